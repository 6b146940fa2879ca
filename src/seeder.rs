use log::{debug, warn};

use crate::detector::FeatureDetector;
use crate::image::Image;
use crate::my_types::*;
use crate::region::Region;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SeedStrategy {
    /// the region is kept for display but yields no point
    Outline,
    /// one point at the region center
    Single,
    /// `size x size` lattice spanning the region, borders included
    Grid { size: usize },
    /// corners detected inside the region
    Features {
        max_points: usize,
        quality_level: f64,
        min_distance: f64,
    },
}

/// Produces the initial points of a committed region.
pub struct Seeder {
    strategy: SeedStrategy,
    detector: Box<dyn FeatureDetector>,
}

impl Seeder {
    pub fn new(strategy: SeedStrategy, detector: Box<dyn FeatureDetector>) -> Self {
        Self { strategy, detector }
    }

    /// `frame` is the most recently acquired frame, absent before the first one.
    pub fn seed(&mut self, region: &Region, frame: Option<&Image>) -> Vec<Vector2d> {
        match self.strategy {
            SeedStrategy::Outline => vec![],
            SeedStrategy::Single => vec![region.center()],
            SeedStrategy::Grid { size } => generate_mesh(region, size),
            SeedStrategy::Features {
                max_points,
                quality_level,
                min_distance,
            } => {
                let frame = if let Some(frame) = frame {
                    frame
                } else {
                    warn!("no frame acquired yet, cannot detect points of interest");
                    return vec![];
                };
                let points =
                    self.generate_poi(region, frame, max_points, quality_level, min_distance);
                if points.is_empty() {
                    warn!("no point of interest found in the zone");
                }
                points
            }
        }
    }

    fn generate_poi(
        &mut self,
        region: &Region,
        frame: &Image,
        max_points: usize,
        quality_level: f64,
        min_distance: f64,
    ) -> Vec<Vector2d> {
        let (sub_image, offset) = frame.crop(region.min(), region.max());
        debug!(
            "detecting corners in a {} x {} sub-image at {:?}",
            sub_image.width, sub_image.height, offset
        );
        let mut corners = self
            .detector
            .detect(&sub_image, max_points, quality_level, min_distance);
        corners.truncate(max_points);
        corners
            .into_iter()
            .map(|corner| region.clamp(corner + offset))
            .collect()
    }
}

/// Evenly spaced values from `min` to `max` inclusive
fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    if n == 1 || min == max {
        return vec![min; n];
    }
    let step = (max - min) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { max } else { min + step * i as f64 })
        .collect()
}

/// Row-major lattice, from the top-left corner of the region
fn generate_mesh(region: &Region, size: usize) -> Vec<Vector2d> {
    let (min, max) = (region.min(), region.max());
    let xs = linspace(min.x, max.x, size);
    let ys = linspace(min.y, max.y, size);
    let mut points = Vec::with_capacity(size * size);
    for y in &ys {
        for x in &xs {
            points.push(Vector2d::new(*x, *y));
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;

    /// Returns fixed corners regardless of the image
    struct FixedDetector(Vec<Vector2d>);

    impl FeatureDetector for FixedDetector {
        fn detect(&mut self, _: &Image, max_points: usize, _: f64, _: f64) -> Vec<Vector2d> {
            self.0.iter().take(max_points).cloned().collect()
        }
    }

    fn grid_seeder(size: usize) -> Seeder {
        Seeder::new(SeedStrategy::Grid { size }, Box::new(Detector::new()))
    }

    #[test]
    fn test_grid() {
        let region = Region::new(Vector2d::new(0., 0.), Vector2d::new(90., 90.));
        let points = grid_seeder(10).seed(&region, None);
        assert_eq!(points.len(), 100);
        assert_eq!(points[0], Vector2d::new(0., 0.));
        assert_eq!(points[1], Vector2d::new(10., 0.));
        assert_eq!(points[9], Vector2d::new(90., 0.));
        assert_eq!(points[90], Vector2d::new(0., 90.));
        assert_eq!(points[99], Vector2d::new(90., 90.));
    }

    #[test]
    fn test_grid_corners_in_any_order() {
        let region = Region::new(Vector2d::new(90., 90.), Vector2d::new(0., 0.));
        let points = grid_seeder(10).seed(&region, None);
        assert_eq!(points[0], Vector2d::new(0., 0.));
        assert_eq!(points[99], Vector2d::new(90., 90.));
    }

    #[test]
    fn test_grid_degenerate() {
        let region = Region::point(Vector2d::new(5., 5.));
        let points = grid_seeder(4).seed(&region, None);
        assert_eq!(points.len(), 16);
        assert!(points.iter().all(|p| *p == Vector2d::new(5., 5.)));

        // a single-pixel-wide column
        let region = Region::new(Vector2d::new(5., 0.), Vector2d::new(5., 30.));
        let points = grid_seeder(4).seed(&region, None);
        assert!(points.iter().all(|p| p.x == 5. && !p.y.is_nan()));
        assert_eq!(points[15], Vector2d::new(5., 30.));

        assert!(grid_seeder(0).seed(&region, None).is_empty());
    }

    #[test]
    fn test_single() {
        let mut seeder = Seeder::new(SeedStrategy::Single, Box::new(Detector::new()));
        let points = seeder.seed(&Region::point(Vector2d::new(100., 100.)), None);
        assert_eq!(points, vec![Vector2d::new(100., 100.)]);
    }

    #[test]
    fn test_outline() {
        let mut seeder = Seeder::new(SeedStrategy::Outline, Box::new(Detector::new()));
        let region = Region::new(Vector2d::new(0., 0.), Vector2d::new(10., 10.));
        assert!(seeder.seed(&region, None).is_empty());
    }

    #[test]
    fn test_features_translated_and_clamped() {
        let strategy = SeedStrategy::Features {
            max_points: 2,
            quality_level: 0.01,
            min_distance: 10.,
        };
        // corners local to the sub-image, the last ones beyond its bounds
        let detector = FixedDetector(vec![
            Vector2d::new(1., 2.),
            Vector2d::new(25., -3.),
            Vector2d::new(5., 5.),
        ]);
        let mut seeder = Seeder::new(strategy, Box::new(detector));
        let frame = Image::filled(100, 100, 0);
        let region = Region::new(Vector2d::new(40., 30.), Vector2d::new(20., 10.));
        let points = seeder.seed(&region, Some(&frame));
        assert_eq!(points, vec![Vector2d::new(21., 12.), Vector2d::new(40., 10.)]);
    }

    #[test]
    fn test_features_without_frame_or_corners() {
        let strategy = SeedStrategy::Features {
            max_points: 10,
            quality_level: 0.01,
            min_distance: 10.,
        };
        let mut seeder = Seeder::new(strategy, Box::new(Detector::new()));
        let region = Region::new(Vector2d::new(0., 0.), Vector2d::new(10., 10.));
        assert!(seeder.seed(&region, None).is_empty());

        let flat = Image::filled(50, 50, 30);
        assert!(seeder.seed(&region, Some(&flat)).is_empty());
        assert!(seeder.seed(&Region::point(Vector2d::new(3., 3.)), Some(&flat)).is_empty());
    }

    #[test]
    fn test_features_on_square() {
        let strategy = SeedStrategy::Features {
            max_points: 10,
            quality_level: 0.1,
            min_distance: 5.,
        };
        let mut seeder = Seeder::new(strategy, Box::new(Detector::new()));
        let frame = Image::from_fn(80, 80, |x, y| {
            if (30..50).contains(&x) && (30..50).contains(&y) {
                200
            } else {
                20
            }
        });
        let region = Region::new(Vector2d::new(20., 20.), Vector2d::new(60., 60.));
        let points = seeder.seed(&region, Some(&frame));
        assert_eq!(points.len(), 4);
        assert!(points.iter().all(|p| region.contains(*p)));
        assert!(points
            .iter()
            .any(|p| (p - Vector2d::new(30., 30.)).norm() <= 1.5));
    }
}

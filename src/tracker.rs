use anyhow::Result;
use log::{debug, info};

use crate::config::Config;
use crate::detector::FeatureDetector;
use crate::feature::TrackedPoint;
use crate::image::Image;
use crate::my_types::*;
use crate::optical_flow::MotionEstimator;
use crate::region::Region;
use crate::seeder::Seeder;
use crate::selection::{PointerEvent, Selection};

/// Result of one frame update.
#[derive(Debug)]
pub struct Tick<'a> {
    /// every point of the session, lost ones included, in seeding order
    pub points: &'a [TrackedPoint],
    /// points lost during this tick
    pub lost: Vec<PointId>,
    /// whether the motion estimator ran
    pub estimated: bool,
}

/// Owns the tracked points and advances them frame to frame.
pub struct Session {
    selection: Selection,
    seeder: Seeder,
    optical_flow: Box<dyn MotionEstimator>,
    points: Vec<TrackedPoint>,
    /// reference frame for the next estimation
    previous_frame: Option<Image>,
    next_id: PointId,
    // Incremented on every processed frame. 0 before the first frame.
    step: usize,
    lost_count: usize,
    track: bool,
    max_error: Option<f64>,
    trail_length: usize,
}

impl Session {
    pub fn new(
        config: &Config,
        optical_flow: Box<dyn MotionEstimator>,
        detector: Box<dyn FeatureDetector>,
    ) -> Self {
        Self {
            selection: Selection::new(config.gesture()),
            seeder: Seeder::new(config.seed_strategy(), detector),
            optical_flow,
            points: vec![],
            previous_frame: None,
            next_id: PointId(0),
            step: 0,
            lost_count: 0,
            track: config.tracks(),
            max_error: config.max_error,
            trail_length: config.trail_length,
        }
    }

    pub fn points(&self) -> &[TrackedPoint] {
        &self.points
    }

    pub fn active_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_active()).count()
    }

    pub fn lost_count(&self) -> usize {
        self.lost_count
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// The committed region, if any
    pub fn region(&self) -> Option<Region> {
        self.selection.region()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Last processed frame, read-only
    pub fn previous_frame(&self) -> Option<&Image> {
        self.previous_frame.as_ref()
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<Region> {
        let region = self.selection.handle(event)?;
        self.seed_region(&region);
        Some(region)
    }

    pub fn on_pointer_down(&mut self, x: f64, y: f64) -> Option<Region> {
        self.handle_pointer(PointerEvent::Down { x, y })
    }

    pub fn on_pointer_up(&mut self, x: f64, y: f64) -> Option<Region> {
        self.handle_pointer(PointerEvent::Up { x, y })
    }

    /// Commit a region without a pointer gesture and seed it
    pub fn commit(&mut self, region: Region) {
        self.selection.commit(region);
        self.seed_region(&region);
    }

    fn seed_region(&mut self, region: &Region) {
        let seeds = self.seeder.seed(region, self.previous_frame.as_ref());
        self.seed_points(seeds);
    }

    /// Replace the tracked points. Ids keep increasing across seedings.
    pub fn seed_points(&mut self, seeds: impl IntoIterator<Item = Vector2d>) {
        self.points.clear();
        for location in seeds {
            self.points.push(TrackedPoint::new(self.next_id, location));
            self.next_id = PointId(self.next_id.0 + 1);
        }
        info!("seeded {} points", self.points.len());
    }

    /// Advance every active point into `next_frame`, which becomes the
    /// reference frame of the following tick.
    pub fn process(&mut self, next_frame: Image) -> Result<Tick<'_>> {
        self.step += 1;
        let mut lost = vec![];
        let mut estimated = false;

        let prior: Vec<Vector2d> = self.points.iter().filter_map(|p| p.location()).collect();
        if let (Some(previous_frame), true, false) =
            (&self.previous_frame, self.track, prior.is_empty())
        {
            let estimate = self
                .optical_flow
                .estimate(previous_frame, &next_frame, &prior)?;
            assert_eq!(estimate.points.len(), prior.len());
            assert_eq!(estimate.valid.len(), prior.len());
            assert_eq!(estimate.errors.len(), prior.len());
            estimated = true;

            let active = self.points.iter_mut().filter(|p| p.is_active());
            for (i, point) in active.enumerate() {
                let accepted = estimate.valid[i]
                    && self
                        .max_error
                        .map_or(true, |max_error| estimate.errors[i] <= max_error);
                if accepted {
                    point.move_to(estimate.points[i], self.trail_length);
                } else if point.mark_lost() {
                    lost.push(point.id);
                }
            }

            self.lost_count += lost.len();
            let remaining = prior.len() - lost.len();
            for id in &lost {
                info!(
                    "point {} lost ({} of {} still tracked)",
                    id,
                    remaining,
                    self.points.len()
                );
            }
        } else {
            debug!("frame {}: no estimation", self.step);
        }

        self.previous_frame = Some(next_frame);

        Ok(Tick {
            points: &self.points,
            lost,
            estimated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Item;
    use crate::detector::Detector;
    use crate::feature::PointState;
    use crate::optical_flow::{FlowEstimate, OpticalFlow};
    use crate::selection::Gesture;

    /// Shifts every point by one pixel and rejects residuals over 1
    struct ErrorEstimator(Vec<f64>);

    impl MotionEstimator for ErrorEstimator {
        fn estimate(&mut self, _: &Image, _: &Image, prior: &[Vector2d]) -> Result<FlowEstimate> {
            let mut estimate = FlowEstimate::with_capacity(prior.len());
            for (i, p) in prior.iter().enumerate() {
                estimate.push(p + Vector2d::new(1., 0.), true, self.0[i]);
            }
            Ok(estimate)
        }
    }

    fn session(config: &Config, estimator: impl MotionEstimator + 'static) -> Session {
        Session::new(config, Box::new(estimator), Box::new(Detector::new()))
    }

    #[test]
    fn test_error_gating_is_opt_in() {
        let frame = Image::filled(8, 8, 0);

        let mut config = Config::default();
        let mut flag_only = session(&config, ErrorEstimator(vec![0.5, 7.]));
        flag_only.seed_points([Vector2d::new(1., 1.), Vector2d::new(2., 2.)]);
        flag_only.process(frame.clone()).unwrap();
        let tick = flag_only.process(frame.clone()).unwrap();
        assert!(tick.lost.is_empty());

        config.max_error = Some(1.);
        let mut gated = session(&config, ErrorEstimator(vec![0.5, 7.]));
        gated.seed_points([Vector2d::new(1., 1.), Vector2d::new(2., 2.)]);
        gated.process(frame.clone()).unwrap();
        let tick = gated.process(frame).unwrap();
        assert_eq!(tick.lost, vec![PointId(1)]);
        assert_eq!(gated.points()[0].location(), Some(Vector2d::new(2., 1.)));
        assert_eq!(gated.lost_count(), 1);
    }

    #[test]
    fn test_seed_only_never_estimates() {
        let config = Config {
            seed_only: true,
            ..Config::default()
        };
        let mut session = session(&config, ErrorEstimator(vec![0.]));
        session.seed_points([Vector2d::new(1., 1.)]);
        for _ in 0..3 {
            let tick = session.process(Image::filled(8, 8, 0)).unwrap();
            assert!(!tick.estimated);
        }
        assert_eq!(session.points()[0].location(), Some(Vector2d::new(1., 1.)));
    }

    #[test]
    fn test_reseeding_keeps_ids_increasing() {
        let config = Config {
            item: Item::Pixel,
            ..Config::default()
        };
        let mut session = session(&config, ErrorEstimator(vec![0.]));
        assert_eq!(session.selection().gesture(), Gesture::Point);
        session.on_pointer_down(10., 10.).unwrap();
        assert_eq!(session.points()[0].id, PointId(0));
        session.on_pointer_down(20., 20.).unwrap();
        assert_eq!(session.points().len(), 1);
        assert_eq!(session.points()[0].id, PointId(1));
        assert_eq!(session.points()[0].location(), Some(Vector2d::new(20., 20.)));
    }

    #[test]
    fn test_poi_seeded_from_previous_frame() {
        let config = Config {
            quality_level: 0.1,
            min_distance: 5.,
            ..Config::default()
        };
        let frame = Image::from_fn(80, 80, |x, y| {
            if (30..50).contains(&x) && (30..50).contains(&y) {
                200
            } else {
                20
            }
        });
        let mut session = Session::new(
            &config,
            Box::new(OpticalFlow::new(&config)),
            Box::new(Detector::new()),
        );

        // before any frame there is nothing to detect on
        assert!(session.on_pointer_down(20., 20.).is_none());
        assert!(session.on_pointer_down(60., 60.).is_some());
        assert!(session.points().is_empty());

        session.process(frame.clone()).unwrap();
        session.commit(Region::new(Vector2d::new(20., 20.), Vector2d::new(60., 60.)));
        assert_eq!(session.points().len(), 4);

        // a static scene keeps every corner in place
        let tick = session.process(frame).unwrap();
        assert!(tick.estimated);
        assert!(tick.lost.is_empty());
        for point in tick.points {
            assert_eq!(point.state(), PointState::Active);
        }
    }
}

use crate::image::Image;
use crate::my_types::*;

/// Corner detection used to seed points of interest.
pub trait FeatureDetector {
    /// Returns at most `max_points` corners in `image` pixel coordinates,
    /// strongest first.
    fn detect(
        &mut self,
        image: &Image,
        max_points: usize,
        quality_level: f64,
        min_distance: f64,
    ) -> Vec<Vector2d>;
}

/// Shi-Tomasi "good features to track": the response of a pixel is the
/// smallest eigenvalue of the gradient structure tensor summed over a block.
pub struct Detector {
    block_radius: i64,
    response: Vec<f64>,
}

impl Detector {
    pub fn new() -> Self {
        Detector {
            block_radius: 1,
            response: vec![],
        }
    }

    fn compute_response(&mut self, image: &Image) {
        let w = image.width as i64;
        let h = image.height as i64;
        let v = |x: i64, y: i64| image.value_clamped(x, y) as f64;

        // sobel derivatives with replicated borders
        let mut gx = vec![0.; image.data.len()];
        let mut gy = vec![0.; image.data.len()];
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) as usize;
                gx[i] = (v(x + 1, y - 1) + 2. * v(x + 1, y) + v(x + 1, y + 1)
                    - v(x - 1, y - 1)
                    - 2. * v(x - 1, y)
                    - v(x - 1, y + 1))
                    / 8.;
                gy[i] = (v(x - 1, y + 1) + 2. * v(x, y + 1) + v(x + 1, y + 1)
                    - v(x - 1, y - 1)
                    - 2. * v(x, y - 1)
                    - v(x + 1, y - 1))
                    / 8.;
            }
        }

        self.response.clear();
        self.response.resize(image.data.len(), 0.);
        let b = self.block_radius;
        for y in 0..h {
            for x in 0..w {
                let (mut xx, mut yy, mut xy) = (0., 0., 0.);
                for by in (y - b).max(0)..=(y + b).min(h - 1) {
                    for bx in (x - b).max(0)..=(x + b).min(w - 1) {
                        let i = (by * w + bx) as usize;
                        xx += gx[i] * gx[i];
                        yy += gy[i] * gy[i];
                        xy += gx[i] * gy[i];
                    }
                }
                let half_trace = 0.5 * (xx + yy);
                let det_term = (0.25 * (xx - yy).powi(2) + xy * xy).sqrt();
                self.response[(y * w + x) as usize] = half_trace - det_term;
            }
        }
    }

    fn is_local_max(&self, image: &Image, x: i64, y: i64) -> bool {
        let w = image.width as i64;
        let h = image.height as i64;
        let r = self.response[(y * w + x) as usize];
        for ny in (y - 1).max(0)..=(y + 1).min(h - 1) {
            for nx in (x - 1).max(0)..=(x + 1).min(w - 1) {
                if self.response[(ny * w + nx) as usize] > r {
                    return false;
                }
            }
        }
        true
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureDetector for Detector {
    fn detect(
        &mut self,
        image: &Image,
        max_points: usize,
        quality_level: f64,
        min_distance: f64,
    ) -> Vec<Vector2d> {
        if image.is_empty() || max_points == 0 {
            return vec![];
        }
        self.compute_response(image);

        let max_response = self.response.iter().cloned().fold(0., f64::max);
        if max_response <= 0. {
            return vec![];
        }
        let threshold = quality_level * max_response;

        let w = image.width as i64;
        let mut candidates = vec![];
        for y in 0..image.height as i64 {
            for x in 0..w {
                let r = self.response[(y * w + x) as usize];
                if r > 0. && r >= threshold && self.is_local_max(image, x, y) {
                    candidates.push((r, Vector2d::new(x as f64, y as f64)));
                }
            }
        }
        // strongest first, stable on ties so the scan order decides
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let min_distance2 = min_distance.powi(2);
        let mut corners: Vec<Vector2d> = vec![];
        for (_, candidate) in candidates {
            if corners
                .iter()
                .all(|c| (c - candidate).norm_squared() >= min_distance2)
            {
                corners.push(candidate);
                if corners.len() == max_points {
                    break;
                }
            }
        }
        corners
    }
}

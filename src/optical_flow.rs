use anyhow::Result;
use nalgebra as na;

use crate::config::Config;
use crate::frame::PyramidFrame;
use crate::image::*;
use crate::my_types::*;

/// Per-point output of a motion estimate. All vectors have the length and
/// order of the prior points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowEstimate {
    pub points: Vec<Vector2d>,
    pub valid: Vec<bool>,
    pub errors: Vec<f64>,
}

impl FlowEstimate {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            points: Vec::with_capacity(n),
            valid: Vec::with_capacity(n),
            errors: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, point: Vector2d, valid: bool, error: f64) {
        self.points.push(point);
        self.valid.push(valid);
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Sparse motion estimation between two temporally adjacent grayscale frames.
pub trait MotionEstimator {
    /// Locate `prior` points of `prev` in `next`.
    ///
    /// Both frames must have the same size.
    fn estimate(&mut self, prev: &Image, next: &Image, prior: &[Vector2d]) -> Result<FlowEstimate>;
}

/// Pyramidal Lucas-Kanade
pub struct OpticalFlow {
    lk_iters: usize,
    lk_levels: usize,
    lk_win_size: usize,
    lk_term: f64,
    lk_min_eig: f64,
    ix: Matrixd,
    iy: Matrixd,
    it: Matrixd,
    grid: Matrixd,
}

impl OpticalFlow {
    pub fn new(config: &Config) -> OpticalFlow {
        let lk_win_size = usize::max(config.lk_win_size, 3);

        OpticalFlow {
            lk_iters: config.lk_iters,
            lk_levels: config.lk_levels,
            lk_win_size,
            lk_term: config.lk_term,
            lk_min_eig: config.lk_min_eig,
            ix: na::DMatrix::zeros(lk_win_size, lk_win_size),
            iy: na::DMatrix::zeros(lk_win_size, lk_win_size),
            it: na::DMatrix::zeros(lk_win_size, lk_win_size),
            grid: na::DMatrix::zeros(lk_win_size + 2, lk_win_size + 2),
        }
    }

    /// ref http://robots.stanford.edu/cs223b04/algo_tracking.pdf
    ///
    /// Returns the location of `point0` in the second frame and the mean
    /// absolute residual over the full-resolution window.
    fn process_feature(
        &mut self,
        pyramid_frame0: &PyramidFrame,
        pyramid_frame1: &PyramidFrame,
        point0: Vector2d,
    ) -> Option<(Vector2d, f64)> {
        let lk_term2 = self.lk_term.powi(2);
        let r = (self.lk_win_size - 1) / 2;

        if !pyramid_frame0.image.contains(point0) {
            return None;
        }

        // guess propagated from the coarser level, in the current level's pixels.
        // Coarse windows may overhang the border, sampling replicates it.
        let mut g = Vector2d::zeros();
        for level in (0..pyramid_frame0.level_count() + 1).rev() {
            let level0 = pyramid_frame0.get_image_at_level(level);
            let level1 = pyramid_frame1.get_image_at_level(level);
            let u = point0 / u32::pow(2, level as u32) as f64;
            // compute the derivative
            scharr(level0, u, r, &mut self.ix, &mut self.iy, &mut self.grid);
            let gradient = spatial_gradient(&self.ix, &self.iy);
            if gradient.symmetric_eigenvalues().min() < self.lk_min_eig {
                if level == 0 {
                    return None;
                }
                // nothing to lock onto at this scale, refine on the finer one
                g *= 2.;
                continue;
            }
            let mut nu = Vector2d::zeros();
            for _ in 0..self.lk_iters {
                let center = u + g + nu;
                image_difference(r, &self.grid, &mut self.it, level1, center);
                let eta = flow_vector(&gradient, &self.ix, &self.iy, &self.it)?;
                nu += eta;
                if eta.norm_squared() < lk_term2 {
                    break;
                }
            }

            if level > 0 {
                g = 2. * (g + nu)
            } else {
                g += nu
            }
        }

        let point1 = point0 + g;
        if !pyramid_frame1.image.contains(point1) {
            return None;
        }
        // the grid still holds the full-resolution window around point0
        image_difference(r, &self.grid, &mut self.it, &pyramid_frame1.image, point1);
        let error = self.it.iter().map(|v| v.abs()).sum::<f64>() / self.it.len() as f64;
        Some((point1, error))
    }
}

impl MotionEstimator for OpticalFlow {
    fn estimate(&mut self, prev: &Image, next: &Image, prior: &[Vector2d]) -> Result<FlowEstimate> {
        assert!(!prev.is_empty(), "motion estimation needs a previous frame");
        assert_eq!(
            (prev.width, prev.height),
            (next.width, next.height),
            "motion estimation between frames of different sizes"
        );

        let mut estimate = FlowEstimate::with_capacity(prior.len());
        if prior.is_empty() {
            return Ok(estimate);
        }

        let pyramid_frame0 = PyramidFrame::new(prev, self.lk_levels)?;
        let pyramid_frame1 = PyramidFrame::new(next, self.lk_levels)?;
        for point0 in prior {
            match self.process_feature(&pyramid_frame0, &pyramid_frame1, *point0) {
                Some((point1, error)) => estimate.push(point1, true, error),
                None => estimate.push(*point0, false, f64::INFINITY),
            }
        }
        Ok(estimate)
    }
}

fn flow_vector(gradient: &Matrix2d, ix: &Matrixd, iy: &Matrixd, it: &Matrixd) -> Option<Vector2d> {
    let mut b = Vector2d::zeros();

    for y in 0..iy.nrows() {
        for x in 0..ix.ncols() {
            b[0] += it[(y, x)] * ix[(y, x)];
            b[1] += it[(y, x)] * iy[(y, x)];
        }
    }

    gradient.try_inverse().map(|inv_g| inv_g * b)
}

/// `it = I0 - I1` over the window, where I0 is the interior of `i0`
fn image_difference(r: usize, i0: &Matrixd, it: &mut Matrixd, level: &Image, center: Vector2d) {
    fill_grid(level, center, r, it);
    let shape = (it.nrows(), it.ncols());
    *it *= -1.;
    *it += i0.view((1, 1), shape);
}

fn spatial_gradient(ix: &Matrixd, iy: &Matrixd) -> Matrix2d {
    assert_eq!(ix.nrows(), iy.nrows());
    assert_eq!(ix.ncols(), iy.ncols());

    let mut x2 = 0.;
    let mut y2 = 0.;
    let mut xy = 0.;

    for y in 0..iy.nrows() {
        for x in 0..ix.ncols() {
            x2 += ix[(y, x)] * ix[(y, x)];
            y2 += iy[(y, x)] * iy[(y, x)];
            xy += ix[(y, x)] * iy[(y, x)];
        }
    }

    Matrix2d::new(x2, xy, xy, y2)
}

/// ref https://theailearner.com/tag/scharr-operator/
///
/// Derivatives over the `(2r + 1)^2` window around `center`. `grid` receives
/// the intensities of the window padded by one pixel.
fn scharr(
    level: &Image,
    center: Vector2d,
    r: usize,
    out_x: &mut Matrixd,
    out_y: &mut Matrixd,
    grid: &mut Matrixd,
) {
    fill_grid(level, center, r + 1, grid);

    *out_x = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
    *out_y = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
    for y in 1..(grid.nrows() - 1) {
        for x in 1..(grid.ncols() - 1) {
            out_x[(y - 1, x - 1)] =
                (10. * grid[(y, x + 1)] + 3. * grid[(y + 1, x + 1)] + 3. * grid[(y - 1, x + 1)]
                    - 10. * grid[(y, x - 1)]
                    - 3. * grid[(y + 1, x - 1)]
                    - 3. * grid[(y - 1, x - 1)])
                    / 32.;
            out_y[(y - 1, x - 1)] =
                (10. * grid[(y + 1, x)] + 3. * grid[(y + 1, x + 1)] + 3. * grid[(y + 1, x - 1)]
                    - 10. * grid[(y - 1, x)]
                    - 3. * grid[(y - 1, x + 1)]
                    - 3. * grid[(y - 1, x - 1)])
                    / 32.;
        }
    }
}

/// Sample the `(2r + 1)^2` neighbourhood of `center`, replicating borders
fn fill_grid(level: &Image, center: Vector2d, r: usize, grid: &mut Matrixd) {
    let n = 2 * r + 1;
    if grid.nrows() != n || grid.ncols() != n {
        *grid = na::DMatrix::zeros(n, n);
    }

    let r = r as i64;
    for (y_ind, y) in (-r..=r).enumerate() {
        for (x_ind, x) in (-r..=r).enumerate() {
            grid[(y_ind, x_ind)] = bilinear(level, center + Vector2d::new(x as f64, y as f64));
        }
    }
}

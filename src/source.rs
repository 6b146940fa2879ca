use anyhow::{bail, Result};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::image::{bilinear, Image};
use crate::my_types::*;

/// Ordered, effectively infinite sequence of grayscale frames.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Image>;
}

/// Pans a window over a smooth random texture at a constant velocity,
/// bouncing at the texture borders.
pub struct SyntheticSource {
    texture: Image,
    width: usize,
    height: usize,
    offset: Vector2d,
    velocity: Vector2d,
}

impl SyntheticSource {
    pub fn new(width: usize, height: usize, velocity: Vector2d, seed: u64) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("synthetic frames must not be empty, got {width} x {height}");
        }
        let margin = 64;
        let texture = smooth_noise(width + 2 * margin, height + 2 * margin, seed);
        Ok(Self {
            texture,
            width,
            height,
            offset: Vector2d::new(margin as f64, margin as f64),
            velocity,
        })
    }

    /// Top-left corner of the next frame in texture coordinates
    pub fn offset(&self) -> Vector2d {
        self.offset
    }

    fn advance(&mut self) {
        let max = Vector2d::new(
            (self.texture.width - self.width) as f64,
            (self.texture.height - self.height) as f64,
        );
        for i in 0..2 {
            let next = self.offset[i] + self.velocity[i];
            if next < 0. || next > max[i] {
                self.velocity[i] = -self.velocity[i];
            }
            self.offset[i] = (self.offset[i] + self.velocity[i]).clamp(0., max[i]);
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Image> {
        let offset = self.offset;
        let frame = Image::from_fn(self.width, self.height, |x, y| {
            let p = offset + Vector2d::new(x as f64, y as f64);
            bilinear(&self.texture, p).round() as u8
        });
        self.advance();
        Ok(frame)
    }
}

/// Uniform noise blurred by two box filter passes
fn smooth_noise(width: usize, height: usize, seed: u64) -> Image {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let noise: Vec<f64> = (0..width * height).map(|_| rng.gen_range(0.0..255.0)).collect();

    let radius = 2_i64;
    let blur = |input: &[f64], horizontal: bool| -> Vec<f64> {
        let mut out = vec![0.; input.len()];
        for y in 0..height as i64 {
            for x in 0..width as i64 {
                let mut sum = 0.;
                for k in -radius..=radius {
                    let (sx, sy) = if horizontal { (x + k, y) } else { (x, y + k) };
                    let sx = sx.clamp(0, width as i64 - 1) as usize;
                    let sy = sy.clamp(0, height as i64 - 1) as usize;
                    sum += input[sy * width + sx];
                }
                out[y as usize * width + x as usize] = sum / (2 * radius + 1) as f64;
            }
        }
        out
    };
    let blurred = blur(&blur(&noise, true), false);

    // stretch the contrast back to the full range
    let (lo, hi) = blurred
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let scale = if hi > lo { 255. / (hi - lo) } else { 0. };
    Image {
        data: blurred
            .iter()
            .map(|v| ((v - lo) * scale).round() as u8)
            .collect(),
        width,
        height,
    }
}

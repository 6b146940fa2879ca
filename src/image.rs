use anyhow::{bail, Result};
use ndarray as nd;

use crate::my_types::*;

/// Row-major grayscale image storage
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Image {
    /// Create an empty image
    pub fn empty() -> Image {
        Image {
            data: vec![],
            width: 0,
            height: 0,
        }
    }

    /// Create an image filled with a constant intensity
    pub fn filled(width: usize, height: usize, value: u8) -> Image {
        Image {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Build an image from a per-pixel function of `(x, y)`
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> u8) -> Image {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Image {
            data,
            width,
            height,
        }
    }

    /// Convert interleaved BGR (or BGRA) bytes into luminance.
    pub fn from_bgr(bytes: &[u8], width: usize, height: usize) -> Result<Image> {
        if width == 0 || height == 0 {
            bail!("cannot convert an empty {width} x {height} frame");
        }
        let channels = bytes.len() / (width * height);
        if channels == 1 && bytes.len() == width * height {
            return Ok(Image {
                data: bytes.to_vec(),
                width,
                height,
            });
        }
        if channels < 3 {
            bail!(
                "frame of {} bytes is not a {width} x {height} color image",
                bytes.len()
            );
        }
        let pixels = nd::ArrayView3::from_shape((height, width, channels), bytes)?;
        let data = pixels
            .lanes(nd::Axis(2))
            .into_iter()
            .map(|px| {
                let luma = 0.114 * px[0] as f64 + 0.587 * px[1] as f64 + 0.299 * px[2] as f64;
                luma.round().min(255.) as u8
            })
            .collect();
        Ok(Image {
            data,
            width,
            height,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether a sub-pixel location lies within the pixel centers of the image
    pub fn contains(&self, point: Vector2d) -> bool {
        !self.is_empty()
            && point.x >= 0.
            && point.y >= 0.
            && point.x <= (self.width - 1) as f64
            && point.y <= (self.height - 1) as f64
    }

    #[inline(always)]
    pub fn value(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Pixel access with replicated borders
    #[inline(always)]
    pub fn value_clamped(&self, x: i64, y: i64) -> u8 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.value(x, y)
    }

    #[inline(always)]
    pub fn set_value(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Copy `patch` with its top-left corner at `(x, y)`, skipping pixels
    /// falling outside the image.
    pub fn set_sub_image_i32(&mut self, x: i32, y: i32, patch: &Image) {
        for py in 0..patch.height {
            for px in 0..patch.width {
                let tx = x + px as i32;
                let ty = y + py as i32;
                if tx < 0 || ty < 0 || tx >= self.width as i32 || ty >= self.height as i32 {
                    continue;
                }
                self.set_value(tx as usize, ty as usize, patch.value(px, py));
            }
        }
    }

    /// Inclusive crop `[x_min, x_max] x [y_min, y_max]`, clamped to the image.
    /// Returns the crop and the offset of its top-left corner.
    pub fn crop(&self, min: Vector2d, max: Vector2d) -> (Image, Vector2d) {
        if self.is_empty() {
            return (Image::empty(), Vector2d::zeros());
        }
        let clamp_x = |v: f64| v.round().clamp(0., (self.width - 1) as f64) as usize;
        let clamp_y = |v: f64| v.round().clamp(0., (self.height - 1) as f64) as usize;
        let (x0, x1) = (clamp_x(min.x), clamp_x(max.x));
        let (y0, y1) = (clamp_y(min.y), clamp_y(max.y));
        if x1 < x0 || y1 < y0 {
            return (Image::empty(), Vector2d::new(x0 as f64, y0 as f64));
        }
        let crop = Image::from_fn(x1 - x0 + 1, y1 - y0 + 1, |x, y| self.value(x0 + x, y0 + y));
        (crop, Vector2d::new(x0 as f64, y0 as f64))
    }

    /// Bilinear resize to `width x height`
    pub fn resize(&self, width: usize, height: usize) -> Image {
        if self.width == width && self.height == height {
            return self.clone();
        }
        if self.is_empty() {
            return Image::filled(width, height, 0);
        }
        let sx = self.width as f64 / width as f64;
        let sy = self.height as f64 / height as f64;
        Image::from_fn(width, height, |x, y| {
            let p = Vector2d::new((x as f64 + 0.5) * sx - 0.5, (y as f64 + 0.5) * sy - 0.5);
            bilinear(self, p).round().clamp(0., 255.) as u8
        })
    }
}

/// Sample the image at a sub-pixel location. Locations outside the image use
/// the nearest border pixel.
pub fn bilinear(image: &Image, p: Vector2d) -> f64 {
    let x = p.x.clamp(0., (image.width - 1) as f64);
    let y = p.y.clamp(0., (image.height - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = usize::min(x0 + 1, image.width - 1);
    let y1 = usize::min(y0 + 1, image.height - 1);
    let ax = x - x0 as f64;
    let ay = y - y0 as f64;

    let top = (1. - ax) * image.value(x0, y0) as f64 + ax * image.value(x1, y0) as f64;
    let bottom = (1. - ax) * image.value(x0, y1) as f64 + ax * image.value(x1, y1) as f64;
    (1. - ay) * top + ay * bottom
}

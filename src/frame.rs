use anyhow::Result;

use crate::image::Image;
use crate::pyramid::Pyramid;

#[derive(Debug)]
pub struct PyramidFrame {
    /// original image
    pub image: Image,
    /// downsized images
    pub pyramid: Pyramid,
}

impl PyramidFrame {
    /// Build a frame with up to `levels` downscaled images, fewer when the
    /// image is too small to halve that many times.
    pub fn new(image: &Image, levels: usize) -> Result<PyramidFrame> {
        let mut pyramid = Pyramid::empty();
        pyramid.compute(image, usable_levels(image, levels))?;
        Ok(PyramidFrame {
            image: image.clone(),
            pyramid,
        })
    }

    /// Number of downscaled levels above the original image
    pub fn level_count(&self) -> usize {
        self.pyramid.levels.len()
    }

    pub fn get_image_at_level(&self, level: usize) -> &Image {
        if level == 0 {
            &self.image
        } else {
            &self.pyramid.levels[level - 1]
        }
    }
}

fn usable_levels(image: &Image, levels: usize) -> usize {
    let mut size = usize::min(image.width, image.height);
    let mut count = 0;
    while count < levels && size >= 2 {
        size /= 2;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_limited_by_size() {
        let frame = PyramidFrame::new(&Image::filled(640, 480, 0), 2).unwrap();
        assert_eq!(frame.level_count(), 2);
        assert_eq!(frame.get_image_at_level(2).width, 160);

        let frame = PyramidFrame::new(&Image::filled(5, 3, 0), 4).unwrap();
        assert_eq!(frame.level_count(), 1);
        assert_eq!(frame.get_image_at_level(0).width, 5);
    }
}

use std::path::Path;

use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use cv2::prelude::*;
use log::info;
use opencv as cv2;

use crate::image::Image;
use crate::matcher::{load_coordinates, Reference};
use crate::source::FrameSource;

/// Frames of a camera peripheral (0 for a built-in webcam)
pub struct CameraSource {
    index: i32,
    capture: cv2::videoio::VideoCapture,
    frame: cv2::core::Mat,
}

impl CameraSource {
    pub fn new(index: i32) -> Result<Self> {
        let capture = cv2::videoio::VideoCapture::new(index, cv2::videoio::CAP_ANY)
            .with_context(|| format!("unable to open camera {index}"))?;
        if !capture.is_opened()? {
            bail!("unable to open camera {index}");
        }
        info!("camera {index} opened");
        Ok(Self {
            index,
            capture,
            frame: cv2::core::Mat::default(),
        })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Image> {
        if !self.capture.read(&mut self.frame)? {
            bail!("camera {} returned no frame", self.index);
        }
        mat_to_image(&self.frame)
    }
}

/// Convert an 8-bit BGR, BGRA or grayscale Mat
pub fn mat_to_image(mat: &cv2::core::Mat) -> Result<Image> {
    let size = mat.size()?;
    if size.width <= 0 || size.height <= 0 {
        bail!("empty frame");
    }
    let continuous;
    let mat = if mat.is_continuous() {
        mat
    } else {
        continuous = mat.try_clone()?;
        &continuous
    };
    let bytes = mat.data_bytes()?;
    Image::from_bgr(bytes, size.width as usize, size.height as usize)
}

/// Load the photographs of `folder`, sorted by file name, aligned by index
/// with the coordinates of `coordinates`.
pub fn load_references(folder: &Path, coordinates: &Path) -> Result<Vec<Reference>> {
    let points = load_coordinates(coordinates)?;
    let mut paths = std::fs::read_dir(folder)
        .with_context(|| format!("cannot read {}", folder.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.retain(|p| p.is_file());
    paths.sort();
    if paths.len() != points.len() {
        bail!(
            "{} photographs in {} but {} coordinates in {}",
            paths.len(),
            folder.display(),
            points.len(),
            coordinates.display()
        );
    }

    let mut references = Vec::with_capacity(paths.len());
    for (path, point) in paths.iter().zip(points) {
        let name = path
            .to_str()
            .ok_or_else(|| anyhow!("non UTF-8 path {}", path.display()))?;
        let mat = cv2::imgcodecs::imread(name, cv2::imgcodecs::IMREAD_GRAYSCALE)?;
        let image = mat_to_image(&mat).with_context(|| format!("cannot decode {name}"))?;
        references.push(Reference { image, point });
    }
    info!("loaded {} reference photographs", references.len());
    Ok(references)
}

use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context as AnyhowContext, Result};
use log::info;
use serde::Deserialize;

use crate::feature::TrackedPoint;
use crate::image::Image;
use crate::my_types::*;
use crate::optical_flow::MotionEstimator;

/// A reference photograph and the location recorded on it
#[derive(Clone, Debug)]
pub struct Reference {
    pub image: Image,
    pub point: Vector2d,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Pair([f64; 2]),
    Named { x: f64, y: f64 },
}

/// Read `[[x, y], ...]` or `[{"x": .., "y": ..}, ...]`
pub fn load_coordinates(path: &Path) -> Result<Vec<Vector2d>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let coordinates: Vec<Coordinate> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("JSON deserialization failed for {}", path.display()))?;
    Ok(coordinates
        .into_iter()
        .map(|c| match c {
            Coordinate::Pair([x, y]) => Vector2d::new(x, y),
            Coordinate::Named { x, y } => Vector2d::new(x, y),
        })
        .collect())
}

#[derive(Debug)]
pub struct MatchReport {
    /// one tracked point per reference, active when found in the frame
    pub points: Vec<TrackedPoint>,
    pub found: usize,
    pub total: usize,
}

impl MatchReport {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.
        } else {
            self.found as f64 / self.total as f64
        }
    }
}

/// Relocates the recorded point of every reference photograph in live frames.
pub struct Matcher {
    references: Vec<Reference>,
    last_found: Option<usize>,
}

impl Matcher {
    pub fn new(references: Vec<Reference>) -> Self {
        Self {
            references,
            last_found: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn match_frame(
        &mut self,
        optical_flow: &mut dyn MotionEstimator,
        frame: &Image,
    ) -> Result<MatchReport> {
        let mut points = Vec::with_capacity(self.references.len());
        let mut found = 0;
        for (i, reference) in self.references.iter().enumerate() {
            let image = if reference.image.width == frame.width
                && reference.image.height == frame.height
            {
                Cow::Borrowed(&reference.image)
            } else {
                Cow::Owned(reference.image.resize(frame.width, frame.height))
            };
            let estimate = optical_flow.estimate(&image, frame, &[reference.point])?;
            assert_eq!(estimate.len(), 1);

            let mut point = TrackedPoint::new(PointId(i), reference.point);
            if estimate.valid[0] {
                point.move_to(estimate.points[0], 1);
                found += 1;
            } else {
                point.mark_lost();
            }
            points.push(point);
        }

        let total = self.references.len();
        if self.last_found != Some(found) {
            info!("found pixels: {found} out of {total}");
            self.last_found = Some(found);
        }
        Ok(MatchReport {
            points,
            found,
            total,
        })
    }
}

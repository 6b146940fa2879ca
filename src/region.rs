use anyhow::{anyhow, bail, Result};
use std::str::FromStr;

use crate::my_types::*;

/// Axis-aligned rectangle given by two opposite corners in any order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub start: Vector2d,
    pub end: Vector2d,
}

impl Region {
    pub fn new(start: Vector2d, end: Vector2d) -> Self {
        Self { start, end }
    }

    /// Zero-area region around a single location
    pub fn point(p: Vector2d) -> Self {
        Self { start: p, end: p }
    }

    pub fn min(&self) -> Vector2d {
        self.start.inf(&self.end)
    }

    pub fn max(&self) -> Vector2d {
        self.start.sup(&self.end)
    }

    pub fn center(&self) -> Vector2d {
        0.5 * (self.start + self.end)
    }

    pub fn width(&self) -> f64 {
        (self.end.x - self.start.x).abs()
    }

    pub fn height(&self) -> f64 {
        (self.end.y - self.start.y).abs()
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() == 0. || self.height() == 0.
    }

    pub fn contains(&self, p: Vector2d) -> bool {
        let (min, max) = (self.min(), self.max());
        p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
    }

    /// Nearest location inside the region
    pub fn clamp(&self, p: Vector2d) -> Vector2d {
        let (min, max) = (self.min(), self.max());
        Vector2d::new(p.x.clamp(min.x, max.x), p.y.clamp(min.y, max.y))
    }
}

/// Parses `x0,y0,x1,y1`
impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|e| anyhow!("invalid coordinate {v:?}: {e}"))
            })
            .collect::<Result<Vec<_>>>()?;
        if values.len() != 4 {
            bail!("expected x0,y0,x1,y1 but got {} values", values.len());
        }
        Ok(Region::new(
            Vector2d::new(values[0], values[1]),
            Vector2d::new(values[2], values[3]),
        ))
    }
}

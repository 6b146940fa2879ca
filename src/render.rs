use anyhow::Result;

use crate::feature::TrackedPoint;
use crate::image::Image;
use crate::my_types::*;
use crate::region::Region;
use crate::selection::PointerEvent;

/// What gets drawn for one tick.
pub struct Scene<'a> {
    pub frame: &'a Image,
    /// lost points are included, drawing them is up to the overlay
    pub points: &'a [TrackedPoint],
    pub region: Option<Region>,
    /// first corner of a selection in progress
    pub pending: Option<Vector2d>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Displays scenes and collects user input.
pub trait Overlay {
    /// Pointer events received since the last call, oldest first
    fn pointer_events(&mut self) -> Vec<PointerEvent>;

    fn present(&mut self, scene: &Scene) -> Result<Control>;
}

/// Draws nothing and stops after an optional number of frames.
#[derive(Debug, Default)]
pub struct Headless {
    remaining: Option<usize>,
}

impl Headless {
    pub fn new(frames: Option<usize>) -> Self {
        Self { remaining: frames }
    }
}

impl Overlay for Headless {
    fn pointer_events(&mut self) -> Vec<PointerEvent> {
        vec![]
    }

    fn present(&mut self, _: &Scene) -> Result<Control> {
        match self.remaining.as_mut() {
            Some(0) => Ok(Control::Quit),
            Some(remaining) => {
                *remaining -= 1;
                Ok(if *remaining == 0 {
                    Control::Quit
                } else {
                    Control::Continue
                })
            }
            None => Ok(Control::Continue),
        }
    }
}

use clap::ValueEnum;
use log::info;

use crate::my_types::*;
use crate::region::Region;

/// How pointer events delimit a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Gesture {
    /// press sets the first corner, release sets the second
    Drag,
    /// a first press sets the first corner, the next press the second
    Click,
    /// every press commits a zero-area region at the pointer
    Point,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { x: f64, y: f64 },
    Up { x: f64, y: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectionState {
    Idle,
    /// first corner placed
    Pending { start: Vector2d },
    Committed(Region),
}

/// Turns pointer events into committed regions. At most one region is pending.
#[derive(Debug)]
pub struct Selection {
    gesture: Gesture,
    state: SelectionState,
}

impl Selection {
    pub fn new(gesture: Gesture) -> Self {
        Self {
            gesture,
            state: SelectionState::Idle,
        }
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn region(&self) -> Option<Region> {
        match self.state {
            SelectionState::Committed(region) => Some(region),
            _ => None,
        }
    }

    pub fn pending_start(&self) -> Option<Vector2d> {
        match self.state {
            SelectionState::Pending { start } => Some(start),
            _ => None,
        }
    }

    /// Returns the region committed by this event, if any
    pub fn handle(&mut self, event: PointerEvent) -> Option<Region> {
        match event {
            PointerEvent::Down { x, y } => self.on_pointer_down(x, y),
            PointerEvent::Up { x, y } => self.on_pointer_up(x, y),
        }
    }

    pub fn on_pointer_down(&mut self, x: f64, y: f64) -> Option<Region> {
        let p = Vector2d::new(x, y);
        match (self.gesture, self.state) {
            (Gesture::Point, _) => {
                info!("point selected ({x}, {y})");
                self.commit(Region::point(p))
            }
            (Gesture::Click, SelectionState::Pending { start }) => {
                info!("zone ends ({x}, {y})");
                self.commit(Region::new(start, p))
            }
            (Gesture::Drag, SelectionState::Pending { .. }) => {
                info!("zone restarts ({x}, {y})");
                self.state = SelectionState::Pending { start: p };
                None
            }
            (_, _) => {
                info!("zone begins ({x}, {y})");
                self.state = SelectionState::Pending { start: p };
                None
            }
        }
    }

    pub fn on_pointer_up(&mut self, x: f64, y: f64) -> Option<Region> {
        match (self.gesture, self.state) {
            (Gesture::Drag, SelectionState::Pending { start }) => {
                info!("zone ends ({x}, {y})");
                self.commit(Region::new(start, Vector2d::new(x, y)))
            }
            _ => None,
        }
    }

    /// Commit a region directly, bypassing the gesture
    pub fn commit(&mut self, region: Region) -> Option<Region> {
        self.state = SelectionState::Committed(region);
        Some(region)
    }
}

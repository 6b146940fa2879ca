use std::collections::VecDeque;

use crate::my_types::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointState {
    Active,
    /// The estimator could no longer locate the point. Terminal.
    Lost,
}

#[derive(Clone, Debug)]
pub struct TrackedPoint {
    pub id: PointId,
    state: PointState,
    location: Vector2d,
    /// past locations, oldest first
    trail: VecDeque<Vector2d>,
}

impl TrackedPoint {
    pub fn new(id: PointId, location: Vector2d) -> Self {
        TrackedPoint {
            id,
            state: PointState::Active,
            location,
            trail: VecDeque::new(),
        }
    }

    pub fn state(&self) -> PointState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == PointState::Active
    }

    /// Current location, `None` once lost
    pub fn location(&self) -> Option<Vector2d> {
        match self.state {
            PointState::Active => Some(self.location),
            PointState::Lost => None,
        }
    }

    pub fn trail(&self) -> impl Iterator<Item = &Vector2d> {
        self.trail.iter()
    }

    /// Move an active point, remembering at most `trail_length` past locations
    pub fn move_to(&mut self, location: Vector2d, trail_length: usize) {
        assert!(self.is_active(), "point {} moved after being lost", self.id);
        self.trail.push_back(self.location);
        while self.trail.len() > trail_length {
            self.trail.pop_front();
        }
        self.location = location;
    }

    /// Returns true on the Active -> Lost transition only
    pub fn mark_lost(&mut self) -> bool {
        if self.state == PointState::Lost {
            return false;
        }
        self.state = PointState::Lost;
        self.location = Vector2d::repeat(f64::NAN);
        self.trail.clear();
        true
    }
}

use glam::Vec3;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Owns the rover's commanded position. `apply_direction` is the only way to move it.
#[derive(Debug, Clone)]
pub struct PositionStore {
    target: Vec3,
    heading: Vec3,
}

impl PositionStore {
    /// `heading` is the world-space step taken by `Direction::Forward`.
    pub fn new(initial: Vec3, heading: Vec3) -> Self {
        Self { target: initial, heading }
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn apply_direction(&mut self, direction: Direction) -> Vec3 {
        self.target += match direction {
            Direction::Forward => self.heading,
            Direction::Backward => -self.heading,
        };
        self.target
    }
}

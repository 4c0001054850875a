//! Damped spring that eases the displayed rover position toward its target.
//!
//! Integration runs in fixed 1 ms sub-steps (semi-implicit Euler) with
//! velocity measured in units per millisecond, so the result does not depend
//! on the frame rate the window happens to run at.

use glam::Vec3;
use std::time::Duration;

const STEP_MS: f32 = 1.0;
const MAX_FRAME_MS: f32 = 64.0;
const PRECISION: f32 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpringConfig {
    pub tension: f32,
    pub friction: f32,
    pub mass: f32,
}

impl SpringConfig {
    pub fn new(tension: f32, friction: f32) -> Self {
        Self { tension, friction, mass: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub struct Spring {
    config: SpringConfig,
    position: Vec3,
    velocity: Vec3,
    target: Vec3,
    carry_ms: f32,
}

impl Spring {
    /// Starts at rest on `position`.
    pub fn new(position: Vec3, config: SpringConfig) -> Self {
        Self {
            config,
            position,
            velocity: Vec3::ZERO,
            target: position,
            carry_ms: 0.0,
        }
    }

    /// Changes the goal without touching position or velocity.
    pub fn retarget(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn is_resting(&self) -> bool {
        self.velocity == Vec3::ZERO && self.position == self.target
    }

    pub fn advance(&mut self, dt: Duration) -> Vec3 {
        if self.is_resting() {
            self.carry_ms = 0.0;
            return self.position;
        }

        let mut budget = (dt.as_secs_f32() * 1000.0).min(MAX_FRAME_MS) + self.carry_ms;
        while budget >= STEP_MS {
            self.step();
            budget -= STEP_MS;
            if self.is_resting() {
                budget = 0.0;
            }
        }
        self.carry_ms = budget;
        self.position
    }

    fn step(&mut self) {
        let SpringConfig { tension, friction, mass } = self.config;
        let displacement = self.position - self.target;
        let spring_force = -tension * 1e-6 * displacement;
        let damping_force = -friction * 1e-3 * self.velocity;
        let acceleration = (spring_force + damping_force) / mass;

        self.velocity += acceleration * STEP_MS;
        self.position += self.velocity * STEP_MS;

        let settled_velocity = self.velocity.abs().max_element() < PRECISION;
        let settled_position = (self.position - self.target).abs().max_element() < PRECISION;
        if settled_velocity && settled_position {
            self.position = self.target;
            self.velocity = Vec3::ZERO;
        }
    }
}

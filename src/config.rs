use clap::{Parser, ValueEnum};
use glam::Vec3;
use std::path::PathBuf;
use std::time::Duration;

pub const INITIAL_TARGET: Vec3 = Vec3::new(0.0, 0.5, 0.0);

pub const SPRING_TENSION: f32 = 170.0;
pub const SPRING_FRICTION: f32 = 26.0;

pub const DRILL_DURATION: Duration = Duration::from_secs(2);

pub const GROUND_SIZE: f32 = 50.0;
pub const GROUND_HEIGHT: f32 = 0.49;

pub const CAMERA_EYE: Vec3 = Vec3::new(5.0, 5.0, 10.0);
pub const CAMERA_FOV_DEGREES: f32 = 50.0;

pub const AMBIENT_INTENSITY: f32 = 2.5;
pub const SUN_POSITION: Vec3 = Vec3::new(10.0, 10.0, 10.0);
pub const SUN_INTENSITY: f32 = 5.0;

/// Which stimulus drives the rover.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum InputMode {
    /// Arrow keys in the window.
    Keyboard,
    /// `move` events from the socket channel.
    Remote,
}

/// Wire protocol used to reach the backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// socket.io, what the rover backend serves.
    #[value(name = "socketio")]
    SocketIo,
    /// One JSON object per line over plain TCP.
    Lines,
}

#[derive(Debug, Parser)]
#[command(name = "mars-rover", about = "Drive a Mars rover around a 3D scene")]
pub struct Args {
    #[arg(long, value_enum, default_value_t = InputMode::Remote)]
    pub input: InputMode,

    #[arg(long, value_enum, default_value_t = Transport::SocketIo)]
    pub transport: Transport,

    /// Backend URL. The `lines` transport only uses its host and port.
    #[arg(long, default_value = "http://localhost:3000")]
    pub endpoint: String,

    /// Run with an in-process channel instead of connecting to the endpoint.
    #[arg(long)]
    pub offline: bool,

    #[arg(long, default_value = "assets/textures/mars_surface.jpg")]
    pub texture: PathBuf,

    #[arg(long, default_value = "assets/models/mars_rover.glb")]
    pub model: PathBuf,
}

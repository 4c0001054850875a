use crate::camera::OrbitCamera;
use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Pointer travel (in pixels) below which a left press-release counts as a click.
const CLICK_SLOP: f32 = 4.0;

/// Left-drag orbits, the wheel zooms, a left click without drag is reported
/// through `take_click`.
#[derive(Default)]
pub struct CameraController {
    is_left_pressed: bool,
    drag_distance: f32,
    cursor: PhysicalPosition<f64>,
    pending_click: Option<PhysicalPosition<f64>>,

    mouse_sensitivity: f32,
    zoom_sensitivity: f32,

    mouse_delta_x: f32,
    mouse_delta_y: f32,
    zoom_delta: f32,
}

impl CameraController {
    pub fn new(mouse_sensitivity: f32, zoom_sensitivity: f32) -> Self {
        Self {
            mouse_sensitivity,
            zoom_sensitivity,
            ..Default::default()
        }
    }

    pub fn process_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = *position;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.zoom_delta += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y * -1.0,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * -0.1,
                };
                true
            }
            WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                self.left_button(*state);
                true
            }
            _ => false,
        }
    }

    fn left_button(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.is_left_pressed = true;
                self.drag_distance = 0.0;
                self.mouse_delta_x = 0.0;
                self.mouse_delta_y = 0.0;
            }
            ElementState::Released => {
                if self.is_left_pressed && self.drag_distance < CLICK_SLOP {
                    self.pending_click = Some(self.cursor);
                    self.mouse_delta_x = 0.0;
                    self.mouse_delta_y = 0.0;
                }
                self.is_left_pressed = false;
            }
        }
    }

    pub fn process_mouse_motion(&mut self, delta_x: f64, delta_y: f64) {
        if !self.is_left_pressed {
            return;
        }
        self.mouse_delta_x += delta_x as f32;
        self.mouse_delta_y += delta_y as f32;
        self.drag_distance += (delta_x.hypot(delta_y)) as f32;
    }

    /// Cursor position of the last click, if one happened since the previous call.
    pub fn take_click(&mut self) -> Option<PhysicalPosition<f64>> {
        self.pending_click.take()
    }

    /// Motion below the click slop is held back, not dropped, and applied in
    /// full once the press turns into a drag.
    pub fn update_camera(&mut self, camera: &mut OrbitCamera) {
        if self.drag_distance >= CLICK_SLOP {
            camera.yaw -= self.mouse_delta_x * self.mouse_sensitivity;
            camera.pitch += self.mouse_delta_y * self.mouse_sensitivity;
            camera.pitch = camera.pitch.clamp(5.0, 89.0);
        }
        if self.drag_distance >= CLICK_SLOP || !self.is_left_pressed {
            self.mouse_delta_x = 0.0;
            self.mouse_delta_y = 0.0;
        }

        camera.distance += self.zoom_delta * self.zoom_sensitivity;
        camera.distance = camera.distance.clamp(2.0, 50.0);
        self.zoom_delta = 0.0;
    }
}

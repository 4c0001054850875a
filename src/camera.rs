use glam::{Mat4, Quat, Vec3};

/// Camera circling a focus point. Angles are in degrees.
pub struct OrbitCamera {
    pub focus_point: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl OrbitCamera {
    /// Places the camera at `eye` looking at `focus_point`.
    pub fn looking_from(eye: Vec3, focus_point: Vec3) -> Self {
        let offset = eye - focus_point;
        let distance = offset.length();
        Self {
            focus_point,
            yaw: offset.x.atan2(offset.z).to_degrees(),
            pitch: (offset.y / distance).asin().to_degrees(),
            distance,
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        let rotation = Quat::from_rotation_y(self.yaw.to_radians())
            * Quat::from_rotation_x(-self.pitch.to_radians());
        self.focus_point + rotation * Vec3::new(0.0, 0.0, self.distance)
    }

    pub fn build_view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.focus_point, Vec3::Y)
    }
}

pub struct Projection {
    aspect: f32,
    fovy: f32,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32, fovy_degrees: f32, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy_degrees.to_radians(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn build_projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looking_from_reproduces_the_eye() {
        let eye = Vec3::new(5.0, 5.0, 10.0);
        let camera = OrbitCamera::looking_from(eye, Vec3::ZERO);
        assert!((camera.eye_position() - eye).length() < 1e-4);
        assert!((camera.distance - 150f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn view_matrix_puts_focus_in_front() {
        let camera = OrbitCamera::looking_from(Vec3::new(0.0, 3.0, 4.0), Vec3::ZERO);
        let focus_in_view = camera.build_view_matrix().transform_point3(Vec3::ZERO);
        assert!((focus_in_view - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-4);
    }
}

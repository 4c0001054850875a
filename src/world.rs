use crate::model::Vertex;

/// Flat textured ground the rover drives on, centred on the origin.
pub struct MarsSurface {
    pub size: f32,
    pub height: f32,
    /// How often the texture tiles across the whole plane.
    pub texture_repeat: f32,
}

impl MarsSurface {
    pub fn new(size: f32, height: f32) -> Self {
        Self { size, height, texture_repeat: 1.0 }
    }

    pub fn mesh(&self) -> (Vec<Vertex>, Vec<u32>) {
        let h = self.size / 2.0;
        let r = self.texture_repeat;
        let up = [0.0, 1.0, 0.0];
        let corner = |x: f32, z: f32, u: f32, v: f32| Vertex {
            position: [x, self.height, z],
            tex_coords: [u, v],
            normal: up,
        };

        let vertices = vec![
            corner(-h, -h, 0.0, 0.0),
            corner(h, -h, r, 0.0),
            corner(-h, h, 0.0, r),
            corner(h, h, r, r),
        ];
        let indices = vec![0, 2, 1, 1, 2, 3];
        (vertices, indices)
    }
}

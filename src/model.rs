use crate::picking::Aabb;
use crate::world::MarsSurface;
use anyhow::{Context, Result};
use glam::{Mat3, Mat4, Vec3};
use std::path::Path;
use wgpu::util::DeviceExt;

pub mod texture {
    use super::*;

    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        address_mode: wgpu::AddressMode,
    ) -> Result<(wgpu::TextureView, wgpu::Sampler)> {
        let img = image::load_from_memory(bytes).with_context(|| format!("decoding {label}"))?;
        let rgba = img.to_rgba8();
        Ok(from_rgba(device, queue, &rgba, rgba.width(), rgba.height(), label, address_mode))
    }

    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &[u8],
        width: u32,
        height: u32,
        label: &str,
        address_mode: wgpu::AddressMode,
    ) -> (wgpu::TextureView, wgpu::Sampler) {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            rgba,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        (view, sampler)
    }

    /// 1x1 texture of a single linear RGBA colour.
    pub fn solid(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color: [f32; 4],
        label: &str,
    ) -> (wgpu::TextureView, wgpu::Sampler) {
        let texel = srgb_texel(color);
        from_rgba(device, queue, &texel, 1, 1, label, wgpu::AddressMode::ClampToEdge)
    }

    pub(crate) fn srgb_texel(color: [f32; 4]) -> [u8; 4] {
        let encode = |c: f32| {
            let c = c.clamp(0.0, 1.0);
            let s = if c <= 0.003_130_8 { c * 12.92 } else { 1.055 * c.powf(1.0 / 2.4) - 0.055 };
            (s * 255.0).round() as u8
        };
        let alpha = (color[3].clamp(0.0, 1.0) * 255.0).round() as u8;
        [encode(color[0]), encode(color[1]), encode(color[2]), alpha]
    }

    /// Expands the pixel layouts glTF images decode to into RGBA8.
    pub(crate) fn gltf_rgba(image: &gltf::image::Data) -> Option<Vec<u8>> {
        use gltf::image::Format;
        let px = &image.pixels;
        let rgba = match image.format {
            Format::R8G8B8A8 => px.clone(),
            Format::R8G8B8 => px.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect(),
            Format::R8G8 => px.chunks_exact(2).flat_map(|p| [p[0], p[1], 0, 255]).collect(),
            Format::R8 => px.iter().flat_map(|&l| [l, l, l, 255]).collect(),
            _ => return None,
        };
        Some(rgba)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
}

impl InstanceRaw {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            model: Mat4::from_translation(translation).to_cols_array_2d(),
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        const ATTRIBS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
            5 => Float32x4,
            6 => Float32x4,
            7 => Float32x4,
            8 => Float32x4
        ];
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBS,
        }
    }
}

pub struct Material {
    pub name: String,
    pub bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        name: &str,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> Self {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some(name),
        });
        Self { name: name.to_string(), bind_group }
    }
}

pub struct Mesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
    pub material_index: usize,
}

impl Mesh {
    fn upload(
        device: &wgpu::Device,
        name: &str,
        vertices: &[Vertex],
        indices: &[u32],
        material_index: usize,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Vertex Buffer")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Index Buffer")),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: indices.len() as u32,
            material_index,
        }
    }
}

pub trait Drawable<'a> {
    fn draw_model(&mut self, model: &'a Model, instance_buffer: &'a wgpu::Buffer, instances: u32);
}

impl<'a, 'b> Drawable<'a> for wgpu::RenderPass<'b> where 'a: 'b {
    fn draw_model(&mut self, model: &'a Model, instance_buffer: &'a wgpu::Buffer, instances: u32) {
        self.set_vertex_buffer(1, instance_buffer.slice(..));
        for mesh in &model.meshes {
            let material = &model.materials[mesh.material_index.min(model.materials.len() - 1)];
            self.set_bind_group(1, &material.bind_group, &[]);
            self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            self.draw_indexed(0..mesh.num_indices, 0, 0..instances);
        }
    }
}

pub struct Model {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    /// Model-space bounds of every mesh.
    pub bounds: Aabb,
}

pub fn material_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

impl Model {
    pub fn from_surface(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface: &MarsSurface,
        texture_path: &Path,
        material_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Result<Self> {
        let (vertices, indices) = surface.mesh();
        let mesh = Mesh::upload(device, "Mars Surface", &vertices, &indices, 0);

        let bytes = std::fs::read(texture_path)
            .with_context(|| format!("reading ground texture {}", texture_path.display()))?;
        let (view, sampler) =
            texture::from_bytes(device, queue, &bytes, "mars_surface", wgpu::AddressMode::Repeat)?;
        let material =
            Material::new(device, material_bind_group_layout, "mars_surface", &view, &sampler);

        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from(v.position)))
            .context("ground plane has no vertices")?;
        Ok(Self {
            meshes: vec![mesh],
            materials: vec![material],
            bounds,
        })
    }

    /// Appends the small grey drill head that sits under the rover's nose.
    pub fn attach_drill_head(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
    ) {
        let (vertices, indices) = cube(Vec3::new(0.0, -0.1, 1.0), 0.1);
        let (view, sampler) = texture::solid(device, queue, [0.5, 0.5, 0.5, 1.0], "drill_head");
        self.materials.push(Material::new(device, layout, "drill_head", &view, &sampler));
        let material_index = self.materials.len() - 1;
        self.meshes.push(Mesh::upload(device, "Drill Head", &vertices, &indices, material_index));
        if let Some(head) = Aabb::from_points(vertices.iter().map(|v| Vec3::from(v.position))) {
            self.bounds = self.bounds.union(head);
        }
    }
}

fn cube(center: Vec3, size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let h = size / 2.0;
    let faces = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for normal in faces {
        let u = if normal.y.abs() > 0.5 { Vec3::X } else { Vec3::Y.cross(normal) };
        let v = normal.cross(u);
        let base = vertices.len() as u32;
        let corners = [
            (-1.0, -1.0, [0.0, 1.0]),
            (1.0, -1.0, [1.0, 1.0]),
            (1.0, 1.0, [1.0, 0.0]),
            (-1.0, 1.0, [0.0, 0.0]),
        ];
        for (du, dv, tc) in corners {
            let p = center + (normal + u * du + v * dv) * h;
            vertices.push(Vertex { position: p.into(), tex_coords: tc, normal: normal.into() });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    (vertices, indices)
}

pub fn load_gltf<P: AsRef<Path>>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: P,
    material_bind_group_layout: &wgpu::BindGroupLayout,
) -> Result<Model> {
    let path = path.as_ref();
    let (doc, buffers, images) =
        gltf::import(path).with_context(|| format!("loading rover model {}", path.display()))?;

    let mut materials = Vec::new();
    for material in doc.materials() {
        let name = material.name().unwrap_or("gltf_material");
        let pbr = material.pbr_metallic_roughness();

        let decoded = pbr.base_color_texture().and_then(|info| {
            let image = images.get(info.texture().source().index())?;
            let rgba = texture::gltf_rgba(image);
            if rgba.is_none() {
                log::warn!("material {name}: unsupported texture format {:?}", image.format);
            }
            Some((rgba?, image.width, image.height))
        });

        let (view, sampler) = match decoded {
            Some((rgba, width, height)) => texture::from_rgba(
                device,
                queue,
                &rgba,
                width,
                height,
                name,
                wgpu::AddressMode::Repeat,
            ),
            None => texture::solid(device, queue, pbr.base_color_factor(), name),
        };
        materials.push(Material::new(device, material_bind_group_layout, name, &view, &sampler));
    }

    if materials.is_empty() {
        let (view, sampler) = texture::solid(device, queue, [1.0; 4], "fallback_material");
        materials.push(Material::new(
            device,
            material_bind_group_layout,
            "fallback_material",
            &view,
            &sampler,
        ));
    }

    let mut meshes = Vec::new();
    let mut bounds: Option<Aabb> = None;
    let mut stack: Vec<(gltf::Node, Mat4)> = doc
        .default_scene()
        .or_else(|| doc.scenes().next())
        .context("model has no scenes")?
        .nodes()
        .map(|node| (node, Mat4::IDENTITY))
        .collect();

    while let Some((node, parent)) = stack.pop() {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        stack.extend(node.children().map(|child| (child, world)));

        let Some(mesh) = node.mesh() else { continue };
        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();

        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let mesh_name = mesh.name().or(node.name()).unwrap_or("rover_part");

            let Some(positions) = reader.read_positions() else {
                log::warn!("skipping {mesh_name}: primitive without positions");
                continue;
            };
            let positions: Vec<Vec3> =
                positions.map(|p| world.transform_point3(Vec3::from(p))).collect();
            let normals: Vec<[f32; 3]> = match reader.read_normals() {
                Some(normals) => normals
                    .map(|n| (normal_matrix * Vec3::from(n)).normalize_or_zero().into())
                    .collect(),
                None => vec![[0.0, 1.0, 0.0]; positions.len()],
            };
            let tex_coords: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                Some(coords) => coords.into_f32().collect(),
                None => vec![[0.0, 0.0]; positions.len()],
            };

            let vertices: Vec<Vertex> = positions
                .iter()
                .zip(normals.iter())
                .zip(tex_coords.iter())
                .map(|((pos, norm), tc)| Vertex {
                    position: (*pos).into(),
                    tex_coords: *tc,
                    normal: *norm,
                })
                .collect();

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };

            if let Some(part) = Aabb::from_points(positions.iter().copied()) {
                bounds = Some(bounds.map_or(part, |b| b.union(part)));
            }
            meshes.push(Mesh::upload(
                device,
                mesh_name,
                &vertices,
                &indices,
                primitive.material().index().unwrap_or(0),
            ));
        }
    }

    let bounds = bounds.context("rover model has no geometry")?;
    log::info!(
        "loaded {} with {} meshes and {} materials",
        path.display(),
        meshes.len(),
        materials.len()
    );
    Ok(Model { meshes, materials, bounds })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_encoding_hits_the_endpoints() {
        assert_eq!(texture::srgb_texel([0.0, 1.0, 0.5, 1.0]), [0, 255, 188, 255]);
    }

    #[test]
    fn gltf_rgb_pixels_gain_alpha() {
        let image = gltf::image::Data {
            pixels: vec![1, 2, 3, 4, 5, 6],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        assert_eq!(texture::gltf_rgba(&image), Some(vec![1, 2, 3, 255, 4, 5, 6, 255]));
    }

    #[test]
    fn drill_head_cube_faces_outward() {
        let center = Vec3::new(0.0, -0.1, 1.0);
        let (vertices, indices) = cube(center, 0.1);
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        for tri in indices.chunks(3) {
            let [a, b, c] =
                [tri[0], tri[1], tri[2]].map(|i| Vec3::from(vertices[i as usize].position));
            let face_normal = (b - a).cross(c - a);
            assert!(face_normal.dot(a - center) > 0.0);
        }
        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from(v.position))).unwrap();
        assert!((bounds.min - Vec3::new(-0.05, -0.15, 0.95)).length() < 1e-6);
    }
}

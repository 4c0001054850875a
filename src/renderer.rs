use crate::camera::{OrbitCamera, Projection};
use crate::camera_controller::CameraController;
use crate::config::{
    AMBIENT_INTENSITY, Args, CAMERA_EYE, CAMERA_FOV_DEGREES, GROUND_HEIGHT, GROUND_SIZE,
    SUN_INTENSITY, SUN_POSITION,
};
use crate::model::{self, Drawable, InstanceRaw, Model};
use crate::picking::Ray;
use crate::world::MarsSurface;
use anyhow::{Context, Result};
use glam::{Mat4, Vec2, Vec3};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalPosition;
use winit::event::WindowEvent;
use winit::window::Window;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const DRILL_JUDDER: f32 = 0.01;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniform {
    view_proj: [[f32; 4]; 4],
    sun_direction: [f32; 4],
    light: [f32; 4],
}

impl SceneUniform {
    fn new() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            sun_direction: SUN_POSITION.normalize().extend(0.0).to_array(),
            light: [AMBIENT_INTENSITY, SUN_INTENSITY, 0.0, 0.0],
        }
    }

    fn update_view_proj(&mut self, camera: &OrbitCamera, projection: &Projection) {
        let view_proj = projection.build_projection_matrix() * camera.build_view_matrix();
        self.view_proj = view_proj.to_cols_array_2d();
    }
}

pub struct State {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    render_pipeline: wgpu::RenderPipeline,
    camera: OrbitCamera,
    projection: Projection,
    camera_controller: CameraController,
    scene_uniform: SceneUniform,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    depth_view: wgpu::TextureView,
    ground: Model,
    ground_instance: wgpu::Buffer,
    rover: Model,
    rover_instance: wgpu::Buffer,
    rover_position: Vec3,
    drill_phase: f32,
}

impl State {
    pub async fn new(window: Arc<Window>, args: &Args) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor { ..Default::default() });
        let surface = instance.create_surface(window).context("creating window surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .context("no suitable GPU adapter")?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                ..Default::default()
            })
            .await
            .context("requesting GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera = OrbitCamera::looking_from(CAMERA_EYE, Vec3::ZERO);
        let projection =
            Projection::new(config.width, config.height, CAMERA_FOV_DEGREES, 0.1, 200.0);
        let mut scene_uniform = SceneUniform::new();
        scene_uniform.update_view_proj(&camera, &projection);

        let scene_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Buffer"),
            contents: bytemuck::cast_slice(&[scene_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let scene_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("scene_bind_group_layout"),
            });

        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &scene_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
            label: Some("scene_bind_group"),
        });

        let material_layout = model::material_bind_group_layout(&device);

        let ground = Model::from_surface(
            &device,
            &queue,
            &MarsSurface::new(GROUND_SIZE, GROUND_HEIGHT),
            &args.texture,
            &material_layout,
        )?;
        let mut rover = model::load_gltf(&device, &queue, &args.model, &material_layout)?;
        rover.attach_drill_head(&device, &queue, &material_layout);
        for material in &rover.materials {
            log::debug!("rover material {}", material.name);
        }

        let ground_instance = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ground Instance Buffer"),
            contents: bytemuck::cast_slice(&[InstanceRaw::from_translation(Vec3::ZERO)]),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let rover_instance = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Rover Instance Buffer"),
            contents: bytemuck::cast_slice(&[InstanceRaw::from_translation(Vec3::ZERO)]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let depth_view = create_depth_view(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&scene_bind_group_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[model::Vertex::desc(), InstanceRaw::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            render_pipeline,
            camera,
            projection,
            camera_controller: CameraController::new(0.3, 0.5),
            scene_uniform,
            scene_buffer,
            scene_bind_group,
            depth_view,
            ground,
            ground_instance,
            rover,
            rover_instance,
            rover_position: Vec3::ZERO,
            drill_phase: 0.0,
        })
    }

    pub fn size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.size
    }

    pub fn input(&mut self, event: &WindowEvent) -> bool {
        self.camera_controller.process_events(event)
    }

    pub fn mouse_motion(&mut self, delta: (f64, f64)) {
        self.camera_controller.process_mouse_motion(delta.0, delta.1);
    }

    pub fn take_click(&mut self) -> Option<PhysicalPosition<f64>> {
        self.camera_controller.take_click()
    }

    /// Whether the pixel under `cursor` shows the rover.
    pub fn hits_rover(&self, cursor: PhysicalPosition<f64>) -> bool {
        let view_proj = self.projection.build_projection_matrix() * self.camera.build_view_matrix();
        let ray = Ray::from_cursor(
            Vec2::new(cursor.x as f32, cursor.y as f32),
            Vec2::new(self.config.width as f32, self.config.height as f32),
            view_proj,
        );
        ray.intersect(&self.rover.bounds.translated(self.rover_position)).is_some()
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.projection.resize(new_size.width, new_size.height);
            self.depth_view = create_depth_view(&self.device, &self.config);
        }
    }

    /// `drilling` makes the rover body judder in place; picking keeps using
    /// the undisturbed position.
    pub fn update(&mut self, rover_position: Vec3, drilling: bool) {
        self.camera_controller.update_camera(&mut self.camera);
        self.scene_uniform.update_view_proj(&self.camera, &self.projection);
        self.queue.write_buffer(&self.scene_buffer, 0, bytemuck::cast_slice(&[self.scene_uniform]));

        self.rover_position = rover_position;
        self.drill_phase = if drilling { self.drill_phase + 0.7 } else { 0.0 };
        let judder = Vec3::Y * DRILL_JUDDER * self.drill_phase.sin();
        self.queue.write_buffer(
            &self.rover_instance,
            0,
            bytemuck::cast_slice(&[InstanceRaw::from_translation(rover_position + judder)]),
        );
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.03,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.scene_bind_group, &[]);
            render_pass.draw_model(&self.ground, &self.ground_instance, 1);
            render_pass.draw_model(&self.rover, &self.rover_instance, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn create_depth_view(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    depth_texture.create_view(&wgpu::TextureViewDescriptor::default())
}

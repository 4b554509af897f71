use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;
use cgmath::{InnerSpace, Matrix4, Rad};

use crate::camera::{Camera, CameraUniform};
use crate::config::DemoConfig;
use crate::geometry::{self, LineVertex, MeshData, MeshVertex};
use crate::physics::PhysicsBody;
use crate::scene::{ShapeKind, TrackedObject};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const GRID_LIFT: f32 = 0.01;

/// Size the surface is configured to. Camera aspect is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns false (and keeps the old size) for a zero sized area, which
    /// happens while a window is minimized.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.width = width;
        self.height = height;
        true
    }

}

// Raw instance data that goes into the GPU buffer
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

impl InstanceRaw {
    pub fn new(model: Matrix4<f32>, srgb: [f32; 3]) -> Self {
        let [r, g, b] = srgb.map(srgb_to_linear);
        Self {
            model: model.into(),
            color: [r, g, b, 1.0],
        }
    }

    /// Translation from physics, cosmetic euler xyz rotation, uniform scale.
    pub fn from_object(object: &TrackedObject) -> Self {
        let model = Matrix4::from_translation(object.position)
            * Matrix4::from_angle_x(Rad(object.rotation.x))
            * Matrix4::from_angle_y(Rad(object.rotation.y))
            * Matrix4::from_angle_z(Rad(object.rotation.z))
            * Matrix4::from_scale(object.scale);
        Self::new(model, object.color)
    }

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // The shader only moves to the next instance when it starts
            // processing a new instance
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // A mat4 takes up 4 vertex slots as it is technically 4 vec4s.
                // It is reassembled in the shader.
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// The ground mesh takes the pose of the ground body so the two coincide.
fn body_model(body: &PhysicsBody) -> Matrix4<f32> {
    Matrix4::from_translation(body.position) * Matrix4::from(body.rotation)
}

/// Grid helper lines in linear color, lifted off the ground so they don't
/// z-fight with it.
fn grid_vertices(demo: &DemoConfig) -> Vec<LineVertex> {
    let mut grid = geometry::grid(
        demo.grid_size,
        demo.grid_divisions,
        demo.grid_center_color.map(srgb_to_linear),
        demo.grid_color.map(srgb_to_linear),
    );
    for vertex in &mut grid {
        vertex.position[1] = GRID_LIFT;
    }
    grid
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniform {
    light_dir: [f32; 4], // towards the light, w unused
    light_color: [f32; 4],
    ambient: [f32; 4],
    fog_color: [f32; 4],
    fog_range: [f32; 4], // near, far, unused, unused
}

impl LightingUniform {
    pub fn new(config: &DemoConfig) -> Self {
        let dir = config.light_position.normalize();
        let i = config.light_intensity;
        let [ar, ag, ab] = config.ambient_color.map(srgb_to_linear);
        let [fr, fg, fb] = config.fog_color.map(srgb_to_linear);
        Self {
            light_dir: [dir.x, dir.y, dir.z, 0.0],
            light_color: [i, i, i, 1.0],
            ambient: [ar, ag, ab, 1.0],
            fog_color: [fr, fg, fb, 1.0],
            fog_range: [config.fog_near, config.fog_far, 0.0, 0.0],
        }
    }
}

/// Ground first, then shapes grouped by kind so each kind is one draw.
fn build_instances(ground: InstanceRaw, objects: &[TrackedObject]) -> (Vec<InstanceRaw>, Vec<(ShapeKind, std::ops::Range<u32>)>) {
    let mut instances = vec![ground];
    let mut ranges = Vec::new();
    for kind in ShapeKind::ALL {
        let start = instances.len() as u32;
        instances.extend(objects.iter().filter(|o| o.shape == kind).map(InstanceRaw::from_object));
        let end = instances.len() as u32;
        if end > start {
            ranges.push((kind, start..end));
        }
    }
    (instances, ranges)
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, label: &str, mesh: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", label)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", label)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: mesh.indices.len() as u32,
        }
    }
}

fn unit_mesh(kind: ShapeKind) -> MeshData {
    match kind {
        ShapeKind::Box => geometry::cuboid(1.0, 1.0, 1.0),
        ShapeKind::Sphere => geometry::sphere(0.7, 32, 32),
        ShapeKind::Cone => geometry::cone(0.5, 1.0, 16),
        ShapeKind::Cylinder => geometry::cylinder(0.5, 0.5, 1.0, 32),
        ShapeKind::Torus => geometry::torus(0.5, 0.2, 16, 100),
    }
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[allow(clippy::too_many_arguments)]
fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    label: &str,
    vs: &str,
    fs: &str,
    buffers: &[wgpu::VertexBufferLayout<'_>],
    topology: wgpu::PrimitiveTopology,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vs),
            buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fs),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        //how to interpret the vertices when converting them to triangles or lines
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None, // the ground is visible from both sides
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    is_surface_configured: bool,
    viewport: Viewport,
    mesh_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    meshes: HashMap<ShapeKind, GpuMesh>,
    ground_mesh: GpuMesh,
    ground_instance: InstanceRaw,
    grid_buffer: wgpu::Buffer,
    grid_vertex_count: u32,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    depth_view: wgpu::TextureView,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, demo: &DemoConfig, ground: &PhysicsBody) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colors and relies on an sRGB surface to
        // encode them. Without one everything comes out darker.
        let surface_format = surface_caps.formats.iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let lighting_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lighting Buffer"),
            contents: bytemuck::cast_slice(&[LightingUniform::new(demo)]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let scene_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[uniform_entry(0), uniform_entry(1)],
            label: Some("scene_bind_group_layout"),
        });

        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &scene_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lighting_buffer.as_entire_binding(),
                },
            ],
            label: Some("scene_bind_group"),
        });

        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&scene_bind_group_layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = create_pipeline(
            &device,
            &render_pipeline_layout,
            &shader,
            config.format,
            "Mesh Pipeline",
            "vs_main",
            "fs_main",
            &[MeshVertex::desc(), InstanceRaw::desc()],
            wgpu::PrimitiveTopology::TriangleList,
        );
        let line_pipeline = create_pipeline(
            &device,
            &render_pipeline_layout,
            &shader,
            config.format,
            "Grid Pipeline",
            "vs_line",
            "fs_line",
            &[LineVertex::desc()],
            wgpu::PrimitiveTopology::LineList,
        );

        let meshes = ShapeKind::ALL
            .into_iter()
            .map(|kind| (kind, GpuMesh::new(&device, &format!("{:?}", kind), &unit_mesh(kind))))
            .collect();

        let ground_mesh = GpuMesh::new(&device, "Ground", &geometry::plane(demo.ground_size, demo.ground_size));
        let ground_instance = InstanceRaw::new(body_model(ground), demo.ground_color);

        let grid = grid_vertices(demo);
        let grid_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Grid Vertex Buffer"),
            contents: bytemuck::cast_slice(&grid),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // one slot for the ground plus every tracked object
        let instance_capacity = demo.object_count + 1;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (instance_capacity * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let is_surface_configured = size.width > 0 && size.height > 0;
        if is_surface_configured {
            surface.configure(&device, &config);
        }
        let depth_view = create_depth_view(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            viewport: Viewport::new(config.width, config.height),
            config,
            is_surface_configured,
            mesh_pipeline,
            line_pipeline,
            meshes,
            ground_mesh,
            ground_instance,
            grid_buffer,
            grid_vertex_count: grid.len() as u32,
            instance_buffer,
            instance_capacity,
            camera_uniform,
            camera_buffer,
            scene_bind_group,
            depth_view,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.viewport.resize(width, height) {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.is_surface_configured = true;

        // Recreate depth texture with new dimensions
        self.depth_view = create_depth_view(&self.device, &self.config);
        log::debug!("Surface resized to {}x{}", width, height);
    }

    pub fn render(&mut self, camera: &Camera, objects: &[TrackedObject]) -> Result<(), wgpu::SurfaceError> {
        // We can't render unless the surface is configured
        if !self.is_surface_configured {
            return Ok(());
        }

        self.camera_uniform.update_view_proj(camera);
        self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[self.camera_uniform]));

        let (instances, ranges) = build_instances(self.ground_instance, objects);
        assert!(
            instances.len() <= self.instance_capacity,
            "{} instances exceed the buffer sized for {}",
            instances.len(),
            self.instance_capacity
        );
        self.queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));

        //asks surface for a new texture to render to
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
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.mesh_pipeline);
            render_pass.set_bind_group(0, &self.scene_bind_group, &[]);

            // instance ranges are bound through buffer offsets, WebGL2 has no base instance
            let stride = std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress;
            let draws = std::iter::once((&self.ground_mesh, 0..1))
                .chain(ranges.into_iter().map(|(kind, range)| (&self.meshes[&kind], range)));
            for (mesh, range) in draws {
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, self.instance_buffer.slice(range.start as u64 * stride..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..mesh.num_indices, 0, 0..range.end - range.start);
            }

            render_pass.set_pipeline(&self.line_pipeline);
            render_pass.set_vertex_buffer(0, self.grid_buffer.slice(..));
            render_pass.draw(0..self.grid_vertex_count, 0..1);
        }

        //encoder.finish() ends the CommandEncoder and returns a CommandBuffer, ready to be passed on to the GPU
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

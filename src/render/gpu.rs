//! wgpu adapter.
//!
//! [`WgpuRenderer`] owns the instance, light and frame buffers plus one
//! render pipeline per (material, kind). The host owns the device, the
//! surface and the render pass; each frame it calls
//! [`ParticleEngine::render`](crate::ParticleEngine::render) and then
//! [`WgpuRenderer::draw_into`] inside its own pass.
//!
//! Geometry instances are drawn as an instanced sphere mesh, billboards as
//! camera-facing quads generated from `vertex_index`, and trails as ribbons
//! read from a storage buffer of [`TrailVertex`](crate::TrailVertex)
//! records.

use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::sync::Arc;

use log::{debug, error, trace};
use wgpu::util::DeviceExt;

use super::mesh::{Mesh, MeshVertex};
use super::shaders::{self, LIGHT_HEADER_SIZE, TRAIL_VERTICES};
use super::{DrawBatch, FrameUniforms, MaterialId, MaterialProvider, ParticleKind, Renderer, ShaderHandle};
use crate::config::EngineConfig;
use crate::error::MaterialError;
use crate::particle::{record_stride, BillboardInstance, GeometryInstance, LightData, MAX_LIGHTS, TRAIL_COUNT};
use crate::registry::Material;
use crate::{AttributeFormat, InstanceAttribute, InstanceLayout};

const SPHERE_RINGS: u32 = 12;
const SPHERE_SEGMENTS: u32 = 16;

fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32 => wgpu::VertexFormat::Float32,
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        AttributeFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        AttributeFormat::Uint32 => wgpu::VertexFormat::Uint32,
        AttributeFormat::Sint32 => wgpu::VertexFormat::Sint32,
    }
}

fn vertex_attributes(attributes: &[InstanceAttribute]) -> Vec<wgpu::VertexAttribute> {
    attributes
        .iter()
        .map(|a| wgpu::VertexAttribute {
            format: vertex_format(a.format),
            offset: a.offset,
            shader_location: a.location,
        })
        .collect()
}

/// A growable GPU buffer that is recreated when an upload outgrows it.
struct DynamicBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    buffer: wgpu::Buffer,
}

impl DynamicBuffer {
    fn new(device: &wgpu::Device, label: &'static str, usage: wgpu::BufferUsages, size: u64) -> Self {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(16),
            usage,
            mapped_at_creation: false,
        });
        Self { label, usage, buffer }
    }

    /// Write `data`, growing first if needed. Returns `true` when the buffer
    /// was recreated.
    fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[u8]) -> bool {
        let needed = data.len() as u64;
        let grown = needed > self.buffer.size();
        if grown {
            let size = needed.next_power_of_two();
            debug!("growing {} to {} bytes", self.label, size);
            *self = Self::new(device, self.label, self.usage, size);
        }
        if !data.is_empty() {
            queue.write_buffer(&self.buffer, 0, data);
        }
        grown
    }
}

/// Renders engine output with wgpu.
pub struct WgpuRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,

    frame_buffer: wgpu::Buffer,
    light_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    trail_layout: wgpu::BindGroupLayout,
    trail_bind_group: wgpu::BindGroup,
    layouts: HashMap<ParticleKind, wgpu::PipelineLayout>,

    billboards: DynamicBuffer,
    geometry: DynamicBuffer,
    trails: DynamicBuffer,
    sphere_vertices: wgpu::Buffer,
    sphere_indices: wgpu::Buffer,
    sphere_index_count: u32,

    pipelines: HashMap<(MaterialId, ParticleKind), wgpu::RenderPipeline>,
    shaders: HashMap<MaterialId, ShaderHandle>,
    next_shader: u64,
    draws: Vec<DrawBatch>,
}

impl WgpuRenderer {
    /// Create buffers sized for `config`. Pass `depth_format` if the host's
    /// pass has a depth attachment.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        config: &EngineConfig,
    ) -> Self {
        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<super::FrameData>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let light_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Uniforms"),
            size: LIGHT_HEADER_SIZE + (MAX_LIGHTS * std::mem::size_of::<LightData>()) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[uniform_entry(0), uniform_entry(1)],
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: light_buffer.as_entire_binding(),
                },
            ],
        });

        let trail_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Trail Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let billboards = DynamicBuffer::new(
            &device,
            "Billboard Instances",
            wgpu::BufferUsages::VERTEX,
            record_stride(ParticleKind::Billboard) * config.billboard_capacity as u64,
        );
        let geometry = DynamicBuffer::new(
            &device,
            "Geometry Instances",
            wgpu::BufferUsages::VERTEX,
            record_stride(ParticleKind::Geometry) * config.geometry_capacity as u64,
        );
        let trails = DynamicBuffer::new(
            &device,
            "Trail Points",
            wgpu::BufferUsages::STORAGE,
            record_stride(ParticleKind::Trail) * (config.trail_capacity * TRAIL_COUNT) as u64,
        );
        let trail_bind_group = create_trail_bind_group(&device, &trail_layout, &trails.buffer);

        let mut layouts = HashMap::new();
        for kind in ParticleKind::ALL {
            let groups: Vec<&wgpu::BindGroupLayout> = match kind {
                ParticleKind::Trail => vec![&frame_layout, &trail_layout],
                _ => vec![&frame_layout],
            };
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(kind.label()),
                bind_group_layouts: &groups,
                push_constant_ranges: &[],
            });
            layouts.insert(kind, layout);
        }

        let sphere = Mesh::uv_sphere(SPHERE_RINGS, SPHERE_SEGMENTS);
        let sphere_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sphere Vertices"),
            contents: sphere.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let sphere_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sphere Indices"),
            contents: sphere.index_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            color_format,
            depth_format,
            frame_buffer,
            light_buffer,
            frame_bind_group,
            trail_layout,
            trail_bind_group,
            layouts,
            billboards,
            geometry,
            trails,
            sphere_vertices,
            sphere_indices,
            sphere_index_count: sphere.indices.len() as u32,
            pipelines: HashMap::new(),
            shaders: HashMap::new(),
            next_shader: 0,
            draws: Vec::new(),
            device,
            queue,
        }
    }

    /// Whether `material` has pipelines for every kind.
    pub fn is_resolved(&self, material: MaterialId) -> bool {
        self.shaders.contains_key(&material)
    }

    /// Record the draws collected since the last `begin_frame` into `pass`.
    /// Draws whose material never resolved are skipped.
    pub fn draw_into(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        for batch in &self.draws {
            let Some(pipeline) = self.pipelines.get(&(batch.material, batch.kind)) else {
                trace!("no pipeline for {:?} {}", batch.material, batch.kind);
                continue;
            };
            pass.set_pipeline(pipeline);
            let instances = batch.range.clone();
            match batch.kind {
                ParticleKind::Billboard => {
                    pass.set_vertex_buffer(0, self.billboards.buffer.slice(..));
                    pass.draw(0..6, instances);
                }
                ParticleKind::Geometry => {
                    pass.set_vertex_buffer(0, self.sphere_vertices.slice(..));
                    pass.set_vertex_buffer(1, self.geometry.buffer.slice(..));
                    pass.set_index_buffer(self.sphere_indices.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..self.sphere_index_count, 0, instances);
                }
                ParticleKind::Trail => {
                    pass.set_bind_group(1, &self.trail_bind_group, &[]);
                    pass.draw(0..TRAIL_VERTICES, instances);
                }
            }
        }
    }

    fn create_pipeline(&self, kind: ParticleKind, module: &wgpu::ShaderModule, label: &str) -> wgpu::RenderPipeline {
        let billboard_attributes = vertex_attributes(BillboardInstance::ATTRIBUTES);
        let geometry_attributes = vertex_attributes(GeometryInstance::ATTRIBUTES);
        let mesh_attributes = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

        let billboard_buffers = [wgpu::VertexBufferLayout {
            array_stride: BillboardInstance::STRIDE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &billboard_attributes,
        }];
        let geometry_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<MeshVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &mesh_attributes,
            },
            wgpu::VertexBufferLayout {
                array_stride: GeometryInstance::STRIDE,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &geometry_attributes,
            },
        ];
        let buffers: &[wgpu::VertexBufferLayout] = match kind {
            ParticleKind::Billboard => &billboard_buffers,
            ParticleKind::Geometry => &geometry_buffers,
            ParticleKind::Trail => &[],
        };

        // Geometry is opaque; billboards and trails blend over it.
        let opaque = kind == ParticleKind::Geometry;
        let blend = if opaque {
            wgpu::BlendState::REPLACE
        } else {
            wgpu::BlendState::ALPHA_BLENDING
        };

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: self.layouts.get(&kind),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: if opaque { Some(wgpu::Face::Back) } else { None },
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: self.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: opaque,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

fn create_trail_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Trail Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

impl Renderer for WgpuRenderer {
    fn begin_frame(&mut self, frame: &FrameUniforms) {
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame.to_data()));
        self.draws.clear();
    }

    fn upload_instances(&mut self, kind: ParticleKind, data: &[u8], _count: u32) {
        let target = match kind {
            ParticleKind::Billboard => &mut self.billboards,
            ParticleKind::Geometry => &mut self.geometry,
            ParticleKind::Trail => &mut self.trails,
        };
        if target.write(&self.device, &self.queue, data) && kind == ParticleKind::Trail {
            self.trail_bind_group = create_trail_bind_group(&self.device, &self.trail_layout, &self.trails.buffer);
        }
    }

    fn upload_lights(&mut self, data: &[u8], count: u32) {
        let count = count.min(MAX_LIGHTS as u32);
        let header = [count, 0, 0, 0];
        self.queue
            .write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(&header));
        let max_bytes = MAX_LIGHTS * std::mem::size_of::<LightData>();
        let data = &data[..data.len().min(max_bytes)];
        if !data.is_empty() {
            self.queue.write_buffer(&self.light_buffer, LIGHT_HEADER_SIZE, data);
        }
    }

    fn draw(&mut self, kind: ParticleKind, material: MaterialId, range: Range<u32>) {
        self.draws.push(DrawBatch { kind, material, range });
    }
}

impl MaterialProvider for WgpuRenderer {
    /// Read the material's WGSL, validate it against every kind's prelude
    /// and build the three pipelines. Nothing is replaced unless all three
    /// compile.
    fn resolve(&mut self, id: MaterialId, material: &Material) -> Result<ShaderHandle, MaterialError> {
        let source = fs::read_to_string(&material.shader_path).map_err(|source| MaterialError::Io {
            path: material.shader_path.clone(),
            source,
        })?;

        let mut modules = Vec::with_capacity(ParticleKind::ALL.len());
        for kind in ParticleKind::ALL {
            let composed = shaders::compose(kind, &source);
            shaders::validate(&composed).map_err(|message| {
                error!("material '{}' failed for {}: {}", material.name, kind, message);
                MaterialError::Compile {
                    path: material.shader_path.clone(),
                    message,
                }
            })?;
            modules.push((kind, composed));
        }

        for (kind, composed) in modules {
            let label = format!("{} {}", material.name, kind);
            let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(composed.into()),
            });
            let pipeline = self.create_pipeline(kind, &module, &label);
            self.pipelines.insert((id, kind), pipeline);
        }

        let handle = ShaderHandle(self.next_shader);
        self.next_shader += 1;
        self.shaders.insert(id, handle);
        Ok(handle)
    }
}

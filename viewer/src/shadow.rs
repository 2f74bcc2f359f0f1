use cgmath::prelude::*;
use cgmath::{Matrix4, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::camera::OPENGL_TO_WGPU_MATRIX;
use crate::config::ShadowConfig;
use crate::instances::InstanceRaw;
use crate::model::{self, DrawModel, Model, Vertex};
use crate::texture;

/// Where the shadow-casting key light sits, looking at the origin.
pub const KEY_LIGHT_POSITION: [f32; 3] = [5.0, 10.0, 7.5];
const LIGHT_DISTANCE: f32 = 30.0;
/// Half-width of the orthographic light frustum; covers the formation, not the focus slot.
const LIGHT_EXTENT: f32 = 8.0;

/// View-projection of the key light, mapping world positions to shadow map depth.
pub fn light_view_proj() -> Matrix4<f32> {
    let dir = Vector3::from(KEY_LIGHT_POSITION).normalize();
    let eye = Point3::from_vec(dir * LIGHT_DISTANCE);
    let view = Matrix4::look_at_rh(eye, Point3::origin(), Vector3::unit_y());
    let proj = cgmath::ortho(
        -LIGHT_EXTENT,
        LIGHT_EXTENT,
        -LIGHT_EXTENT,
        LIGHT_EXTENT,
        1.0,
        LIGHT_DISTANCE * 2.0,
    );
    OPENGL_TO_WGPU_MATRIX * proj * view
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub view_proj: [[f32; 4]; 4],
    /// x: size of one shadow map texel in uv units
    pub params: [f32; 4],
}

impl LightUniform {
    pub fn new(map_size: u32) -> Self {
        Self {
            view_proj: light_view_proj().into(),
            params: [1.0 / map_size.max(1) as f32, 0.0, 0.0, 0.0],
        }
    }
}

/// Depth map rendered from the key light and the bindings the part shader samples it through.
pub struct ShadowMap {
    enabled: bool,
    map: texture::Texture,
    light_bind_group: wgpu::BindGroup,
    pub bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
}

impl ShadowMap {
    /// Layout of group 2 of the part pipeline.
    pub fn create_sample_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Depth,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
            label: Some("shadow_sample_bind_group_layout"),
        })
    }

    pub fn new(
        device: &wgpu::Device,
        sample_layout: &wgpu::BindGroupLayout,
        config: &ShadowConfig,
    ) -> Self {
        let map_size = config.map_size.clamp(256, 8192);
        let map = texture::Texture::create_depth(device, map_size, map_size, "shadow_map");

        let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Uniform Buffer"),
            contents: bytemuck::cast_slice(&[LightUniform::new(map_size)]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let light_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("light_bind_group_layout"),
        });
        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &light_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
            label: Some("light_bind_group"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: sample_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&map.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: light_buffer.as_entire_binding(),
                },
            ],
            label: Some("shadow_sample_bind_group"),
        });

        let shader = device.create_shader_module(&wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shadow.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&light_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[model::ModelVertex::desc(), InstanceRaw::desc()],
            },
            // depth only
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: texture::Texture::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                // keeps lit faces from shadowing themselves
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            enabled: config.enabled,
            map,
            light_bind_group,
            bind_group,
            pipeline,
        }
    }

    /// Renders the depth of every part instance from the key light. When shadows are disabled
    /// the map is only cleared, which the part shader reads as fully lit.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, model: Option<&Model>) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.map.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: true,
                }),
                stencil_ops: None,
            }),
        });
        if !self.enabled {
            return;
        }
        if let Some(model) = model {
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.light_bind_group, &[]);
            render_pass.draw_model_depth(model);
        }
    }
}

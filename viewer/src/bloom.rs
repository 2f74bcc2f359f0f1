use wgpu::util::DeviceExt;

use crate::config::BloomConfig;
use crate::texture;

/// Format of the offscreen scene colour and bloom-selection targets.
pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Scene clear colour, sRGB.
pub const BACKGROUND_COLOR: u32 = 0x0a3d62;

/// Converts a packed sRGB colour to the linear values the HDR target expects.
pub fn linear_color(rgb: u32) -> wgpu::Color {
    let channel = |shift: u32| {
        let c = ((rgb >> shift) & 0xff) as f64 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    wgpu::Color {
        r: channel(16),
        g: channel(8),
        b: channel(0),
        a: 1.0,
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BloomUniform {
    pub intensity: f32,
    pub threshold: f32,
    /// Blur spread in pixels between taps
    pub spread: f32,
    pub _padding: f32,
}

impl BloomUniform {
    pub fn from_config(config: &BloomConfig) -> Self {
        Self {
            intensity: config.intensity.max(0.0),
            threshold: config.luminance_threshold.max(0.0),
            spread: config.radius.max(0.0) * 4.0,
            _padding: 0.0,
        }
    }
}

/// Offscreen targets of the scene pass and the full-screen pass that blurs the selection,
/// adds it back and tone maps into the surface.
pub struct Compositor {
    pub color: texture::Texture,
    pub selection: texture::Texture,
    pub depth: texture::Texture,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    pipeline: wgpu::RenderPipeline,
}

impl Compositor {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        bloom: &BloomConfig,
    ) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
            label: Some("composite_bind_group_layout"),
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Bloom Uniform Buffer"),
            contents: bytemuck::cast_slice(&[BloomUniform::from_config(bloom)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let shader = device.create_shader_module(&wgpu::ShaderModuleDescriptor {
            label: Some("Composite Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("composite.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Composite Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Composite Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                }],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let color = texture::Texture::create_render_target(device, config, SCENE_FORMAT, "scene_color");
        let selection =
            texture::Texture::create_render_target(device, config, SCENE_FORMAT, "bloom_selection");
        let depth = texture::Texture::create_depth_texture(device, config, "depth_texture");
        let bind_group = create_bind_group(device, &layout, &color, &selection, &uniform_buffer);

        Self {
            color,
            selection,
            depth,
            layout,
            bind_group,
            uniform_buffer,
            pipeline,
        }
    }

    /// Recreates the size-dependent targets.
    pub fn resize(&mut self, device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) {
        self.color = texture::Texture::create_render_target(device, config, SCENE_FORMAT, "scene_color");
        self.selection =
            texture::Texture::create_render_target(device, config, SCENE_FORMAT, "bloom_selection");
        self.depth = texture::Texture::create_depth_texture(device, config, "depth_texture");
        self.bind_group = create_bind_group(
            device,
            &self.layout,
            &self.color,
            &self.selection,
            &self.uniform_buffer,
        );
    }

    pub fn composite(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Composite Pass"),
            color_attachments: &[wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: true,
                },
            }],
            depth_stencil_attachment: None,
        });
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    color: &texture::Texture,
    selection: &texture::Texture,
    uniform_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&color.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&selection.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&color.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: uniform_buffer.as_entire_binding(),
            },
        ],
        label: Some("composite_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn background_is_linearised() {
        let c = linear_color(BACKGROUND_COLOR);
        assert!((c.r - 0.0030).abs() < 1e-4);
        assert!((c.g - 0.0467).abs() < 1e-3);
        assert!((c.b - 0.1221).abs() < 1e-3);
        assert_eq!(linear_color(0xffffff).r, 1.0);
    }

    #[test]
    fn uniform_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<BloomUniform>(), 16);
    }

    #[test]
    fn negative_settings_are_clamped() {
        let u = BloomUniform::from_config(&BloomConfig {
            intensity: -1.0,
            luminance_threshold: -0.5,
            radius: 0.5,
        });
        assert_eq!(
            u,
            BloomUniform {
                intensity: 0.0,
                threshold: 0.0,
                spread: 2.0,
                _padding: 0.0,
            }
        );
    }
}

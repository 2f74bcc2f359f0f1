use std::f32::consts::PI;

use cgmath::{Matrix4, Rad, Vector3};
use wgpu::util::DeviceExt;

use crate::model::ModelVertex;
use crate::texture;

pub const SKY_RADIUS: f32 = 100.0;
const WIDTH_SEGMENTS: u32 = 48;
const HEIGHT_SEGMENTS: u32 = 24;

/// UV sphere wound so its faces point inwards.
pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> (Vec<ModelVertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(((width_segments + 1) * (height_segments + 1)) as usize);
    for y in 0..=height_segments {
        let v = y as f32 / height_segments as f32;
        let theta = v * PI;
        for x in 0..=width_segments {
            let u = x as f32 / width_segments as f32;
            let phi = u * 2.0 * PI;
            let dir = [-phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin()];
            vertices.push(ModelVertex {
                position: [dir[0] * radius, dir[1] * radius, dir[2] * radius],
                tex_coords: [u, v],
                // lit from the inside
                normal: [-dir[0], -dir[1], -dir[2]],
            });
        }
    }

    let row = width_segments + 1;
    let mut indices = Vec::with_capacity((width_segments * height_segments * 6) as usize);
    for y in 0..height_segments {
        for x in 0..width_segments {
            let a = y * row + x + 1;
            let b = y * row + x;
            let c = (y + 1) * row + x;
            let d = (y + 1) * row + x + 1;
            if y != 0 {
                indices.extend_from_slice(&[a, d, b]);
            }
            if y != height_segments - 1 {
                indices.extend_from_slice(&[b, d, c]);
            }
        }
    }
    (vertices, indices)
}

/// Model matrix of the sky sphere for an Euler rotation (XYZ, radians).
pub fn rotation_matrix(rotation: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::from_angle_x(Rad(rotation.x))
        * Matrix4::from_angle_y(Rad(rotation.y))
        * Matrix4::from_angle_z(Rad(rotation.z))
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SkyUniform {
    model: [[f32; 4]; 4],
}

pub struct Skybox {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_elements: u32,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group: wgpu::BindGroup,
    _texture: texture::Texture,
}

impl Skybox {
    pub fn create_texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
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
            label: Some("sky_texture_bind_group_layout"),
        })
    }

    pub fn create_uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
            label: Some("sky_uniform_bind_group_layout"),
        })
    }

    pub fn new(
        device: &wgpu::Device,
        texture_layout: &wgpu::BindGroupLayout,
        uniform_layout: &wgpu::BindGroupLayout,
        texture: texture::Texture,
        rotation: Vector3<f32>,
    ) -> Self {
        let (vertices, indices) = sphere(SKY_RADIUS, WIDTH_SEGMENTS, HEIGHT_SEGMENTS);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sky Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sky Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let uniform = SkyUniform {
            model: rotation_matrix(rotation).into(),
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sky Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("sky_uniform_bind_group"),
        });
        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
            label: Some("sky_texture_bind_group"),
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_elements: indices.len() as u32,
            uniform_buffer,
            uniform_bind_group,
            texture_bind_group,
            _texture: texture,
        }
    }

    pub fn set_rotation(&self, queue: &wgpu::Queue, rotation: Vector3<f32>) {
        let uniform = SkyUniform {
            model: rotation_matrix(rotation).into(),
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }
}

pub trait DrawSkybox<'a> {
    fn draw_skybox(&mut self, skybox: &'a Skybox, camera_bind_group: &'a wgpu::BindGroup);
}

impl<'a, 'b> DrawSkybox<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_skybox(&mut self, skybox: &'b Skybox, camera_bind_group: &'b wgpu::BindGroup) {
        self.set_vertex_buffer(0, skybox.vertex_buffer.slice(..));
        self.set_index_buffer(skybox.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &skybox.texture_bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, &skybox.uniform_bind_group, &[]);
        self.draw_indexed(0..skybox.num_elements, 0, 0..1);
    }
}

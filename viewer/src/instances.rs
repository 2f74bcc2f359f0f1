use std::f32::consts::PI;

use cgmath::{Matrix3, Matrix4, Rad, Vector3};

use crate::model::{self, Aabb};

pub const GRID_COLUMNS: usize = 3;
pub const GRID_SPACING: f32 = 3.0;
/// Where the inspected drone is shown, away from the formation.
pub const FOCUS_POSITION: [f32; 3] = [40.0, 0.0, 0.0];

/// Position, Euler rotation (XYZ order, radians) and scale of a single instance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InstanceTransform {
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl InstanceTransform {
    pub fn rotation_matrix(&self) -> Matrix3<f32> {
        Matrix3::from_angle_x(Rad(self.rotation.x))
            * Matrix3::from_angle_y(Rad(self.rotation.y))
            * Matrix3::from_angle_z(Rad(self.rotation.z))
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation_matrix())
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> InstanceRaw {
        InstanceRaw {
            model: self.matrix().into(),
            normal: self.rotation_matrix().into(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

impl model::Vertex for InstanceRaw {
    fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Advance per instance, not per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // A mat4 takes up 4 vertex slots, one per column
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
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// What the registry needs to know about a mesh of the loaded asset.
#[derive(Debug, Clone, PartialEq)]
pub struct PartBase {
    pub name: String,
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub bounds: Aabb,
}

/// One mesh part, instanced `count + 1` times.
#[derive(Debug, Clone)]
pub struct ModelPart {
    pub base: PartBase,
    transforms: Vec<InstanceTransform>,
}

impl ModelPart {
    pub fn transforms(&self) -> &[InstanceTransform] {
        &self.transforms
    }
}

/// Grid slot of drone `index`: three columns along z, rows along y, centred on the origin.
pub fn grid_position(index: usize) -> Vector3<f32> {
    let column = (index % GRID_COLUMNS) as f32 - 1.0;
    let row = (index / GRID_COLUMNS) as f32 - 1.0;
    Vector3::new(0.0, row * GRID_SPACING, column * GRID_SPACING)
}

fn formation_transform(base: &PartBase, index: usize) -> InstanceTransform {
    let mut rotation = base.rotation;
    rotation.y += PI / 2.0;
    rotation.x += PI;
    InstanceTransform {
        position: grid_position(index),
        rotation,
        scale: base.scale,
    }
}

fn focus_transform(base: &PartBase) -> InstanceTransform {
    let mut rotation = base.rotation;
    rotation.x -= PI / 2.0;
    InstanceTransform {
        position: FOCUS_POSITION.into(),
        rotation,
        scale: base.scale,
    }
}

/// Per-part instance transforms for every drone plus the focus slot at index `count`.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    parts: Vec<ModelPart>,
    count: usize,
}

impl InstanceRegistry {
    pub fn build(bases: Vec<PartBase>, count: usize) -> Self {
        let parts = bases
            .into_iter()
            .map(|base| {
                let transforms = (0..count)
                    .map(|i| formation_transform(&base, i))
                    .chain(std::iter::once(focus_transform(&base)))
                    .collect();
                ModelPart { base, transforms }
            })
            .collect();
        Self { parts, count }
    }

    pub fn parts(&self) -> &[ModelPart] {
        &self.parts
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn drone_count(&self) -> usize {
        self.count
    }

    pub fn focus_slot(&self) -> usize {
        self.count
    }

    pub fn transform(&self, part: usize, slot: usize) -> Option<&InstanceTransform> {
        self.parts.get(part).and_then(|p| p.transforms.get(slot))
    }

    /// Shifts every drone (not the focus slot) of every part by the same displacement.
    pub fn bob(&mut self, dy: f32, dz: f32) {
        let count = self.count;
        for part in self.parts.iter_mut() {
            for t in part.transforms[..count].iter_mut() {
                t.position.y += dy;
                t.position.z += dz;
            }
        }
    }

    /// Rolls the focus instance around its z axis.
    pub fn spin_focus(&mut self, dz: f32) {
        let slot = self.count;
        for part in self.parts.iter_mut() {
            part.transforms[slot].rotation.z += dz;
        }
    }

    pub fn raw_instances(&self, part: usize) -> Vec<InstanceRaw> {
        self.parts[part]
            .transforms
            .iter()
            .map(InstanceTransform::to_raw)
            .collect()
    }
}

use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::*;
use cgmath::Vector3;
use log::{debug, error, warn};
use tobj::LoadOptions;
use wgpu::util::DeviceExt;

use crate::instances::{InstanceRegistry, PartBase};
use crate::texture;

pub trait Vertex {
    fn desc<'a>() -> wgpu::VertexBufferLayout<'a>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Axis-aligned bounds in a mesh's local space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    pub fn from_vertices(vertices: &[ModelVertex]) -> Self {
        let mut iter = vertices.iter().map(|v| glam::Vec3::from(v.position));
        let first = match iter.next() {
            Some(p) => p,
            None => return Self::new([0.0; 3], [0.0; 3]),
        };
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Self::new(min.into(), max.into())
    }
}

/// CPU side of one mesh of the asset.
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MaterialData {
    pub name: String,
    pub diffuse: [f32; 3],
    pub diffuse_texture: Option<PathBuf>,
}

/// Node graph of a loaded asset. An OBJ file is a group holding one mesh per object.
#[derive(Debug, Clone)]
pub enum AssetNode {
    Group { name: String, children: Vec<AssetNode> },
    Mesh(MeshData),
}

impl AssetNode {
    /// Meshes in depth-first order.
    pub fn meshes(&self) -> Vec<&MeshData> {
        let mut out = vec![];
        self.collect_meshes(&mut out);
        out
    }

    fn collect_meshes<'a>(&'a self, out: &mut Vec<&'a MeshData>) {
        match self {
            AssetNode::Group { children, .. } => {
                for child in children {
                    child.collect_meshes(out);
                }
            }
            AssetNode::Mesh(mesh) => out.push(mesh),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub root: AssetNode,
    pub materials: Vec<MaterialData>,
}

fn load_options() -> LoadOptions {
    LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

impl Asset {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let (obj_models, obj_materials) = tobj::load_obj(path, &load_options())
            .with_context(|| format!("Couldn't load model {:?}", path))?;
        let obj_materials = obj_materials.unwrap_or_else(|e| {
            warn!("{:?} has no usable materials ({}), using a plain white one", path, e);
            vec![]
        });

        // texture files are expected next to the obj file
        let containing_folder = path.parent().context("Directory has no parent")?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_tobj(name, obj_models, obj_materials, containing_folder))
    }

    /// Parses OBJ text without touching the filesystem; material libraries are skipped.
    #[cfg(test)]
    pub fn from_obj_buf<B: std::io::BufRead>(name: &str, reader: &mut B) -> Result<Self> {
        let (obj_models, _) = tobj::load_obj_buf(reader, &load_options(), |_| {
            Err(tobj::LoadError::OpenFileFailed)
        })
        .with_context(|| format!("Couldn't parse model {}", name))?;
        Ok(Self::from_tobj(name.to_string(), obj_models, vec![], Path::new(".")))
    }

    fn from_tobj(
        name: String,
        obj_models: Vec<tobj::Model>,
        obj_materials: Vec<tobj::Material>,
        containing_folder: &Path,
    ) -> Self {
        let materials = obj_materials
            .into_iter()
            .map(|mat| MaterialData {
                name: mat.name,
                diffuse: mat.diffuse,
                diffuse_texture: if mat.diffuse_texture.is_empty() {
                    None
                } else {
                    Some(containing_folder.join(mat.diffuse_texture))
                },
            })
            .collect();

        let children = obj_models
            .into_iter()
            .map(|m| AssetNode::Mesh(mesh_data(m)))
            .collect();

        Self {
            root: AssetNode::Group { name, children },
            materials,
        }
    }

    /// Base transforms and bounds of every mesh part, in traversal order.
    pub fn parts(&self, rotation_deg: [f32; 3], scale: [f32; 3]) -> Vec<PartBase> {
        let rotation = Vector3::new(
            rotation_deg[0].to_radians(),
            rotation_deg[1].to_radians(),
            rotation_deg[2].to_radians(),
        );
        self.root
            .meshes()
            .into_iter()
            .map(|mesh| PartBase {
                name: mesh.name.clone(),
                position: Vector3::new(0.0, 0.0, 0.0),
                rotation,
                scale: scale.into(),
                bounds: Aabb::from_vertices(&mesh.vertices),
            })
            .collect()
    }
}

fn mesh_data(m: tobj::Model) -> MeshData {
    let mesh = m.mesh;
    let vertex_count = mesh.positions.len() / 3;
    let has_texcoords = mesh.texcoords.len() >= vertex_count * 2;
    let has_normals = mesh.normals.len() >= vertex_count * 3;

    let mut vertices: Vec<ModelVertex> = (0..vertex_count)
        .map(|i| ModelVertex {
            position: [
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                mesh.positions[i * 3 + 2],
            ],
            tex_coords: if has_texcoords {
                [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
            } else {
                [0.0, 0.0]
            },
            normal: if has_normals {
                [
                    mesh.normals[i * 3],
                    mesh.normals[i * 3 + 1],
                    mesh.normals[i * 3 + 2],
                ]
            } else {
                [0.0, 0.0, 0.0]
            },
        })
        .collect();

    if !has_normals {
        compute_normals(&mut vertices, &mesh.indices);
    }

    MeshData {
        name: m.name,
        vertices,
        indices: mesh.indices,
        material: mesh.material_id,
    }
}

/// Area-weighted vertex normals for meshes exported without them.
fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut sums = vec![glam::Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let pa = glam::Vec3::from(vertices[a].position);
        let pb = glam::Vec3::from(vertices[b].position);
        let pc = glam::Vec3::from(vertices[c].position);
        let n = (pb - pa).cross(pc - pa);
        sums[a] += n;
        sums[b] += n;
        sums[c] += n;
    }
    for (v, n) in vertices.iter_mut().zip(sums) {
        v.normal = n.normalize_or_zero().into();
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub diffuse_color: [f32; 3],
    pub use_diffuse_color: i32,
}

pub struct Material {
    pub name: String,
    pub bind_group: wgpu::BindGroup,
    // bound through `bind_group`, held so they live as long as the material
    #[allow(dead_code)]
    diffuse_texture: texture::Texture,
    #[allow(dead_code)]
    uniform_buffer: wgpu::Buffer,
}

pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub instance_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub num_instances: u32,
    pub material: usize,
}

/// GPU side of the asset. Mesh `i` draws instance registry part `i`.
pub struct Model {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
}

impl Model {
    pub fn create_material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
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
            label: Some("material_bind_group_layout"),
        })
    }

    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
        asset: &Asset,
        registry: &InstanceRegistry,
    ) -> Result<Self> {
        let mut materials = Vec::with_capacity(asset.materials.len() + 1);
        for mat in &asset.materials {
            materials.push(create_material(device, queue, material_layout, mat)?);
        }
        // fallback for meshes without a usable material
        let default_material = materials.len();
        materials.push(create_material(
            device,
            queue,
            material_layout,
            &MaterialData {
                name: "default".to_string(),
                diffuse: [0.8, 0.8, 0.8],
                diffuse_texture: None,
            },
        )?);

        let meshes = asset
            .root
            .meshes()
            .into_iter()
            .enumerate()
            .map(|(part, m)| {
                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Vertex Buffer", m.name)),
                    contents: bytemuck::cast_slice(&m.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Index Buffer", m.name)),
                    contents: bytemuck::cast_slice(&m.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                let instance_data = registry.raw_instances(part);
                let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Instance Buffer", m.name)),
                    contents: bytemuck::cast_slice(&instance_data),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                });
                Mesh {
                    name: m.name.clone(),
                    vertex_buffer,
                    index_buffer,
                    instance_buffer,
                    num_elements: m.indices.len() as u32,
                    num_instances: instance_data.len() as u32,
                    material: m
                        .material
                        .filter(|&i| i < default_material)
                        .unwrap_or(default_material),
                }
            })
            .collect::<Vec<_>>();

        for mesh in &meshes {
            debug!(
                "Uploaded {} ({} indices) with material {}",
                mesh.name, mesh.num_elements, materials[mesh.material].name
            );
        }
        Ok(Self { meshes, materials })
    }

    /// Uploads the current transforms of every part.
    pub fn write_instances(&self, queue: &wgpu::Queue, registry: &InstanceRegistry) {
        for (part, mesh) in self.meshes.iter().enumerate() {
            if part >= registry.part_count() {
                break;
            }
            queue.write_buffer(
                &mesh.instance_buffer,
                0,
                bytemuck::cast_slice(&registry.raw_instances(part)),
            );
        }
    }
}

fn create_material(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    mat: &MaterialData,
) -> Result<Material> {
    let textured = match &mat.diffuse_texture {
        Some(path) => texture::Texture::load(device, queue, path)
            .map_err(|e| error!("{:?}", e))
            .ok(),
        None => None,
    };
    let (diffuse_texture, uniform) = match textured {
        Some(t) => (
            t,
            MaterialUniform {
                diffuse_color: [1.0, 1.0, 1.0],
                use_diffuse_color: 0,
            },
        ),
        None => (
            texture::Texture::solid(device, queue, [255, 255, 255, 255], "solid_white")?,
            MaterialUniform {
                diffuse_color: mat.diffuse,
                use_diffuse_color: 1,
            },
        ),
    };

    let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{} Uniform Buffer (MATERIAL)", mat.name)),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&diffuse_texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&diffuse_texture.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniform_buffer.as_entire_binding(),
            },
        ],
        label: Some(&format!("{} Bind Group", mat.name)),
    });

    Ok(Material {
        name: mat.name.clone(),
        diffuse_texture,
        bind_group,
        uniform_buffer,
    })
}

pub trait DrawModel<'a> {
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'a Mesh,
        material: &'a Material,
        instances: Range<u32>,
        camera_bind_group: &'a wgpu::BindGroup,
    );

    fn draw_model_instanced(&mut self, model: &'a Model, camera_bind_group: &'a wgpu::BindGroup);

    /// Geometry only, for passes that bind their own group 0 and no material.
    fn draw_model_depth(&mut self, model: &'a Model);
}

impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'b Mesh,
        material: &'b Material,
        instances: Range<u32>,
        camera_bind_group: &'b wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_vertex_buffer(1, mesh.instance_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }

    /// Draws every mesh over all of its instance slots, focus slot included.
    fn draw_model_instanced(&mut self, model: &'b Model, camera_bind_group: &'b wgpu::BindGroup) {
        for mesh in &model.meshes {
            let material = &model.materials[mesh.material];
            self.draw_mesh_instanced(mesh, material, 0..mesh.num_instances, camera_bind_group);
        }
    }

    fn draw_model_depth(&mut self, model: &'b Model) {
        for mesh in &model.meshes {
            self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            self.set_vertex_buffer(1, mesh.instance_buffer.slice(..));
            self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            self.draw_indexed(0..mesh.num_elements, 0, 0..mesh.num_instances);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::io::Cursor;

    const TWO_PARTS: &str = "\
o body
v -1.0 -0.5 -2.0
v 1.0 -0.5 -2.0
v 1.0 0.5 2.0
v -1.0 0.5 2.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 1.0 0.0
f 1/1/1 2/2/1 3/3/1 4/4/1
o rotor
v 0.0 1.0 0.0
v 0.5 1.0 0.0
v 0.0 1.0 0.5
f 5 6 7
";

    fn asset() -> Asset {
        Asset::from_obj_buf("drone", &mut Cursor::new(TWO_PARTS)).unwrap()
    }

    #[test]
    fn every_object_becomes_a_part_in_order() {
        let asset = asset();
        let names: Vec<_> = asset.root.meshes().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["body".to_string(), "rotor".to_string()]);
        // the quad is triangulated
        assert_eq!(asset.root.meshes()[0].indices.len(), 6);
    }

    #[test]
    fn nested_groups_are_walked_depth_first() {
        let leaf = |name: &str| {
            AssetNode::Mesh(MeshData {
                name: name.to_string(),
                vertices: vec![],
                indices: vec![],
                material: None,
            })
        };
        let root = AssetNode::Group {
            name: "root".to_string(),
            children: vec![
                leaf("a"),
                AssetNode::Group {
                    name: "arm".to_string(),
                    children: vec![leaf("b"), leaf("c")],
                },
                leaf("d"),
            ],
        };
        let names: Vec<_> = root.meshes().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn parts_carry_bounds_and_base_transform() {
        let parts = asset().parts([90.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].bounds, Aabb::new([-1.0, -0.5, -2.0], [1.0, 0.5, 2.0]));
        assert!((parts[0].rotation.x - PI / 2.0).abs() < 1e-6);
        assert_eq!(parts[1].scale, Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn missing_normals_are_generated() {
        let asset = asset();
        let rotor = asset.root.meshes()[1];
        for v in &rotor.vertices {
            assert_eq!(v.tex_coords, [0.0, 0.0]);
            let n = glam::Vec3::from(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-5);
            assert!(n.y.abs() > 0.99);
        }
    }

    #[test]
    fn empty_bounds_are_degenerate() {
        assert_eq!(Aabb::from_vertices(&[]), Aabb::new([0.0; 3], [0.0; 3]));
    }
}

use std::f32::consts::PI;

use cgmath::prelude::*;
use cgmath::{Matrix4, Point3, Vector3, Vector4};
use wgpu::util::DeviceExt;
use winit::event::{ElementState, MouseButton, WindowEvent};

use crate::config::CameraConfig;
use crate::picking::Ray;
use crate::tween::CameraRig;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub aspect: f32,
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new(config: &CameraConfig, width: f32, height: f32) -> Self {
        Self {
            eye: Point3::from(config.position),
            target: Point3::new(0.0, 0.0, 0.0),
            up: Vector3::unit_y(),
            aspect: width / height.max(1.0),
            fovy: config.fovy,
            znear: config.znear,
            zfar: config.zfar,
        }
    }

    pub fn update_aspect(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.aspect = width / height;
        }
    }

    /// Points the camera at the rig's (possibly tweened) pose.
    pub fn follow(&mut self, rig: &CameraRig) {
        self.eye = Point3::from_vec(rig.camera_position);
        self.target = Point3::from_vec(rig.camera_target);
    }

    pub fn build_view_projection_matrix(&self) -> Matrix4<f32> {
        let view = Matrix4::look_at_rh(self.eye, self.target, self.up);
        let proj = cgmath::perspective(cgmath::Deg(self.fovy), self.aspect, self.znear, self.zfar);
        OPENGL_TO_WGPU_MATRIX * proj * view
    }

    /// World position to screen pixels (origin top-left).
    pub fn project(&self, point: Vector3<f32>, width: f32, height: f32) -> [f32; 2] {
        let clip = self.build_view_projection_matrix() * point.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        [(ndc.x + 1.0) * width / 2.0, -(ndc.y - 1.0) * height / 2.0]
    }

    /// Ray from the eye through the screen pixel `(x, y)`.
    pub fn screen_ray(&self, x: f32, y: f32, width: f32, height: f32) -> Option<Ray> {
        let ndc_x = x / width * 2.0 - 1.0;
        let ndc_y = -(y / height) * 2.0 + 1.0;
        let inverse = self.build_view_projection_matrix().invert()?;
        let unproject = |z: f32| {
            let p = inverse * Vector4::new(ndc_x, ndc_y, z, 1.0);
            p.truncate() / p.w
        };
        let near = unproject(0.0);
        let far = unproject(1.0);
        let dir = far - near;
        if dir.magnitude2() == 0.0 {
            return None;
        }
        Some(Ray::new(near, dir.normalize()))
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        self.view_position = camera.eye.to_homogeneous().into();
        self.view_proj = camera.build_view_projection_matrix().into();
    }
}

/// GPU side of the camera.
pub struct CameraBuffer {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl CameraBuffer {
    pub fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        })
    }

    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, camera: &Camera) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(camera);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            uniform,
            buffer,
            bind_group,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, camera: &Camera) {
        self.uniform.update_view_proj(camera);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

/// Orbit controls around the rig's look-at target. Drag rotation only applies when enabled;
/// the minimum distance is always enforced.
pub struct OrbitController {
    pub enabled: bool,
    pub min_distance: f32,
    damping: f32,
    rotating: bool,
    last_cursor: Option<(f64, f64)>,
    viewport_height: f32,
    delta_theta: f32,
    delta_phi: f32,
}

impl OrbitController {
    pub fn new(config: &CameraConfig, viewport_height: f32) -> Self {
        Self {
            enabled: config.controls_enabled,
            min_distance: config.min_distance,
            damping: config.damping.clamp(0.0, 1.0),
            rotating: false,
            last_cursor: None,
            viewport_height: viewport_height.max(1.0),
            delta_theta: 0.0,
            delta_phi: 0.0,
        }
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(1.0);
    }

    /// Returns true when the event was consumed by a drag.
    pub fn process_events(&mut self, event: &WindowEvent) -> bool {
        if !self.enabled {
            return false;
        }
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.rotating = *state == ElementState::Pressed;
                if !self.rotating {
                    self.last_cursor = None;
                }
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                let current = (position.x, position.y);
                let consumed = match (self.rotating, self.last_cursor) {
                    (true, Some((lx, ly))) => {
                        self.rotate_by((current.0 - lx) as f32, (current.1 - ly) as f32);
                        true
                    }
                    _ => false,
                };
                self.last_cursor = Some(current);
                consumed
            }
            _ => false,
        }
    }

    /// Queues a rotation equivalent to dragging by `(dx, dy)` pixels.
    pub fn rotate_by(&mut self, dx: f32, dy: f32) {
        self.delta_theta -= 2.0 * PI * dx / self.viewport_height;
        self.delta_phi -= 2.0 * PI * dy / self.viewport_height;
    }

    pub fn update(&mut self, rig: &mut CameraRig) {
        let mut offset = rig.camera_position - rig.camera_target;
        let mut changed = false;

        if self.delta_theta != 0.0 || self.delta_phi != 0.0 {
            let radius = offset.magnitude();
            if radius > 0.0 {
                let theta = offset.x.atan2(offset.z) + self.delta_theta;
                let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() + self.delta_phi)
                    .clamp(1e-6, PI - 1e-6);
                offset = Vector3::new(
                    radius * phi.sin() * theta.sin(),
                    radius * phi.cos(),
                    radius * phi.sin() * theta.cos(),
                );
                changed = true;
            }
            if self.damping > 0.0 {
                self.delta_theta *= 1.0 - self.damping;
                self.delta_phi *= 1.0 - self.damping;
                if self.delta_theta.abs() < 1e-5 && self.delta_phi.abs() < 1e-5 {
                    self.delta_theta = 0.0;
                    self.delta_phi = 0.0;
                }
            } else {
                self.delta_theta = 0.0;
                self.delta_phi = 0.0;
            }
        }

        let distance = offset.magnitude();
        if distance > 0.0 && distance < self.min_distance {
            offset = offset * (self.min_distance / distance);
            changed = true;
        }

        if changed {
            rig.camera_position = rig.camera_target + offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig(position: [f32; 3]) -> CameraRig {
        CameraRig {
            camera_position: position.into(),
            camera_target: Vector3::zero(),
            skybox_rotation: Vector3::zero(),
        }
    }

    #[test]
    fn target_projects_to_screen_centre() {
        let camera = Camera::new(&CameraConfig::default(), 800.0, 600.0);
        let [x, y] = camera.project(Vector3::zero(), 800.0, 600.0);
        assert!((x - 400.0).abs() < 1e-3);
        assert!((y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn centre_ray_points_at_target() {
        let camera = Camera::new(&CameraConfig::default(), 800.0, 600.0);
        let ray = camera.screen_ray(400.0, 300.0, 800.0, 600.0).unwrap();
        let expected = (Vector3::zero() - Vector3::new(8.0, -15.0, 0.0)).normalize();
        assert!((ray.dir - expected).magnitude() < 1e-3);
    }

    #[test]
    fn update_without_input_leaves_pose_untouched() {
        let mut controls = OrbitController::new(&CameraConfig::default(), 600.0);
        let mut r = rig([8.0, -15.0, 0.0]);
        controls.update(&mut r);
        assert_eq!(r.camera_position, Vector3::new(8.0, -15.0, 0.0));
    }

    #[test]
    fn min_distance_is_enforced() {
        let mut controls = OrbitController::new(&CameraConfig::default(), 600.0);
        let mut r = rig([0.0, 0.0, 2.0]);
        controls.update(&mut r);
        assert!((r.camera_position.magnitude() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn drag_rotation_keeps_distance_and_decays() {
        let config = CameraConfig {
            controls_enabled: true,
            ..CameraConfig::default()
        };
        let mut controls = OrbitController::new(&config, 600.0);
        let mut r = rig([0.0, 0.0, 20.0]);
        controls.rotate_by(30.0, 0.0);
        controls.update(&mut r);
        let first = r.camera_position;
        assert!((first.magnitude() - 20.0).abs() < 1e-3);
        assert!(first.x.abs() > 0.0);
        for _ in 0..1000 {
            controls.update(&mut r);
        }
        let settled = r.camera_position;
        controls.update(&mut r);
        assert_eq!(r.camera_position, settled);
    }

    #[test]
    fn disabled_controls_ignore_input() {
        let mut controls = OrbitController::new(&CameraConfig::default(), 600.0);
        let event = WindowEvent::MouseInput {
            device_id: unsafe { winit::event::DeviceId::dummy() },
            state: ElementState::Pressed,
            button: MouseButton::Left,
            modifiers: Default::default(),
        };
        assert!(!controls.process_events(&event));
        assert!(!controls.rotating);
    }
}

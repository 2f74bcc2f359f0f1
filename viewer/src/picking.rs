use cgmath::prelude::*;
use cgmath::{Vector3, Vector4};

use crate::instances::InstanceRegistry;
use crate::model::Aabb;

/// Entry distances closer than this count as the same hit.
const TIE_EPSILON: f32 = 1e-4;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f32>,
    pub dir: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Vector3<f32>, dir: Vector3<f32>) -> Self {
        Self { origin, dir }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InstanceHit {
    /// Drone index, never the focus slot
    pub index: usize,
    pub part: usize,
    pub distance: f32,
}

/// Slab test. Returns the entry distance along `dir`, or the exit distance when the origin
/// is inside the box.
pub fn ray_aabb(origin: Vector3<f32>, dir: Vector3<f32>, bounds: &Aabb) -> Option<f32> {
    let mut t_min = 0.0f32;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
        if d.abs() < 1e-12 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t0 = (lo - o) * inv;
        let mut t1 = (hi - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

/// Nearest drone instance hit by `ray` across all parts.
///
/// The ray is moved into each instance's local space and tested against the part's bounds,
/// so the distance stays comparable between instances. Equal distances resolve to the lower
/// drone index.
pub fn pick_instance(registry: &InstanceRegistry, ray: &Ray) -> Option<InstanceHit> {
    let mut best: Option<InstanceHit> = None;
    for (part_index, part) in registry.parts().iter().enumerate() {
        let drones = &part.transforms()[..registry.focus_slot()];
        for (index, transform) in drones.iter().enumerate() {
            let inverse = match transform.matrix().invert() {
                Some(m) => m,
                None => continue,
            };
            let origin = (inverse * ray.origin.extend(1.0)).truncate();
            let dir = (inverse * Vector4::new(ray.dir.x, ray.dir.y, ray.dir.z, 0.0)).truncate();
            let distance = match ray_aabb(origin, dir, &part.base.bounds) {
                Some(t) => t,
                None => continue,
            };
            let closer = match best {
                None => true,
                Some(b) => {
                    distance < b.distance - TIE_EPSILON
                        || ((distance - b.distance).abs() <= TIE_EPSILON && index < b.index)
                }
            };
            if closer {
                best = Some(InstanceHit {
                    index,
                    part: part_index,
                    distance,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instances::{grid_position, PartBase};
    use std::f32::consts::PI;

    fn registry(count: usize) -> InstanceRegistry {
        // no base rotation beyond the formation correction; a unit cube stays a unit cube
        let base = PartBase {
            name: "body".to_string(),
            position: Vector3::zero(),
            rotation: Vector3::zero(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            bounds: Aabb::new([-0.5, -0.5, -0.5], [0.5, 0.5, 0.5]),
        };
        InstanceRegistry::build(vec![base], count)
    }

    /// A part whose base rotation cancels the formation correction, so local axes are world axes.
    fn axis_aligned(name: &str, min: [f32; 3], max: [f32; 3]) -> PartBase {
        PartBase {
            name: name.to_string(),
            position: Vector3::zero(),
            rotation: Vector3::new(-PI, -PI / 2.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            bounds: Aabb::new(min, max),
        }
    }

    #[test]
    fn slab_hit_and_miss() {
        let b = Aabb::new([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        let t = ray_aabb(Vector3::new(-5.0, 0.0, 0.0), Vector3::unit_x(), &b).unwrap();
        assert!((t - 4.0).abs() < 1e-6);
        assert!(ray_aabb(Vector3::new(-5.0, 3.0, 0.0), Vector3::unit_x(), &b).is_none());
        assert!(ray_aabb(Vector3::new(5.0, 0.0, 0.0), Vector3::unit_x(), &b).is_none());
    }

    #[test]
    fn picks_the_drone_in_front_of_the_ray() {
        let reg = registry(9);
        for i in 0..9 {
            let p = grid_position(i);
            let ray = Ray::new(Vector3::new(20.0, p.y, p.z), -Vector3::unit_x());
            let hit = pick_instance(&reg, &ray).unwrap();
            assert_eq!(hit.index, i);
            assert!((hit.distance - 19.5).abs() < 1e-3);
        }
    }

    #[test]
    fn misses_between_drones() {
        let reg = registry(9);
        let ray = Ray::new(Vector3::new(20.0, 1.5, 1.5), -Vector3::unit_x());
        assert!(pick_instance(&reg, &ray).is_none());
    }

    #[test]
    fn focus_slot_is_never_picked() {
        let reg = registry(3);
        let ray = Ray::new(Vector3::new(40.0, 0.0, 20.0), -Vector3::unit_z());
        assert!(pick_instance(&reg, &ray).is_none());
    }

    #[test]
    fn nearest_wins_along_a_row() {
        let reg = registry(9);
        // along +z through row y=0: drones 3, 4, 5 at z=-3, 0, 3
        let ray = Ray::new(Vector3::new(0.0, 0.0, -20.0), Vector3::unit_z());
        assert_eq!(pick_instance(&reg, &ray).unwrap().index, 3);
        let back = Ray::new(Vector3::new(0.0, 0.0, 20.0), -Vector3::unit_z());
        assert_eq!(pick_instance(&reg, &back).unwrap().index, 5);
    }

    #[test]
    fn equal_distance_goes_to_the_lower_index() {
        // boxes wide enough that drones 2 (y=-3) and 5 (y=0) in column z=3 overlap at y=-1.5
        let reg = InstanceRegistry::build(vec![axis_aligned("body", [-2.0; 3], [2.0; 3])], 9);
        let ray = Ray::new(Vector3::new(20.0, -1.5, 3.0), -Vector3::unit_x());
        let hit = pick_instance(&reg, &ray).unwrap();
        assert_eq!(hit.index, 2);
        assert!((hit.distance - 18.0).abs() < 1e-4);
    }

    #[test]
    fn equal_distance_across_parts_goes_to_the_lower_index() {
        // at y=-0.5 the first box only reaches drone 5 and the second only drone 2,
        // both entered at x=1
        let near_centre = axis_aligned("body", [-1.0; 3], [1.0; 3]);
        let above_centre = axis_aligned("mast", [-1.0, 0.0, -1.0], [1.0, 3.0, 1.0]);
        let ray = Ray::new(Vector3::new(20.0, -0.5, 3.0), -Vector3::unit_x());

        let reg = InstanceRegistry::build(vec![near_centre.clone(), above_centre.clone()], 9);
        let hit = pick_instance(&reg, &ray).unwrap();
        assert_eq!((hit.index, hit.part), (2, 1));
        assert!((hit.distance - 19.0).abs() < 1e-4);

        let reg = InstanceRegistry::build(vec![above_centre, near_centre], 9);
        let hit = pick_instance(&reg, &ray).unwrap();
        assert_eq!((hit.index, hit.part), (2, 0));
    }
}

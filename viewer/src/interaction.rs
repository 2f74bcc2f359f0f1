use std::time::Duration;

use cgmath::Vector3;
use log::{debug, info};

use crate::picking::{pick_instance, Ray};
use crate::scene::SceneState;
use crate::tween::{Completion, Easing, Tween, TweenTarget};

pub const FOCUS_TARGET: [f32; 3] = [50.0, -2.0, 10.0];
pub const FOCUS_CAMERA: [f32; 3] = [36.0, 1.0, -1.8];
pub const FOCUS_SKYBOX_DEG: [f32; 3] = [0.0, -24.0, 10.0];
pub const HOME_TARGET: [f32; 3] = [0.0, 0.0, 0.0];
pub const HOME_SKYBOX_DEG: [f32; 3] = [0.0, 0.0, -47.0];

const LOOK_DURATION: Duration = Duration::from_millis(2000);
const MOVE_DURATION: Duration = Duration::from_millis(1000);
const MOVE_DELAY: Duration = Duration::from_millis(500);
const SKY_DURATION: Duration = Duration::from_millis(2000);

pub fn degrees(v: [f32; 3]) -> Vector3<f32> {
    Vector3::new(v[0].to_radians(), v[1].to_radians(), v[2].to_radians())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Hovering(usize),
    Focused(usize),
}

/// Hovered and focused drone. Hover is always cleared while a drone is focused.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct InteractionState {
    pub hovered: Option<usize>,
    pub focused: Option<usize>,
}

impl InteractionState {
    pub fn mode(&self) -> Mode {
        match (self.focused, self.hovered) {
            (Some(i), _) => Mode::Focused(i),
            (None, Some(i)) => Mode::Hovering(i),
            (None, None) => Mode::Idle,
        }
    }

    /// Hover picking only runs outside of focus.
    pub fn raycast_enabled(&self) -> bool {
        self.focused.is_none()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorStyle {
    Default,
    Pointer,
}

fn transition(target: TweenTarget, to: Vector3<f32>, duration: Duration) -> Tween {
    Tween::new(target, to, duration).easing(Easing::QuadraticInOut)
}

impl SceneState {
    /// Picks along `ray` and updates the hover. Ignored while focused.
    pub fn hover_at(&mut self, ray: Option<Ray>) {
        if !self.interaction.raycast_enabled() {
            return;
        }
        let hit = ray
            .and_then(|ray| pick_instance(&self.registry, &ray))
            .map(|hit| hit.index);
        self.pointer_moved(hit);
    }

    pub fn pointer_moved(&mut self, hit: Option<usize>) {
        if !self.interaction.raycast_enabled() {
            return;
        }
        if let Some(previous) = self.interaction.hovered.take() {
            self.tooltips.set_active(previous, false);
        }
        match hit {
            Some(index) => {
                self.interaction.hovered = Some(index);
                self.tooltips.set_active(index, true);
                self.cursor = CursorStyle::Pointer;
            }
            None => self.cursor = CursorStyle::Default,
        }
    }

    /// Focuses the hovered drone. Returns false when there was nothing to focus.
    pub fn click(&mut self) -> bool {
        let index = match self.interaction.mode() {
            Mode::Hovering(index) => index,
            Mode::Idle | Mode::Focused(_) => return false,
        };
        let record = match self.dataset.get(index) {
            Some(record) => record,
            None => return false,
        };
        info!("Focusing drone #{}", index + 1);

        self.panel.populate(index, record);
        self.tooltips.set_active(index, false);
        self.tooltips.set_hidden(true);
        self.interaction.hovered = None;
        self.interaction.focused = Some(index);
        self.cursor = CursorStyle::Default;

        self.tweens.add(
            transition(TweenTarget::CameraTarget, FOCUS_TARGET.into(), LOOK_DURATION)
                .on_complete(Completion::RevealInfoPanel),
        );
        self.tweens.add(
            transition(TweenTarget::CameraPosition, FOCUS_CAMERA.into(), MOVE_DURATION)
                .delay(MOVE_DELAY),
        );
        self.tweens.add(transition(
            TweenTarget::SkyboxRotation,
            degrees(FOCUS_SKYBOX_DEG),
            SKY_DURATION,
        ));
        true
    }

    /// Leaves focus. Returns false when no drone was focused.
    pub fn back(&mut self) -> bool {
        let index = match self.interaction.focused.take() {
            Some(index) => index,
            None => return false,
        };
        info!("Leaving drone #{}", index + 1);
        self.panel.hide();

        self.tweens.add(
            transition(TweenTarget::CameraTarget, HOME_TARGET.into(), LOOK_DURATION)
                .on_complete(Completion::RevealTooltips),
        );
        self.tweens.add(
            transition(TweenTarget::CameraPosition, self.home_position, MOVE_DURATION)
                .delay(MOVE_DELAY),
        );
        self.tweens.add(transition(
            TweenTarget::SkyboxRotation,
            degrees(HOME_SKYBOX_DEG),
            SKY_DURATION,
        ));
        true
    }

    /// Applies a finished tween's action. A reveal that no longer matches the current mode
    /// (focus left or re-entered before the camera settled) is dropped.
    pub(crate) fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::RevealInfoPanel if self.interaction.focused.is_some() => self.panel.show(),
            Completion::RevealTooltips if self.interaction.focused.is_none() => {
                self.tooltips.set_hidden(false)
            }
            _ => debug!("Dropped stale {:?}", completion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instances::grid_position;
    use crate::scene::tests::{scene, TICK};
    use cgmath::InnerSpace;
    use pretty_assertions::assert_eq;

    fn settle(s: &mut SceneState) -> u64 {
        let mut n = 0u64;
        while !s.tweens.is_empty() {
            s.tick(n as f64 * TICK.as_secs_f64());
            n += 1;
            assert!(n < 10_000, "tweens never settled");
        }
        n
    }

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-4
    }

    #[test]
    fn hover_then_move_away_leaves_nothing_active() {
        let mut s = scene(9);
        s.pointer_moved(Some(4));
        assert_eq!(s.interaction.mode(), Mode::Hovering(4));
        assert_eq!(s.tooltips.active_count(), 1);
        assert_eq!(s.cursor, CursorStyle::Pointer);

        s.pointer_moved(Some(5));
        assert_eq!(s.tooltips.active_count(), 1);

        s.pointer_moved(None);
        assert_eq!(s.interaction, InteractionState::default());
        assert_eq!(s.tooltips.active_count(), 0);
        assert_eq!(s.cursor, CursorStyle::Default);
    }

    #[test]
    fn hover_follows_the_pick_ray() {
        let mut s = scene(9);
        let p = grid_position(7);
        s.hover_at(Some(Ray::new(Vector3::new(20.0, p.y, p.z), -Vector3::unit_x())));
        assert_eq!(s.interaction.hovered, Some(7));
        s.hover_at(Some(Ray::new(Vector3::new(20.0, 1.5, 1.5), -Vector3::unit_x())));
        assert_eq!(s.interaction.hovered, None);
    }

    #[test]
    fn click_without_hover_is_a_no_op() {
        let mut s = scene(9);
        assert!(!s.click());
        assert_eq!(s.interaction.mode(), Mode::Idle);
        assert!(s.tweens.is_empty());
    }

    #[test]
    fn back_while_idle_is_a_no_op() {
        let mut s = scene(9);
        assert!(!s.back());
        assert!(s.tweens.is_empty());
    }

    #[test]
    fn focus_populates_panel_and_hides_tooltips() {
        let mut s = scene(9);
        s.pointer_moved(Some(3));
        assert!(s.click());
        assert_eq!(s.interaction.mode(), Mode::Focused(3));
        assert_eq!(s.interaction.hovered, None);
        assert_eq!(s.panel.id, "#Drone4");
        assert_eq!(s.panel.flight_hours, "30 hour");
        assert_eq!(s.panel.location, "3.5, -3.25");
        assert_eq!(s.tooltips.visible_count(), 0);
        assert_eq!(s.tooltips.active_count(), 0);
        assert_eq!(s.cursor, CursorStyle::Default);
        assert_eq!(s.tweens.len(), 3);
    }

    #[test]
    fn focused_ignores_hover_and_clicks() {
        let mut s = scene(9);
        s.pointer_moved(Some(0));
        s.click();
        s.pointer_moved(Some(2));
        assert_eq!(s.interaction.hovered, None);
        assert_eq!(s.tooltips.active_count(), 0);
        assert!(!s.click());
        assert_eq!(s.tweens.len(), 3);
    }

    #[test]
    fn panel_is_revealed_only_once_the_camera_has_turned() {
        let mut s = scene(9);
        s.pointer_moved(Some(1));
        s.click();
        let mut n = 0u64;
        while !s.tweens.is_empty() {
            let look_pending =
                s.tweens.len() == 3 || s.rig.camera_target != Vector3::from(FOCUS_TARGET);
            if look_pending {
                assert!(!s.panel.visible);
            }
            s.tick(n as f64 * TICK.as_secs_f64());
            n += 1;
        }
        assert!(s.panel.visible);
        assert_eq!(s.rig.camera_target, Vector3::from(FOCUS_TARGET));
        assert_eq!(s.rig.camera_position, Vector3::from(FOCUS_CAMERA));
        assert!(close(s.rig.skybox_rotation, degrees(FOCUS_SKYBOX_DEG)));
    }

    #[test]
    fn focus_spins_the_detail_instance_instead_of_bobbing() {
        let mut s = scene(3);
        s.pointer_moved(Some(0));
        s.click();
        let before = s.registry.transform(0, 0).unwrap().position;
        let roll = s.registry.transform(0, 3).unwrap().rotation.z;
        for n in 0..10 {
            s.tick(n as f64 * TICK.as_secs_f64());
        }
        assert_eq!(s.registry.transform(0, 0).unwrap().position, before);
        assert!((s.registry.transform(0, 3).unwrap().rotation.z - roll - 0.1).abs() < 1e-5);
    }

    #[test]
    fn hover_click_back_restores_the_overview() {
        let mut s = scene(9);
        s.pointer_moved(Some(3));
        s.click();
        settle(&mut s);
        assert!(s.back());
        assert!(!s.panel.visible);
        assert_eq!(s.tooltips.visible_count(), 0);
        settle(&mut s);

        assert_eq!(s.interaction, InteractionState::default());
        assert_eq!(s.rig.camera_position, Vector3::new(8.0, -15.0, 0.0));
        assert_eq!(s.rig.camera_target, Vector3::new(0.0, 0.0, 0.0));
        assert!(close(s.rig.skybox_rotation, degrees(HOME_SKYBOX_DEG)));
        assert_eq!(s.tooltips.visible_count(), 9);
        assert_eq!(s.tooltips.active_count(), 0);
        assert!(!s.panel.visible);
    }

    #[test]
    fn immediate_back_overlaps_and_still_lands_home() {
        let mut s = scene(9);
        s.pointer_moved(Some(3));
        s.click();
        s.back();
        assert_eq!(s.tweens.len(), 6);
        settle(&mut s);

        assert_eq!(s.interaction, InteractionState::default());
        assert_eq!(s.rig.camera_position, Vector3::new(8.0, -15.0, 0.0));
        assert!(close(s.rig.skybox_rotation, degrees(HOME_SKYBOX_DEG)));
        assert_eq!(s.tooltips.visible_count(), 9);
        // the focus reveal arrives after back and is dropped
        assert!(!s.panel.visible);
    }
}

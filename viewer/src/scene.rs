use std::time::Duration;

use cgmath::Vector3;
use log::debug;

use crate::camera::{Camera, OrbitController};
use crate::dataset::Dataset;
use crate::instances::{InstanceRegistry, PartBase};
use crate::interaction::{degrees, CursorStyle, InteractionState, HOME_SKYBOX_DEG};
use crate::panel::InfoPanel;
use crate::tooltip::{Tooltip, TooltipOverlay};
use crate::tween::{CameraRig, TweenSet};

/// Peak per-tick displacement of the idle bob.
pub const BOB_AMPLITUDE: f32 = 0.003;
/// Roll added to the focus instance every tick.
pub const FOCUS_SPIN: f32 = 0.01;

/// Everything the frame loop and the input handlers mutate.
pub struct SceneState {
    pub dataset: Dataset,
    pub registry: InstanceRegistry,
    pub tooltips: TooltipOverlay,
    pub panel: InfoPanel,
    pub interaction: InteractionState,
    pub tweens: TweenSet,
    pub rig: CameraRig,
    pub controls: OrbitController,
    pub cursor: CursorStyle,
    /// Camera position the "back" transition returns to
    pub home_position: Vector3<f32>,
    tick_interval: Duration,
}

impl SceneState {
    /// `viewport` is the logical window size the tooltips are laid out in.
    pub fn new(
        dataset: Dataset,
        parts: Vec<PartBase>,
        camera: &Camera,
        viewport: [f32; 2],
        controls: OrbitController,
        tick_interval: Duration,
    ) -> Self {
        let registry = InstanceRegistry::build(parts, dataset.count());
        let tooltips = build_tooltips(&dataset, &registry, camera, viewport);
        let home_position = Vector3::new(camera.eye.x, camera.eye.y, camera.eye.z);
        let rig = CameraRig {
            camera_position: home_position,
            camera_target: Vector3::new(camera.target.x, camera.target.y, camera.target.z),
            skybox_rotation: degrees(HOME_SKYBOX_DEG),
        };
        debug!(
            "Scene built with {} drones and {} parts",
            registry.drone_count(),
            registry.part_count()
        );

        Self {
            dataset,
            registry,
            tooltips,
            panel: InfoPanel::default(),
            interaction: InteractionState::default(),
            tweens: TweenSet::new(),
            rig,
            controls,
            cursor: CursorStyle::Default,
            home_position,
            tick_interval,
        }
    }

    /// One logic tick at simulation time `time` (seconds).
    pub fn tick(&mut self, time: f64) {
        if self.interaction.focused.is_none() {
            let phase = time * std::f64::consts::PI;
            self.registry.bob(
                phase.cos() as f32 * BOB_AMPLITUDE,
                phase.sin() as f32 * BOB_AMPLITUDE,
            );
        } else {
            self.registry.spin_focus(FOCUS_SPIN);
        }

        for completion in self.tweens.advance(self.tick_interval, &mut self.rig) {
            self.complete(completion);
        }

        self.controls.update(&mut self.rig);
    }
}

/// One label per drone, laid out once from the first part's transforms.
fn build_tooltips(
    dataset: &Dataset,
    registry: &InstanceRegistry,
    camera: &Camera,
    viewport: [f32; 2],
) -> TooltipOverlay {
    let mut overlay = TooltipOverlay::default();
    if registry.part_count() == 0 {
        return overlay;
    }
    for (index, record) in dataset.drones.iter().enumerate() {
        if let Some(transform) = registry.transform(0, index) {
            let projected = camera.project(transform.position, viewport[0], viewport[1]);
            overlay.push(Tooltip::new(index, record, projected));
        }
    }
    overlay
}

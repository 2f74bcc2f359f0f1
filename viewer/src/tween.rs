use std::time::Duration;

use cgmath::Vector3;

/// The camera/skybox properties a tween can drive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraRig {
    pub camera_position: Vector3<f32>,
    pub camera_target: Vector3<f32>,
    /// Euler rotation (XYZ, radians) of the sky sphere
    pub skybox_rotation: Vector3<f32>,
}

impl CameraRig {
    fn get(&self, target: TweenTarget) -> Vector3<f32> {
        match target {
            TweenTarget::CameraPosition => self.camera_position,
            TweenTarget::CameraTarget => self.camera_target,
            TweenTarget::SkyboxRotation => self.skybox_rotation,
        }
    }

    fn set(&mut self, target: TweenTarget, value: Vector3<f32>) {
        match target {
            TweenTarget::CameraPosition => self.camera_position = value,
            TweenTarget::CameraTarget => self.camera_target = value,
            TweenTarget::SkyboxRotation => self.skybox_rotation = value,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TweenTarget {
    CameraPosition,
    CameraTarget,
    SkyboxRotation,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Easing {
    Linear,
    QuadraticInOut,
}

impl Easing {
    pub fn apply(self, k: f32) -> f32 {
        match self {
            Easing::Linear => k,
            Easing::QuadraticInOut => {
                let k = k * 2.0;
                if k < 1.0 {
                    0.5 * k * k
                } else {
                    let k = k - 1.0;
                    -0.5 * (k * (k - 2.0) - 1.0)
                }
            }
        }
    }
}

/// What should happen once a tween reaches its destination.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Completion {
    RevealInfoPanel,
    RevealTooltips,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TweenStatus {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TweenId(u64);

#[derive(Debug, Clone)]
pub struct Tween {
    target: TweenTarget,
    from: Vector3<f32>,
    to: Vector3<f32>,
    duration: Duration,
    delay: Duration,
    elapsed: Duration,
    easing: Easing,
    status: TweenStatus,
    on_complete: Option<Completion>,
}

impl Tween {
    pub fn new(target: TweenTarget, to: Vector3<f32>, duration: Duration) -> Self {
        Self {
            target,
            from: to,
            to,
            duration,
            delay: Duration::ZERO,
            elapsed: Duration::ZERO,
            easing: Easing::QuadraticInOut,
            status: TweenStatus::Pending,
            on_complete: None,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn on_complete(mut self, completion: Completion) -> Self {
        self.on_complete = Some(completion);
        self
    }

    #[cfg(test)]
    pub fn status(&self) -> TweenStatus {
        self.status
    }

    fn start(&mut self, rig: &CameraRig) {
        self.from = rig.get(self.target);
        self.elapsed = Duration::ZERO;
        self.status = TweenStatus::Running;
    }

    /// Returns true when this step took the tween to its destination.
    fn step(&mut self, dt: Duration, rig: &mut CameraRig) -> bool {
        self.elapsed += dt;
        if self.elapsed < self.delay {
            return false;
        }
        let active = self.elapsed - self.delay;
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (active.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
        };
        if progress >= 1.0 {
            rig.set(self.target, self.to);
            self.status = TweenStatus::Done;
            return true;
        }
        let k = self.easing.apply(progress);
        rig.set(self.target, self.from + (self.to - self.from) * k);
        false
    }
}

/// In-flight tweens. Tweens are moved in, so the same task can't be added twice, and are
/// compacted out after the step in which they finish.
#[derive(Debug, Default)]
pub struct TweenSet {
    next_id: u64,
    tweens: Vec<(TweenId, Tween)>,
}

impl TweenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tween: Tween) -> TweenId {
        let id = TweenId(self.next_id);
        self.next_id += 1;
        self.tweens.push((id, tween));
        id
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, id: TweenId) -> bool {
        self.tweens.iter().any(|(i, _)| *i == id)
    }

    #[cfg(test)]
    pub fn get(&self, id: TweenId) -> Option<&Tween> {
        self.tweens.iter().find(|(i, _)| *i == id).map(|(_, t)| t)
    }

    /// Starts pending tweens and steps running ones by `dt`. Returns the completion actions
    /// of tweens that finished, in insertion order.
    pub fn advance(&mut self, dt: Duration, rig: &mut CameraRig) -> Vec<Completion> {
        let mut completions = vec![];
        for (_, tween) in self.tweens.iter_mut() {
            match tween.status {
                TweenStatus::Pending => tween.start(rig),
                TweenStatus::Running => {
                    if tween.step(dt, rig) {
                        completions.extend(tween.on_complete);
                    }
                }
                TweenStatus::Done => {}
            }
        }
        self.tweens.retain(|(_, t)| t.status != TweenStatus::Done);
        completions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: Duration = Duration::from_millis(10);

    fn rig() -> CameraRig {
        CameraRig {
            camera_position: Vector3::new(0.0, 0.0, 0.0),
            camera_target: Vector3::new(0.0, 0.0, 0.0),
            skybox_rotation: Vector3::new(0.0, 0.0, 0.0),
        }
    }

    fn run_until_empty(set: &mut TweenSet, rig: &mut CameraRig) -> Vec<Completion> {
        let mut all = vec![];
        for _ in 0..10_000 {
            if set.is_empty() {
                break;
            }
            all.extend(set.advance(DT, rig));
        }
        all
    }

    #[test]
    fn easing_endpoints() {
        for e in [Easing::Linear, Easing::QuadraticInOut] {
            assert!((e.apply(0.0)).abs() < 1e-6);
            assert!((e.apply(1.0) - 1.0).abs() < 1e-6);
        }
        assert!((Easing::QuadraticInOut.apply(0.5) - 0.5).abs() < 1e-6);
        assert!(Easing::QuadraticInOut.apply(0.25) < 0.25);
    }

    #[test]
    fn first_advance_only_starts() {
        let mut set = TweenSet::new();
        let mut r = rig();
        let id = set.add(Tween::new(
            TweenTarget::CameraPosition,
            Vector3::new(10.0, 0.0, 0.0),
            Duration::from_millis(100),
        ));
        assert_eq!(set.get(id).unwrap().status(), TweenStatus::Pending);
        set.advance(DT, &mut r);
        assert_eq!(set.get(id).unwrap().status(), TweenStatus::Running);
        assert_eq!(r.camera_position, Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn reaches_destination_and_removes_itself_once() {
        let mut set = TweenSet::new();
        let mut r = rig();
        let a = set.add(
            Tween::new(TweenTarget::CameraTarget, Vector3::new(1.0, 2.0, 3.0), Duration::from_millis(50))
                .on_complete(Completion::RevealInfoPanel),
        );
        let b = set.add(Tween::new(
            TweenTarget::SkyboxRotation,
            Vector3::new(0.0, 0.0, 1.0),
            Duration::from_millis(200),
        ));
        assert_eq!(set.len(), 2);

        let mut sizes = vec![];
        let mut completions = vec![];
        while !set.is_empty() {
            completions.extend(set.advance(DT, &mut r));
            sizes.push(set.len());
        }
        assert!(!set.contains(a));
        assert!(!set.contains(b));
        assert_eq!(completions, vec![Completion::RevealInfoPanel]);
        // never shrinks by more than one per completion and never grows
        for w in sizes.windows(2) {
            assert!(w[0] >= w[1] && w[0] - w[1] <= 1);
        }
        assert_eq!(r.camera_target, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(r.skybox_rotation, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn delay_holds_the_start_value() {
        let mut set = TweenSet::new();
        let mut r = rig();
        set.add(
            Tween::new(TweenTarget::CameraPosition, Vector3::new(5.0, 0.0, 0.0), Duration::from_millis(100))
                .delay(Duration::from_millis(50)),
        );
        set.advance(DT, &mut r); // start
        for _ in 0..4 {
            set.advance(DT, &mut r);
            assert_eq!(r.camera_position.x, 0.0);
        }
        set.advance(DT, &mut r);
        set.advance(DT, &mut r);
        assert!(r.camera_position.x > 0.0);
        run_until_empty(&mut set, &mut r);
        assert_eq!(r.camera_position.x, 5.0);
    }

    #[test]
    fn start_value_is_captured_when_started() {
        let mut set = TweenSet::new();
        let mut r = rig();
        set.add(
            Tween::new(TweenTarget::CameraPosition, Vector3::new(4.0, 0.0, 0.0), Duration::from_millis(40))
                .easing(Easing::Linear),
        );
        r.camera_position = Vector3::new(2.0, 0.0, 0.0);
        set.advance(DT, &mut r);
        set.advance(DT, &mut r);
        assert!((r.camera_position.x - 2.5).abs() < 1e-5);
    }

    #[test]
    fn ids_are_unique() {
        let mut set = TweenSet::new();
        let t = Tween::new(TweenTarget::CameraTarget, Vector3::new(0.0, 0.0, 0.0), DT);
        let a = set.add(t.clone());
        let b = set.add(t);
        assert_ne!(a, b);
        assert_eq!(set.len(), 2);
    }
}

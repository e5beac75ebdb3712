//! Procedural walk-in-place pose
//!
//! The pose is a pure function of elapsed time: nothing is integrated between
//! frames, so any instant can be sampled directly.

use std::time::Instant;

/// Translation offset for one limb
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LimbOffset {
    /// Forward/backward offset along the part's depth axis
    pub swing: f32,
    /// Upward offset, never negative
    pub lift: f32,
}

/// Per-frame joint parameters for the figure
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseParameters {
    /// Head nod about the lateral axis, in radians
    pub head_angle: f32,
    pub left_leg: LimbOffset,
    pub right_leg: LimbOffset,
    pub left_arm: LimbOffset,
    pub right_arm: LimbOffset,
}

impl PoseParameters {
    /// Standing straight
    pub const NEUTRAL: Self = Self {
        head_angle: 0.0,
        left_leg: LimbOffset { swing: 0.0, lift: 0.0 },
        right_leg: LimbOffset { swing: 0.0, lift: 0.0 },
        left_arm: LimbOffset { swing: 0.0, lift: 0.0 },
        right_arm: LimbOffset { swing: 0.0, lift: 0.0 },
    };
}

/// Sample the pose at `elapsed_seconds`.
///
/// Legs move at twice the angular frequency of the arms, and left and right
/// sides are in opposite phase. Lifts are clamped at zero so feet and hands
/// only rise on the forward part of the swing.
pub fn pose(elapsed_seconds: f64, animate: bool) -> PoseParameters {
    if !animate {
        return PoseParameters::NEUTRAL;
    }

    let t = elapsed_seconds;
    let (leg_sin, leg_cos) = (2.0 * t).sin_cos();
    let (arm_sin, arm_cos) = t.sin_cos();

    PoseParameters {
        head_angle: (leg_sin * 0.8) as f32,
        left_leg: LimbOffset {
            swing: (leg_sin * 0.5) as f32,
            lift: (-leg_cos * 0.5).max(0.0) as f32,
        },
        right_leg: LimbOffset {
            swing: (-leg_sin * 0.5) as f32,
            lift: (leg_cos * 0.5).max(0.0) as f32,
        },
        left_arm: LimbOffset {
            swing: -arm_sin as f32,
            lift: arm_cos.max(0.0) as f32,
        },
        right_arm: LimbOffset {
            swing: arm_sin as f32,
            lift: (-arm_cos).max(0.0) as f32,
        },
    }
}

/// Wall-clock origin for [`pose`]
#[derive(Debug, Clone, Copy)]
pub struct PoseClock {
    origin: Instant,
}

impl PoseClock {
    pub fn new(origin: Instant) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn elapsed_seconds(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.origin).as_secs_f64()
    }

    pub fn sample(&self, now: Instant, animate: bool) -> PoseParameters {
        pose(self.elapsed_seconds(now), animate)
    }
}

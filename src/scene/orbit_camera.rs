//! Orbit camera
//!
//! Orbits a fixed target on a sphere described by yaw, pitch and radius.
//! - Left mouse drag: orbit (relative to the previous frame's cursor)
//! - W / S: move closer / further away

use glam::{Mat4, Vec2, Vec3};

use super::{InputState, Projection};

/// Pitch stays strictly inside the poles by this margin
pub const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.1;

/// Camera orbiting a target point
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Point the camera looks at
    pub target: Vec3,
    /// World-up reference for building the view basis
    pub up_hint: Vec3,
    yaw: f32,
    pitch: f32,
    radius: f32,
    /// Minimum radius
    pub min_radius: f32,
    /// Maximum radius
    pub max_radius: f32,
    /// Orbit sensitivity (radians per pixel)
    pub sensitivity: f32,
    /// Zoom speed in world units per second
    pub zoom_speed: f32,
    projection: Projection,
    drag_anchor: Option<Vec2>,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::new(0.0, 3.0, 0.0),
            up_hint: Vec3::new(0.0, 10.0, 0.0),
            yaw: std::f32::consts::PI + 0.5,
            pitch: 0.2,
            radius: 20.0,
            min_radius: 1.0,
            max_radius: 90.0,
            sensitivity: 0.01,
            // 0.1 units per frame at 120 Hz
            zoom_speed: 12.0,
            projection: Projection::default(),
            drag_anchor: None,
        }
    }
}

impl OrbitCamera {
    pub fn new(width: u32, height: u32) -> Self {
        let mut camera = Self::default();
        camera.set_viewport(width, height);
        camera
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.projection.set_viewport(width, height);
    }

    /// Rotate by the given yaw and pitch deltas, keeping pitch clamped
    pub fn rotate(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw += d_yaw;
        self.pitch = (self.pitch + d_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Apply one frame of input.
    ///
    /// The frame the button goes down only records the anchor, so clicking never
    /// makes the view jump. Zoom is scaled by `dt`.
    pub fn apply_input(&mut self, input: &InputState, dt: f32) {
        if input.orbit_held {
            if let Some(anchor) = self.drag_anchor {
                let delta = input.cursor - anchor;
                self.rotate(-delta.x * self.sensitivity, delta.y * self.sensitivity);
            }
            self.drag_anchor = Some(input.cursor);
        } else {
            self.drag_anchor = None;
        }

        let direction = input.zoom_out as i32 - input.zoom_in as i32;
        if direction != 0 {
            self.radius = (self.radius + direction as f32 * self.zoom_speed * dt)
                .clamp(self.min_radius, self.max_radius);
        }
    }

    /// Camera position from the spherical coordinates around `target`
    pub fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target + self.radius * Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    /// Combined `projection * view` matrix.
    ///
    /// A forward direction parallel to `up_hint` has no defined right vector; the
    /// basis then falls back to world X so the result stays finite.
    pub fn view_projection(&self) -> Mat4 {
        let position = self.position();
        let forward = (self.target - position).try_normalize().unwrap_or(Vec3::NEG_Z);
        let right = self
            .up_hint
            .cross(forward)
            .try_normalize()
            .unwrap_or(Vec3::X);
        let up = forward.cross(right);

        let view = Mat4::look_to_rh(position, forward, up);
        self.projection.matrix() * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held_at(x: f32, y: f32) -> InputState {
        InputState {
            cursor: Vec2::new(x, y),
            orbit_held: true,
            ..InputState::default()
        }
    }

    /// Reference values are the default orbit around (0, 3, 0) with a 45 degree,
    /// 0.1..100 perspective, built with wgpu's 0..1 clip depth (`perspective_rh`).
    /// An OpenGL -1..1 projection of the same orbit differs by up to ~0.08.
    #[test]
    fn initial_view_projection_matches_reference() {
        let camera = OrbitCamera::new(800, 800);
        let expected = Mat4::from_cols_array(&[
            -2.118672, 0.229947, 0.470339, 0.469869, //
            0.000000, 2.366090, -0.198868, -0.198669, //
            1.157436, 0.420915, 0.860950, 0.860089, //
            0.000000, -7.098270, 20.516525, 20.596008,
        ]);

        let actual = camera.view_projection();
        for (a, e) in actual.to_cols_array().iter().zip(expected.to_cols_array()) {
            assert!((a - e).abs() < 1e-4, "{actual:?} != {expected:?}");
        }

        let position = camera.position();
        assert!((position - Vec3::new(-9.397379, 6.973387, -17.201787)).length() < 1e-4);
    }

    #[test]
    fn pitch_stays_clamped_after_huge_drags() {
        let mut camera = OrbitCamera::default();
        camera.apply_input(&held_at(0.0, 0.0), 0.0);

        for step in 1..50 {
            let sign = if step % 2 == 0 { 1.0 } else { -1.0 };
            camera.apply_input(&held_at(0.0, sign * 1.0e6 * step as f32), 0.0);
            assert!(camera.pitch() >= -PITCH_LIMIT && camera.pitch() <= PITCH_LIMIT);
        }
        assert!(camera.view_projection().is_finite());
    }

    #[test]
    fn press_frame_does_not_move() {
        let mut camera = OrbitCamera::default();
        let (yaw, pitch) = (camera.yaw(), camera.pitch());

        camera.apply_input(&held_at(400.0, 300.0), 1.0 / 120.0);
        assert_eq!((camera.yaw(), camera.pitch()), (yaw, pitch));
        assert!(camera.is_dragging());
    }

    #[test]
    fn drag_is_incremental() {
        let mut camera = OrbitCamera::default();
        let (yaw, pitch) = (camera.yaw(), camera.pitch());

        camera.apply_input(&held_at(100.0, 100.0), 0.0);
        camera.apply_input(&held_at(110.0, 105.0), 0.0);
        camera.apply_input(&held_at(120.0, 110.0), 0.0);

        assert!((camera.yaw() - (yaw - 20.0 * 0.01)).abs() < 1e-5);
        assert!((camera.pitch() - (pitch + 10.0 * 0.01)).abs() < 1e-5);
    }

    #[test]
    fn release_clears_drag_state() {
        let mut camera = OrbitCamera::default();
        camera.apply_input(&held_at(100.0, 100.0), 0.0);
        camera.apply_input(&InputState::default(), 0.0);
        assert!(!camera.is_dragging());

        // Pressing again somewhere else must not jump
        let yaw = camera.yaw();
        camera.apply_input(&held_at(500.0, 100.0), 0.0);
        assert_eq!(camera.yaw(), yaw);
    }

    #[test]
    fn zoom_scales_with_frame_time() {
        let zoom_in = InputState {
            zoom_in: true,
            ..InputState::default()
        };

        let mut fast = OrbitCamera::default();
        for _ in 0..120 {
            fast.apply_input(&zoom_in, 1.0 / 120.0);
        }
        let mut slow = OrbitCamera::default();
        for _ in 0..30 {
            slow.apply_input(&zoom_in, 1.0 / 30.0);
        }

        assert!((fast.radius() - 8.0).abs() < 1e-3);
        assert!((fast.radius() - slow.radius()).abs() < 1e-3);
    }

    #[test]
    fn radius_is_bounded() {
        let mut camera = OrbitCamera::default();
        let zoom_in = InputState {
            zoom_in: true,
            ..InputState::default()
        };
        camera.apply_input(&zoom_in, 100.0);
        assert_eq!(camera.radius(), camera.min_radius);
    }

    #[test]
    fn degenerate_up_hint_stays_finite() {
        let mut camera = OrbitCamera::default();
        camera.up_hint = Vec3::ZERO;
        assert!(camera.view_projection().is_finite());

        // Looking straight along the up hint
        camera.up_hint = camera.target - camera.position();
        assert!(camera.view_projection().is_finite());
    }
}

//! Frame scheduling: per-frame state updates and software frame pacing

use std::time::{Duration, Instant};

use glam::Mat4;
use log::info;

use crate::scene::{InputState, OrbitCamera, PoseClock, PoseParameters};

/// Caps the frame rate by sleeping out the remainder of each frame
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    target: Duration,
}

impl FramePacer {
    pub fn from_fps(fps: u32) -> Self {
        Self {
            target: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
        }
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    /// Time left in the frame after `elapsed`; zero for overlong frames
    pub fn sleep_duration(&self, elapsed: Duration) -> Duration {
        self.target.saturating_sub(elapsed)
    }

    /// Block until the frame that began at `frame_start` has used its budget
    pub fn pace(&self, frame_start: Instant) {
        let remaining = self.sleep_duration(frame_start.elapsed());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        log::trace!("Frame took {:.2} ms", frame_start.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Rising-edge detector for a held key, sampled once per frame
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyToggle {
    was_down: bool,
}

impl KeyToggle {
    /// True only on the first frame the key is seen down
    pub fn rising_edge(&mut self, down: bool) -> bool {
        let edge = down && !self.was_down;
        self.was_down = down;
        edge
    }
}

/// Values produced by one frame update, consumed by the renderer
#[derive(Debug, Clone, Copy)]
pub struct FrameUpdate {
    pub view_projection: Mat4,
    pub pose: PoseParameters,
}

/// Everything the frame loop mutates between frames
#[derive(Debug)]
pub struct AppState {
    pub camera: OrbitCamera,
    animate: bool,
    animation_key: KeyToggle,
    clock: PoseClock,
    last_frame: Instant,
}

impl AppState {
    pub fn new(width: u32, height: u32, start: Instant) -> Self {
        Self {
            camera: OrbitCamera::new(width, height),
            animate: true,
            animation_key: KeyToggle::default(),
            clock: PoseClock::new(start),
            last_frame: start,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animate
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.camera.set_viewport(width, height);
    }

    /// Advance to `now`: camera input, animation toggle, then the pose.
    pub fn advance(&mut self, input: &InputState, now: Instant) -> FrameUpdate {
        let dt = now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.camera.apply_input(input, dt);

        if self.animation_key.rising_edge(input.toggle_animation) {
            self.animate = !self.animate;
            info!("Animation {}", if self.animate { "resumed" } else { "paused" });
        }

        let pose = self.clock.sample(now, self.animate);
        log::trace!("Frame dt={dt:.4}s animate={}", self.animate);

        FrameUpdate {
            view_projection: self.camera.view_projection(),
            pose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::pose;

    #[test]
    fn sleep_never_goes_negative() {
        let pacer = FramePacer::from_fps(120);
        assert_eq!(pacer.sleep_duration(Duration::from_millis(50)), Duration::ZERO);
        assert_eq!(pacer.sleep_duration(pacer.target()), Duration::ZERO);

        let remaining = pacer.sleep_duration(Duration::from_millis(3));
        assert!(remaining > Duration::from_millis(5) && remaining < Duration::from_millis(6));
    }

    #[test]
    fn pacing_holds_the_frame_budget() {
        let pacer = FramePacer::from_fps(120);
        let start = Instant::now();
        pacer.pace(start);
        assert!(start.elapsed() >= pacer.target());
    }

    #[test]
    fn toggle_fires_once_per_press() {
        let mut toggle = KeyToggle::default();
        let fired: Vec<_> = [false, true, true, true, false, true]
            .into_iter()
            .map(|down| toggle.rising_edge(down))
            .collect();
        assert_eq!(fired, [false, true, false, false, false, true]);
    }

    #[test]
    fn space_pauses_and_resumes() {
        let start = Instant::now();
        let mut state = AppState::new(800, 800, start);
        assert!(state.is_animating());

        let pressed = InputState {
            toggle_animation: true,
            ..InputState::default()
        };
        let frame = |i: u64| start + Duration::from_millis(8 * i);

        let update = state.advance(&pressed, frame(1));
        assert!(!state.is_animating());
        assert_eq!(update.pose, PoseParameters::NEUTRAL);

        // Holding the key does not toggle again
        state.advance(&pressed, frame(2));
        assert!(!state.is_animating());

        state.advance(&InputState::default(), frame(3));
        let update = state.advance(&pressed, frame(4));
        assert!(state.is_animating());
        assert_eq!(update.pose, pose(0.032, true));
    }

    #[test]
    fn first_frame_matches_initial_camera() {
        let start = Instant::now();
        let mut state = AppState::new(800, 800, start);
        let update = state.advance(&InputState::default(), start);
        assert_eq!(update.view_projection, OrbitCamera::new(800, 800).view_projection());
        assert_eq!(update.pose, pose(0.0, true));
    }

    #[test]
    fn zoom_uses_frame_time() {
        let start = Instant::now();
        let mut state = AppState::new(800, 800, start);
        let zoom_out = InputState {
            zoom_out: true,
            ..InputState::default()
        };
        state.advance(&zoom_out, start + Duration::from_millis(500));
        assert!((state.camera.radius() - 26.0).abs() < 1e-3);
    }
}

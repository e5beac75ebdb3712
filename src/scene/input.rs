//! Pointer and keyboard state sampled once per frame

use glam::Vec2;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Raw input state consumed by the orbit camera and the frame scheduler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    /// Cursor position in physical pixels
    pub cursor: Vec2,
    /// Left mouse button held
    pub orbit_held: bool,
    /// W held
    pub zoom_in: bool,
    /// S held
    pub zoom_out: bool,
    /// Space held
    pub toggle_animation: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a window event into the state. Returns true if the event was input.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.apply_key(code, event.state == ElementState::Pressed);
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.apply_mouse_button(*button, *state == ElementState::Pressed);
                true
            }
            WindowEvent::Focused(false) => {
                self.release_all();
                true
            }
            _ => false,
        }
    }

    pub fn apply_key(&mut self, code: KeyCode, pressed: bool) {
        match code {
            KeyCode::KeyW => self.zoom_in = pressed,
            KeyCode::KeyS => self.zoom_out = pressed,
            KeyCode::Space => self.toggle_animation = pressed,
            _ => {}
        }
    }

    pub fn apply_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if button == MouseButton::Left {
            self.orbit_held = pressed;
        }
    }

    /// Drop every held button, e.g. when the window loses focus
    pub fn release_all(&mut self) {
        self.orbit_held = false;
        self.zoom_in = false;
        self.zoom_out = false;
        self.toggle_animation = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_actions() {
        let mut input = InputState::new();
        input.apply_key(KeyCode::KeyW, true);
        input.apply_key(KeyCode::Space, true);
        input.apply_key(KeyCode::KeyQ, true);
        assert!(input.zoom_in);
        assert!(input.toggle_animation);
        assert!(!input.zoom_out);

        input.apply_key(KeyCode::KeyW, false);
        assert!(!input.zoom_in);
    }

    #[test]
    fn only_left_button_orbits() {
        let mut input = InputState::new();
        input.apply_mouse_button(MouseButton::Right, true);
        assert!(!input.orbit_held);
        input.apply_mouse_button(MouseButton::Left, true);
        assert!(input.orbit_held);
    }

    fn device() -> winit::event::DeviceId {
        // SAFETY: only compared as an opaque id, never passed to the platform
        unsafe { winit::event::DeviceId::dummy() }
    }

    fn cursor_moved(x: f64, y: f64) -> WindowEvent {
        WindowEvent::CursorMoved {
            device_id: device(),
            position: winit::dpi::PhysicalPosition::new(x, y),
        }
    }

    fn mouse(button: MouseButton, state: ElementState) -> WindowEvent {
        WindowEvent::MouseInput {
            device_id: device(),
            state,
            button,
        }
    }

    #[test]
    fn pointer_events_drive_a_drag() {
        let mut input = InputState::new();
        let mut camera = crate::scene::OrbitCamera::default();
        let start_yaw = camera.yaw();

        assert!(input.handle_window_event(&cursor_moved(100.0, 50.0)));
        assert_eq!(input.cursor, Vec2::new(100.0, 50.0));
        assert!(input.handle_window_event(&mouse(MouseButton::Left, ElementState::Pressed)));
        assert!(input.orbit_held);
        camera.apply_input(&input, 0.0);

        input.handle_window_event(&cursor_moved(120.0, 50.0));
        camera.apply_input(&input, 0.0);
        assert!((camera.yaw() - (start_yaw - 20.0 * camera.sensitivity)).abs() < 1e-5);

        input.handle_window_event(&mouse(MouseButton::Right, ElementState::Released));
        assert!(input.orbit_held);
        input.handle_window_event(&mouse(MouseButton::Left, ElementState::Released));
        assert!(!input.orbit_held);

        // Moving without the button held leaves the orbit alone
        let yaw = camera.yaw();
        input.handle_window_event(&cursor_moved(400.0, 300.0));
        camera.apply_input(&input, 0.0);
        assert_eq!(camera.yaw(), yaw);
    }

    #[test]
    fn focus_loss_releases_everything() {
        let mut input = InputState::new();
        input.apply_key(KeyCode::KeyS, true);
        input.apply_mouse_button(MouseButton::Left, true);
        input.cursor = Vec2::new(3.0, 4.0);

        assert!(input.handle_window_event(&WindowEvent::Focused(false)));
        assert_eq!(
            input,
            InputState {
                cursor: Vec2::new(3.0, 4.0),
                ..InputState::default()
            }
        );
    }
}

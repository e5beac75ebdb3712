//! Figure Viewer - a real-time viewer for a procedurally animated six-part figure
//!
//! The figure is built from six OBJ meshes and two textures. Each frame the
//! pose is sampled from wall-clock time, the parts are placed around a fixed
//! torso, and the result is drawn with wgpu through an orbit camera.
//!
//! # Controls
//! - Left mouse drag: orbit
//! - W / S: zoom in / out
//! - Space: pause / resume the animation

pub mod app;
pub mod backend;
pub mod error;
pub mod frame;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod window;

use std::path::{Path, PathBuf};

pub use app::run;
pub use error::{ViewerError, ViewerResult};
pub use window::ViewerWindow;

// Re-export wgpu backend for direct access
pub use backend::wgpu_backend::WgpuBackend;

/// Configuration for the viewer
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Frame rate cap enforced by sleeping
    pub target_fps: u32,
    /// Enable vsync in addition to the software cap
    pub vsync: bool,
    /// Background color
    pub clear_color: [f32; 4],
    /// Directory holding `obj/`, `texture/` and `shaders/`
    pub asset_root: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Figure Viewer".to_string(),
            width: 800,
            height: 800,
            target_fps: 120,
            vsync: false,
            clear_color: [1.0, 1.0, 1.0, 1.0],
            asset_root: PathBuf::from("assets"),
        }
    }
}

impl ViewerConfig {
    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    pub fn vertex_shader_path(&self) -> PathBuf {
        self.asset_root.join("shaders").join("vertex.wgsl")
    }

    pub fn fragment_shader_path(&self) -> PathBuf {
        self.asset_root.join("shaders").join("fragment.wgsl")
    }
}

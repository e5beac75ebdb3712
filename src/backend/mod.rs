//! Backend abstraction layer
//!
//! Provides the handle-based [`GraphicsBackend`] trait, the wgpu implementation
//! used by the viewer, and a recording backend for headless tests.

pub mod dummy;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use traits::*;
pub use types::*;

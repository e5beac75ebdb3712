//! Resource management
//!
//! Meshes, textures and diffuse materials, each with a CPU-side form loaded
//! from disk and a GPU-side form owned by the viewer.

mod material;
mod mesh;
mod texture;

pub use material::*;
pub use mesh::*;
pub use texture::*;

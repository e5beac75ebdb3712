//! Scene state: camera, input, pose and figure assembly

mod camera;
mod figure;
mod input;
mod orbit_camera;
mod pose;

pub use camera::*;
pub use figure::*;
pub use input::*;
pub use orbit_camera::*;
pub use pose::*;

//! Top-level error type for viewer startup

use thiserror::Error;

use crate::backend::BackendError;
use crate::resources::{MeshError, TextureError};

/// Fatal startup errors. Shader problems are not here; they never stop the viewer.
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error("graphics backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

pub type ViewerResult<T> = Result<T, ViewerError>;

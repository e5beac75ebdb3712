//! Viewer startup, frame loop and shutdown

use std::time::Instant;

use log::{error, info, warn};
use winit::{
    event::Event,
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
};

use crate::backend::wgpu_backend::WgpuBackend;
use crate::backend::{BackendError, BackendResult, GraphicsBackend};
use crate::error::ViewerResult;
use crate::frame::{AppState, FramePacer, FrameUpdate};
use crate::renderer::FigureRenderer;
use crate::resources::{GpuMesh, GpuTexture, MeshData, TextureData};
use crate::scene::{FigureAssets, InputState, SceneAssembler};
use crate::shader::ShaderProgram;
use crate::window::ViewerWindow;
use crate::ViewerConfig;

/// GPU-resident figure
pub type GpuFigure = FigureAssets<GpuMesh, GpuTexture>;

/// Load everything, open the window and run until it is closed.
///
/// Assets are loaded before the window is created, so a missing or corrupt
/// file ends the program without ever showing a window.
pub fn run(config: ViewerConfig) -> ViewerResult<()> {
    let assets = FigureAssets::load(config.asset_root())?;

    let event_loop = EventLoop::new()?;
    let mut window = ViewerWindow::new(&event_loop, &config.title, config.width, config.height)?;
    let mut backend = WgpuBackend::new(window.window_arc(), config.vsync)?;

    let program = ShaderProgram::load(&config.vertex_shader_path(), &config.fragment_shader_path());
    let (width, height) = backend.surface_size();
    let draw_capacity = assets.meshes().iter().map(|mesh| mesh.materials.len()).sum();
    let mut renderer = FigureRenderer::new(
        &mut backend,
        &program,
        width,
        height,
        draw_capacity,
        config.clear_color,
    )?;
    let mut figure = upload_figure(&mut backend, &renderer, assets)?;

    let pacer = FramePacer::from_fps(config.target_fps);
    let mut input = InputState::new();
    let mut state = AppState::new(width, height, Instant::now());
    info!("Viewer started, frame rate capped at {} fps", config.target_fps);

    event_loop.run(move |event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => {
                window.handle_event(&event);
                input.handle_window_event(&event);
                if window.should_close() {
                    elwt.exit();
                }
            }
            Event::AboutToWait => {
                if elwt.exiting() {
                    return;
                }
                let frame_start = Instant::now();

                if window.take_resized() && !window.is_minimized() {
                    let (width, height) = window.dimensions();
                    backend.resize(width, height);
                    let (width, height) = backend.surface_size();
                    if let Err(e) = renderer.resize(&mut backend, width, height) {
                        error!("Failed to resize depth buffer: {e}");
                    }
                    state.set_viewport(width, height);
                }

                let update = state.advance(&input, frame_start);

                if !window.is_minimized() {
                    match render_figure(&mut backend, &mut renderer, &figure, &update) {
                        Ok(()) => {}
                        Err(BackendError::SurfaceLost) => {
                            warn!("Surface lost, reconfiguring");
                            let (width, height) = window.dimensions();
                            backend.resize(width, height);
                        }
                        Err(BackendError::OutOfMemory) => {
                            error!("GPU out of memory");
                            elwt.exit();
                        }
                        Err(e) => error!("Frame failed: {e}"),
                    }
                }

                pacer.pace(frame_start);
            }
            Event::LoopExiting => {
                release_figure(&mut backend, &mut figure);
                renderer.release(&mut backend);
                info!("Viewer shut down");
            }
            _ => {}
        }
    })?;

    Ok(())
}

/// Upload meshes and textures, creating textures against the renderer's layout
pub fn upload_figure<B: GraphicsBackend>(
    backend: &mut B,
    renderer: &FigureRenderer,
    assets: FigureAssets<MeshData, TextureData>,
) -> BackendResult<GpuFigure> {
    let layout = renderer.texture_layout();
    assets.try_map(
        backend,
        |backend, _, mesh| GpuMesh::upload(backend, &mesh),
        |backend, _, texture| GpuTexture::create(backend, &texture, layout),
    )
}

/// Draw one frame of the figure and present it
pub fn render_figure<B: GraphicsBackend>(
    backend: &mut B,
    renderer: &mut FigureRenderer,
    figure: &GpuFigure,
    update: &FrameUpdate,
) -> BackendResult<()> {
    let frame = backend.begin_frame()?;
    let placements = SceneAssembler::new(figure).assemble(&update.pose);
    renderer.render_frame(backend, &frame, update.view_projection, &placements)?;
    backend.end_frame()
}

/// Free every mesh and texture; safe to call more than once
pub fn release_figure<B: GraphicsBackend>(backend: &mut B, figure: &mut GpuFigure) {
    for mesh in figure.meshes_mut() {
        mesh.release(backend);
    }
    for texture in figure.textures_mut() {
        texture.release(backend);
    }
}

//! Per-frame drawing of the assembled figure
//!
//! Bind group layout:
//! - group 0: camera (view-projection)
//! - group 1: draw uniforms, one 256-byte slot per (part, material) draw
//! - group 2: texture and sampler of the part being drawn

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use log::{debug, error};

use crate::backend::*;
use crate::resources::{GpuMesh, GpuTexture, VertexLayout};
use crate::scene::PartPlacement;
use crate::shader::ShaderProgram;

pub const CAMERA_GROUP: u32 = 0;
pub const DRAW_GROUP: u32 = 1;
pub const TEXTURE_GROUP: u32 = 2;

/// Distance between draw uniform slots; the minimum uniform offset alignment
pub const DRAW_SLOT_STRIDE: u64 = 256;

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_projection: Mat4,
}

/// Uniforms for a single draw
///
/// `position.w` is unused.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawUniform {
    pub rotation: Mat4,
    pub scale: Mat4,
    pub position: Vec4,
    pub diffuse_color: Vec4,
}

impl DrawUniform {
    pub fn new(rotation: Mat4, translation: Vec3, scale: Mat4, diffuse: Vec3) -> Self {
        Self {
            rotation,
            scale,
            position: translation.extend(0.0),
            diffuse_color: diffuse.extend(1.0),
        }
    }
}

struct DepthTarget {
    texture: TextureHandle,
    view: TextureViewHandle,
    width: u32,
    height: u32,
}

/// Owns the pipeline and the per-frame uniform storage
pub struct FigureRenderer {
    pipeline: Option<RenderPipelineHandle>,
    draw_layout: BindGroupLayoutHandle,
    texture_layout: BindGroupLayoutHandle,
    camera_buffer: Option<BufferHandle>,
    camera_bind_group: Option<BindGroupHandle>,
    draw_buffer: Option<BufferHandle>,
    draw_slots: Vec<BindGroupHandle>,
    depth: Option<DepthTarget>,
    clear_color: [f32; 4],
}

impl FigureRenderer {
    /// Build layouts, uniform buffers and the depth target.
    ///
    /// An unusable shader program, or a pipeline the backend rejects, leaves the
    /// renderer without a pipeline: frames are still cleared but nothing is drawn.
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        program: &ShaderProgram,
        width: u32,
        height: u32,
        draw_capacity: usize,
        clear_color: [f32; 4],
    ) -> BackendResult<Self> {
        let camera_layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::VERTEX,
            ty: BindingType::UniformBuffer,
        }])?;
        let draw_layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::VERTEX_FRAGMENT,
            ty: BindingType::UniformBuffer,
        }])?;
        let texture_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler,
            },
        ])?;

        let camera_buffer = backend.create_buffer(&BufferDescriptor {
            label: Some("Camera Buffer".into()),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        let camera_bind_group = backend.create_bind_group(
            camera_layout,
            &[(
                0,
                BindGroupEntry::Buffer {
                    buffer: camera_buffer,
                    offset: 0,
                    size: None,
                },
            )],
        )?;

        let pipeline = if program.is_usable() {
            let desc = RenderPipelineDescriptor {
                label: Some("Figure Pipeline".into()),
                vertex_shader: program.vertex_source().to_string(),
                fragment_shader: program.fragment_source().to_string(),
                vertex_layouts: vec![VertexLayout::buffer_layout()],
                bind_group_layouts: vec![camera_layout, draw_layout, texture_layout],
                depth_stencil: Some(DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                }),
                color_format: backend.swapchain_format(),
            };
            match backend.create_render_pipeline(&desc) {
                Ok(pipeline) => Some(pipeline),
                Err(e) => {
                    error!("Failed to create render pipeline: {e}");
                    None
                }
            }
        } else {
            None
        };

        let mut renderer = Self {
            pipeline,
            draw_layout,
            texture_layout,
            camera_buffer: Some(camera_buffer),
            camera_bind_group: Some(camera_bind_group),
            draw_buffer: None,
            draw_slots: Vec::new(),
            depth: None,
            clear_color,
        };
        renderer.resize(backend, width, height)?;
        renderer.ensure_draw_slots(backend, draw_capacity)?;
        Ok(renderer)
    }

    /// Layout textures must be created against to be bound at [`TEXTURE_GROUP`]
    pub fn texture_layout(&self) -> BindGroupLayoutHandle {
        self.texture_layout
    }

    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn draw_capacity(&self) -> usize {
        self.draw_slots.len()
    }

    /// Recreate the depth target if the size changed
    pub fn resize<B: GraphicsBackend>(&mut self, backend: &mut B, width: u32, height: u32) -> BackendResult<()> {
        let (width, height) = (width.max(1), height.max(1));
        if let Some(depth) = &self.depth {
            if depth.width == width && depth.height == height {
                return Ok(());
            }
        }
        self.release_depth(backend);

        let texture = backend.create_texture(&TextureDescriptor {
            label: Some("Depth Buffer".into()),
            width,
            height,
            mip_levels: 1,
            format: DEPTH_FORMAT,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })?;
        let view = backend.create_texture_view(texture)?;
        self.depth = Some(DepthTarget {
            texture,
            view,
            width,
            height,
        });
        Ok(())
    }

    /// Grow the draw uniform buffer to hold at least `count` slots
    pub fn ensure_draw_slots<B: GraphicsBackend>(&mut self, backend: &mut B, count: usize) -> BackendResult<()> {
        if count <= self.draw_slots.len() {
            return Ok(());
        }
        self.release_draw_slots(backend);

        let buffer = backend.create_buffer(&BufferDescriptor {
            label: Some("Draw Uniforms".into()),
            size: count as u64 * DRAW_SLOT_STRIDE,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        self.draw_buffer = Some(buffer);

        for slot in 0..count {
            let bind_group = backend.create_bind_group(
                self.draw_layout,
                &[(
                    0,
                    BindGroupEntry::Buffer {
                        buffer,
                        offset: slot as u64 * DRAW_SLOT_STRIDE,
                        size: Some(std::mem::size_of::<DrawUniform>() as u64),
                    },
                )],
            )?;
            self.draw_slots.push(bind_group);
        }
        debug!("Allocated {count} draw uniform slots");
        Ok(())
    }

    /// Record one frame: clear, then draw every placement in order.
    ///
    /// Uniforms are written before the pass begins. Each part binds its texture
    /// and then draws once per material, each draw using its own slot.
    pub fn render_frame<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        frame: &FrameContext,
        view_projection: Mat4,
        placements: &[PartPlacement<'_, GpuMesh, GpuTexture>],
    ) -> BackendResult<()> {
        let draw_count = placements.iter().map(|p| p.mesh.materials().len()).sum();
        self.ensure_draw_slots(backend, draw_count)?;
        self.resize(backend, frame.width, frame.height)?;

        if let Some(camera_buffer) = self.camera_buffer {
            let camera = CameraUniform { view_projection };
            backend.write_buffer(camera_buffer, 0, bytemuck::bytes_of(&camera));
        }

        if let Some(draw_buffer) = self.draw_buffer {
            let mut slot = 0u64;
            for placement in placements {
                for material in placement.mesh.materials() {
                    let uniform = DrawUniform::new(
                        placement.rotation,
                        placement.translation,
                        placement.scale,
                        material.diffuse,
                    );
                    backend.write_buffer(draw_buffer, slot * DRAW_SLOT_STRIDE, bytemuck::bytes_of(&uniform));
                    slot += 1;
                }
            }
        }

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Figure Pass".into()),
            color_attachments: vec![ColorAttachment {
                view: frame.swapchain_view,
                clear_color: self.clear_color,
            }],
            depth_stencil_attachment: self.depth.as_ref().map(|depth| DepthStencilAttachment {
                view: depth.view,
                depth_clear_value: 1.0,
            }),
        });
        backend.set_viewport(0.0, 0.0, frame.width as f32, frame.height as f32, 0.0, 1.0);

        if let (Some(pipeline), Some(camera_bind_group)) = (self.pipeline, self.camera_bind_group) {
            backend.set_render_pipeline(pipeline);
            backend.set_bind_group(CAMERA_GROUP, camera_bind_group);

            let mut first_slot = 0;
            for placement in placements {
                let count = placement.mesh.materials().len();
                placement.texture.bind(backend);
                placement
                    .mesh
                    .render(backend, &self.draw_slots[first_slot..first_slot + count]);
                first_slot += count;
            }
        }

        backend.end_render_pass();
        Ok(())
    }

    /// Free buffers, bind groups and the depth target. Later calls do nothing.
    pub fn release<B: GraphicsBackend>(&mut self, backend: &mut B) {
        self.release_draw_slots(backend);
        self.release_depth(backend);
        if let Some(bind_group) = self.camera_bind_group.take() {
            backend.destroy_bind_group(bind_group);
        }
        if let Some(buffer) = self.camera_buffer.take() {
            backend.destroy_buffer(buffer);
        }
    }

    fn release_draw_slots<B: GraphicsBackend>(&mut self, backend: &mut B) {
        for bind_group in self.draw_slots.drain(..) {
            backend.destroy_bind_group(bind_group);
        }
        if let Some(buffer) = self.draw_buffer.take() {
            backend.destroy_buffer(buffer);
        }
    }

    fn release_depth<B: GraphicsBackend>(&mut self, backend: &mut B) {
        if let Some(depth) = self.depth.take() {
            backend.destroy_texture_view(depth.view);
            backend.destroy_texture(depth.texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::upload_figure;
    use crate::backend::dummy::{DummyBackend, RecordedCommand};
    use crate::resources::{MeshData, TextureData};
    use crate::scene::{pose, BodyPart, FigureAssets, SceneAssembler};
    use image::{DynamicImage, RgbaImage};

    const VERTEX: &str = r#"
struct DrawUniforms {
    rotation: mat4x4<f32>,
    scale: mat4x4<f32>,
    position: vec4<f32>,
    diffuse_color: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: mat4x4<f32>;
@group(1) @binding(0) var<uniform> draw: DrawUniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera * (draw.rotation * draw.scale * vec4<f32>(position, 1.0) + draw.position);
}
"#;

    const FRAGMENT: &str = r#"
@group(2) @binding(0) var figure_texture: texture_2d<f32>;
@group(2) @binding(1) var figure_sampler: sampler;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureSample(figure_texture, figure_sampler, vec2<f32>(0.5, 0.5));
}
"#;

    const TRIANGLE: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";

    const TWO_MATERIALS: &str = "\
mtllib two.mtl
v 0 0 0
v 1 0 0
v 0 1 0
usemtl red
f 1 2 3
usemtl blue
f 1 3 2
";

    fn program() -> ShaderProgram {
        ShaderProgram::from_sources(VERTEX.into(), FRAGMENT.into())
    }

    fn mesh(source: &str) -> MeshData {
        MeshData::parse_with("part.obj", &mut source.as_bytes(), |_| {
            tobj::load_mtl_buf(&mut "newmtl red\nKd 1 0 0\nnewmtl blue\nKd 0 0 1\n".as_bytes())
        })
        .unwrap()
    }

    fn texture(name: &str) -> TextureData {
        TextureData::from_image(DynamicImage::ImageRgba8(RgbaImage::new(2, 2)), name).unwrap()
    }

    fn gpu_figure(
        backend: &mut DummyBackend,
        renderer: &FigureRenderer,
        left_arm: &str,
    ) -> FigureAssets<GpuMesh, GpuTexture> {
        let meshes = [
            mesh(TRIANGLE),
            mesh(TRIANGLE),
            mesh(TRIANGLE),
            mesh(TRIANGLE),
            mesh(left_arm),
            mesh(TRIANGLE),
        ];
        let assets = FigureAssets::from_parts(meshes, [texture("head"), texture("torso")]);
        upload_figure(backend, renderer, assets).unwrap()
    }

    fn draws(commands: &[RecordedCommand]) -> usize {
        commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::DrawIndexed { .. }))
            .count()
    }

    #[test]
    fn uniform_layouts_match_shader_structs() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 64);
        assert_eq!(std::mem::size_of::<DrawUniform>(), 160);
        assert!(std::mem::size_of::<DrawUniform>() as u64 <= DRAW_SLOT_STRIDE);
    }

    #[test]
    fn frame_clears_white_and_draws_each_part_in_order() {
        let mut backend = DummyBackend::default();
        let mut renderer = FigureRenderer::new(&mut backend, &program(), 800, 800, 6, [1.0; 4]).unwrap();
        assert!(renderer.has_pipeline());
        let assets = gpu_figure(&mut backend, &renderer, TRIANGLE);

        let placements = SceneAssembler::new(&assets).assemble(&pose(0.0, true));
        let frame = backend.begin_frame().unwrap();
        backend.clear_commands();
        renderer
            .render_frame(&mut backend, &frame, Mat4::IDENTITY, &placements)
            .unwrap();

        let commands = backend.commands();
        assert_eq!(
            commands[0],
            RecordedCommand::BeginRenderPass {
                clear_color: Some([1.0; 4]),
                depth_clear: Some(1.0)
            }
        );
        assert_eq!(commands[1], RecordedCommand::SetViewport { width: 800.0, height: 800.0 });
        assert_eq!(commands.last(), Some(&RecordedCommand::EndRenderPass));
        assert_eq!(draws(commands), 6);

        // Head texture first, then the body texture for every other part
        let textures: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::SetBindGroup { index: TEXTURE_GROUP, bind_group } => Some(*bind_group),
                _ => None,
            })
            .collect();
        assert_eq!(textures.len(), 6);
        assert_ne!(textures[0], textures[1]);
        assert!(textures[1..].iter().all(|bg| *bg == textures[1]));
    }

    #[test]
    fn pipeline_binds_three_groups_and_writes_depth() {
        let mut backend = DummyBackend::default();
        FigureRenderer::new(&mut backend, &program(), 800, 800, 6, [1.0; 4]).unwrap();

        assert_eq!(backend.pipeline_count(), 1);
        let desc = backend.last_pipeline().unwrap();
        assert_eq!(desc.bind_group_layouts.len(), 3);
        assert_eq!(desc.color_format, backend.swapchain_format());
        assert_eq!(desc.vertex_layouts[0].array_stride, 32);
        let depth = desc.depth_stencil.as_ref().unwrap();
        assert_eq!(depth.format, TextureFormat::Depth32Float);
        assert!(depth.depth_write_enabled);
    }

    #[test]
    fn each_material_gets_its_own_slot() {
        let mut backend = DummyBackend::default();
        let mut renderer = FigureRenderer::new(&mut backend, &program(), 800, 800, 1, [1.0; 4]).unwrap();
        let assets = gpu_figure(&mut backend, &renderer, TWO_MATERIALS);

        let p = pose(0.4, true);
        let placements = SceneAssembler::new(&assets).assemble(&p);
        let frame = backend.begin_frame().unwrap();
        renderer
            .render_frame(&mut backend, &frame, Mat4::IDENTITY, &placements)
            .unwrap();

        // Five single-material parts plus the two-material left arm
        assert_eq!(renderer.draw_capacity(), 7);
        assert_eq!(draws(backend.commands()), 7);

        let contents = backend.buffer_contents(renderer.draw_buffer.unwrap()).unwrap();
        let slot = |i: u64| -> DrawUniform {
            let start = (i * DRAW_SLOT_STRIDE) as usize;
            bytemuck::pod_read_unaligned(&contents[start..start + std::mem::size_of::<DrawUniform>()])
        };

        let head = slot(0);
        assert_eq!(head.rotation, Mat4::from_rotation_x(p.head_angle));
        assert_eq!(head.position, Vec4::new(0.0, -1.7, 0.4, 0.0));
        assert_eq!(head.diffuse_color, Vec4::ONE);

        let left_arm = BodyPart::LeftArm.index() as u64;
        assert_eq!(slot(left_arm).diffuse_color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(slot(left_arm + 1).diffuse_color, Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(
            slot(left_arm).position,
            Vec4::new(-3.2, p.left_arm.lift, p.left_arm.swing, 0.0)
        );
        assert_eq!(slot(left_arm + 2).position.x, 4.0);
    }

    #[test]
    fn unusable_program_only_clears() {
        let mut backend = DummyBackend::default();
        let broken = ShaderProgram::from_sources("not wgsl".into(), FRAGMENT.into());
        let mut renderer = FigureRenderer::new(&mut backend, &broken, 800, 800, 6, [1.0; 4]).unwrap();
        assert!(!renderer.has_pipeline());
        assert_eq!(backend.pipeline_count(), 0);

        let assets = gpu_figure(&mut backend, &renderer, TRIANGLE);
        let placements = SceneAssembler::new(&assets).assemble(&pose(0.0, false));
        let frame = backend.begin_frame().unwrap();
        backend.clear_commands();
        renderer
            .render_frame(&mut backend, &frame, Mat4::IDENTITY, &placements)
            .unwrap();

        assert_eq!(draws(backend.commands()), 0);
        assert_eq!(backend.commands().len(), 3);
    }

    #[test]
    fn camera_matrix_is_uploaded() {
        let mut backend = DummyBackend::default();
        let mut renderer = FigureRenderer::new(&mut backend, &program(), 800, 800, 6, [1.0; 4]).unwrap();
        let view_projection = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));

        let frame = backend.begin_frame().unwrap();
        renderer
            .render_frame(&mut backend, &frame, view_projection, &[])
            .unwrap();

        let contents = backend.buffer_contents(renderer.camera_buffer.unwrap()).unwrap();
        let uploaded: CameraUniform = bytemuck::pod_read_unaligned(contents);
        assert_eq!(uploaded.view_projection, view_projection);
    }

    #[test]
    fn resize_recreates_depth_target() {
        let mut backend = DummyBackend::default();
        let mut renderer = FigureRenderer::new(&mut backend, &program(), 800, 800, 6, [1.0; 4]).unwrap();
        assert_eq!(backend.live_texture_count(), 1);

        renderer.resize(&mut backend, 1024, 600).unwrap();
        assert_eq!(backend.live_texture_count(), 1);
        let depth = renderer.depth.as_ref().unwrap();
        let desc = backend.texture_descriptor(depth.texture).unwrap();
        assert_eq!((desc.width, desc.height), (1024, 600));
        assert_eq!(desc.format, TextureFormat::Depth32Float);
    }

    #[test]
    fn release_is_idempotent() {
        let mut backend = DummyBackend::default();
        let mut renderer = FigureRenderer::new(&mut backend, &program(), 800, 800, 6, [1.0; 4]).unwrap();

        renderer.release(&mut backend);
        renderer.release(&mut backend);
        assert_eq!(backend.live_buffer_count(), 0);
        assert_eq!(backend.live_texture_count(), 0);
    }
}

//! Dummy GPU backend for testing.
//!
//! Performs no GPU work. Resources are tracked by handle, buffer contents are
//! kept in memory, and every command recorded inside a render pass is kept so
//! tests can assert on what a frame would have drawn.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::backend::traits::*;
use crate::backend::types::*;

/// A command recorded by [`DummyBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginRenderPass { clear_color: Option<[f32; 4]>, depth_clear: Option<f32> },
    EndRenderPass,
    SetPipeline(RenderPipelineHandle),
    SetBindGroup { index: u32, bind_group: BindGroupHandle },
    SetVertexBuffer { slot: u32, buffer: BufferHandle },
    SetIndexBuffer { buffer: BufferHandle },
    SetViewport { width: f32, height: f32 },
    DrawIndexed { indices: std::ops::Range<u32> },
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    width: u32,
    height: u32,
    next_id: u64,
    commands: Vec<RecordedCommand>,
    buffers: HashMap<u64, Vec<u8>>,
    textures: HashMap<u64, TextureDescriptor>,
    texture_writes: Vec<(TextureHandle, u32, u32, u32)>,
    live_views: HashSet<u64>,
    live_samplers: HashSet<u64>,
    live_bind_groups: HashSet<u64>,
    pipelines: Vec<RenderPipelineDescriptor>,
}

impl DummyBackend {
    /// Create a headless backend with the given surface size.
    pub fn headless(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            next_id: 1,
            commands: Vec::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            texture_writes: Vec::new(),
            live_views: HashSet::new(),
            live_samplers: HashSet::new(),
            live_bind_groups: HashSet::new(),
            pipelines: Vec::new(),
        }
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Commands recorded since creation or the last [`DummyBackend::clear_commands`].
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Current contents of a live buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(Vec::as_slice)
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    /// `(texture, mip_level, width, height)` for every texture upload.
    pub fn texture_writes(&self) -> &[(TextureHandle, u32, u32, u32)] {
        &self.texture_writes
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Most recently created render pipeline.
    pub fn last_pipeline(&self) -> Option<&RenderPipelineDescriptor> {
        self.pipelines.last()
    }

    fn record(&mut self, command: RecordedCommand) {
        log::trace!("DummyBackend: {command:?}");
        self.commands.push(command);
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::headless(800, 800)
    }
}

impl GraphicsBackend for DummyBackend {
    fn new(window: Arc<winit::window::Window>, _vsync: bool) -> BackendResult<Self> {
        let size = window.inner_size();
        Ok(Self::headless(size.width, size.height))
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let view = self.next_handle();
        Ok(FrameContext {
            swapchain_view: TextureViewHandle(view),
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        TextureFormat::Bgra8UnormSrgb
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!("DummyBackend: creating buffer {:?} (size: {})", desc.label, desc.size);
        let id = self.next_handle();
        self.buffers.insert(id, vec![0; desc.size as usize]);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        log::trace!("DummyBackend: creating buffer {:?} with {} bytes", desc.label, data.len());
        let id = self.next_handle();
        self.buffers.insert(id, data.to_vec());
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(contents) = self.buffers.get_mut(&buffer.0) {
            let start = offset as usize;
            let end = start + data.len();
            if end > contents.len() {
                contents.resize(end, 0);
            }
            contents[start..end].copy_from_slice(data);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}, {} mips)",
            desc.label,
            desc.width,
            desc.height,
            desc.mip_levels
        );
        let id = self.next_handle();
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture.0) {
            return Err(BackendError::TextureCreationFailed("Texture not found".into()));
        }
        let id = self.next_handle();
        self.live_views.insert(id);
        Ok(TextureViewHandle(id))
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        mip_level: u32,
        data: &[u8],
        width: u32,
        height: u32,
    ) {
        debug_assert_eq!(data.len(), (width * height * 4) as usize);
        self.texture_writes.push((texture, mip_level, width, height));
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("DummyBackend: creating sampler {:?}", desc.label);
        let id = self.next_handle();
        self.live_samplers.insert(id);
        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        Ok(BindGroupLayoutHandle(self.next_handle()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        _entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let id = self.next_handle();
        self.live_bind_groups.insert(id);
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        self.pipelines.push(desc.clone());
        Ok(RenderPipelineHandle(self.next_handle()))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.record(RecordedCommand::BeginRenderPass {
            clear_color: desc.color_attachments.first().map(|att| att.clear_color),
            depth_clear: desc.depth_stencil_attachment.as_ref().map(|att| att.depth_clear_value),
        });
    }

    fn end_render_pass(&mut self) {
        self.record(RecordedCommand::EndRenderPass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record(RecordedCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, _offset: u64) {
        self.record(RecordedCommand::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64) {
        self.record(RecordedCommand::SetIndexBuffer { buffer });
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, width: f32, height: f32, _min_depth: f32, _max_depth: f32) {
        self.record(RecordedCommand::SetViewport { width, height });
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        _base_vertex: i32,
        _instances: std::ops::Range<u32>,
    ) {
        self.record(RecordedCommand::DrawIndexed { indices });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.live_views.remove(&view.0);
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        self.live_samplers.remove(&sampler.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.live_bind_groups.remove(&bind_group.0);
    }
}

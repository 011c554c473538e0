use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace, warn};

use super::object_cache::{
    DescriptorSetKey, FramebufferKey, ObjectCache, RenderPassKey, SubpassInfo,
};
use super::replayer::Recording;
use crate::gpu::config::{GraphicsStateCfg, RecorderInfo};
use crate::gpu::driver::binding::{ResourceBindingState, ResourceInfo, ResourceSet};
use crate::gpu::driver::command::{
    BindIndexBuffer, CommandEncoder, CopyBufferToImage, CopyImage, Draw, DrawIndexed,
    ImageBarrier, PushConstants, SetDepthBias, UpdateBuffer, VertexBufferBinding,
};
use crate::gpu::driver::layout::{DescriptorSetLayout, PipelineLayout};
use crate::gpu::driver::state::{
    ColorBlendState, DepthStencilState, GraphicsPipelineState, InputAssemblyState,
    MultisampleState, PipelineStateDesc, RasterizationState, VertexInputState, ViewportState,
};
use crate::gpu::driver::types::{
    BindingMap, Buffer, BufferImageCopy, ClearValue, CommandBufferUsage, DescriptorBufferInfo,
    DescriptorImageInfo, DescriptorSet, DescriptorType, Format, Framebuffer, GraphicsPipeline,
    Image, ImageCopy, ImageLayout, ImageMemoryBarrier, ImageView, IndexType, LoadStoreInfo,
    PipelineBindPoint, Rect2D, RenderPass, RenderTarget, Sampler, Viewport,
};
use crate::gpu::error::{GPUError, Result};
use crate::utils::Handle;

/// A graphics state captured at a draw, waiting for its render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    pub seq: u64,
    pub state: PipelineStateDesc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubpassBinding {
    pub seq: u64,
    pub input_attachments: BTreeSet<u32>,
    pub output_attachments: BTreeSet<u32>,
    pub pipeline_requests: Vec<PipelineRequest>,
}

impl SubpassBinding {
    fn new(seq: u64) -> Self {
        Self {
            seq,
            ..Default::default()
        }
    }
}

/// One `begin_render_pass` .. `end_render_pass` span.
///
/// `render_pass` and `framebuffer` stay `None` until the span is closed.
#[derive(Debug, Clone)]
pub struct RenderPassBinding<'a> {
    pub seq: u64,
    pub render_target: &'a RenderTarget,
    pub load_store: Vec<LoadStoreInfo>,
    pub clear_values: Vec<ClearValue>,
    pub subpasses: Vec<SubpassBinding>,
    pub render_pass: Option<Handle<RenderPass>>,
    pub framebuffer: Option<Handle<Framebuffer>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineBinding {
    pub seq: u64,
    pub bind_point: PipelineBindPoint,
    pub layout: Handle<PipelineLayout>,
    pub pipeline: Handle<GraphicsPipeline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSetBinding {
    pub seq: u64,
    pub bind_point: PipelineBindPoint,
    pub layout: Handle<PipelineLayout>,
    pub set_index: u32,
    pub descriptor_set: Handle<DescriptorSet>,
}

/// Layout an image has to be in to be read through `descriptor_type`, or
/// `None` when images are not bound through that descriptor type.
pub fn image_layout_for(descriptor_type: DescriptorType, format: Format) -> Option<ImageLayout> {
    match descriptor_type {
        DescriptorType::CombinedImageSampler | DescriptorType::InputAttachment => {
            Some(if format.is_depth_stencil() {
                ImageLayout::DepthStencilReadOnly
            } else {
                ImageLayout::ShaderReadOnly
            })
        }
        DescriptorType::StorageImage => Some(ImageLayout::General),
        _ => None,
    }
}

/// Deferred command recorder.
///
/// Calls are turned into stream records right away, but pipelines, render
/// passes, framebuffers and descriptor sets are only requested from the
/// object cache when state actually changed: graphics state and descriptor
/// bindings are flushed before each draw, and render passes are resolved when
/// they end. The results land in the binding tables, keyed by the sequence
/// number of the stream record they apply to.
///
/// Everything borrowed for `'a` (cache, pipeline layouts, render targets)
/// must outlive the recorder and any replay of it.
pub struct CommandRecorder<'a, C: ObjectCache + ?Sized> {
    cache: &'a C,
    info: RecorderInfo,
    encoder: CommandEncoder,
    render_pass_bindings: Vec<RenderPassBinding<'a>>,
    pipeline_bindings: Vec<PipelineBinding>,
    descriptor_set_bindings: Vec<DescriptorSetBinding>,
    pipeline_state: GraphicsPipelineState<'a>,
    resource_binding_state: ResourceBindingState,
    bound_set_layouts: BTreeMap<u32, Handle<DescriptorSetLayout>>,
}

impl<'a, C: ObjectCache + ?Sized> CommandRecorder<'a, C> {
    pub fn new(cache: &'a C, info: RecorderInfo) -> Self {
        let encoder = CommandEncoder::with_capacity(info.stream_capacity);
        Self {
            cache,
            info,
            encoder,
            render_pass_bindings: Vec::new(),
            pipeline_bindings: Vec::new(),
            descriptor_set_bindings: Vec::new(),
            pipeline_state: GraphicsPipelineState::default(),
            resource_binding_state: ResourceBindingState::default(),
            bound_set_layouts: BTreeMap::new(),
        }
    }

    /// Drop everything recorded so far. The recorder behaves as if freshly
    /// constructed afterwards.
    pub fn reset(&mut self) {
        self.encoder.reset();
        self.pipeline_state.reset();
        self.resource_binding_state.reset();
        self.render_pass_bindings.clear();
        self.pipeline_bindings.clear();
        self.descriptor_set_bindings.clear();
        self.bound_set_layouts.clear();
    }

    pub fn info(&self) -> &RecorderInfo {
        &self.info
    }

    pub fn cache(&self) -> &'a C {
        self.cache
    }

    pub fn stream(&self) -> &CommandEncoder {
        &self.encoder
    }

    pub fn render_pass_bindings(&self) -> &[RenderPassBinding<'a>] {
        &self.render_pass_bindings
    }

    pub fn pipeline_bindings(&self) -> &[PipelineBinding] {
        &self.pipeline_bindings
    }

    pub fn descriptor_set_bindings(&self) -> &[DescriptorSetBinding] {
        &self.descriptor_set_bindings
    }

    pub fn pipeline_state(&self) -> &GraphicsPipelineState<'a> {
        &self.pipeline_state
    }

    pub fn resource_binding_state(&self) -> &ResourceBindingState {
        &self.resource_binding_state
    }

    /// Descriptor set layout last bound for each set index.
    pub fn bound_set_layouts(&self) -> &BTreeMap<u32, Handle<DescriptorSetLayout>> {
        &self.bound_set_layouts
    }

    /// Everything a replay needs: the stream plus the three binding tables.
    pub fn recording(&self) -> Recording<'_, 'a> {
        Recording::new(
            &self.encoder,
            &self.render_pass_bindings,
            &self.pipeline_bindings,
            &self.descriptor_set_bindings,
        )
    }

    pub fn begin(&mut self, flags: CommandBufferUsage) {
        self.encoder.begin(flags);
    }

    pub fn end(&mut self) {
        self.encoder.end();
    }

    /// Opens a render pass on `render_target`. Nothing is written to the
    /// stream; the pass is replayed from its binding, which starts at the next
    /// record. The bound pipeline layout and sub-states carry over, only the
    /// subpass index goes back to 0.
    pub fn begin_render_pass(
        &mut self,
        render_target: &'a RenderTarget,
        load_store: &[LoadStoreInfo],
        clear_values: &[ClearValue],
    ) {
        self.pipeline_state.set_subpass_index(0);

        let seq = self.encoder.next_seq();
        self.render_pass_bindings.push(RenderPassBinding {
            seq,
            render_target,
            load_store: load_store.to_vec(),
            clear_values: clear_values.to_vec(),
            subpasses: vec![SubpassBinding::new(seq)],
            render_pass: None,
            framebuffer: None,
        });
    }

    pub fn next_subpass(&mut self) -> Result<()> {
        let render_pass = open_render_pass(&mut self.render_pass_bindings)
            .ok_or(GPUError::OutOfOrder("next_subpass outside of a render pass"))?;

        self.pipeline_state
            .set_subpass_index(self.pipeline_state.subpass_index() + 1);
        let seq = self.encoder.next_subpass();
        render_pass.subpasses.push(SubpassBinding::new(seq));
        Ok(())
    }

    /// Resolves the render pass, its framebuffer and every pipeline requested
    /// inside it, then closes the pass.
    pub fn end_render_pass(&mut self) -> Result<()> {
        let cache = self.cache;
        let binding = open_render_pass(&mut self.render_pass_bindings)
            .ok_or(GPUError::OutOfOrder("end_render_pass without begin_render_pass"))?;

        let subpasses = binding
            .subpasses
            .iter()
            .map(|subpass| SubpassInfo {
                input_attachments: subpass.input_attachments.clone(),
                output_attachments: subpass.output_attachments.clone(),
            })
            .collect();

        let render_pass = cache.resolve_render_pass(&RenderPassKey {
            attachments: binding.render_target.attachments().to_vec(),
            load_store: binding.load_store.clone(),
            subpasses,
        })?;
        let framebuffer = cache.resolve_framebuffer(&FramebufferKey {
            views: binding.render_target.views().to_vec(),
            extent: binding.render_target.extent(),
            render_pass,
        })?;
        binding.render_pass = Some(render_pass);
        binding.framebuffer = Some(framebuffer);

        for request in binding
            .subpasses
            .iter_mut()
            .flat_map(|subpass| subpass.pipeline_requests.iter_mut())
        {
            request.state.render_pass = Some(render_pass);
            let pipeline = cache.resolve_graphics_pipeline(&request.state)?;
            self.pipeline_bindings.push(PipelineBinding {
                seq: request.seq,
                bind_point: PipelineBindPoint::Graphics,
                layout: request.state.layout,
                pipeline,
            });
        }

        debug!(
            "[{}] render pass {:?} resolved: {} subpass(es), framebuffer {:?}",
            self.info.debug_name,
            render_pass,
            binding.subpasses.len(),
            framebuffer
        );

        self.encoder.end_render_pass();
        Ok(())
    }

    pub fn bind_pipeline_layout(&mut self, layout: &'a PipelineLayout) {
        self.pipeline_state.set_pipeline_layout(layout);
    }

    /// Writes `values` at `offset` into the push-constant block of the bound
    /// layout. A range no block covers is dropped with a warning, or rejected
    /// when [`RecorderInfo::strict_push_constants`] is set.
    pub fn push_constants(&mut self, offset: u32, values: &[u8]) -> Result<()> {
        let layout = self
            .pipeline_state
            .pipeline_layout()
            .ok_or(GPUError::OutOfOrder("push_constants without a pipeline layout"))?;

        let size = u32::try_from(values.len()).unwrap_or(u32::MAX);
        let stages = layout.push_constant_range_stage(offset, size);
        if stages.is_empty() {
            if self.info.strict_push_constants {
                return Err(GPUError::PushConstantRange { offset, size });
            }
            warn!(
                "[{}] push constant range [{}, {}) not found",
                self.info.debug_name,
                offset,
                u64::from(offset) + u64::from(size)
            );
            return Ok(());
        }

        self.encoder.push_constants(
            &PushConstants {
                layout: layout.handle(),
                stages,
                offset,
                size,
            },
            values,
        );
        Ok(())
    }

    pub fn bind_buffer(
        &mut self,
        buffer: Handle<Buffer>,
        offset: u64,
        range: u64,
        set: u32,
        binding: u32,
        array_element: u32,
    ) {
        self.resource_binding_state
            .bind_buffer(buffer, offset, range, set, binding, array_element);
    }

    pub fn bind_image(
        &mut self,
        view: ImageView,
        sampler: Option<Handle<Sampler>>,
        set: u32,
        binding: u32,
        array_element: u32,
    ) {
        self.resource_binding_state
            .bind_image(view, sampler, set, binding, array_element);
    }

    pub fn bind_sampler(
        &mut self,
        sampler: Handle<Sampler>,
        set: u32,
        binding: u32,
        array_element: u32,
    ) {
        self.resource_binding_state
            .bind_sampler(sampler, set, binding, array_element);
    }

    /// Pairs `buffers` with `offsets`; extra entries in the longer slice are
    /// ignored.
    pub fn bind_vertex_buffers(
        &mut self,
        first_binding: u32,
        buffers: &[Handle<Buffer>],
        offsets: &[u64],
    ) {
        let bindings: Vec<VertexBufferBinding> = buffers
            .iter()
            .zip(offsets)
            .map(|(buffer, offset)| VertexBufferBinding::new(*buffer, *offset))
            .collect();
        self.encoder.bind_vertex_buffers(first_binding, &bindings);
    }

    pub fn bind_index_buffer(
        &mut self,
        buffer: Handle<Buffer>,
        offset: u64,
        index_type: IndexType,
    ) {
        self.encoder.bind_index_buffer(&BindIndexBuffer {
            buffer,
            index_type,
            offset,
        });
    }

    pub fn set_vertex_input_state(&mut self, state: VertexInputState) {
        self.pipeline_state.set_vertex_input_state(state);
    }

    pub fn set_input_assembly_state(&mut self, state: InputAssemblyState) {
        self.pipeline_state.set_input_assembly_state(state);
    }

    pub fn set_rasterization_state(&mut self, state: RasterizationState) {
        self.pipeline_state.set_rasterization_state(state);
    }

    pub fn set_viewport_state(&mut self, state: ViewportState) {
        self.pipeline_state.set_viewport_state(state);
    }

    pub fn set_multisample_state(&mut self, state: MultisampleState) {
        self.pipeline_state.set_multisample_state(state);
    }

    pub fn set_depth_stencil_state(&mut self, state: DepthStencilState) {
        self.pipeline_state.set_depth_stencil_state(state);
    }

    pub fn set_color_blend_state(&mut self, state: ColorBlendState) {
        self.pipeline_state.set_color_blend_state(state);
    }

    /// Applies every sub-state of an authored configuration.
    pub fn apply_graphics_state(&mut self, cfg: &GraphicsStateCfg) {
        self.set_vertex_input_state(cfg.vertex_input.clone());
        self.set_input_assembly_state(cfg.input_assembly);
        self.set_rasterization_state(cfg.rasterization);
        self.set_viewport_state(cfg.viewport);
        self.set_multisample_state(cfg.multisample);
        self.set_depth_stencil_state(cfg.depth_stencil);
        self.set_color_blend_state(cfg.color_blend.clone());
    }

    pub fn set_viewport(&mut self, first_viewport: u32, viewports: &[Viewport]) {
        self.encoder.set_viewport(first_viewport, viewports);
    }

    pub fn set_scissor(&mut self, first_scissor: u32, scissors: &[Rect2D]) {
        self.encoder.set_scissor(first_scissor, scissors);
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.encoder.set_line_width(width);
    }

    pub fn set_depth_bias(&mut self, constant_factor: f32, clamp: f32, slope_factor: f32) {
        self.encoder.set_depth_bias(&SetDepthBias {
            constant_factor,
            clamp,
            slope_factor,
        });
    }

    pub fn set_blend_constants(&mut self, constants: [f32; 4]) {
        self.encoder.set_blend_constants(constants);
    }

    pub fn set_depth_bounds(&mut self, min: f32, max: f32) {
        self.encoder.set_depth_bounds(min, max);
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.flush()?;
        self.encoder.draw(&Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.flush()?;
        self.encoder.draw_indexed(&DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
        Ok(())
    }

    pub fn update_buffer(&mut self, buffer: Handle<Buffer>, offset: u64, data: &[u8]) {
        self.encoder
            .update_buffer(&UpdateBuffer::new(buffer, offset), data);
    }

    pub fn copy_image(&mut self, src: Handle<Image>, dst: Handle<Image>, regions: &[ImageCopy]) {
        self.encoder.copy_image(&CopyImage { src, dst }, regions);
    }

    pub fn copy_buffer_to_image(
        &mut self,
        buffer: Handle<Buffer>,
        image: Handle<Image>,
        regions: &[BufferImageCopy],
    ) {
        self.encoder
            .copy_buffer_to_image(&CopyBufferToImage { buffer, image }, regions);
    }

    pub fn image_memory_barrier(&mut self, view: &ImageView, barrier: &ImageMemoryBarrier) {
        self.encoder.image_barrier(&ImageBarrier {
            image: view.img,
            aspect: view.aspect(),
            range: view.range,
            old_layout: barrier.old_layout,
            new_layout: barrier.new_layout,
            src_access: barrier.src_access_mask,
            dst_access: barrier.dst_access_mask,
            src_stage: barrier.src_stage_mask,
            dst_stage: barrier.dst_stage_mask,
            src_queue_family: barrier.old_queue_family,
            dst_queue_family: barrier.new_queue_family,
        });
    }

    fn flush(&mut self) -> Result<()> {
        let layout = self
            .pipeline_state
            .pipeline_layout()
            .ok_or(GPUError::OutOfOrder("draw without a pipeline layout"))?;
        if open_render_pass(&mut self.render_pass_bindings).is_none() {
            return Err(GPUError::OutOfOrder("draw outside of a render pass"));
        }
        self.flush_pipeline_state(layout)?;
        self.flush_descriptor_state(layout)
    }

    fn flush_pipeline_state(&mut self, layout: &'a PipelineLayout) -> Result<()> {
        if !self.pipeline_state.is_dirty() {
            return Ok(());
        }

        let subpass = open_render_pass(&mut self.render_pass_bindings)
            .and_then(|render_pass| render_pass.subpasses.last_mut())
            .ok_or(GPUError::OutOfOrder("draw outside of a render pass"))?;
        let state = self
            .pipeline_state
            .describe()
            .ok_or(GPUError::OutOfOrder("draw without a pipeline layout"))?;

        self.pipeline_state.clear_dirty();

        let seq = self.encoder.next_seq();
        trace!(
            "[{}] pipeline state captured at seq {seq}",
            self.info.debug_name
        );
        subpass.pipeline_requests.push(PipelineRequest { seq, state });
        subpass
            .output_attachments
            .extend(layout.fragment_output_attachments());
        subpass
            .input_attachments
            .extend(layout.fragment_input_attachments());
        Ok(())
    }

    fn flush_descriptor_state(&mut self, layout: &'a PipelineLayout) -> Result<()> {
        // Sets whose bound layout no longer matches must be rebuilt even if
        // their resources did not change.
        let forced: BTreeSet<u32> = layout
            .set_layouts()
            .iter()
            .filter(|(set, set_layout)| {
                self.bound_set_layouts
                    .get(*set)
                    .is_some_and(|bound| *bound != set_layout.handle())
            })
            .map(|(set, _)| *set)
            .collect();

        self.bound_set_layouts
            .retain(|set, _| layout.has_set_layout(*set));

        if !self.resource_binding_state.is_dirty() && forced.is_empty() {
            return Ok(());
        }
        self.resource_binding_state.clear_dirty();

        let pending: Vec<u32> = self
            .resource_binding_state
            .sets()
            .iter()
            .filter(|(set, resources)| resources.is_dirty() || forced.contains(*set))
            .map(|(set, _)| *set)
            .collect();

        for set_index in pending {
            self.resource_binding_state.clear_set_dirty(set_index);

            let Some(set_layout) = layout.set_layout(set_index) else {
                trace!(
                    "[{}] set {set_index} is not part of the pipeline layout",
                    self.info.debug_name
                );
                continue;
            };
            self.bound_set_layouts
                .insert(set_index, set_layout.handle());

            let Some(resources) = self.resource_binding_state.set(set_index) else {
                continue;
            };
            let (buffer_infos, image_infos) = collect_descriptor_infos(set_layout, resources);

            let descriptor_set = self.cache.resolve_descriptor_set(&DescriptorSetKey {
                layout: set_layout.handle(),
                buffer_infos,
                image_infos,
            })?;
            self.descriptor_set_bindings.push(DescriptorSetBinding {
                seq: self.encoder.next_seq(),
                bind_point: PipelineBindPoint::Graphics,
                layout: layout.handle(),
                set_index,
                descriptor_set,
            });
        }
        Ok(())
    }
}

/// The last render pass, unless `end_render_pass` already resolved it.
fn open_render_pass<'r, 'a>(
    bindings: &'r mut [RenderPassBinding<'a>],
) -> Option<&'r mut RenderPassBinding<'a>> {
    bindings
        .last_mut()
        .filter(|binding| binding.render_pass.is_none())
}

fn collect_descriptor_infos(
    set_layout: &DescriptorSetLayout,
    resources: &ResourceSet,
) -> (BindingMap<DescriptorBufferInfo>, BindingMap<DescriptorImageInfo>) {
    let mut buffer_infos: BindingMap<DescriptorBufferInfo> = BindingMap::new();
    let mut image_infos: BindingMap<DescriptorImageInfo> = BindingMap::new();

    for (binding, elements) in resources.bindings() {
        let Some(layout_binding) = set_layout.binding(*binding) else {
            trace!("binding {binding} is not part of set {}", set_layout.set_index());
            continue;
        };

        for (element, info) in elements {
            match *info {
                ResourceInfo::Buffer(buffer_info) => {
                    buffer_infos
                        .entry(*binding)
                        .or_default()
                        .insert(*element, buffer_info);
                }
                ResourceInfo::Sampler(sampler) => {
                    image_infos
                        .entry(*binding)
                        .or_default()
                        .insert(*element, sampler_only(sampler));
                }
                ResourceInfo::Image {
                    sampler: Some(sampler),
                    ..
                } if layout_binding.descriptor_type == DescriptorType::Sampler => {
                    image_infos
                        .entry(*binding)
                        .or_default()
                        .insert(*element, sampler_only(sampler));
                }
                ResourceInfo::Image { view, sampler } => {
                    let Some(layout) = image_layout_for(layout_binding.descriptor_type, view.format)
                    else {
                        trace!(
                            "image at binding {binding}[{element}] skipped for {:?}",
                            layout_binding.descriptor_type
                        );
                        continue;
                    };
                    image_infos.entry(*binding).or_default().insert(
                        *element,
                        DescriptorImageInfo {
                            sampler,
                            view: Some(view),
                            layout,
                        },
                    );
                }
            }
        }
    }

    (buffer_infos, image_infos)
}

fn sampler_only(sampler: Handle<Sampler>) -> DescriptorImageInfo {
    DescriptorImageInfo {
        sampler: Some(sampler),
        view: None,
        layout: ImageLayout::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_layout_follows_descriptor_type_and_format() {
        assert_eq!(
            image_layout_for(DescriptorType::CombinedImageSampler, Format::RGBA8),
            Some(ImageLayout::ShaderReadOnly)
        );
        assert_eq!(
            image_layout_for(DescriptorType::CombinedImageSampler, Format::D32F),
            Some(ImageLayout::DepthStencilReadOnly)
        );
        assert_eq!(
            image_layout_for(DescriptorType::InputAttachment, Format::D24S8),
            Some(ImageLayout::DepthStencilReadOnly)
        );
        assert_eq!(
            image_layout_for(DescriptorType::InputAttachment, Format::BGRA8),
            Some(ImageLayout::ShaderReadOnly)
        );
        assert_eq!(
            image_layout_for(DescriptorType::StorageImage, Format::D16),
            Some(ImageLayout::General)
        );
        assert_eq!(
            image_layout_for(DescriptorType::SampledImage, Format::RGBA8),
            None
        );
        assert_eq!(
            image_layout_for(DescriptorType::UniformBuffer, Format::RGBA8),
            None
        );
    }
}

use std::iter::Peekable;
use std::slice::Iter;

use log::debug;

use super::recorder::{DescriptorSetBinding, PipelineBinding, RenderPassBinding};
use crate::gpu::driver::command::{
    Begin, BindIndexBuffer, CommandEncoder, CommandSink, CopyBufferToImage, CopyImage, Draw,
    DrawIndexed, ImageBarrier, PushConstants, SetBlendConstants, SetDepthBias, SetDepthBounds,
    SetLineWidth, UpdateBuffer, VertexBufferBinding,
};
use crate::gpu::driver::types::{BufferImageCopy, ImageCopy, Rect2D, Viewport};
use crate::gpu::error::{GPUError, Result};

/// Borrowed view of a finished recording: the command stream and the binding
/// tables that point into it.
#[derive(Debug, Clone, Copy)]
pub struct Recording<'r, 'a> {
    stream: &'r CommandEncoder,
    render_passes: &'r [RenderPassBinding<'a>],
    pipelines: &'r [PipelineBinding],
    descriptor_sets: &'r [DescriptorSetBinding],
}

impl<'r, 'a> Recording<'r, 'a> {
    pub fn new(
        stream: &'r CommandEncoder,
        render_passes: &'r [RenderPassBinding<'a>],
        pipelines: &'r [PipelineBinding],
        descriptor_sets: &'r [DescriptorSetBinding],
    ) -> Self {
        Self {
            stream,
            render_passes,
            pipelines,
            descriptor_sets,
        }
    }

    pub fn stream(&self) -> &'r CommandEncoder {
        self.stream
    }

    pub fn render_passes(&self) -> &'r [RenderPassBinding<'a>] {
        self.render_passes
    }

    pub fn pipelines(&self) -> &'r [PipelineBinding] {
        self.pipelines
    }

    pub fn descriptor_sets(&self) -> &'r [DescriptorSetBinding] {
        self.descriptor_sets
    }
}

/// Trait for types that can replay a [`Recording`] on a [`CommandSink`].
pub trait Replayer<S: CommandSink> {
    /// Obtain the underlying command sink.
    fn sink(&mut self) -> &mut S;

    /// Walks the stream in order. Before the record with sequence number `s`,
    /// every binding with `seq <= s` that has not been applied yet is
    /// forwarded: render passes first, then pipelines, then descriptor sets.
    /// Returns the number of stream records replayed.
    fn replay(&mut self, recording: &Recording<'_, '_>) -> Result<usize> {
        let sink = self.sink();
        let mut render_passes = recording.render_passes.iter().peekable();
        let mut pipelines = recording.pipelines.iter().peekable();
        let mut descriptor_sets = recording.descriptor_sets.iter().peekable();

        let mut count = 0;
        for cmd in recording.stream.iter() {
            let cmd = cmd?;
            for binding in due(&mut render_passes, cmd.seq, |b| b.seq) {
                if binding.render_pass.is_none() || binding.framebuffer.is_none() {
                    return Err(GPUError::UnresolvedRenderPass(binding.seq));
                }
                sink.begin_render_pass(binding)?;
            }
            for binding in due(&mut pipelines, cmd.seq, |b| b.seq) {
                sink.bind_pipeline(binding)?;
            }
            for binding in due(&mut descriptor_sets, cmd.seq, |b| b.seq) {
                sink.bind_descriptor_set(binding)?;
            }
            cmd.apply(sink)?;
            count += 1;
        }

        if let Some(binding) = render_passes.find(|b| b.render_pass.is_none()) {
            return Err(GPUError::UnresolvedRenderPass(binding.seq));
        }
        debug!("Replayed {count} command(s)");
        Ok(count)
    }
}

// Pops every binding at or before `seq`. Binding tables are sorted by seq.
fn due<'i, 'x: 'i, T>(
    bindings: &'i mut Peekable<Iter<'x, T>>,
    seq: u64,
    seq_of: fn(&T) -> u64,
) -> impl Iterator<Item = &'x T> + 'i {
    std::iter::from_fn(move || bindings.next_if(|b| seq_of(b) <= seq))
}

/// Generic replayer that forwards commands to any [`CommandSink`].
pub struct CommandReplayer<'s, S: CommandSink> {
    sink: &'s mut S,
}

impl<'s, S: CommandSink> CommandReplayer<'s, S> {
    /// Create a new replayer targeting the given sink.
    pub fn new(sink: &'s mut S) -> Self {
        Self { sink }
    }
}

impl<'s, S: CommandSink> Replayer<S> for CommandReplayer<'s, S> {
    fn sink(&mut self) -> &mut S {
        &mut *self.sink
    }
}

/// What a [`TraceSink`] saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayEvent {
    Begin(Begin),
    End,
    BeginRenderPass { seq: u64, subpasses: usize },
    NextSubpass,
    EndRenderPass,
    BindPipeline(PipelineBinding),
    BindDescriptorSet(DescriptorSetBinding),
    PushConstants(PushConstants, Vec<u8>),
    BindVertexBuffers(u32, Vec<VertexBufferBinding>),
    BindIndexBuffer(BindIndexBuffer),
    SetViewport(u32, Vec<Viewport>),
    SetScissor(u32, Vec<Rect2D>),
    SetLineWidth(SetLineWidth),
    SetDepthBias(SetDepthBias),
    SetBlendConstants(SetBlendConstants),
    SetDepthBounds(SetDepthBounds),
    Draw(Draw),
    DrawIndexed(DrawIndexed),
    UpdateBuffer(UpdateBuffer, Vec<u8>),
    CopyImage(CopyImage, Vec<ImageCopy>),
    CopyBufferToImage(CopyBufferToImage, Vec<BufferImageCopy>),
    ImageBarrier(ImageBarrier),
}

/// Headless sink that only records what it is asked to do.
#[derive(Debug, Clone, Default)]
pub struct TraceSink {
    pub events: Vec<ReplayEvent>,
}

impl TraceSink {
    fn push(&mut self, event: ReplayEvent) -> Result<()> {
        self.events.push(event);
        Ok(())
    }
}

impl CommandSink for TraceSink {
    fn begin(&mut self, cmd: &Begin) -> Result<()> {
        self.push(ReplayEvent::Begin(*cmd))
    }

    fn end(&mut self) -> Result<()> {
        self.push(ReplayEvent::End)
    }

    fn begin_render_pass(&mut self, binding: &RenderPassBinding<'_>) -> Result<()> {
        self.push(ReplayEvent::BeginRenderPass {
            seq: binding.seq,
            subpasses: binding.subpasses.len(),
        })
    }

    fn next_subpass(&mut self) -> Result<()> {
        self.push(ReplayEvent::NextSubpass)
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.push(ReplayEvent::EndRenderPass)
    }

    fn bind_pipeline(&mut self, binding: &PipelineBinding) -> Result<()> {
        self.push(ReplayEvent::BindPipeline(*binding))
    }

    fn bind_descriptor_set(&mut self, binding: &DescriptorSetBinding) -> Result<()> {
        self.push(ReplayEvent::BindDescriptorSet(*binding))
    }

    fn push_constants(&mut self, cmd: &PushConstants, data: &[u8]) -> Result<()> {
        self.push(ReplayEvent::PushConstants(*cmd, data.to_vec()))
    }

    fn bind_vertex_buffers(
        &mut self,
        first_binding: u32,
        buffers: &[VertexBufferBinding],
    ) -> Result<()> {
        self.push(ReplayEvent::BindVertexBuffers(first_binding, buffers.to_vec()))
    }

    fn bind_index_buffer(&mut self, cmd: &BindIndexBuffer) -> Result<()> {
        self.push(ReplayEvent::BindIndexBuffer(*cmd))
    }

    fn set_viewport(&mut self, first_viewport: u32, viewports: &[Viewport]) -> Result<()> {
        self.push(ReplayEvent::SetViewport(first_viewport, viewports.to_vec()))
    }

    fn set_scissor(&mut self, first_scissor: u32, scissors: &[Rect2D]) -> Result<()> {
        self.push(ReplayEvent::SetScissor(first_scissor, scissors.to_vec()))
    }

    fn set_line_width(&mut self, cmd: &SetLineWidth) -> Result<()> {
        self.push(ReplayEvent::SetLineWidth(*cmd))
    }

    fn set_depth_bias(&mut self, cmd: &SetDepthBias) -> Result<()> {
        self.push(ReplayEvent::SetDepthBias(*cmd))
    }

    fn set_blend_constants(&mut self, cmd: &SetBlendConstants) -> Result<()> {
        self.push(ReplayEvent::SetBlendConstants(*cmd))
    }

    fn set_depth_bounds(&mut self, cmd: &SetDepthBounds) -> Result<()> {
        self.push(ReplayEvent::SetDepthBounds(*cmd))
    }

    fn draw(&mut self, cmd: &Draw) -> Result<()> {
        self.push(ReplayEvent::Draw(*cmd))
    }

    fn draw_indexed(&mut self, cmd: &DrawIndexed) -> Result<()> {
        self.push(ReplayEvent::DrawIndexed(*cmd))
    }

    fn update_buffer(&mut self, cmd: &UpdateBuffer, data: &[u8]) -> Result<()> {
        self.push(ReplayEvent::UpdateBuffer(*cmd, data.to_vec()))
    }

    fn copy_image(&mut self, cmd: &CopyImage, regions: &[ImageCopy]) -> Result<()> {
        self.push(ReplayEvent::CopyImage(*cmd, regions.to_vec()))
    }

    fn copy_buffer_to_image(
        &mut self,
        cmd: &CopyBufferToImage,
        regions: &[BufferImageCopy],
    ) -> Result<()> {
        self.push(ReplayEvent::CopyBufferToImage(*cmd, regions.to_vec()))
    }

    fn image_barrier(&mut self, cmd: &ImageBarrier) -> Result<()> {
        self.push(ReplayEvent::ImageBarrier(*cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::driver::types::CommandBufferUsage;

    #[test]
    fn stream_without_bindings_replays_in_order() {
        let mut stream = CommandEncoder::new();
        stream.begin(CommandBufferUsage::ONE_TIME_SUBMIT);
        stream.set_line_width(2.0);
        stream.set_blend_constants([0.0, 0.5, 1.0, 1.0]);
        stream.end();

        let mut sink = TraceSink::default();
        let recording = Recording::new(&stream, &[], &[], &[]);
        let count = CommandReplayer::new(&mut sink).replay(&recording).unwrap();

        assert_eq!(count, 4);
        assert_eq!(
            sink.events,
            vec![
                ReplayEvent::Begin(Begin {
                    flags: CommandBufferUsage::ONE_TIME_SUBMIT
                }),
                ReplayEvent::SetLineWidth(SetLineWidth { width: 2.0 }),
                ReplayEvent::SetBlendConstants(SetBlendConstants {
                    constants: [0.0, 0.5, 1.0, 1.0]
                }),
                ReplayEvent::End,
            ]
        );
    }

    #[test]
    fn bindings_apply_before_their_record() {
        use crate::utils::Handle;
        use crate::gpu::driver::types::PipelineBindPoint;

        let mut stream = CommandEncoder::new();
        stream.set_line_width(1.0);
        stream.draw(&Draw {
            vertex_count: 3,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        });

        let pipeline = PipelineBinding {
            seq: 1,
            bind_point: PipelineBindPoint::Graphics,
            layout: Handle::new(0, 0),
            pipeline: Handle::new(5, 0),
        };
        let set = DescriptorSetBinding {
            seq: 1,
            bind_point: PipelineBindPoint::Graphics,
            layout: Handle::new(0, 0),
            set_index: 0,
            descriptor_set: Handle::new(9, 0),
        };
        let pipelines = [pipeline];
        let sets = [set];
        let recording = Recording::new(&stream, &[], &pipelines, &sets);

        let mut sink = TraceSink::default();
        CommandReplayer::new(&mut sink).replay(&recording).unwrap();

        assert!(matches!(sink.events[0], ReplayEvent::SetLineWidth(_)));
        assert_eq!(sink.events[1], ReplayEvent::BindPipeline(pipeline));
        assert_eq!(sink.events[2], ReplayEvent::BindDescriptorSet(set));
        assert!(matches!(sink.events[3], ReplayEvent::Draw(_)));
    }
}

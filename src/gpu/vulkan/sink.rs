use ash::vk;
use log::trace;

use super::conversions::subresource_range;
use crate::gpu::driver::command::{
    Begin, BindIndexBuffer, CommandSink, CopyBufferToImage, CopyImage, Draw, DrawIndexed,
    ImageBarrier, PushConstants, SetBlendConstants, SetDepthBias, SetDepthBounds, SetLineWidth,
    UpdateBuffer, VertexBufferBinding,
};
use crate::gpu::driver::layout::PipelineLayout;
use crate::gpu::driver::types::{
    Buffer, BufferImageCopy, DescriptorSet, Framebuffer, GraphicsPipeline, Image, ImageCopy,
    ImageLayout, Rect2D, RenderPass, Viewport,
};
use crate::gpu::error::{GPUError, Result};
use crate::gpu::execution::recorder::{DescriptorSetBinding, PipelineBinding, RenderPassBinding};
use crate::utils::Handle;

/// Maps handles to the native objects a [`VulkanSink`] records against.
///
/// Usually implemented by whatever owns the `vk` objects an
/// [`ObjectFactory`](crate::gpu::execution::object_cache::ObjectFactory) hands
/// out handles for.
pub trait VkObjects {
    fn buffer(&self, handle: Handle<Buffer>) -> Option<vk::Buffer>;
    fn image(&self, handle: Handle<Image>) -> Option<vk::Image>;
    fn pipeline_layout(&self, handle: Handle<PipelineLayout>) -> Option<vk::PipelineLayout>;
    fn render_pass(&self, handle: Handle<RenderPass>) -> Option<vk::RenderPass>;
    fn framebuffer(&self, handle: Handle<Framebuffer>) -> Option<vk::Framebuffer>;
    fn pipeline(&self, handle: Handle<GraphicsPipeline>) -> Option<vk::Pipeline>;
    fn descriptor_set(&self, handle: Handle<DescriptorSet>) -> Option<vk::DescriptorSet>;
}

fn lookup<T>(obj: Option<T>, what: &'static str) -> Result<T> {
    obj.ok_or(GPUError::MissingObject(what))
}

/// Replays a recording into a native command buffer.
///
/// The command buffer must come from a pool whose family supports graphics,
/// and must not be recording when `Begin` is replayed.
pub struct VulkanSink<'o, O: VkObjects + ?Sized> {
    device: &'o ash::Device,
    cmd: vk::CommandBuffer,
    objects: &'o O,
}

impl<'o, O: VkObjects + ?Sized> VulkanSink<'o, O> {
    pub fn new(device: &'o ash::Device, cmd: vk::CommandBuffer, objects: &'o O) -> Self {
        Self {
            device,
            cmd,
            objects,
        }
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.cmd
    }
}

impl<'o, O: VkObjects + ?Sized> CommandSink for VulkanSink<'o, O> {
    fn begin(&mut self, cmd: &Begin) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::builder().flags(cmd.flags.into());
        unsafe { self.device.begin_command_buffer(self.cmd, &info)? };
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        unsafe { self.device.end_command_buffer(self.cmd)? };
        Ok(())
    }

    fn begin_render_pass(&mut self, binding: &RenderPassBinding<'_>) -> Result<()> {
        let (Some(render_pass), Some(framebuffer)) = (binding.render_pass, binding.framebuffer)
        else {
            return Err(GPUError::UnresolvedRenderPass(binding.seq));
        };
        let render_pass = lookup(self.objects.render_pass(render_pass), "render pass")?;
        let framebuffer = lookup(self.objects.framebuffer(framebuffer), "framebuffer")?;

        let clear_values: Vec<vk::ClearValue> =
            binding.clear_values.iter().map(|&c| c.into()).collect();
        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: binding.render_target.extent().into(),
            })
            .clear_values(&clear_values);

        trace!(
            "vk begin render pass seq {} ({} subpasses)",
            binding.seq,
            binding.subpasses.len()
        );
        unsafe {
            self.device
                .cmd_begin_render_pass(self.cmd, &info, vk::SubpassContents::INLINE)
        };
        Ok(())
    }

    fn next_subpass(&mut self) -> Result<()> {
        unsafe {
            self.device
                .cmd_next_subpass(self.cmd, vk::SubpassContents::INLINE)
        };
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        unsafe { self.device.cmd_end_render_pass(self.cmd) };
        Ok(())
    }

    fn bind_pipeline(&mut self, binding: &PipelineBinding) -> Result<()> {
        let pipeline = lookup(self.objects.pipeline(binding.pipeline), "graphics pipeline")?;
        unsafe {
            self.device
                .cmd_bind_pipeline(self.cmd, binding.bind_point.into(), pipeline)
        };
        Ok(())
    }

    fn bind_descriptor_set(&mut self, binding: &DescriptorSetBinding) -> Result<()> {
        let layout = lookup(
            self.objects.pipeline_layout(binding.layout),
            "pipeline layout",
        )?;
        let set = lookup(
            self.objects.descriptor_set(binding.descriptor_set),
            "descriptor set",
        )?;
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.cmd,
                binding.bind_point.into(),
                layout,
                binding.set_index,
                &[set],
                &[],
            )
        };
        Ok(())
    }

    fn push_constants(&mut self, cmd: &PushConstants, data: &[u8]) -> Result<()> {
        let layout = lookup(self.objects.pipeline_layout(cmd.layout), "pipeline layout")?;
        unsafe {
            self.device
                .cmd_push_constants(self.cmd, layout, cmd.stages.into(), cmd.offset, data)
        };
        Ok(())
    }

    fn bind_vertex_buffers(
        &mut self,
        first_binding: u32,
        buffers: &[VertexBufferBinding],
    ) -> Result<()> {
        let mut raw = Vec::with_capacity(buffers.len());
        let mut offsets = Vec::with_capacity(buffers.len());
        for b in buffers {
            raw.push(lookup(self.objects.buffer(b.buffer), "vertex buffer")?);
            offsets.push(b.offset);
        }
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.cmd, first_binding, &raw, &offsets)
        };
        Ok(())
    }

    fn bind_index_buffer(&mut self, cmd: &BindIndexBuffer) -> Result<()> {
        let buffer = lookup(self.objects.buffer(cmd.buffer), "index buffer")?;
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.cmd, buffer, cmd.offset, cmd.index_type.into())
        };
        Ok(())
    }

    fn set_viewport(&mut self, first_viewport: u32, viewports: &[Viewport]) -> Result<()> {
        let raw: Vec<vk::Viewport> = viewports.iter().map(|&v| v.into()).collect();
        unsafe { self.device.cmd_set_viewport(self.cmd, first_viewport, &raw) };
        Ok(())
    }

    fn set_scissor(&mut self, first_scissor: u32, scissors: &[Rect2D]) -> Result<()> {
        let raw: Vec<vk::Rect2D> = scissors.iter().map(|&r| r.into()).collect();
        unsafe { self.device.cmd_set_scissor(self.cmd, first_scissor, &raw) };
        Ok(())
    }

    fn set_line_width(&mut self, cmd: &SetLineWidth) -> Result<()> {
        unsafe { self.device.cmd_set_line_width(self.cmd, cmd.width) };
        Ok(())
    }

    fn set_depth_bias(&mut self, cmd: &SetDepthBias) -> Result<()> {
        unsafe {
            self.device.cmd_set_depth_bias(
                self.cmd,
                cmd.constant_factor,
                cmd.clamp,
                cmd.slope_factor,
            )
        };
        Ok(())
    }

    fn set_blend_constants(&mut self, cmd: &SetBlendConstants) -> Result<()> {
        unsafe { self.device.cmd_set_blend_constants(self.cmd, &cmd.constants) };
        Ok(())
    }

    fn set_depth_bounds(&mut self, cmd: &SetDepthBounds) -> Result<()> {
        unsafe { self.device.cmd_set_depth_bounds(self.cmd, cmd.min, cmd.max) };
        Ok(())
    }

    fn draw(&mut self, cmd: &Draw) -> Result<()> {
        unsafe {
            self.device.cmd_draw(
                self.cmd,
                cmd.vertex_count,
                cmd.instance_count,
                cmd.first_vertex,
                cmd.first_instance,
            )
        };
        Ok(())
    }

    fn draw_indexed(&mut self, cmd: &DrawIndexed) -> Result<()> {
        unsafe {
            self.device.cmd_draw_indexed(
                self.cmd,
                cmd.index_count,
                cmd.instance_count,
                cmd.first_index,
                cmd.vertex_offset,
                cmd.first_instance,
            )
        };
        Ok(())
    }

    fn update_buffer(&mut self, cmd: &UpdateBuffer, data: &[u8]) -> Result<()> {
        let buffer = lookup(self.objects.buffer(cmd.buffer), "buffer")?;
        unsafe {
            self.device
                .cmd_update_buffer(self.cmd, buffer, cmd.offset, data)
        };
        Ok(())
    }

    fn copy_image(&mut self, cmd: &CopyImage, regions: &[ImageCopy]) -> Result<()> {
        let src = lookup(self.objects.image(cmd.src), "source image")?;
        let dst = lookup(self.objects.image(cmd.dst), "destination image")?;
        let raw: Vec<vk::ImageCopy> = regions.iter().map(|&r| r.into()).collect();
        unsafe {
            self.device.cmd_copy_image(
                self.cmd,
                src,
                ImageLayout::TransferSrc.into(),
                dst,
                ImageLayout::TransferDst.into(),
                &raw,
            )
        };
        Ok(())
    }

    fn copy_buffer_to_image(
        &mut self,
        cmd: &CopyBufferToImage,
        regions: &[BufferImageCopy],
    ) -> Result<()> {
        let buffer = lookup(self.objects.buffer(cmd.buffer), "staging buffer")?;
        let image = lookup(self.objects.image(cmd.image), "destination image")?;
        let raw: Vec<vk::BufferImageCopy> = regions.iter().map(|&r| r.into()).collect();
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.cmd,
                buffer,
                image,
                ImageLayout::TransferDst.into(),
                &raw,
            )
        };
        Ok(())
    }

    fn image_barrier(&mut self, cmd: &ImageBarrier) -> Result<()> {
        let image = lookup(self.objects.image(cmd.image), "image")?;
        let barrier = vk::ImageMemoryBarrier::builder()
            .image(image)
            .old_layout(cmd.old_layout.into())
            .new_layout(cmd.new_layout.into())
            .src_access_mask(cmd.src_access.into())
            .dst_access_mask(cmd.dst_access.into())
            .src_queue_family_index(cmd.src_queue_family)
            .dst_queue_family_index(cmd.dst_queue_family)
            .subresource_range(subresource_range(cmd.aspect, cmd.range))
            .build();
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.cmd,
                cmd.src_stage.into(),
                cmd.dst_stage.into(),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            )
        };
        Ok(())
    }
}

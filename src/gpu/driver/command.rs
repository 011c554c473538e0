use bytemuck::{AnyBitPattern, CheckedBitPattern, NoUninit, Pod, Zeroable};

use super::layout::PipelineLayout;
use super::types::{
    AccessFlags, AspectMask, Buffer, BufferImageCopy, CommandBufferUsage, Image, ImageCopy,
    ImageLayout, IndexType, PipelineStageFlags, Rect2D, ShaderStageFlags, SubresourceRange,
    Viewport,
};
use crate::gpu::error::{GPUError, Result};
use crate::gpu::execution::recorder::{DescriptorSetBinding, PipelineBinding, RenderPassBinding};
use crate::utils::Handle;

//===----------------------------------------------------------------------===//
// Command definitions
//===----------------------------------------------------------------------===//

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    Begin = 0,
    End = 1,
    NextSubpass = 2,
    EndRenderPass = 3,
    PushConstants = 4,
    BindVertexBuffers = 5,
    BindIndexBuffer = 6,
    SetViewport = 7,
    SetScissor = 8,
    SetLineWidth = 9,
    SetDepthBias = 10,
    SetBlendConstants = 11,
    SetDepthBounds = 12,
    Draw = 13,
    DrawIndexed = 14,
    UpdateBuffer = 15,
    CopyImage = 16,
    CopyBufferToImage = 17,
    ImageMemoryBarrier = 18,
}

impl Op {
    fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            0 => Op::Begin,
            1 => Op::End,
            2 => Op::NextSubpass,
            3 => Op::EndRenderPass,
            4 => Op::PushConstants,
            5 => Op::BindVertexBuffers,
            6 => Op::BindIndexBuffer,
            7 => Op::SetViewport,
            8 => Op::SetScissor,
            9 => Op::SetLineWidth,
            10 => Op::SetDepthBias,
            11 => Op::SetBlendConstants,
            12 => Op::SetDepthBounds,
            13 => Op::Draw,
            14 => Op::DrawIndexed,
            15 => Op::UpdateBuffer,
            16 => Op::CopyImage,
            17 => Op::CopyBufferToImage,
            18 => Op::ImageMemoryBarrier,
            _ => return None,
        })
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct Begin {
    pub flags: CommandBufferUsage,
}

/// Followed by `size` raw bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct PushConstants {
    pub layout: Handle<PipelineLayout>,
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// Followed by `count` [`VertexBufferBinding`]s.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct BindVertexBuffers {
    pub first_binding: u32,
    pub count: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct VertexBufferBinding {
    pub buffer: Handle<Buffer>,
    _pad: u32,
    pub offset: u64,
}

impl VertexBufferBinding {
    pub fn new(buffer: Handle<Buffer>, offset: u64) -> Self {
        Self {
            buffer,
            _pad: 0,
            offset,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, NoUninit, CheckedBitPattern, PartialEq, Eq)]
pub struct BindIndexBuffer {
    pub buffer: Handle<Buffer>,
    pub index_type: IndexType,
    pub offset: u64,
}

/// Followed by `count` [`Viewport`]s.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct SetViewport {
    pub first_viewport: u32,
    pub count: u32,
}

/// Followed by `count` [`Rect2D`]s.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct SetScissor {
    pub first_scissor: u32,
    pub count: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct SetLineWidth {
    pub width: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct SetDepthBias {
    pub constant_factor: f32,
    pub clamp: f32,
    pub slope_factor: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct SetBlendConstants {
    pub constants: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct SetDepthBounds {
    pub min: f32,
    pub max: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct Draw {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct DrawIndexed {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

/// Followed by the bytes to write.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct UpdateBuffer {
    pub buffer: Handle<Buffer>,
    _pad: u32,
    pub offset: u64,
}

impl UpdateBuffer {
    pub fn new(buffer: Handle<Buffer>, offset: u64) -> Self {
        Self {
            buffer,
            _pad: 0,
            offset,
        }
    }
}

/// Followed by [`ImageCopy`] regions. The source is read in `TransferSrc`
/// layout and the destination written in `TransferDst` layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct CopyImage {
    pub src: Handle<Image>,
    pub dst: Handle<Image>,
}

/// Followed by [`BufferImageCopy`] regions. The image is written in
/// `TransferDst` layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct CopyBufferToImage {
    pub buffer: Handle<Buffer>,
    pub image: Handle<Image>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, NoUninit, CheckedBitPattern, PartialEq, Eq)]
pub struct ImageBarrier {
    pub image: Handle<Image>,
    pub aspect: AspectMask,
    pub range: SubresourceRange,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_stage: PipelineStageFlags,
    pub dst_stage: PipelineStageFlags,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
}

//===----------------------------------------------------------------------===//
// Command encoder & stream
//===----------------------------------------------------------------------===//

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct CmdHeader {
    op: u16,
    reserved: u16,
    len: u32,
    seq: u64,
}

const HEADER_SIZE: usize = std::mem::size_of::<CmdHeader>();

/// Append-only command stream.
///
/// Every record is `[header][payload][tail]`: a fixed header carrying the op,
/// the byte length of what follows and the record's sequence number, then a
/// `#[repr(C)]` payload and an optional slice of plain-data elements. The
/// sequence number is what binding tables use to point into the stream.
#[derive(Debug, Clone, Default)]
pub struct CommandEncoder {
    data: Vec<u8>,
    next_seq: u64,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            next_seq: 0,
        }
    }

    /// Clear all recorded commands while retaining the allocation. Sequence
    /// numbers restart at zero.
    pub fn reset(&mut self) {
        self.data.clear();
        self.next_seq = 0;
    }

    /// Sequence number the next pushed record will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Number of records in the stream.
    pub fn len(&self) -> usize {
        self.next_seq as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_seq == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn push_with_tail<T: NoUninit, U: NoUninit>(&mut self, op: Op, payload: &T, tail: &[U]) -> u64 {
        let payload = bytemuck::bytes_of(payload);
        let tail: &[u8] = bytemuck::cast_slice(tail);
        let seq = self.next_seq;
        let header = CmdHeader {
            op: op as u16,
            reserved: 0,
            len: (payload.len() + tail.len()) as u32,
            seq,
        };

        self.data
            .reserve(HEADER_SIZE + payload.len() + tail.len());
        self.data.extend_from_slice(bytemuck::bytes_of(&header));
        self.data.extend_from_slice(payload);
        self.data.extend_from_slice(tail);
        self.next_seq += 1;
        seq
    }

    #[inline]
    fn push<T: NoUninit>(&mut self, op: Op, payload: &T) -> u64 {
        self.push_with_tail::<T, u8>(op, payload, &[])
    }

    #[inline]
    fn push_op(&mut self, op: Op) -> u64 {
        self.push_with_tail::<[u8; 0], u8>(op, &[], &[])
    }

    pub fn begin(&mut self, flags: CommandBufferUsage) -> u64 {
        self.push(Op::Begin, &Begin { flags })
    }

    pub fn end(&mut self) -> u64 {
        self.push_op(Op::End)
    }

    pub fn next_subpass(&mut self) -> u64 {
        self.push_op(Op::NextSubpass)
    }

    pub fn end_render_pass(&mut self) -> u64 {
        self.push_op(Op::EndRenderPass)
    }

    pub fn push_constants(&mut self, cmd: &PushConstants, data: &[u8]) -> u64 {
        self.push_with_tail(Op::PushConstants, cmd, data)
    }

    pub fn bind_vertex_buffers(
        &mut self,
        first_binding: u32,
        buffers: &[VertexBufferBinding],
    ) -> u64 {
        let cmd = BindVertexBuffers {
            first_binding,
            count: buffers.len() as u32,
        };
        self.push_with_tail(Op::BindVertexBuffers, &cmd, buffers)
    }

    pub fn bind_index_buffer(&mut self, cmd: &BindIndexBuffer) -> u64 {
        self.push(Op::BindIndexBuffer, cmd)
    }

    pub fn set_viewport(&mut self, first_viewport: u32, viewports: &[Viewport]) -> u64 {
        let cmd = SetViewport {
            first_viewport,
            count: viewports.len() as u32,
        };
        self.push_with_tail(Op::SetViewport, &cmd, viewports)
    }

    pub fn set_scissor(&mut self, first_scissor: u32, scissors: &[Rect2D]) -> u64 {
        let cmd = SetScissor {
            first_scissor,
            count: scissors.len() as u32,
        };
        self.push_with_tail(Op::SetScissor, &cmd, scissors)
    }

    pub fn set_line_width(&mut self, width: f32) -> u64 {
        self.push(Op::SetLineWidth, &SetLineWidth { width })
    }

    pub fn set_depth_bias(&mut self, cmd: &SetDepthBias) -> u64 {
        self.push(Op::SetDepthBias, cmd)
    }

    pub fn set_blend_constants(&mut self, constants: [f32; 4]) -> u64 {
        self.push(Op::SetBlendConstants, &SetBlendConstants { constants })
    }

    pub fn set_depth_bounds(&mut self, min: f32, max: f32) -> u64 {
        self.push(Op::SetDepthBounds, &SetDepthBounds { min, max })
    }

    pub fn draw(&mut self, cmd: &Draw) -> u64 {
        self.push(Op::Draw, cmd)
    }

    pub fn draw_indexed(&mut self, cmd: &DrawIndexed) -> u64 {
        self.push(Op::DrawIndexed, cmd)
    }

    pub fn update_buffer(&mut self, cmd: &UpdateBuffer, data: &[u8]) -> u64 {
        self.push_with_tail(Op::UpdateBuffer, cmd, data)
    }

    pub fn copy_image(&mut self, cmd: &CopyImage, regions: &[ImageCopy]) -> u64 {
        self.push_with_tail(Op::CopyImage, cmd, regions)
    }

    pub fn copy_buffer_to_image(
        &mut self,
        cmd: &CopyBufferToImage,
        regions: &[BufferImageCopy],
    ) -> u64 {
        self.push_with_tail(Op::CopyBufferToImage, cmd, regions)
    }

    pub fn image_barrier(&mut self, cmd: &ImageBarrier) -> u64 {
        self.push(Op::ImageMemoryBarrier, cmd)
    }

    /// Iterate over recorded commands.
    pub fn iter(&self) -> CommandIter<'_> {
        CommandIter {
            data: &self.data,
            offset: 0,
        }
    }
}

//===----------------------------------------------------------------------===//
// Iteration
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone, Copy)]
pub struct Command<'a> {
    pub op: Op,
    pub seq: u64,
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> Command<'a> {
    /// Byte offset of this record's header in the stream.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn payload<T: CheckedBitPattern>(&self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let bytes = self
            .bytes
            .get(..size)
            .ok_or(GPUError::MalformedStream(self.offset))?;
        bytemuck::checked::try_pod_read_unaligned(bytes)
            .map_err(|_| GPUError::MalformedStream(self.offset))
    }

    /// Elements following a payload of type `T`.
    pub fn tail<T, U: AnyBitPattern>(&self) -> Result<Vec<U>> {
        let rest = self
            .bytes
            .get(std::mem::size_of::<T>()..)
            .ok_or(GPUError::MalformedStream(self.offset))?;
        let elem = std::mem::size_of::<U>();
        if elem == 0 || rest.len() % elem != 0 {
            return Err(GPUError::MalformedStream(self.offset));
        }
        Ok(rest
            .chunks_exact(elem)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Decodes the record and forwards it to `sink`.
    pub fn apply<S: CommandSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        match self.op {
            Op::Begin => sink.begin(&self.payload()?),
            Op::End => sink.end(),
            Op::NextSubpass => sink.next_subpass(),
            Op::EndRenderPass => sink.end_render_pass(),
            Op::PushConstants => {
                sink.push_constants(&self.payload()?, &self.tail::<PushConstants, u8>()?)
            }
            Op::BindVertexBuffers => {
                let cmd: BindVertexBuffers = self.payload()?;
                sink.bind_vertex_buffers(
                    cmd.first_binding,
                    &self.tail::<BindVertexBuffers, VertexBufferBinding>()?,
                )
            }
            Op::BindIndexBuffer => sink.bind_index_buffer(&self.payload()?),
            Op::SetViewport => {
                let cmd: SetViewport = self.payload()?;
                sink.set_viewport(cmd.first_viewport, &self.tail::<SetViewport, Viewport>()?)
            }
            Op::SetScissor => {
                let cmd: SetScissor = self.payload()?;
                sink.set_scissor(cmd.first_scissor, &self.tail::<SetScissor, Rect2D>()?)
            }
            Op::SetLineWidth => sink.set_line_width(&self.payload()?),
            Op::SetDepthBias => sink.set_depth_bias(&self.payload()?),
            Op::SetBlendConstants => sink.set_blend_constants(&self.payload()?),
            Op::SetDepthBounds => sink.set_depth_bounds(&self.payload()?),
            Op::Draw => sink.draw(&self.payload()?),
            Op::DrawIndexed => sink.draw_indexed(&self.payload()?),
            Op::UpdateBuffer => {
                sink.update_buffer(&self.payload()?, &self.tail::<UpdateBuffer, u8>()?)
            }
            Op::CopyImage => {
                sink.copy_image(&self.payload()?, &self.tail::<CopyImage, ImageCopy>()?)
            }
            Op::CopyBufferToImage => sink.copy_buffer_to_image(
                &self.payload()?,
                &self.tail::<CopyBufferToImage, BufferImageCopy>()?,
            ),
            Op::ImageMemoryBarrier => sink.image_barrier(&self.payload()?),
        }
    }
}

/// Walks a stream record by record. A truncated record or an unknown op
/// yields one `MalformedStream` error and ends the iteration.
pub struct CommandIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for CommandIter<'a> {
    type Item = Result<Command<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }

        let offset = self.offset;
        let Some(header) = self
            .data
            .get(..HEADER_SIZE)
            .map(bytemuck::pod_read_unaligned::<CmdHeader>)
        else {
            self.data = &[];
            return Some(Err(GPUError::MalformedStream(offset)));
        };

        let len = header.len as usize;
        let (Some(op), Some(bytes)) = (
            Op::from_u16(header.op),
            self.data.get(HEADER_SIZE..HEADER_SIZE + len),
        ) else {
            self.data = &[];
            return Some(Err(GPUError::MalformedStream(offset)));
        };

        self.data = &self.data[HEADER_SIZE + len..];
        self.offset += HEADER_SIZE + len;
        Some(Ok(Command {
            op,
            seq: header.seq,
            offset,
            bytes,
        }))
    }
}

/// Backend receiving a replayed recording.
pub trait CommandSink {
    fn begin(&mut self, cmd: &Begin) -> Result<()>;
    fn end(&mut self) -> Result<()>;
    fn begin_render_pass(&mut self, binding: &RenderPassBinding<'_>) -> Result<()>;
    fn next_subpass(&mut self) -> Result<()>;
    fn end_render_pass(&mut self) -> Result<()>;
    fn bind_pipeline(&mut self, binding: &PipelineBinding) -> Result<()>;
    fn bind_descriptor_set(&mut self, binding: &DescriptorSetBinding) -> Result<()>;
    fn push_constants(&mut self, cmd: &PushConstants, data: &[u8]) -> Result<()>;
    fn bind_vertex_buffers(
        &mut self,
        first_binding: u32,
        buffers: &[VertexBufferBinding],
    ) -> Result<()>;
    fn bind_index_buffer(&mut self, cmd: &BindIndexBuffer) -> Result<()>;
    fn set_viewport(&mut self, first_viewport: u32, viewports: &[Viewport]) -> Result<()>;
    fn set_scissor(&mut self, first_scissor: u32, scissors: &[Rect2D]) -> Result<()>;
    fn set_line_width(&mut self, cmd: &SetLineWidth) -> Result<()>;
    fn set_depth_bias(&mut self, cmd: &SetDepthBias) -> Result<()>;
    fn set_blend_constants(&mut self, cmd: &SetBlendConstants) -> Result<()>;
    fn set_depth_bounds(&mut self, cmd: &SetDepthBounds) -> Result<()>;
    fn draw(&mut self, cmd: &Draw) -> Result<()>;
    fn draw_indexed(&mut self, cmd: &DrawIndexed) -> Result<()>;
    fn update_buffer(&mut self, cmd: &UpdateBuffer, data: &[u8]) -> Result<()>;
    fn copy_image(&mut self, cmd: &CopyImage, regions: &[ImageCopy]) -> Result<()>;
    fn copy_buffer_to_image(
        &mut self,
        cmd: &CopyBufferToImage,
        regions: &[BufferImageCopy],
    ) -> Result<()>;
    fn image_barrier(&mut self, cmd: &ImageBarrier) -> Result<()>;
}

//===----------------------------------------------------------------------===//
// Tests
//===----------------------------------------------------------------------===//

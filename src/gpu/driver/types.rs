use std::collections::BTreeMap;

use bitflags::bitflags;
use bytemuck::{CheckedBitPattern, NoUninit, Pod, Zeroable};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::utils::Handle;

// Object kinds referenced through `Handle<T>`. None of them are owned by the
// recorder; the device (or whatever implements the object cache) owns them.
#[derive(Debug)]
pub struct Buffer;
#[derive(Debug)]
pub struct Image;
#[derive(Debug)]
pub struct Sampler;
#[derive(Debug)]
pub struct RenderPass;
#[derive(Debug)]
pub struct Framebuffer;
#[derive(Debug)]
pub struct GraphicsPipeline;
#[derive(Debug)]
pub struct DescriptorSet;

/// Mirrors `VK_QUEUE_FAMILY_IGNORED`.
pub const QUEUE_FAMILY_IGNORED: u32 = u32::MAX;

#[repr(C)]
#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Format {
    R8Sint,
    R8Uint,
    RGB8,
    BGRA8,
    BGRA8Unorm,
    #[default]
    RGBA8,
    RGBA8Unorm,
    RGBA16F,
    RGBA32F,
    D16,
    D32F,
    S8,
    D16S8,
    D24S8,
    D32FS8,
}

impl Format {
    pub fn is_depth_only(&self) -> bool {
        matches!(self, Format::D16 | Format::D32F)
    }

    /// True for every format carrying a depth aspect, with or without stencil.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, Format::D16S8 | Format::D24S8 | Format::D32FS8) || self.is_depth_only()
    }

    pub fn has_stencil(&self) -> bool {
        matches!(self, Format::S8 | Format::D16S8 | Format::D24S8 | Format::D32FS8)
    }

    pub fn bits_per_pixel(&self) -> u32 {
        match self {
            Format::R8Sint | Format::R8Uint | Format::S8 => 8,
            Format::D16 => 16,
            Format::RGB8 | Format::D16S8 => 24,
            Format::BGRA8
            | Format::BGRA8Unorm
            | Format::RGBA8
            | Format::RGBA8Unorm
            | Format::D32F
            | Format::D24S8 => 32,
            Format::D32FS8 => 40,
            Format::RGBA16F => 64,
            Format::RGBA32F => 128,
        }
    }

    pub fn aspect(&self) -> AspectMask {
        if self.is_depth_stencil() {
            let mut mask = AspectMask::DEPTH;
            if self.has_stencil() {
                mask |= AspectMask::STENCIL;
            }
            mask
        } else if *self == Format::S8 {
            AspectMask::STENCIL
        } else {
            AspectMask::COLOR
        }
    }
}

#[repr(C)]
#[derive(Hash, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SampleCount {
    #[default]
    S1,
    S2,
    S4,
    S8,
    S16,
    S32,
    S64,
}

impl SampleCount {
    pub fn samples(&self) -> u32 {
        match self {
            SampleCount::S1 => 1,
            SampleCount::S2 => 2,
            SampleCount::S4 => 4,
            SampleCount::S8 => 8,
            SampleCount::S16 => 16,
            SampleCount::S32 => 32,
            SampleCount::S64 => 64,
        }
    }
}

/// Backend-agnostic image layout.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, NoUninit, CheckedBitPattern)]
pub enum ImageLayout {
    #[default]
    Undefined = 0,
    General = 1,
    ColorAttachment = 2,
    DepthStencilAttachment = 3,
    DepthStencilReadOnly = 4,
    ShaderReadOnly = 5,
    TransferSrc = 6,
    TransferDst = 7,
    Present = 8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, NoUninit, CheckedBitPattern)]
pub enum IndexType {
    U16 = 0,
    U32 = 1,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PipelineBindPoint {
    #[default]
    Graphics,
    Compute,
}

#[derive(Hash, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LoadOp {
    Load,
    #[default]
    Clear,
    DontCare,
}

#[derive(Hash, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StoreOp {
    #[default]
    Store,
    DontCare,
}

/// Load/store policy of one render-pass attachment.
#[derive(Hash, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoadStoreInfo {
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    ColorUint([u32; 4]),
    ColorInt([i32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl Default for ClearValue {
    fn default() -> Self {
        ClearValue::Color([0.0; 4])
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 0x1;
        const TESSELLATION_CONTROL = 0x2;
        const TESSELLATION_EVALUATION = 0x4;
        const GEOMETRY = 0x8;
        const FRAGMENT = 0x10;
        const COMPUTE = 0x20;
        const ALL_GRAPHICS = 0x1f;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AspectMask: u32 {
        const COLOR = 0x1;
        const DEPTH = 0x2;
        const STENCIL = 0x4;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const INPUT_ATTACHMENT_READ = 0x10;
        const SHADER_READ = 0x20;
        const SHADER_WRITE = 0x40;
        const COLOR_ATTACHMENT_READ = 0x80;
        const COLOR_ATTACHMENT_WRITE = 0x100;
        const DEPTH_STENCIL_ATTACHMENT_READ = 0x200;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 0x400;
        const TRANSFER_READ = 0x800;
        const TRANSFER_WRITE = 0x1000;
        const HOST_READ = 0x2000;
        const HOST_WRITE = 0x4000;
        const MEMORY_READ = 0x8000;
        const MEMORY_WRITE = 0x10000;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 0x1;
        const VERTEX_INPUT = 0x4;
        const VERTEX_SHADER = 0x8;
        const FRAGMENT_SHADER = 0x80;
        const EARLY_FRAGMENT_TESTS = 0x100;
        const LATE_FRAGMENT_TESTS = 0x200;
        const COLOR_ATTACHMENT_OUTPUT = 0x400;
        const COMPUTE_SHADER = 0x800;
        const TRANSFER = 0x1000;
        const BOTTOM_OF_PIPE = 0x2000;
        const ALL_GRAPHICS = 0x8000;
        const ALL_COMMANDS = 0x10000;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandBufferUsage: u32 {
        const ONE_TIME_SUBMIT = 0x1;
        const RENDER_PASS_CONTINUE = 0x2;
        const SIMULTANEOUS_USE = 0x4;
    }
}

unsafe impl Zeroable for ShaderStageFlags {}
unsafe impl Pod for ShaderStageFlags {}
unsafe impl Zeroable for AspectMask {}
unsafe impl Pod for AspectMask {}
unsafe impl Zeroable for AccessFlags {}
unsafe impl Pod for AccessFlags {}
unsafe impl Zeroable for PipelineStageFlags {}
unsafe impl Pod for PipelineStageFlags {}
unsafe impl Zeroable for CommandBufferUsage {}
unsafe impl Pod for CommandBufferUsage {}

#[repr(C)]
#[derive(Debug, Hash, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Hash, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Offset3D {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[repr(C)]
#[derive(Debug, Hash, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[repr(C)]
#[derive(Default, Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq, Hash)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1024.0,
            height: 1024.0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct SubresourceRange {
    pub base_mip: u32,
    pub level_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl Default for SubresourceRange {
    fn default() -> Self {
        Self {
            base_mip: Default::default(),
            level_count: 1,
            base_layer: Default::default(),
            layer_count: 1,
        }
    }
}

impl SubresourceRange {
    pub fn new(base_mip: u32, level_count: u32, base_layer: u32, layer_count: u32) -> Self {
        Self {
            base_mip,
            level_count,
            base_layer,
            layer_count,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct SubresourceLayers {
    pub aspect: AspectMask,
    pub mip_level: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl Default for SubresourceLayers {
    fn default() -> Self {
        Self {
            aspect: AspectMask::COLOR,
            mip_level: 0,
            base_layer: 0,
            layer_count: 1,
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct ImageCopy {
    pub src_subresource: SubresourceLayers,
    pub src_offset: Offset3D,
    pub dst_subresource: SubresourceLayers,
    pub dst_offset: Offset3D,
    pub extent: Extent3D,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct BufferImageCopy {
    pub buffer_offset: u64,
    pub buffer_row_length: u32,
    pub buffer_image_height: u32,
    pub image_subresource: SubresourceLayers,
    pub image_offset: Offset3D,
    pub image_extent: Extent3D,
}

/// A view over (part of) an image, as seen by descriptors and render targets.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ImageView {
    pub img: Handle<Image>,
    pub format: Format,
    pub range: SubresourceRange,
}

impl ImageView {
    pub fn new(img: Handle<Image>, format: Format) -> Self {
        Self {
            img,
            format,
            range: SubresourceRange::default(),
        }
    }

    pub fn aspect(&self) -> AspectMask {
        self.format.aspect()
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attachment {
    pub format: Format,
    pub samples: SampleCount,
}

/// The set of image views a render pass draws into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    extent: Extent2D,
    views: Vec<ImageView>,
    attachments: Vec<Attachment>,
}

impl RenderTarget {
    pub fn new(extent: Extent2D, views: Vec<ImageView>) -> Self {
        let attachments = views
            .iter()
            .map(|view| Attachment {
                format: view.format,
                samples: SampleCount::S1,
            })
            .collect();

        Self {
            extent,
            views,
            attachments,
        }
    }

    /// Overrides the sample count of every attachment.
    pub fn with_samples(mut self, samples: SampleCount) -> Self {
        for attachment in &mut self.attachments {
            attachment.samples = samples;
        }
        self
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn views(&self) -> &[ImageView] {
        &self.views
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageMemoryBarrier {
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_access_mask: AccessFlags,
    pub dst_access_mask: AccessFlags,
    pub src_stage_mask: PipelineStageFlags,
    pub dst_stage_mask: PipelineStageFlags,
    pub old_queue_family: u32,
    pub new_queue_family: u32,
}

impl Default for ImageMemoryBarrier {
    fn default() -> Self {
        Self {
            old_layout: ImageLayout::Undefined,
            new_layout: ImageLayout::Undefined,
            src_access_mask: AccessFlags::empty(),
            dst_access_mask: AccessFlags::empty(),
            src_stage_mask: PipelineStageFlags::BOTTOM_OF_PIPE,
            dst_stage_mask: PipelineStageFlags::TOP_OF_PIPE,
            old_queue_family: QUEUE_FAMILY_IGNORED,
            new_queue_family: QUEUE_FAMILY_IGNORED,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorBufferInfo {
    pub buffer: Handle<Buffer>,
    pub offset: u64,
    pub range: u64,
}

/// `view` is `None` for sampler-only descriptors, whose `layout` is then
/// `Undefined`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorImageInfo {
    pub sampler: Option<Handle<Sampler>>,
    pub view: Option<ImageView>,
    pub layout: ImageLayout,
}

/// binding index -> array element -> T
pub type BindingMap<T> = BTreeMap<u32, BTreeMap<u32, T>>;

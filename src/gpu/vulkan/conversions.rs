use ash::vk;

use crate::gpu::driver::state::{
    BlendFactor, BlendOp, ColorBlendAttachmentState, CompareOp, CullMode, PolygonMode, StencilOp,
    Topology, VertexFormat, VertexOrdering, VertexRate, WriteMask,
};
use crate::gpu::driver::types::{
    AccessFlags, AspectMask, BufferImageCopy, ClearValue, CommandBufferUsage, DescriptorType,
    Extent2D, Extent3D, Format, ImageCopy, ImageLayout, IndexType, LoadOp, Offset3D,
    PipelineBindPoint, PipelineStageFlags, Rect2D, SampleCount, ShaderStageFlags, StoreOp,
    SubresourceLayers, SubresourceRange, Viewport,
};

impl From<Format> for vk::Format {
    fn from(fmt: Format) -> Self {
        match fmt {
            Format::R8Sint => vk::Format::R8_SINT,
            Format::R8Uint => vk::Format::R8_UINT,
            Format::RGB8 => vk::Format::R8G8B8_SRGB,
            Format::BGRA8 => vk::Format::B8G8R8A8_SRGB,
            Format::BGRA8Unorm => vk::Format::B8G8R8A8_UNORM,
            Format::RGBA8 => vk::Format::R8G8B8A8_SRGB,
            Format::RGBA8Unorm => vk::Format::R8G8B8A8_UNORM,
            Format::RGBA16F => vk::Format::R16G16B16A16_SFLOAT,
            Format::RGBA32F => vk::Format::R32G32B32A32_SFLOAT,
            Format::D16 => vk::Format::D16_UNORM,
            Format::D32F => vk::Format::D32_SFLOAT,
            Format::S8 => vk::Format::S8_UINT,
            Format::D16S8 => vk::Format::D16_UNORM_S8_UINT,
            Format::D24S8 => vk::Format::D24_UNORM_S8_UINT,
            Format::D32FS8 => vk::Format::D32_SFLOAT_S8_UINT,
        }
    }
}

impl From<SampleCount> for vk::SampleCountFlags {
    fn from(samples: SampleCount) -> Self {
        match samples {
            SampleCount::S1 => vk::SampleCountFlags::TYPE_1,
            SampleCount::S2 => vk::SampleCountFlags::TYPE_2,
            SampleCount::S4 => vk::SampleCountFlags::TYPE_4,
            SampleCount::S8 => vk::SampleCountFlags::TYPE_8,
            SampleCount::S16 => vk::SampleCountFlags::TYPE_16,
            SampleCount::S32 => vk::SampleCountFlags::TYPE_32,
            SampleCount::S64 => vk::SampleCountFlags::TYPE_64,
        }
    }
}

impl From<ImageLayout> for vk::ImageLayout {
    fn from(layout: ImageLayout) -> Self {
        match layout {
            ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
            ImageLayout::General => vk::ImageLayout::GENERAL,
            ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ImageLayout::DepthStencilAttachment => {
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            }
            ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            ImageLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }
}

impl From<DescriptorType> for vk::DescriptorType {
    fn from(ty: DescriptorType) -> Self {
        match ty {
            DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
            DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
            DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
            DescriptorType::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            DescriptorType::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
            DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            DescriptorType::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
            DescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
        }
    }
}

impl From<IndexType> for vk::IndexType {
    fn from(ty: IndexType) -> Self {
        match ty {
            IndexType::U16 => vk::IndexType::UINT16,
            IndexType::U32 => vk::IndexType::UINT32,
        }
    }
}

impl From<PipelineBindPoint> for vk::PipelineBindPoint {
    fn from(point: PipelineBindPoint) -> Self {
        match point {
            PipelineBindPoint::Graphics => vk::PipelineBindPoint::GRAPHICS,
            PipelineBindPoint::Compute => vk::PipelineBindPoint::COMPUTE,
        }
    }
}

impl From<LoadOp> for vk::AttachmentLoadOp {
    fn from(op: LoadOp) -> Self {
        match op {
            LoadOp::Load => vk::AttachmentLoadOp::LOAD,
            LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
            LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
        }
    }
}

impl From<StoreOp> for vk::AttachmentStoreOp {
    fn from(op: StoreOp) -> Self {
        match op {
            StoreOp::Store => vk::AttachmentStoreOp::STORE,
            StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
        }
    }
}

impl From<ClearValue> for vk::ClearValue {
    fn from(value: ClearValue) -> Self {
        match value {
            ClearValue::Color(float32) => vk::ClearValue {
                color: vk::ClearColorValue { float32 },
            },
            ClearValue::ColorUint(uint32) => vk::ClearValue {
                color: vk::ClearColorValue { uint32 },
            },
            ClearValue::ColorInt(int32) => vk::ClearValue {
                color: vk::ClearColorValue { int32 },
            },
            ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
            },
        }
    }
}

// Our flag types share Vulkan's bit values.

impl From<ShaderStageFlags> for vk::ShaderStageFlags {
    fn from(flags: ShaderStageFlags) -> Self {
        vk::ShaderStageFlags::from_raw(flags.bits())
    }
}

impl From<AspectMask> for vk::ImageAspectFlags {
    fn from(flags: AspectMask) -> Self {
        vk::ImageAspectFlags::from_raw(flags.bits())
    }
}

impl From<AccessFlags> for vk::AccessFlags {
    fn from(flags: AccessFlags) -> Self {
        vk::AccessFlags::from_raw(flags.bits())
    }
}

impl From<PipelineStageFlags> for vk::PipelineStageFlags {
    fn from(flags: PipelineStageFlags) -> Self {
        vk::PipelineStageFlags::from_raw(flags.bits())
    }
}

impl From<CommandBufferUsage> for vk::CommandBufferUsageFlags {
    fn from(flags: CommandBufferUsage) -> Self {
        vk::CommandBufferUsageFlags::from_raw(flags.bits())
    }
}

impl From<Extent2D> for vk::Extent2D {
    fn from(extent: Extent2D) -> Self {
        vk::Extent2D {
            width: extent.width,
            height: extent.height,
        }
    }
}

impl From<Extent3D> for vk::Extent3D {
    fn from(extent: Extent3D) -> Self {
        vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: extent.depth,
        }
    }
}

impl From<Offset3D> for vk::Offset3D {
    fn from(offset: Offset3D) -> Self {
        vk::Offset3D {
            x: offset.x,
            y: offset.y,
            z: offset.z,
        }
    }
}

impl From<Rect2D> for vk::Rect2D {
    fn from(rect: Rect2D) -> Self {
        vk::Rect2D {
            offset: vk::Offset2D {
                x: rect.x,
                y: rect.y,
            },
            extent: vk::Extent2D {
                width: rect.w,
                height: rect.h,
            },
        }
    }
}

impl From<Viewport> for vk::Viewport {
    fn from(vp: Viewport) -> Self {
        vk::Viewport {
            x: vp.x,
            y: vp.y,
            width: vp.width,
            height: vp.height,
            min_depth: vp.min_depth,
            max_depth: vp.max_depth,
        }
    }
}

pub(super) fn subresource_range(
    aspect: AspectMask,
    range: SubresourceRange,
) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect.into(),
        base_mip_level: range.base_mip,
        level_count: range.level_count,
        base_array_layer: range.base_layer,
        layer_count: range.layer_count,
    }
}

impl From<SubresourceLayers> for vk::ImageSubresourceLayers {
    fn from(layers: SubresourceLayers) -> Self {
        vk::ImageSubresourceLayers {
            aspect_mask: layers.aspect.into(),
            mip_level: layers.mip_level,
            base_array_layer: layers.base_layer,
            layer_count: layers.layer_count,
        }
    }
}

impl From<ImageCopy> for vk::ImageCopy {
    fn from(region: ImageCopy) -> Self {
        vk::ImageCopy {
            src_subresource: region.src_subresource.into(),
            src_offset: region.src_offset.into(),
            dst_subresource: region.dst_subresource.into(),
            dst_offset: region.dst_offset.into(),
            extent: region.extent.into(),
        }
    }
}

impl From<BufferImageCopy> for vk::BufferImageCopy {
    fn from(region: BufferImageCopy) -> Self {
        vk::BufferImageCopy {
            buffer_offset: region.buffer_offset,
            buffer_row_length: region.buffer_row_length,
            buffer_image_height: region.buffer_image_height,
            image_subresource: region.image_subresource.into(),
            image_offset: region.image_offset.into(),
            image_extent: region.image_extent.into(),
        }
    }
}

//===----------------------------------------------------------------------===//
// Fixed-function state, for factories building native pipelines.
//===----------------------------------------------------------------------===//

impl From<Topology> for vk::PrimitiveTopology {
    fn from(topology: Topology) -> Self {
        match topology {
            Topology::PointList => vk::PrimitiveTopology::POINT_LIST,
            Topology::LineList => vk::PrimitiveTopology::LINE_LIST,
            Topology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
            Topology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            Topology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
            Topology::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
        }
    }
}

impl From<PolygonMode> for vk::PolygonMode {
    fn from(mode: PolygonMode) -> Self {
        match mode {
            PolygonMode::Fill => vk::PolygonMode::FILL,
            PolygonMode::Line => vk::PolygonMode::LINE,
            PolygonMode::Point => vk::PolygonMode::POINT,
        }
    }
}

impl From<CullMode> for vk::CullModeFlags {
    fn from(mode: CullMode) -> Self {
        match mode {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
            CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
        }
    }
}

impl From<VertexOrdering> for vk::FrontFace {
    fn from(ordering: VertexOrdering) -> Self {
        match ordering {
            VertexOrdering::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            VertexOrdering::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

impl From<CompareOp> for vk::CompareOp {
    fn from(op: CompareOp) -> Self {
        match op {
            CompareOp::Never => vk::CompareOp::NEVER,
            CompareOp::Less => vk::CompareOp::LESS,
            CompareOp::Equal => vk::CompareOp::EQUAL,
            CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareOp::Greater => vk::CompareOp::GREATER,
            CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
            CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
            CompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

impl From<StencilOp> for vk::StencilOp {
    fn from(op: StencilOp) -> Self {
        match op {
            StencilOp::Keep => vk::StencilOp::KEEP,
            StencilOp::Zero => vk::StencilOp::ZERO,
            StencilOp::Replace => vk::StencilOp::REPLACE,
            StencilOp::IncrementAndClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
            StencilOp::DecrementAndClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
            StencilOp::Invert => vk::StencilOp::INVERT,
            StencilOp::IncrementAndWrap => vk::StencilOp::INCREMENT_AND_WRAP,
            StencilOp::DecrementAndWrap => vk::StencilOp::DECREMENT_AND_WRAP,
        }
    }
}

impl From<VertexFormat> for vk::Format {
    fn from(format: VertexFormat) -> Self {
        match format {
            VertexFormat::Float => vk::Format::R32_SFLOAT,
            VertexFormat::Vec2 => vk::Format::R32G32_SFLOAT,
            VertexFormat::Vec3 => vk::Format::R32G32B32_SFLOAT,
            VertexFormat::Vec4 => vk::Format::R32G32B32A32_SFLOAT,
            VertexFormat::IVec4 => vk::Format::R32G32B32A32_SINT,
            VertexFormat::UVec4 => vk::Format::R32G32B32A32_UINT,
        }
    }
}

impl From<VertexRate> for vk::VertexInputRate {
    fn from(rate: VertexRate) -> Self {
        match rate {
            VertexRate::Vertex => vk::VertexInputRate::VERTEX,
            VertexRate::Instance => vk::VertexInputRate::INSTANCE,
        }
    }
}

impl From<BlendFactor> for vk::BlendFactor {
    fn from(op: BlendFactor) -> Self {
        match op {
            BlendFactor::One => vk::BlendFactor::ONE,
            BlendFactor::Zero => vk::BlendFactor::ZERO,
            BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
            BlendFactor::InvSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
            BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
            BlendFactor::InvSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
            BlendFactor::InvDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
            BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
            BlendFactor::InvDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
            BlendFactor::BlendFactor => vk::BlendFactor::CONSTANT_ALPHA,
        }
    }
}

impl From<BlendOp> for vk::BlendOp {
    fn from(op: BlendOp) -> Self {
        match op {
            BlendOp::Add => vk::BlendOp::ADD,
            BlendOp::Subtract => vk::BlendOp::SUBTRACT,
            BlendOp::InvSubtract => vk::BlendOp::REVERSE_SUBTRACT,
            BlendOp::Min => vk::BlendOp::MIN,
            BlendOp::Max => vk::BlendOp::MAX,
        }
    }
}

impl From<WriteMask> for vk::ColorComponentFlags {
    fn from(mask: WriteMask) -> Self {
        let mut flags = vk::ColorComponentFlags::empty();
        if mask.r {
            flags |= vk::ColorComponentFlags::R;
        }
        if mask.g {
            flags |= vk::ColorComponentFlags::G;
        }
        if mask.b {
            flags |= vk::ColorComponentFlags::B;
        }
        if mask.a {
            flags |= vk::ColorComponentFlags::A;
        }
        flags
    }
}

impl From<ColorBlendAttachmentState> for vk::PipelineColorBlendAttachmentState {
    fn from(state: ColorBlendAttachmentState) -> Self {
        vk::PipelineColorBlendAttachmentState::builder()
            .blend_enable(state.blend_enable)
            .src_color_blend_factor(state.src_color_blend_factor.into())
            .dst_color_blend_factor(state.dst_color_blend_factor.into())
            .color_blend_op(state.color_blend_op.into())
            .src_alpha_blend_factor(state.src_alpha_blend_factor.into())
            .dst_alpha_blend_factor(state.dst_alpha_blend_factor.into())
            .alpha_blend_op(state.alpha_blend_op.into())
            .color_write_mask(state.write_mask.into())
            .build()
    }
}

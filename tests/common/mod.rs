#![allow(dead_code)]

use deferred_gfx::gpu::driver::layout::{PipelineLayout, ShaderResource};
use deferred_gfx::{
    Extent2D, Format, HeadlessFactory, ImageView, RenderTarget, ResourceCache, ShaderStageFlags,
};
use deferred_gfx::Handle;

pub type Cache = ResourceCache<HeadlessFactory>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn cache() -> Cache {
    init_logging();
    ResourceCache::new(HeadlessFactory::default())
}

pub fn view(slot: u16, format: Format) -> ImageView {
    ImageView::new(Handle::new(slot, 0), format)
}

/// `count` RGBA8 color attachments at 640x480.
pub fn color_target(count: u16) -> RenderTarget {
    let views = (0..count).map(|i| view(i, Format::RGBA8)).collect();
    RenderTarget::new(
        Extent2D {
            width: 640,
            height: 480,
        },
        views,
    )
}

/// One uniform buffer at set 0 binding 0, fragment output at location 0.
pub fn simple_layout(cache: &Cache) -> PipelineLayout {
    PipelineLayout::new(
        cache,
        vec![
            ShaderResource::uniform_buffer(ShaderStageFlags::VERTEX, "camera", 0, 0),
            ShaderResource::output(ShaderStageFlags::FRAGMENT, "color", 0),
        ],
    )
    .expect("simple layout")
}

/// Uniform at (0, 0), combined sampler at (0, 1), 64 bytes of vertex push
/// constants and one fragment output.
pub fn textured_layout(cache: &Cache) -> PipelineLayout {
    PipelineLayout::new(
        cache,
        vec![
            ShaderResource::uniform_buffer(ShaderStageFlags::VERTEX, "camera", 0, 0),
            ShaderResource::image_sampler(ShaderStageFlags::FRAGMENT, "albedo", 0, 1),
            ShaderResource::push_constant(ShaderStageFlags::VERTEX, "model", 0, 64),
            ShaderResource::output(ShaderStageFlags::FRAGMENT, "color", 0),
        ],
    )
    .expect("textured layout")
}

mod common;

use std::collections::BTreeSet;

use common::Cache;
use deferred_gfx::gpu::driver::layout::{PipelineLayout, ShaderResource};
use deferred_gfx::gpu::driver::state::{CullMode, RasterizationState};
use deferred_gfx::*;

fn open_pass<'a>(
    rec: &mut CommandRecorder<'a, Cache>,
    target: &'a RenderTarget,
    layout: &'a PipelineLayout,
) {
    rec.begin(CommandBufferUsage::ONE_TIME_SUBMIT);
    rec.begin_render_pass(target, &[LoadStoreInfo::default()], &[ClearValue::default()]);
    rec.bind_pipeline_layout(layout);
}

fn buffer(slot: u16) -> Handle<Buffer> {
    Handle::new(slot, 0)
}

#[test]
fn end_to_end_single_draw() {
    let cache = common::cache();
    let layout = common::simple_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    rec.bind_pipeline_layout(&layout);
    rec.begin_render_pass(&target, &[LoadStoreInfo::default()], &[ClearValue::default()]);
    rec.bind_buffer(buffer(7), 0, 256, 0, 0, 0);
    rec.draw(3, 1, 0, 0).unwrap();
    rec.end_render_pass().unwrap();

    assert_eq!(rec.pipeline_bindings().len(), 1);
    assert_eq!(rec.descriptor_set_bindings().len(), 1);

    let set = rec.descriptor_set_bindings()[0];
    assert_eq!(set.set_index, 0);
    assert_eq!(set.layout, layout.handle());
    let factory = cache.factory();
    let key = factory.descriptor_set(set.descriptor_set).unwrap();
    assert_eq!(key.buffer_infos.len(), 1);
    assert_eq!(key.buffer_infos[&0].len(), 1);
    assert_eq!(key.buffer_infos[&0][&0].buffer, buffer(7));
    assert_eq!(key.buffer_infos[&0][&0].range, 256);
    assert!(key.image_infos.is_empty());

    let pass = &rec.render_pass_bindings()[0];
    assert_eq!(pass.subpasses.len(), 1);
    assert_eq!(pass.subpasses[0].output_attachments, BTreeSet::from([0]));
    assert!(pass.subpasses[0].input_attachments.is_empty());
}

#[test]
fn pipeline_flush_runs_once_per_state_change() {
    let cache = common::cache();
    let layout = common::simple_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    open_pass(&mut rec, &target, &layout);
    rec.set_rasterization_state(RasterizationState {
        cull_mode: CullMode::Front,
        ..Default::default()
    });
    rec.set_rasterization_state(RasterizationState {
        cull_mode: CullMode::None,
        ..Default::default()
    });
    rec.draw(3, 1, 0, 0).unwrap();
    rec.draw(3, 1, 3, 0).unwrap();
    assert!(!rec.pipeline_state().is_dirty());

    rec.set_rasterization_state(RasterizationState::default());
    rec.draw(3, 1, 6, 0).unwrap();

    let requests = &rec.render_pass_bindings()[0].subpasses[0].pipeline_requests;
    assert_eq!(requests.len(), 2);
    // `begin` is record 0, the draws are 1, 2 and 3.
    assert_eq!(requests[0].seq, 1);
    assert_eq!(requests[0].state.rasterization.cull_mode, CullMode::None);
    assert_eq!(requests[1].seq, 3);
    assert_eq!(requests[1].state.rasterization.cull_mode, CullMode::Back);

    rec.end_render_pass().unwrap();
    let pipelines = rec.pipeline_bindings();
    assert_eq!(pipelines.len(), 2);
    assert_ne!(pipelines[0].pipeline, pipelines[1].pipeline);
    assert_eq!(cache.factory().graphics_pipeline_count(), 2);
}

#[test]
fn repeated_state_hits_the_pipeline_cache() {
    let cache = common::cache();
    let layout = common::simple_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    open_pass(&mut rec, &target, &layout);
    rec.draw(3, 1, 0, 0).unwrap();
    rec.set_rasterization_state(RasterizationState::default());
    rec.draw(3, 1, 0, 0).unwrap();
    rec.end_render_pass().unwrap();

    let pipelines = rec.pipeline_bindings();
    assert_eq!(pipelines.len(), 2);
    assert_eq!(pipelines[0].pipeline, pipelines[1].pipeline);
    assert_eq!(cache.factory().graphics_pipeline_count(), 1);
}

#[test]
fn unmatched_bindings_are_left_out_of_descriptor_sets() {
    let cache = common::cache();
    let layout = PipelineLayout::new(
        &cache,
        vec![
            ShaderResource::uniform_buffer(ShaderStageFlags::VERTEX, "camera", 0, 0),
            ShaderResource::storage_buffer(ShaderStageFlags::VERTEX, "instances", 0, 1),
            ShaderResource::output(ShaderStageFlags::FRAGMENT, "color", 0),
        ],
    )
    .unwrap();
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    open_pass(&mut rec, &target, &layout);
    rec.bind_buffer(buffer(1), 0, 64, 0, 0, 0);
    rec.bind_buffer(buffer(2), 0, 1024, 0, 1, 0);
    rec.bind_buffer(buffer(3), 0, 16, 0, 5, 0);
    rec.draw(3, 1, 0, 0).unwrap();

    let set = rec.descriptor_set_bindings()[0];
    let factory = cache.factory();
    let key = factory.descriptor_set(set.descriptor_set).unwrap();
    let bound: Vec<Handle<Buffer>> = key
        .buffer_infos
        .values()
        .flat_map(|elements| elements.values())
        .map(|info| info.buffer)
        .collect();
    assert_eq!(bound, vec![buffer(1), buffer(2)]);
}

#[test]
fn sets_missing_from_the_layout_are_skipped() {
    let cache = common::cache();
    let layout = PipelineLayout::new(
        &cache,
        vec![
            ShaderResource::uniform_buffer(ShaderStageFlags::VERTEX, "camera", 0, 0),
            ShaderResource::uniform_buffer(ShaderStageFlags::FRAGMENT, "material", 1, 0),
        ],
    )
    .unwrap();
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    open_pass(&mut rec, &target, &layout);
    for set in 0..3 {
        rec.bind_buffer(buffer(set as u16), 0, 64, set, 0, 0);
    }
    rec.draw(3, 1, 0, 0).unwrap();

    let sets: Vec<u32> = rec
        .descriptor_set_bindings()
        .iter()
        .map(|b| b.set_index)
        .collect();
    assert_eq!(sets, vec![0, 1]);
    assert_eq!(
        rec.bound_set_layouts().keys().copied().collect::<Vec<_>>(),
        vec![0, 1]
    );
    assert!(!rec.resource_binding_state().set(2).unwrap().is_dirty());
}

#[test]
fn image_layouts_follow_descriptor_type() {
    let cache = common::cache();
    let layout = PipelineLayout::new(
        &cache,
        vec![
            ShaderResource::image_sampler(ShaderStageFlags::FRAGMENT, "albedo", 0, 0),
            ShaderResource::image_sampler(ShaderStageFlags::FRAGMENT, "shadow", 0, 1),
            ShaderResource::image_storage(ShaderStageFlags::FRAGMENT, "scratch", 0, 2),
            ShaderResource::image(ShaderStageFlags::FRAGMENT, "plain", 0, 3),
            ShaderResource::output(ShaderStageFlags::FRAGMENT, "color", 0),
        ],
    )
    .unwrap();
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());
    let sampler = Some(Handle::new(0, 0));

    open_pass(&mut rec, &target, &layout);
    rec.bind_image(common::view(10, Format::RGBA8), sampler, 0, 0, 0);
    rec.bind_image(common::view(11, Format::D32F), sampler, 0, 1, 0);
    rec.bind_image(common::view(12, Format::D24S8), None, 0, 2, 0);
    rec.bind_image(common::view(13, Format::RGBA8), None, 0, 3, 0);
    rec.draw(3, 1, 0, 0).unwrap();

    let set = rec.descriptor_set_bindings()[0];
    let factory = cache.factory();
    let key = factory.descriptor_set(set.descriptor_set).unwrap();
    let layouts: Vec<(u32, ImageLayout)> = key
        .image_infos
        .iter()
        .map(|(binding, elements)| (*binding, elements[&0].layout))
        .collect();
    assert_eq!(
        layouts,
        vec![
            (0, ImageLayout::ShaderReadOnly),
            (1, ImageLayout::DepthStencilReadOnly),
            (2, ImageLayout::General),
        ]
    );
    assert_eq!(key.image_infos[&1][&0].sampler, sampler);
}

#[test]
fn sampler_bindings_produce_sampler_only_descriptors() {
    let cache = common::cache();
    let layout = PipelineLayout::new(
        &cache,
        vec![
            ShaderResource::sampler(ShaderStageFlags::FRAGMENT, "linear", 0, 0),
            ShaderResource::sampler(ShaderStageFlags::FRAGMENT, "nearest", 0, 1),
            ShaderResource::output(ShaderStageFlags::FRAGMENT, "color", 0),
        ],
    )
    .unwrap();
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());
    let (linear, nearest) = (Handle::new(1, 0), Handle::new(2, 0));

    open_pass(&mut rec, &target, &layout);
    rec.bind_sampler(linear, 0, 0, 0);
    rec.bind_image(common::view(10, Format::RGBA8), Some(nearest), 0, 1, 0);
    rec.draw(3, 1, 0, 0).unwrap();

    let set = rec.descriptor_set_bindings()[0];
    let factory = cache.factory();
    let key = factory.descriptor_set(set.descriptor_set).unwrap();
    assert_eq!(key.image_infos.len(), 2);
    for (binding, sampler) in [(0, linear), (1, nearest)] {
        let info = key.image_infos[&binding][&0];
        assert_eq!(info.sampler, Some(sampler));
        assert_eq!(info.view, None);
        assert_eq!(info.layout, ImageLayout::Undefined);
    }
}

#[test]
fn uncovered_push_constants_are_dropped() {
    let cache = common::cache();
    let layout = common::textured_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    open_pass(&mut rec, &target, &layout);
    let before = rec.stream().len();
    rec.push_constants(0, &[1u8; 16]).unwrap();
    assert_eq!(rec.stream().len(), before + 1);

    rec.push_constants(60, &[0u8; 8]).unwrap();
    rec.push_constants(128, &[0u8; 4]).unwrap();
    assert_eq!(rec.stream().len(), before + 1);

    let last = rec.stream().iter().last().unwrap().unwrap();
    assert_eq!(last.op, Op::PushConstants);
    let cmd: deferred_gfx::gpu::driver::command::PushConstants = last.payload().unwrap();
    assert_eq!(cmd.stages, ShaderStageFlags::VERTEX);
    assert_eq!((cmd.offset, cmd.size), (0, 16));
}

#[test]
fn strict_push_constants_reject_uncovered_ranges() {
    let cache = common::cache();
    let layout = common::textured_layout(&cache);
    let target = common::color_target(1);
    let info = RecorderInfo {
        strict_push_constants: true,
        ..Default::default()
    };
    let mut rec = CommandRecorder::new(&cache, info);

    open_pass(&mut rec, &target, &layout);
    assert!(rec.push_constants(48, &[0u8; 16]).is_ok());
    assert!(matches!(
        rec.push_constants(60, &[0u8; 8]),
        Err(GPUError::PushConstantRange { offset: 60, size: 8 })
    ));
}

#[test]
fn push_constant_errors_format_past_u32_max() {
    let cache = common::cache();
    let layout = common::textured_layout(&cache);
    let target = common::color_target(1);
    let info = RecorderInfo {
        strict_push_constants: true,
        ..Default::default()
    };
    let mut rec = CommandRecorder::new(&cache, info);

    open_pass(&mut rec, &target, &layout);
    let err = rec.push_constants(u32::MAX - 3, &[0u8; 8]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "push constant range [4294967292, 4294967300) is not declared by the pipeline layout"
    );
}

#[test]
fn changed_set_layout_forces_a_rebind() {
    let cache = common::cache();
    let narrow = common::simple_layout(&cache);
    let wide = PipelineLayout::new(
        &cache,
        vec![
            ShaderResource::uniform_buffer(ShaderStageFlags::VERTEX, "camera", 0, 0),
            ShaderResource::uniform_buffer(ShaderStageFlags::VERTEX, "lights", 0, 1),
            ShaderResource::output(ShaderStageFlags::FRAGMENT, "color", 0),
        ],
    )
    .unwrap();
    assert_ne!(
        narrow.set_layout(0).unwrap().handle(),
        wide.set_layout(0).unwrap().handle()
    );

    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    open_pass(&mut rec, &target, &narrow);
    rec.bind_buffer(buffer(1), 0, 64, 0, 0, 0);
    rec.draw(3, 1, 0, 0).unwrap();
    assert_eq!(rec.descriptor_set_bindings().len(), 1);

    // Nothing rebound, but set 0 now has a different layout.
    rec.bind_pipeline_layout(&wide);
    rec.draw(3, 1, 0, 0).unwrap();
    assert_eq!(rec.descriptor_set_bindings().len(), 2);
    assert_eq!(rec.descriptor_set_bindings()[1].layout, wide.handle());
    assert_eq!(
        rec.bound_set_layouts()[&0],
        wide.set_layout(0).unwrap().handle()
    );

    rec.draw(3, 1, 0, 0).unwrap();
    assert_eq!(rec.descriptor_set_bindings().len(), 2);
}

#[test]
fn stale_set_layouts_are_evicted() {
    let cache = common::cache();
    let two_sets = PipelineLayout::new(
        &cache,
        vec![
            ShaderResource::uniform_buffer(ShaderStageFlags::VERTEX, "camera", 0, 0),
            ShaderResource::uniform_buffer(ShaderStageFlags::FRAGMENT, "material", 1, 0),
        ],
    )
    .unwrap();
    let one_set = common::simple_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    open_pass(&mut rec, &target, &two_sets);
    rec.bind_buffer(buffer(1), 0, 64, 0, 0, 0);
    rec.bind_buffer(buffer(2), 0, 64, 1, 0, 0);
    rec.draw(3, 1, 0, 0).unwrap();
    assert_eq!(rec.bound_set_layouts().len(), 2);

    rec.bind_pipeline_layout(&one_set);
    rec.draw(3, 1, 0, 0).unwrap();
    assert_eq!(
        rec.bound_set_layouts().keys().copied().collect::<Vec<_>>(),
        vec![0]
    );
}

#[test]
fn reset_matches_a_fresh_recorder() {
    let cache = common::cache();
    let layout = common::textured_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    fn record<'a>(
        rec: &mut CommandRecorder<'a, Cache>,
        target: &'a RenderTarget,
        layout: &'a PipelineLayout,
    ) {
        open_pass(rec, target, layout);
        rec.bind_buffer(buffer(1), 0, 64, 0, 0, 0);
        rec.bind_image(common::view(4, Format::RGBA8), None, 0, 1, 0);
        rec.push_constants(0, &[9u8; 64]).unwrap();
        rec.draw(3, 1, 0, 0).unwrap();
        rec.end_render_pass().unwrap();
        rec.end();
    }

    record(&mut rec, &target, &layout);
    let first_stream = rec.stream().as_bytes().to_vec();
    let first_pipelines = rec.pipeline_bindings().to_vec();
    let first_sets = rec.descriptor_set_bindings().to_vec();

    rec.reset();
    assert!(rec.stream().is_empty());
    assert_eq!(rec.stream().next_seq(), 0);
    assert!(rec.render_pass_bindings().is_empty());
    assert!(rec.pipeline_bindings().is_empty());
    assert!(rec.descriptor_set_bindings().is_empty());
    assert!(rec.bound_set_layouts().is_empty());
    assert!(rec.pipeline_state().pipeline_layout().is_none());
    assert!(!rec.pipeline_state().is_dirty());
    assert_eq!(rec.pipeline_state().subpass_index(), 0);
    assert!(rec.resource_binding_state().sets().is_empty());
    assert!(!rec.resource_binding_state().is_dirty());

    record(&mut rec, &target, &layout);
    assert_eq!(rec.stream().as_bytes(), first_stream.as_slice());
    assert_eq!(rec.pipeline_bindings(), first_pipelines.as_slice());
    assert_eq!(rec.descriptor_set_bindings(), first_sets.as_slice());
}

#[test]
fn cache_failures_reach_the_caller() {
    common::init_logging();
    // Room for the layout objects and one descriptor set, nothing more.
    let cache = ResourceCache::new(HeadlessFactory::with_limit(1));
    let layout = common::simple_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    open_pass(&mut rec, &target, &layout);
    rec.bind_buffer(buffer(1), 0, 64, 0, 0, 0);
    rec.draw(3, 1, 0, 0).unwrap();

    rec.bind_buffer(buffer(2), 0, 64, 0, 0, 0);
    assert!(matches!(rec.draw(3, 1, 0, 0), Err(GPUError::SlotError)));

    rec.bind_buffer(buffer(1), 0, 64, 0, 0, 0);
    rec.set_rasterization_state(RasterizationState {
        cull_mode: CullMode::None,
        ..Default::default()
    });
    rec.draw(3, 1, 0, 0).unwrap();
    assert!(matches!(rec.end_render_pass(), Err(GPUError::SlotError)));
}

#[test]
fn calls_without_their_context_are_rejected() {
    let cache = common::cache();
    let layout = common::textured_layout(&cache);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    assert!(matches!(rec.draw(3, 1, 0, 0), Err(GPUError::OutOfOrder(_))));
    assert!(matches!(
        rec.push_constants(0, &[0u8; 4]),
        Err(GPUError::OutOfOrder(_))
    ));
    assert!(matches!(rec.next_subpass(), Err(GPUError::OutOfOrder(_))));
    assert!(matches!(rec.end_render_pass(), Err(GPUError::OutOfOrder(_))));

    rec.bind_pipeline_layout(&layout);
    assert!(matches!(
        rec.draw_indexed(6, 1, 0, 0, 0),
        Err(GPUError::OutOfOrder(_))
    ));
    assert!(rec.stream().is_empty());
}

#[test]
fn closed_render_passes_are_not_reopened() {
    let cache = common::cache();
    let layout = common::simple_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    open_pass(&mut rec, &target, &layout);
    rec.draw(3, 1, 0, 0).unwrap();
    rec.end_render_pass().unwrap();
    let recorded = rec.stream().len();

    assert!(matches!(rec.end_render_pass(), Err(GPUError::OutOfOrder(_))));
    assert!(matches!(rec.next_subpass(), Err(GPUError::OutOfOrder(_))));
    rec.set_rasterization_state(RasterizationState {
        cull_mode: CullMode::None,
        ..Default::default()
    });
    assert!(matches!(rec.draw(3, 1, 0, 0), Err(GPUError::OutOfOrder(_))));

    assert_eq!(rec.pipeline_bindings().len(), 1);
    assert_eq!(rec.render_pass_bindings()[0].subpasses.len(), 1);
    assert_eq!(rec.render_pass_bindings()[0].subpasses[0].pipeline_requests.len(), 1);
    assert_eq!(rec.stream().len(), recorded);
}

mod common;

use deferred_gfx::gpu::driver::command::{CopyImage, Draw, PushConstants};
use deferred_gfx::*;

#[test]
fn bindings_are_replayed_before_their_commands() {
    let cache = common::cache();
    let layout = common::textured_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());
    let viewport = Viewport {
        width: 640.0,
        height: 480.0,
        ..Default::default()
    };
    let (src, dst) = (Handle::new(3, 0), Handle::new(4, 0));

    rec.begin(CommandBufferUsage::ONE_TIME_SUBMIT);
    rec.begin_render_pass(&target, &[LoadStoreInfo::default()], &[ClearValue::default()]);
    rec.bind_pipeline_layout(&layout);
    rec.bind_buffer(Handle::new(1, 0), 0, 64, 0, 0, 0);
    rec.set_viewport(0, &[viewport]);
    rec.draw(3, 1, 0, 0).unwrap();
    rec.push_constants(0, &[5u8; 16]).unwrap();
    rec.end_render_pass().unwrap();
    rec.copy_image(src, dst, &[ImageCopy::default()]);
    rec.end();

    let mut sink = TraceSink::default();
    let replayed = CommandReplayer::new(&mut sink)
        .replay(&rec.recording())
        .unwrap();
    assert_eq!(replayed, 7);

    let expected = vec![
        ReplayEvent::Begin(deferred_gfx::gpu::driver::command::Begin {
            flags: CommandBufferUsage::ONE_TIME_SUBMIT,
        }),
        ReplayEvent::BeginRenderPass {
            seq: 1,
            subpasses: 1,
        },
        ReplayEvent::SetViewport(0, vec![viewport]),
        ReplayEvent::BindPipeline(rec.pipeline_bindings()[0]),
        ReplayEvent::BindDescriptorSet(rec.descriptor_set_bindings()[0]),
        ReplayEvent::Draw(Draw {
            vertex_count: 3,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        }),
        ReplayEvent::PushConstants(
            PushConstants {
                layout: layout.handle(),
                stages: ShaderStageFlags::VERTEX,
                offset: 0,
                size: 16,
            },
            vec![5u8; 16],
        ),
        ReplayEvent::EndRenderPass,
        ReplayEvent::CopyImage(CopyImage { src, dst }, vec![ImageCopy::default()]),
        ReplayEvent::End,
    ];
    assert_eq!(sink.events, expected);
}

#[test]
fn every_draw_sees_its_own_bindings() {
    let cache = common::cache();
    let layout = common::simple_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    rec.begin_render_pass(&target, &[LoadStoreInfo::default()], &[ClearValue::default()]);
    rec.bind_pipeline_layout(&layout);
    for slot in 0..3 {
        rec.bind_buffer(Handle::new(slot, 0), 0, 64, 0, 0, 0);
        rec.draw(3, 1, 0, 0).unwrap();
    }
    rec.end_render_pass().unwrap();

    let mut sink = TraceSink::default();
    CommandReplayer::new(&mut sink)
        .replay(&rec.recording())
        .unwrap();

    let sets: Vec<Handle<DescriptorSet>> = rec
        .descriptor_set_bindings()
        .iter()
        .map(|b| b.descriptor_set)
        .collect();
    assert_eq!(sets.len(), 3);

    // Each descriptor set is bound right before the draw it was flushed for.
    let mut seen = Vec::new();
    for pair in sink.events.windows(2) {
        if let [ReplayEvent::BindDescriptorSet(b), ReplayEvent::Draw(_)] = pair {
            seen.push(b.descriptor_set);
        }
    }
    assert_eq!(seen, sets);
}

#[test]
fn open_render_pass_fails_the_replay() {
    let cache = common::cache();
    let layout = common::simple_layout(&cache);
    let target = common::color_target(1);
    let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());

    rec.begin(CommandBufferUsage::empty());
    rec.begin_render_pass(&target, &[LoadStoreInfo::default()], &[ClearValue::default()]);
    rec.bind_pipeline_layout(&layout);
    rec.draw(3, 1, 0, 0).unwrap();

    let mut sink = TraceSink::default();
    let result = CommandReplayer::new(&mut sink).replay(&rec.recording());
    assert!(matches!(result, Err(GPUError::UnresolvedRenderPass(1))));
    assert_eq!(sink.events.len(), 1);
}

#[test]
fn empty_recording_replays_nothing() {
    let cache = common::cache();
    let rec = CommandRecorder::new(&cache, RecorderInfo::default());

    let mut sink = TraceSink::default();
    let replayed = CommandReplayer::new(&mut sink)
        .replay(&rec.recording())
        .unwrap();
    assert_eq!(replayed, 0);
    assert!(sink.events.is_empty());
}

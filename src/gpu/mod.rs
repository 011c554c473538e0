//! Deferred command recording.
//!
//! A [`CommandRecorder`] turns draw, bind and state calls into a compact
//! command stream. Pipelines, render passes, framebuffers and descriptor sets
//! are only resolved through an [`ObjectCache`] when the state they depend on
//! changed, and the results are kept in binding tables next to the stream.
//! A [`Replayer`] walks both and drives a [`CommandSink`].
//!
//! ```ignore
//! let cache = ResourceCache::new(HeadlessFactory::default());
//! let layout = PipelineLayout::new(&cache, shader_resources)?;
//! let mut rec = CommandRecorder::new(&cache, RecorderInfo::default());
//! rec.begin(CommandBufferUsage::ONE_TIME_SUBMIT);
//! rec.begin_render_pass(&target, &[LoadStoreInfo::default()], &[ClearValue::default()]);
//! rec.bind_pipeline_layout(&layout);
//! rec.draw(3, 1, 0, 0)?;
//! rec.end_render_pass()?;
//! rec.end();
//!
//! let mut sink = TraceSink::default();
//! CommandReplayer::new(&mut sink).replay(&rec.recording())?;
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod execution;
#[cfg(feature = "vulkan")]
pub mod vulkan;

pub use config::{GraphicsStateCfg, RecorderInfo};
pub use driver::command::{CommandEncoder, CommandSink, Op};
pub use driver::layout::{PipelineLayout, ShaderResource, ShaderResourceType};
pub use driver::types::*;
pub use error::{GPUError, Result};
pub use execution::*;

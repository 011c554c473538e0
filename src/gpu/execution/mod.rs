pub mod object_cache;
pub mod recorder;
pub mod replayer;

pub use object_cache::{CacheStats, HeadlessFactory, ObjectCache, ObjectFactory, ResourceCache};
pub use recorder::{
    CommandRecorder, DescriptorSetBinding, PipelineBinding, PipelineRequest, RenderPassBinding,
    SubpassBinding,
};
pub use replayer::{CommandReplayer, Recording, ReplayEvent, Replayer, TraceSink};

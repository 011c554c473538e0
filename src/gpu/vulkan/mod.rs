//! Vulkan backend: conversions to `ash` types and a [`CommandSink`] that
//! replays recordings into a `vk::CommandBuffer`.
//!
//! The sink only needs the command-level conversions. The fixed-function and
//! descriptor conversions in [`conversions`] are for [`ObjectFactory`]
//! implementations that build native pipelines, render passes and descriptor
//! sets from cache keys; no such factory ships with this crate.
//!
//! [`CommandSink`]: crate::gpu::driver::command::CommandSink
//! [`ObjectFactory`]: crate::gpu::execution::object_cache::ObjectFactory

pub mod conversions;
mod sink;

pub use sink::{VkObjects, VulkanSink};

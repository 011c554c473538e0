use thiserror::Error;

#[derive(Debug, Error)]
pub enum GPUError {
    #[cfg(feature = "vulkan")]
    #[error("Vulkan Error: {0}")]
    VulkanError(#[from] ash::vk::Result),
    #[error("Ran out of slots!")]
    SlotError,
    /// A call that needs an active record (render pass, pipeline layout) was
    /// issued without one.
    #[error("out of order call: {0}")]
    OutOfOrder(&'static str),
    #[error(
        "push constant range [{offset}, {end}) is not declared by the pipeline layout",
        end = u64::from(*.offset) + u64::from(*.size)
    )]
    PushConstantRange { offset: u32, size: u32 },
    #[error("malformed command stream at byte {0}")]
    MalformedStream(usize),
    #[error("render pass recorded at sequence {0} was never resolved")]
    UnresolvedRenderPass(u64),
    #[error("no native object for {0}")]
    MissingObject(&'static str),
}

/// Convenient crate-wide result type.
pub type Result<T, E = GPUError> = std::result::Result<T, E>;

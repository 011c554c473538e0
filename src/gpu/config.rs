#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::driver::state::{
    ColorBlendState, DepthStencilState, InputAssemblyState, MultisampleState, RasterizationState,
    VertexInputState, ViewportState,
};

/// Per-recorder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RecorderInfo {
    pub debug_name: String,
    /// Bytes reserved for the command stream up front.
    pub stream_capacity: usize,
    /// Reject push constants that no pipeline-layout range covers instead of
    /// dropping them with a warning.
    pub strict_push_constants: bool,
}

impl Default for RecorderInfo {
    fn default() -> Self {
        Self {
            debug_name: "recorder".to_string(),
            stream_capacity: 1024,
            strict_push_constants: false,
        }
    }
}

/// Every fixed-function sub-state of a graphics pipeline, as authored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GraphicsStateCfg {
    pub vertex_input: VertexInputState,
    pub input_assembly: InputAssemblyState,
    pub rasterization: RasterizationState,
    pub viewport: ViewportState,
    pub multisample: MultisampleState,
    pub depth_stencil: DepthStencilState,
    pub color_blend: ColorBlendState,
}

#[cfg(feature = "serde")]
mod yaml {
    use anyhow::{Context as _, Result};

    use super::{GraphicsStateCfg, RecorderInfo};

    impl RecorderInfo {
        pub fn from_yaml(s: &str) -> Result<Self, serde_yaml::Error> {
            serde_yaml::from_str(s)
        }

        pub fn from_yaml_file(path: &str) -> Result<Self> {
            let text = load_text(path)?;
            Self::from_yaml(&text).with_context(|| format!("parsing recorder config '{path}'"))
        }
    }

    impl GraphicsStateCfg {
        pub fn from_yaml(s: &str) -> Result<Self, serde_yaml::Error> {
            serde_yaml::from_str(s)
        }

        pub fn vec_from_yaml(s: &str) -> Result<Vec<Self>, serde_yaml::Error> {
            serde_yaml::from_str(s)
        }

        pub fn from_yaml_file(path: &str) -> Result<Self> {
            let text = load_text(path)?;
            Self::from_yaml(&text).with_context(|| format!("parsing graphics state '{path}'"))
        }
    }

    fn load_text(path: &str) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading '{path}'"))
    }
}

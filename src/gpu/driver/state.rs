use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::layout::PipelineLayout;
use super::types::{RenderPass, SampleCount};
use crate::utils::Handle;

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VertexOrdering {
    #[default]
    CounterClockwise,
    Clockwise,
}

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    #[default]
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LogicOp {
    Clear,
    And,
    #[default]
    Copy,
    NoOp,
    Xor,
    Or,
    Invert,
    Set,
}

#[derive(Hash, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlendFactor {
    #[default]
    One,
    Zero,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    DstColor,
    InvDstColor,
    BlendFactor,
}

#[derive(Hash, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    InvSubtract,
    Min,
    Max,
}

#[derive(Hash, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VertexFormat {
    Float,
    Vec2,
    Vec3,
    Vec4,
    IVec4,
    UVec4,
}

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VertexRate {
    #[default]
    Vertex,
    Instance,
}

#[derive(Hash, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexInputBinding {
    pub binding: u32,
    pub stride: u32,
    pub rate: VertexRate,
}

#[derive(Hash, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexInputAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Hash, Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VertexInputState {
    pub bindings: Vec<VertexInputBinding>,
    pub attributes: Vec<VertexInputAttribute>,
}

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InputAssemblyState {
    pub topology: Topology,
    pub primitive_restart_enable: bool,
}

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RasterizationState {
    pub depth_clamp_enable: bool,
    pub rasterizer_discard_enable: bool,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: VertexOrdering,
    pub depth_bias_enable: bool,
}

#[derive(Hash, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ViewportState {
    pub viewport_count: u32,
    pub scissor_count: u32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            viewport_count: 1,
            scissor_count: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MultisampleState {
    pub rasterization_samples: SampleCount,
    pub sample_shading_enable: bool,
    pub min_sample_shading: f32,
    pub sample_mask: u32,
    pub alpha_to_coverage_enable: bool,
    pub alpha_to_one_enable: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            rasterization_samples: SampleCount::S1,
            sample_shading_enable: false,
            min_sample_shading: 0.0,
            sample_mask: 0,
            alpha_to_coverage_enable: false,
            alpha_to_one_enable: false,
        }
    }
}

// f32 does not implement Eq/Hash; compare the bit pattern instead.
impl PartialEq for MultisampleState {
    fn eq(&self, other: &Self) -> bool {
        self.rasterization_samples == other.rasterization_samples
            && self.sample_shading_enable == other.sample_shading_enable
            && self.min_sample_shading.to_bits() == other.min_sample_shading.to_bits()
            && self.sample_mask == other.sample_mask
            && self.alpha_to_coverage_enable == other.alpha_to_coverage_enable
            && self.alpha_to_one_enable == other.alpha_to_one_enable
    }
}

impl Eq for MultisampleState {}

impl Hash for MultisampleState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rasterization_samples.hash(state);
        self.sample_shading_enable.hash(state);
        self.min_sample_shading.to_bits().hash(state);
        self.sample_mask.hash(state);
        self.alpha_to_coverage_enable.hash(state);
        self.alpha_to_one_enable.hash(state);
    }
}

#[derive(Hash, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StencilOpState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
}

impl Default for StencilOpState {
    fn default() -> Self {
        Self {
            fail_op: StencilOp::Replace,
            pass_op: StencilOp::Replace,
            depth_fail_op: StencilOp::Replace,
            compare_op: CompareOp::Never,
        }
    }
}

#[derive(Hash, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub depth_bounds_test_enable: bool,
    pub stencil_test_enable: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Greater,
            depth_bounds_test_enable: false,
            stencil_test_enable: false,
            front: Default::default(),
            back: Default::default(),
        }
    }
}

#[derive(Hash, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WriteMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl Default for WriteMask {
    fn default() -> Self {
        Self {
            r: true,
            g: true,
            b: true,
            a: true,
        }
    }
}

#[derive(Hash, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ColorBlendAttachmentState {
    pub blend_enable: bool,
    pub src_color_blend_factor: BlendFactor,
    pub dst_color_blend_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_blend_factor: BlendFactor,
    pub dst_alpha_blend_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
    pub write_mask: WriteMask,
}

impl ColorBlendAttachmentState {
    /// Classic `src * a + dst * (1 - a)` blending.
    pub fn alpha_blended() -> Self {
        Self {
            blend_enable: true,
            src_color_blend_factor: BlendFactor::SrcAlpha,
            dst_color_blend_factor: BlendFactor::InvSrcAlpha,
            color_blend_op: BlendOp::Add,
            src_alpha_blend_factor: BlendFactor::SrcAlpha,
            dst_alpha_blend_factor: BlendFactor::InvSrcAlpha,
            alpha_blend_op: BlendOp::Add,
            write_mask: WriteMask::default(),
        }
    }
}

#[derive(Hash, Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ColorBlendState {
    pub logic_op_enable: bool,
    pub logic_op: LogicOp,
    pub attachments: Vec<ColorBlendAttachmentState>,
}

/// Owned, hashable copy of everything a graphics pipeline is built from.
///
/// `render_pass` stays `None` while the draw is recorded and is filled in once
/// the enclosing render pass resolves at `end_render_pass`.
#[derive(Hash, Debug, Clone, PartialEq, Eq)]
pub struct PipelineStateDesc {
    pub layout: Handle<PipelineLayout>,
    pub render_pass: Option<Handle<RenderPass>>,
    pub subpass_index: u32,
    pub vertex_input: VertexInputState,
    pub input_assembly: InputAssemblyState,
    pub rasterization: RasterizationState,
    pub viewport: ViewportState,
    pub multisample: MultisampleState,
    pub depth_stencil: DepthStencilState,
    pub color_blend: ColorBlendState,
}

/// Incremental tracker of the fixed-function state used by the next draw.
///
/// Every setter marks the tracker dirty, whether or not the value changed.
#[derive(Debug, Clone, Default)]
pub struct GraphicsPipelineState<'a> {
    dirty: bool,
    pipeline_layout: Option<&'a PipelineLayout>,
    vertex_input: VertexInputState,
    input_assembly: InputAssemblyState,
    rasterization: RasterizationState,
    viewport: ViewportState,
    multisample: MultisampleState,
    depth_stencil: DepthStencilState,
    color_blend: ColorBlendState,
    subpass_index: u32,
}

impl<'a> GraphicsPipelineState<'a> {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_pipeline_layout(&mut self, layout: &'a PipelineLayout) {
        self.pipeline_layout = Some(layout);
        self.dirty = true;
    }

    pub fn set_vertex_input_state(&mut self, state: VertexInputState) {
        self.vertex_input = state;
        self.dirty = true;
    }

    pub fn set_input_assembly_state(&mut self, state: InputAssemblyState) {
        self.input_assembly = state;
        self.dirty = true;
    }

    pub fn set_rasterization_state(&mut self, state: RasterizationState) {
        self.rasterization = state;
        self.dirty = true;
    }

    pub fn set_viewport_state(&mut self, state: ViewportState) {
        self.viewport = state;
        self.dirty = true;
    }

    pub fn set_multisample_state(&mut self, state: MultisampleState) {
        self.multisample = state;
        self.dirty = true;
    }

    pub fn set_depth_stencil_state(&mut self, state: DepthStencilState) {
        self.depth_stencil = state;
        self.dirty = true;
    }

    pub fn set_color_blend_state(&mut self, state: ColorBlendState) {
        self.color_blend = state;
        self.dirty = true;
    }

    pub fn set_subpass_index(&mut self, index: u32) {
        self.subpass_index = index;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn pipeline_layout(&self) -> Option<&'a PipelineLayout> {
        self.pipeline_layout
    }

    pub fn vertex_input_state(&self) -> &VertexInputState {
        &self.vertex_input
    }

    pub fn input_assembly_state(&self) -> &InputAssemblyState {
        &self.input_assembly
    }

    pub fn rasterization_state(&self) -> &RasterizationState {
        &self.rasterization
    }

    pub fn viewport_state(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn multisample_state(&self) -> &MultisampleState {
        &self.multisample
    }

    pub fn depth_stencil_state(&self) -> &DepthStencilState {
        &self.depth_stencil
    }

    pub fn color_blend_state(&self) -> &ColorBlendState {
        &self.color_blend
    }

    pub fn subpass_index(&self) -> u32 {
        self.subpass_index
    }

    /// Snapshot of the current state. `None` until a pipeline layout is bound.
    pub fn describe(&self) -> Option<PipelineStateDesc> {
        let layout = self.pipeline_layout?;
        Some(PipelineStateDesc {
            layout: layout.handle(),
            render_pass: None,
            subpass_index: self.subpass_index,
            vertex_input: self.vertex_input.clone(),
            input_assembly: self.input_assembly,
            rasterization: self.rasterization,
            viewport: self.viewport,
            multisample: self.multisample,
            depth_stencil: self.depth_stencil,
            color_blend: self.color_blend.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_mark_dirty_even_for_equal_values() {
        let mut state = GraphicsPipelineState::default();
        assert!(!state.is_dirty());

        state.set_rasterization_state(RasterizationState::default());
        assert!(state.is_dirty());
        state.clear_dirty();

        let same = *state.input_assembly_state();
        state.set_input_assembly_state(same);
        assert!(state.is_dirty());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut state = GraphicsPipelineState::default();
        state.set_subpass_index(3);
        state.set_color_blend_state(ColorBlendState {
            attachments: vec![ColorBlendAttachmentState::alpha_blended()],
            ..Default::default()
        });

        state.reset();
        assert!(!state.is_dirty());
        assert_eq!(state.subpass_index(), 0);
        assert!(state.color_blend_state().attachments.is_empty());
        assert!(state.pipeline_layout().is_none());
        assert!(state.describe().is_none());
    }

    #[test]
    fn multisample_state_hashes_float_bits() {
        use std::collections::HashSet;

        let a = MultisampleState {
            min_sample_shading: 0.5,
            ..Default::default()
        };
        let b = a;
        let c = MultisampleState {
            min_sample_shading: 0.25,
            ..Default::default()
        };
        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}

use std::collections::BTreeMap;

use log::debug;

use super::types::{DescriptorType, ShaderStageFlags};
use crate::gpu::error::Result;
use crate::gpu::execution::object_cache::{DescriptorSetLayoutKey, ObjectCache, PipelineLayoutKey};
use crate::utils::Handle;

#[derive(Hash, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderResourceType {
    Input,
    InputAttachment,
    Output,
    Image,
    ImageSampler,
    ImageStorage,
    Sampler,
    BufferUniform,
    BufferStorage,
    PushConstant,
}

/// One reflected shader interface variable.
#[derive(Hash, Debug, Clone, PartialEq, Eq)]
pub struct ShaderResource {
    pub name: String,
    pub stages: ShaderStageFlags,
    pub resource_type: ShaderResourceType,
    pub set: u32,
    pub binding: u32,
    pub location: u32,
    pub input_attachment_index: u32,
    pub array_size: u32,
    pub offset: u32,
    pub size: u32,
    pub dynamic: bool,
}

impl ShaderResource {
    fn new(name: &str, stages: ShaderStageFlags, resource_type: ShaderResourceType) -> Self {
        Self {
            name: name.to_string(),
            stages,
            resource_type,
            set: 0,
            binding: 0,
            location: 0,
            input_attachment_index: 0,
            array_size: 1,
            offset: 0,
            size: 0,
            dynamic: false,
        }
    }

    fn descriptor(
        name: &str,
        stages: ShaderStageFlags,
        resource_type: ShaderResourceType,
        set: u32,
        binding: u32,
    ) -> Self {
        Self {
            set,
            binding,
            ..Self::new(name, stages, resource_type)
        }
    }

    pub fn input(stages: ShaderStageFlags, name: &str, location: u32) -> Self {
        Self {
            location,
            ..Self::new(name, stages, ShaderResourceType::Input)
        }
    }

    pub fn output(stages: ShaderStageFlags, name: &str, location: u32) -> Self {
        Self {
            location,
            ..Self::new(name, stages, ShaderResourceType::Output)
        }
    }

    pub fn input_attachment(name: &str, set: u32, binding: u32, index: u32) -> Self {
        Self {
            input_attachment_index: index,
            ..Self::descriptor(
                name,
                ShaderStageFlags::FRAGMENT,
                ShaderResourceType::InputAttachment,
                set,
                binding,
            )
        }
    }

    pub fn image(stages: ShaderStageFlags, name: &str, set: u32, binding: u32) -> Self {
        Self::descriptor(name, stages, ShaderResourceType::Image, set, binding)
    }

    pub fn image_sampler(stages: ShaderStageFlags, name: &str, set: u32, binding: u32) -> Self {
        Self::descriptor(name, stages, ShaderResourceType::ImageSampler, set, binding)
    }

    pub fn image_storage(stages: ShaderStageFlags, name: &str, set: u32, binding: u32) -> Self {
        Self::descriptor(name, stages, ShaderResourceType::ImageStorage, set, binding)
    }

    pub fn sampler(stages: ShaderStageFlags, name: &str, set: u32, binding: u32) -> Self {
        Self::descriptor(name, stages, ShaderResourceType::Sampler, set, binding)
    }

    pub fn uniform_buffer(stages: ShaderStageFlags, name: &str, set: u32, binding: u32) -> Self {
        Self::descriptor(name, stages, ShaderResourceType::BufferUniform, set, binding)
    }

    pub fn storage_buffer(stages: ShaderStageFlags, name: &str, set: u32, binding: u32) -> Self {
        Self::descriptor(name, stages, ShaderResourceType::BufferStorage, set, binding)
    }

    pub fn push_constant(stages: ShaderStageFlags, name: &str, offset: u32, size: u32) -> Self {
        Self {
            offset,
            size,
            ..Self::new(name, stages, ShaderResourceType::PushConstant)
        }
    }

    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }

    /// Marks a uniform/storage buffer as dynamically offset.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// The descriptor type this resource occupies, if it lives in a set.
    pub fn descriptor_type(&self) -> Option<DescriptorType> {
        Some(match self.resource_type {
            ShaderResourceType::InputAttachment => DescriptorType::InputAttachment,
            ShaderResourceType::Image => DescriptorType::SampledImage,
            ShaderResourceType::ImageSampler => DescriptorType::CombinedImageSampler,
            ShaderResourceType::ImageStorage => DescriptorType::StorageImage,
            ShaderResourceType::Sampler => DescriptorType::Sampler,
            ShaderResourceType::BufferUniform if self.dynamic => {
                DescriptorType::UniformBufferDynamic
            }
            ShaderResourceType::BufferUniform => DescriptorType::UniformBuffer,
            ShaderResourceType::BufferStorage if self.dynamic => {
                DescriptorType::StorageBufferDynamic
            }
            ShaderResourceType::BufferStorage => DescriptorType::StorageBuffer,
            ShaderResourceType::Input
            | ShaderResourceType::Output
            | ShaderResourceType::PushConstant => return None,
        })
    }
}

#[derive(Hash, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStageFlags,
}

#[derive(Hash, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// Layout of one descriptor set, resolved through the object cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetLayout {
    handle: Handle<DescriptorSetLayout>,
    set_index: u32,
    bindings: BTreeMap<u32, DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    pub fn handle(&self) -> Handle<DescriptorSetLayout> {
        self.handle
    }

    pub fn set_index(&self) -> u32 {
        self.set_index
    }

    pub fn binding(&self, binding: u32) -> Option<&DescriptorSetLayoutBinding> {
        self.bindings.get(&binding)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &DescriptorSetLayoutBinding> {
        self.bindings.values()
    }
}

/// Reflection data for a whole pipeline plus its native layout handle.
#[derive(Debug, Clone)]
pub struct PipelineLayout {
    handle: Handle<PipelineLayout>,
    resources: Vec<ShaderResource>,
    set_layouts: BTreeMap<u32, DescriptorSetLayout>,
}

impl PipelineLayout {
    pub fn new<C: ObjectCache + ?Sized>(cache: &C, resources: Vec<ShaderResource>) -> Result<Self> {
        let resources = merge_resources(resources);

        let mut per_set: BTreeMap<u32, BTreeMap<u32, DescriptorSetLayoutBinding>> =
            BTreeMap::new();
        for res in &resources {
            let Some(descriptor_type) = res.descriptor_type() else {
                continue;
            };
            per_set
                .entry(res.set)
                .or_default()
                .entry(res.binding)
                .and_modify(|b| b.stages |= res.stages)
                .or_insert(DescriptorSetLayoutBinding {
                    binding: res.binding,
                    descriptor_type,
                    count: res.array_size,
                    stages: res.stages,
                });
        }

        let mut set_layouts = BTreeMap::new();
        for (set_index, bindings) in per_set {
            let key = DescriptorSetLayoutKey {
                set_index,
                bindings: bindings.values().copied().collect(),
            };
            let handle = cache.resolve_descriptor_set_layout(&key)?;
            set_layouts.insert(
                set_index,
                DescriptorSetLayout {
                    handle,
                    set_index,
                    bindings,
                },
            );
        }

        let key = PipelineLayoutKey {
            set_layouts: set_layouts
                .iter()
                .map(|(set, layout)| (*set, layout.handle))
                .collect(),
            push_constant_ranges: resources
                .iter()
                .filter(|r| r.resource_type == ShaderResourceType::PushConstant)
                .map(|r| PushConstantRange {
                    stages: r.stages,
                    offset: r.offset,
                    size: r.size,
                })
                .collect(),
        };
        let handle = cache.resolve_pipeline_layout(&key)?;
        debug!(
            "Pipeline layout {:?}: {} set(s), {} resource(s)",
            handle,
            set_layouts.len(),
            resources.len()
        );

        Ok(Self {
            handle,
            resources,
            set_layouts,
        })
    }

    pub fn handle(&self) -> Handle<PipelineLayout> {
        self.handle
    }

    pub fn resources(&self) -> &[ShaderResource] {
        &self.resources
    }

    pub fn set_layouts(&self) -> &BTreeMap<u32, DescriptorSetLayout> {
        &self.set_layouts
    }

    pub fn has_set_layout(&self, set: u32) -> bool {
        self.set_layouts.contains_key(&set)
    }

    pub fn set_layout(&self, set: u32) -> Option<&DescriptorSetLayout> {
        self.set_layouts.get(&set)
    }

    /// Locations written by the fragment stage.
    pub fn fragment_output_attachments(&self) -> impl Iterator<Item = u32> + '_ {
        self.resources
            .iter()
            .filter(|r| {
                r.resource_type == ShaderResourceType::Output
                    && r.stages.contains(ShaderStageFlags::FRAGMENT)
            })
            .map(|r| r.location)
    }

    /// Input attachment indices read by the fragment stage.
    pub fn fragment_input_attachments(&self) -> impl Iterator<Item = u32> + '_ {
        self.resources
            .iter()
            .filter(|r| {
                r.resource_type == ShaderResourceType::InputAttachment
                    && r.stages.contains(ShaderStageFlags::FRAGMENT)
            })
            .map(|r| r.input_attachment_index)
    }

    /// Union of the stages of every push-constant block that fully contains
    /// `[offset, offset + size)`. Empty when no block does.
    pub fn push_constant_range_stage(&self, offset: u32, size: u32) -> ShaderStageFlags {
        let Some(end) = offset.checked_add(size) else {
            return ShaderStageFlags::empty();
        };
        self.resources
            .iter()
            .filter(|r| r.resource_type == ShaderResourceType::PushConstant)
            .filter(|r| {
                offset >= r.offset && u64::from(end) <= u64::from(r.offset) + u64::from(r.size)
            })
            .fold(ShaderStageFlags::empty(), |acc, r| acc | r.stages)
    }
}

// Stage inputs/outputs are per stage; everything else with the same name and
// type is one resource seen from several stages.
fn merge_resources(resources: Vec<ShaderResource>) -> Vec<ShaderResource> {
    let mut merged: Vec<ShaderResource> = Vec::with_capacity(resources.len());
    for res in resources {
        let per_stage = matches!(
            res.resource_type,
            ShaderResourceType::Input | ShaderResourceType::Output
        );
        let existing = if per_stage {
            None
        } else {
            merged.iter().position(|m| {
                m.name == res.name
                    && m.resource_type == res.resource_type
                    && m.set == res.set
                    && m.binding == res.binding
            })
        };
        match existing {
            Some(i) => merged[i].stages |= res.stages,
            None => merged.push(res),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::execution::object_cache::{HeadlessFactory, ResourceCache};

    fn resources() -> Vec<ShaderResource> {
        vec![
            ShaderResource::input(ShaderStageFlags::VERTEX, "position", 0),
            ShaderResource::output(ShaderStageFlags::VERTEX, "uv", 0),
            ShaderResource::input(ShaderStageFlags::FRAGMENT, "uv", 0),
            ShaderResource::output(ShaderStageFlags::FRAGMENT, "albedo", 0),
            ShaderResource::output(ShaderStageFlags::FRAGMENT, "normal", 1),
            ShaderResource::uniform_buffer(ShaderStageFlags::VERTEX, "camera", 0, 0),
            ShaderResource::uniform_buffer(ShaderStageFlags::FRAGMENT, "camera", 0, 0),
            ShaderResource::image_sampler(ShaderStageFlags::FRAGMENT, "base_color", 0, 1),
            ShaderResource::input_attachment("depth", 1, 0, 2),
            ShaderResource::push_constant(ShaderStageFlags::VERTEX, "model", 0, 64),
            ShaderResource::push_constant(ShaderStageFlags::FRAGMENT, "tint", 64, 16),
        ]
    }

    #[test]
    fn groups_descriptors_per_set_and_merges_stages() {
        let cache = ResourceCache::new(HeadlessFactory::default());
        let layout = PipelineLayout::new(&cache, resources()).unwrap();

        assert!(layout.has_set_layout(0));
        assert!(layout.has_set_layout(1));
        assert!(!layout.has_set_layout(2));

        let set0 = layout.set_layout(0).unwrap();
        let camera = set0.binding(0).unwrap();
        assert_eq!(camera.descriptor_type, DescriptorType::UniformBuffer);
        assert_eq!(
            camera.stages,
            ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT
        );
        assert_eq!(
            set0.binding(1).unwrap().descriptor_type,
            DescriptorType::CombinedImageSampler
        );
        assert_eq!(
            layout.set_layout(1).unwrap().binding(0).unwrap().descriptor_type,
            DescriptorType::InputAttachment
        );

        // The merged uniform shows up once.
        assert_eq!(
            layout.resources().iter().filter(|r| r.name == "camera").count(),
            1
        );
    }

    #[test]
    fn reflects_fragment_attachments() {
        let cache = ResourceCache::new(HeadlessFactory::default());
        let layout = PipelineLayout::new(&cache, resources()).unwrap();

        let outputs: Vec<u32> = layout.fragment_output_attachments().collect();
        assert_eq!(outputs, vec![0, 1]);
        let inputs: Vec<u32> = layout.fragment_input_attachments().collect();
        assert_eq!(inputs, vec![2]);
    }

    #[test]
    fn push_constant_stages_cover_requested_range() {
        let cache = ResourceCache::new(HeadlessFactory::default());
        let layout = PipelineLayout::new(&cache, resources()).unwrap();

        assert_eq!(layout.push_constant_range_stage(0, 64), ShaderStageFlags::VERTEX);
        assert_eq!(layout.push_constant_range_stage(16, 16), ShaderStageFlags::VERTEX);
        assert_eq!(
            layout.push_constant_range_stage(64, 16),
            ShaderStageFlags::FRAGMENT
        );
        assert!(layout.push_constant_range_stage(60, 8).is_empty());
        assert!(layout.push_constant_range_stage(80, 4).is_empty());
        assert!(layout.push_constant_range_stage(u32::MAX, 4).is_empty());
    }

    #[test]
    fn identical_reflection_resolves_to_the_same_handles() {
        let cache = ResourceCache::new(HeadlessFactory::default());
        let a = PipelineLayout::new(&cache, resources()).unwrap();
        let b = PipelineLayout::new(&cache, resources()).unwrap();
        assert_eq!(a.handle(), b.handle());
        assert_eq!(
            a.set_layout(0).unwrap().handle(),
            b.set_layout(0).unwrap().handle()
        );
    }
}

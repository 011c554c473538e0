use std::collections::BTreeMap;

use super::types::{Buffer, DescriptorBufferInfo, ImageView, Sampler};
use crate::utils::Handle;

/// What is bound at one (set, binding, array element) coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceInfo {
    Buffer(DescriptorBufferInfo),
    Image {
        view: ImageView,
        sampler: Option<Handle<Sampler>>,
    },
    Sampler(Handle<Sampler>),
}

/// Resources bound to a single descriptor set index.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    dirty: bool,
    bindings: BTreeMap<u32, BTreeMap<u32, ResourceInfo>>,
}

impl ResourceSet {
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// binding -> array element -> resource, in ascending order.
    pub fn bindings(&self) -> &BTreeMap<u32, BTreeMap<u32, ResourceInfo>> {
        &self.bindings
    }

    pub fn get(&self, binding: u32, array_element: u32) -> Option<&ResourceInfo> {
        self.bindings.get(&binding)?.get(&array_element)
    }

    fn bind(&mut self, info: ResourceInfo, binding: u32, array_element: u32) {
        self.bindings
            .entry(binding)
            .or_default()
            .insert(array_element, info);
        self.dirty = true;
    }
}

/// Two-level dirty tracker for everything bound through `bind_buffer`,
/// `bind_image` and `bind_sampler`.
#[derive(Debug, Clone, Default)]
pub struct ResourceBindingState {
    dirty: bool,
    sets: BTreeMap<u32, ResourceSet>,
}

impl ResourceBindingState {
    pub fn reset(&mut self) {
        self.dirty = false;
        self.sets.clear();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn clear_set_dirty(&mut self, set: u32) {
        if let Some(resource_set) = self.sets.get_mut(&set) {
            resource_set.clear_dirty();
        }
    }

    pub fn bind_buffer(
        &mut self,
        buffer: Handle<Buffer>,
        offset: u64,
        range: u64,
        set: u32,
        binding: u32,
        array_element: u32,
    ) {
        let info = ResourceInfo::Buffer(DescriptorBufferInfo {
            buffer,
            offset,
            range,
        });
        self.sets
            .entry(set)
            .or_default()
            .bind(info, binding, array_element);
        self.dirty = true;
    }

    pub fn bind_image(
        &mut self,
        view: ImageView,
        sampler: Option<Handle<Sampler>>,
        set: u32,
        binding: u32,
        array_element: u32,
    ) {
        self.sets
            .entry(set)
            .or_default()
            .bind(ResourceInfo::Image { view, sampler }, binding, array_element);
        self.dirty = true;
    }

    pub fn bind_sampler(
        &mut self,
        sampler: Handle<Sampler>,
        set: u32,
        binding: u32,
        array_element: u32,
    ) {
        self.sets
            .entry(set)
            .or_default()
            .bind(ResourceInfo::Sampler(sampler), binding, array_element);
        self.dirty = true;
    }

    pub fn sets(&self) -> &BTreeMap<u32, ResourceSet> {
        &self.sets
    }

    pub fn set(&self, set: u32) -> Option<&ResourceSet> {
        self.sets.get(&set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::driver::types::Format;

    #[test]
    fn binding_marks_tracker_and_set_dirty() {
        let mut state = ResourceBindingState::default();
        assert!(!state.is_dirty());

        state.bind_buffer(Handle::new(1, 0), 0, 256, 0, 0, 0);
        state.bind_image(ImageView::new(Handle::new(2, 0), Format::RGBA8), None, 1, 3, 0);

        assert!(state.is_dirty());
        assert!(state.set(0).unwrap().is_dirty());
        assert!(state.set(1).unwrap().is_dirty());

        state.clear_dirty();
        state.clear_set_dirty(0);
        assert!(!state.is_dirty());
        assert!(!state.set(0).unwrap().is_dirty());
        assert!(state.set(1).unwrap().is_dirty());
    }

    #[test]
    fn rebinding_overwrites_the_coordinate() {
        let mut state = ResourceBindingState::default();
        let view = ImageView::new(Handle::new(2, 0), Format::RGBA8);
        state.bind_buffer(Handle::new(1, 0), 0, 64, 0, 2, 1);
        state.bind_image(view, Some(Handle::new(4, 0)), 0, 2, 1);

        let set = state.set(0).unwrap();
        assert_eq!(set.bindings().len(), 1);
        assert_eq!(
            set.get(2, 1),
            Some(&ResourceInfo::Image {
                view,
                sampler: Some(Handle::new(4, 0)),
            })
        );

        state.bind_sampler(Handle::new(5, 0), 0, 2, 1);
        assert_eq!(
            state.set(0).unwrap().get(2, 1),
            Some(&ResourceInfo::Sampler(Handle::new(5, 0)))
        );

        state.reset();
        assert!(state.sets().is_empty());
        assert!(!state.is_dirty());
    }
}

use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use log::{debug, trace};

use crate::gpu::driver::layout::{
    DescriptorSetLayout, DescriptorSetLayoutBinding, PipelineLayout, PushConstantRange,
};
use crate::gpu::driver::state::PipelineStateDesc;
use crate::gpu::driver::types::{
    Attachment, BindingMap, DescriptorBufferInfo, DescriptorImageInfo, DescriptorSet, Extent2D,
    Framebuffer, GraphicsPipeline, ImageView, LoadStoreInfo, RenderPass,
};
use crate::gpu::error::{GPUError, Result};
use crate::utils::Handle;

// ----- Keys used by the caches ------------------------------------------------

#[derive(Hash, Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetLayoutKey {
    pub set_index: u32,
    pub bindings: Vec<DescriptorSetLayoutBinding>,
}

#[derive(Hash, Debug, Clone, PartialEq, Eq)]
pub struct PipelineLayoutKey {
    /// (set index, layout) in ascending set order.
    pub set_layouts: Vec<(u32, Handle<DescriptorSetLayout>)>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

/// Attachment usage of one subpass, derived from the pipelines drawn in it.
#[derive(Hash, Debug, Clone, Default, PartialEq, Eq)]
pub struct SubpassInfo {
    pub input_attachments: BTreeSet<u32>,
    pub output_attachments: BTreeSet<u32>,
}

#[derive(Hash, Debug, Clone, PartialEq, Eq)]
pub struct RenderPassKey {
    pub attachments: Vec<Attachment>,
    pub load_store: Vec<LoadStoreInfo>,
    pub subpasses: Vec<SubpassInfo>,
}

#[derive(Hash, Debug, Clone, PartialEq, Eq)]
pub struct FramebufferKey {
    pub views: Vec<ImageView>,
    pub extent: Extent2D,
    pub render_pass: Handle<RenderPass>,
}

#[derive(Hash, Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetKey {
    pub layout: Handle<DescriptorSetLayout>,
    pub buffer_infos: BindingMap<DescriptorBufferInfo>,
    pub image_infos: BindingMap<DescriptorImageInfo>,
}

// ----- Cache interface ---------------------------------------------------------

/// Memoizing source of GPU objects. Resolving the same key twice yields the
/// same handle. Implementations are shared by reference between recorders, so
/// every method takes `&self`.
pub trait ObjectCache {
    fn resolve_descriptor_set_layout(
        &self,
        key: &DescriptorSetLayoutKey,
    ) -> Result<Handle<DescriptorSetLayout>>;
    fn resolve_pipeline_layout(&self, key: &PipelineLayoutKey) -> Result<Handle<PipelineLayout>>;
    fn resolve_render_pass(&self, key: &RenderPassKey) -> Result<Handle<RenderPass>>;
    fn resolve_framebuffer(&self, key: &FramebufferKey) -> Result<Handle<Framebuffer>>;
    fn resolve_graphics_pipeline(
        &self,
        desc: &PipelineStateDesc,
    ) -> Result<Handle<GraphicsPipeline>>;
    fn resolve_descriptor_set(&self, key: &DescriptorSetKey) -> Result<Handle<DescriptorSet>>;
}

/// Creates the object behind a cache miss.
pub trait ObjectFactory {
    fn create_descriptor_set_layout(
        &mut self,
        key: &DescriptorSetLayoutKey,
    ) -> Result<Handle<DescriptorSetLayout>>;
    fn create_pipeline_layout(&mut self, key: &PipelineLayoutKey)
        -> Result<Handle<PipelineLayout>>;
    fn create_render_pass(&mut self, key: &RenderPassKey) -> Result<Handle<RenderPass>>;
    fn create_framebuffer(&mut self, key: &FramebufferKey) -> Result<Handle<Framebuffer>>;
    fn create_graphics_pipeline(
        &mut self,
        desc: &PipelineStateDesc,
    ) -> Result<Handle<GraphicsPipeline>>;
    fn create_descriptor_set(&mut self, key: &DescriptorSetKey) -> Result<Handle<DescriptorSet>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

type Table<K, T> = RwLock<HashMap<K, Handle<T>>>;

// ----- ResourceCache -----------------------------------------------------------

/// Thread-safe [`ObjectCache`] in front of an [`ObjectFactory`].
///
/// Lookups take a read lock; a miss upgrades to the write lock, checks again
/// and only then asks the factory, so racing resolves of one key create a
/// single object.
pub struct ResourceCache<F> {
    factory: Mutex<F>,
    descriptor_set_layouts: Table<DescriptorSetLayoutKey, DescriptorSetLayout>,
    pipeline_layouts: Table<PipelineLayoutKey, PipelineLayout>,
    render_passes: Table<RenderPassKey, RenderPass>,
    framebuffers: Table<FramebufferKey, Framebuffer>,
    graphics_pipelines: Table<PipelineStateDesc, GraphicsPipeline>,
    descriptor_sets: Table<DescriptorSetKey, DescriptorSet>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<F: ObjectFactory> ResourceCache<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory: Mutex::new(factory),
            descriptor_set_layouts: Default::default(),
            pipeline_layouts: Default::default(),
            render_passes: Default::default(),
            framebuffers: Default::default(),
            graphics_pipelines: Default::default(),
            descriptor_sets: Default::default(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Locks the factory, e.g. to inspect what has been created so far.
    pub fn factory(&self) -> MutexGuard<'_, F> {
        self.factory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forgets every cached handle. The objects themselves stay with the
    /// factory.
    pub fn clear(&self) {
        fn wipe<K, T>(table: &Table<K, T>) {
            table
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        wipe(&self.descriptor_set_layouts);
        wipe(&self.pipeline_layouts);
        wipe(&self.render_passes);
        wipe(&self.framebuffers);
        wipe(&self.graphics_pipelines);
        wipe(&self.descriptor_sets);
    }

    fn get_or_create<K, T, C>(
        &self,
        kind: &'static str,
        table: &Table<K, T>,
        key: &K,
        create: C,
    ) -> Result<Handle<T>>
    where
        K: Hash + Eq + Clone + Debug,
        C: FnOnce(&mut F, &K) -> Result<Handle<T>>,
    {
        if let Some(h) = table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!("{kind} cache hit: {h:?}");
            return Ok(h);
        }

        let mut w = table.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(h) = w.get(key).copied() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!("{kind} cache hit: {h:?}");
            return Ok(h);
        }

        let mut factory = self.factory();
        let h = create(&mut *factory, key)?;
        drop(factory);
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Created {kind} {h:?}");
        w.insert(key.clone(), h);
        Ok(h)
    }
}

impl<F: ObjectFactory> ObjectCache for ResourceCache<F> {
    fn resolve_descriptor_set_layout(
        &self,
        key: &DescriptorSetLayoutKey,
    ) -> Result<Handle<DescriptorSetLayout>> {
        self.get_or_create(
            "descriptor set layout",
            &self.descriptor_set_layouts,
            key,
            |f, k| f.create_descriptor_set_layout(k),
        )
    }

    fn resolve_pipeline_layout(&self, key: &PipelineLayoutKey) -> Result<Handle<PipelineLayout>> {
        self.get_or_create("pipeline layout", &self.pipeline_layouts, key, |f, k| {
            f.create_pipeline_layout(k)
        })
    }

    fn resolve_render_pass(&self, key: &RenderPassKey) -> Result<Handle<RenderPass>> {
        self.get_or_create("render pass", &self.render_passes, key, |f, k| {
            f.create_render_pass(k)
        })
    }

    fn resolve_framebuffer(&self, key: &FramebufferKey) -> Result<Handle<Framebuffer>> {
        self.get_or_create("framebuffer", &self.framebuffers, key, |f, k| {
            f.create_framebuffer(k)
        })
    }

    fn resolve_graphics_pipeline(
        &self,
        desc: &PipelineStateDesc,
    ) -> Result<Handle<GraphicsPipeline>> {
        self.get_or_create("graphics pipeline", &self.graphics_pipelines, desc, |f, k| {
            f.create_graphics_pipeline(k)
        })
    }

    fn resolve_descriptor_set(&self, key: &DescriptorSetKey) -> Result<Handle<DescriptorSet>> {
        self.get_or_create("descriptor set", &self.descriptor_sets, key, |f, k| {
            f.create_descriptor_set(k)
        })
    }
}

// ----- HeadlessFactory ---------------------------------------------------------

/// Factory that creates no GPU objects at all. Handles are allocated
/// sequentially per kind and the key behind each one is kept for inspection.
#[derive(Debug, Clone)]
pub struct HeadlessFactory {
    limit: usize,
    descriptor_set_layouts: Vec<DescriptorSetLayoutKey>,
    pipeline_layouts: Vec<PipelineLayoutKey>,
    render_passes: Vec<RenderPassKey>,
    framebuffers: Vec<FramebufferKey>,
    graphics_pipelines: Vec<PipelineStateDesc>,
    descriptor_sets: Vec<DescriptorSetKey>,
}

impl Default for HeadlessFactory {
    fn default() -> Self {
        Self::with_limit(u16::MAX as usize)
    }
}

fn alloc<K: Clone, T>(store: &mut Vec<K>, limit: usize, key: &K) -> Result<Handle<T>> {
    if store.len() >= limit.min(u16::MAX as usize) {
        return Err(GPUError::SlotError);
    }
    let slot = store.len() as u16;
    store.push(key.clone());
    Ok(Handle::new(slot, 0))
}

impl HeadlessFactory {
    /// At most `limit` objects of each kind; the next one fails with
    /// [`GPUError::SlotError`].
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            descriptor_set_layouts: Vec::new(),
            pipeline_layouts: Vec::new(),
            render_passes: Vec::new(),
            framebuffers: Vec::new(),
            graphics_pipelines: Vec::new(),
            descriptor_sets: Vec::new(),
        }
    }

    pub fn descriptor_set_layout(
        &self,
        h: Handle<DescriptorSetLayout>,
    ) -> Option<&DescriptorSetLayoutKey> {
        self.descriptor_set_layouts.get(h.slot as usize)
    }

    pub fn pipeline_layout(&self, h: Handle<PipelineLayout>) -> Option<&PipelineLayoutKey> {
        self.pipeline_layouts.get(h.slot as usize)
    }

    pub fn render_pass(&self, h: Handle<RenderPass>) -> Option<&RenderPassKey> {
        self.render_passes.get(h.slot as usize)
    }

    pub fn framebuffer(&self, h: Handle<Framebuffer>) -> Option<&FramebufferKey> {
        self.framebuffers.get(h.slot as usize)
    }

    pub fn graphics_pipeline(&self, h: Handle<GraphicsPipeline>) -> Option<&PipelineStateDesc> {
        self.graphics_pipelines.get(h.slot as usize)
    }

    pub fn descriptor_set(&self, h: Handle<DescriptorSet>) -> Option<&DescriptorSetKey> {
        self.descriptor_sets.get(h.slot as usize)
    }

    pub fn render_pass_count(&self) -> usize {
        self.render_passes.len()
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn graphics_pipeline_count(&self) -> usize {
        self.graphics_pipelines.len()
    }

    pub fn descriptor_set_count(&self) -> usize {
        self.descriptor_sets.len()
    }
}

impl ObjectFactory for HeadlessFactory {
    fn create_descriptor_set_layout(
        &mut self,
        key: &DescriptorSetLayoutKey,
    ) -> Result<Handle<DescriptorSetLayout>> {
        alloc(&mut self.descriptor_set_layouts, self.limit, key)
    }

    fn create_pipeline_layout(
        &mut self,
        key: &PipelineLayoutKey,
    ) -> Result<Handle<PipelineLayout>> {
        alloc(&mut self.pipeline_layouts, self.limit, key)
    }

    fn create_render_pass(&mut self, key: &RenderPassKey) -> Result<Handle<RenderPass>> {
        alloc(&mut self.render_passes, self.limit, key)
    }

    fn create_framebuffer(&mut self, key: &FramebufferKey) -> Result<Handle<Framebuffer>> {
        alloc(&mut self.framebuffers, self.limit, key)
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &PipelineStateDesc,
    ) -> Result<Handle<GraphicsPipeline>> {
        alloc(&mut self.graphics_pipelines, self.limit, desc)
    }

    fn create_descriptor_set(&mut self, key: &DescriptorSetKey) -> Result<Handle<DescriptorSet>> {
        alloc(&mut self.descriptor_sets, self.limit, key)
    }
}

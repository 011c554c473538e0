use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

/// Non-owning, typed reference to an object that lives somewhere else
/// (a device, an object cache, a caller-side pool).
///
/// Handles are plain data so they can be written straight into the command
/// stream and used as cache keys.
#[repr(C)]
pub struct Handle<T> {
    pub slot: u16,
    pub generation: u16,
    phantom: PhantomData<T>,
}

impl<T> Handle<T> {
    pub const fn new(slot: u16, generation: u16) -> Self {
        Self {
            slot,
            generation,
            phantom: PhantomData,
        }
    }

    /// Packs slot and generation into a single integer, useful for logging.
    pub fn as_u32(&self) -> u32 {
        (self.generation as u32) << 16 | self.slot as u32
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}:{})", self.slot, self.generation)
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

unsafe impl<T: 'static> Zeroable for Handle<T> {}
unsafe impl<T: 'static> Pod for Handle<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Marker;

    #[test]
    fn handles_compare_by_slot_and_generation() {
        let a = Handle::<Marker>::new(3, 1);
        let b = Handle::<Marker>::new(3, 1);
        let c = Handle::<Marker>::new(3, 2);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn handles_are_plain_bytes() {
        let h = Handle::<Marker>::new(0x0102, 0x0304);
        let bytes = bytemuck::bytes_of(&h);
        assert_eq!(bytes.len(), 4);
        let back: Handle<Marker> = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back, h);
        assert_eq!(h.as_u32(), 0x0304_0102);
    }
}

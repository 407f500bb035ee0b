//! Identifiers and a simple allocator for scene objects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle for an object living in the host scene.
///
/// Handles are only meaningful to the host that issued them. Objects may be
/// recreated by the host, so code that needs a stable relation (e.g. a driver
/// variable pointing back at its own mesh) should compare names as well.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic allocator for ObjectId.
#[derive(Default, Debug, Clone)]
pub struct IdAllocator {
    next_object: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_object(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object = self.next_object.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

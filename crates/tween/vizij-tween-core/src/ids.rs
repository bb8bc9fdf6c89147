//! Identifiers for engine-owned entities and host targets.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Handle to a timer or animation registered with the engine.
    pub struct TickableId;
    /// Handle to a tween stored in the engine arena.
    pub struct TweenId;
}

/// Opaque identity of a host object whose properties are animated.
///
/// The engine never interprets the number; the `ValueIo` implementation maps
/// it to whatever the host uses (an entity, a node index, a DOM element).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub u32);

impl From<u32> for TargetId {
    fn from(raw: u32) -> Self {
        TargetId(raw)
    }
}

/// (target, property) pair used to key composition chains and value writes.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PropertyKey {
    pub target: TargetId,
    pub property: String,
}

impl PropertyKey {
    pub fn new(target: TargetId, property: impl Into<String>) -> Self {
        Self {
            target,
            property: property.into(),
        }
    }
}

/// Monotonic allocator for target ids, for hosts without their own identity scheme.
#[derive(Default, Debug)]
pub struct TargetAllocator {
    next: u32,
}

impl TargetAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc(&mut self) -> TargetId {
        let id = TargetId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

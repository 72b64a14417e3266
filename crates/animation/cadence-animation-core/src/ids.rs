//! Identifiers and simple allocators for scene entities.

use serde::{Deserialize, Serialize};

/// A registered animation target (node, bone, morph target, ...).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub u32);

/// A running animatable in the scene's active list.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnimatableId(pub u32);

/// An animation group registered with a scene.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Handle returned by `Scene::subscribe`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u32);

/// Monotonic allocator for all scene ids.
/// Ids are never reused within a scene; they are opaque externally.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_target: u32,
    next_animatable: u32,
    next_group: u32,
    next_subscription: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_target(&mut self) -> TargetId {
        let id = TargetId(self.next_target);
        self.next_target = self.next_target.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_animatable(&mut self) -> AnimatableId {
        let id = AnimatableId(self.next_animatable);
        self.next_animatable = self.next_animatable.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_group(&mut self) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group = self.next_group.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_subscription(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription = self.next_subscription.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic_per_kind() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_target(), TargetId(0));
        assert_eq!(alloc.alloc_target(), TargetId(1));
        assert_eq!(alloc.alloc_animatable(), AnimatableId(0));
        assert_eq!(alloc.alloc_group(), GroupId(0));
        assert_eq!(alloc.alloc_group(), GroupId(1));
        assert_eq!(alloc.alloc_subscription(), SubscriptionId(0));
    }
}

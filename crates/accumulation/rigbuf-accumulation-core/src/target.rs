//! Weak references to rig targets.
//!
//! Entries never own their target. They hold a generation-counted
//! [`TargetHandle`] that a [`TargetResolver`] turns back into a live target at
//! apply time; a handle whose target was removed (or whose slot was reused)
//! resolves to `None`.

use serde::{Deserialize, Serialize};

use rigbuf_api_core::RigTarget;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TargetHandle {
    pub index: u32,
    pub generation: u32,
}

/// Adapters implement this to hand live targets to the apply pass.
pub trait TargetResolver {
    type Target: RigTarget + ?Sized;

    fn resolve(&mut self, handle: TargetHandle) -> Option<&mut Self::Target>;
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    target: Option<T>,
}

/// Owning registry of targets addressed by weak handles.
#[derive(Debug)]
pub struct TargetRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for TargetRegistry<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> TargetRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: T) -> TargetHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.target = Some(target);
            TargetHandle {
                index,
                generation: slot.generation,
            }
        } else {
            assert!(self.slots.len() < u32::MAX as usize, "target registry overflow");
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                target: Some(target),
            });
            TargetHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Remove the target; every outstanding handle to it expires.
    pub fn remove(&mut self, handle: TargetHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let target = slot.target.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Some(target)
    }

    pub fn get(&self, handle: TargetHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.target.as_ref())
    }

    pub fn get_mut(&mut self, handle: TargetHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.target.as_mut())
    }

    #[inline]
    pub fn contains(&self, handle: TargetHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: RigTarget> TargetResolver for TargetRegistry<T> {
    type Target = T;

    fn resolve(&mut self, handle: TargetHandle) -> Option<&mut T> {
        self.get_mut(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_handles_expire() {
        let mut reg = TargetRegistry::new();
        let a = reg.insert("rig_a");
        let b = reg.insert("rig_b");
        assert_eq!(reg.get(a), Some(&"rig_a"));
        assert_eq!(reg.remove(a), Some("rig_a"));
        assert_eq!(reg.get(a), None);
        assert_eq!(reg.remove(a), None);
        assert_eq!(reg.get(b), Some(&"rig_b"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn reused_slot_does_not_resurrect_old_handle() {
        let mut reg = TargetRegistry::new();
        let a = reg.insert(1u32);
        reg.remove(a);
        let c = reg.insert(2u32);
        assert_eq!(c.index, a.index);
        assert_ne!(c.generation, a.generation);
        assert_eq!(reg.get(a), None);
        assert_eq!(reg.get(c), Some(&2));
    }
}

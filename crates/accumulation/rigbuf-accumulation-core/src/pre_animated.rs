//! Values a target held before animation first touched them.
//!
//! Snapshots are taken once per `(target, name)` and scope, and restored
//! with apply-and-forget so a value is never pushed back twice.

use hashbrown::HashMap;
use log::trace;
use serde::{Deserialize, Serialize};

use rigbuf_api_core::{Name, RigTarget, ValueKind};

use crate::params::ParameterSet;
use crate::store::IndexingMode;
use crate::target::TargetHandle;

/// How long a captured value is kept.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureScope {
    /// Restored when the animating section ends.
    Transient,
    /// Restored when the whole sequence is torn down.
    Persistent,
}

#[derive(Debug, Default)]
pub struct PreAnimatedCache {
    transient: HashMap<TargetHandle, ParameterSet>,
    persistent: HashMap<TargetHandle, ParameterSet>,
}

impl PreAnimatedCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn scope(&self, scope: CaptureScope) -> &HashMap<TargetHandle, ParameterSet> {
        match scope {
            CaptureScope::Transient => &self.transient,
            CaptureScope::Persistent => &self.persistent,
        }
    }

    fn scope_mut(&mut self, scope: CaptureScope) -> &mut HashMap<TargetHandle, ParameterSet> {
        match scope {
            CaptureScope::Transient => &mut self.transient,
            CaptureScope::Persistent => &mut self.persistent,
        }
    }

    /// Snapshot `target`'s current value of `name` unless one is already
    /// held in `scope`. Returns whether a new snapshot was taken.
    pub fn add_current_value<T: RigTarget + ?Sized>(
        &mut self,
        handle: TargetHandle,
        target: &T,
        name: Name,
        kind: ValueKind,
        scope: CaptureScope,
    ) -> bool {
        let captured = self
            .scope(scope)
            .get(&handle)
            .is_some_and(|set| set.find(name, kind).is_some());
        if captured {
            return false;
        }
        let Some(value) = target.current_value(name, kind) else {
            trace!("no current {kind} value for {name} on {handle:?}");
            return false;
        };
        self.scope_mut(scope)
            .entry(handle)
            .or_insert_with(|| ParameterSet::with_mode(IndexingMode::Sorted))
            .add_value(name, value);
        true
    }

    pub fn contains(&self, handle: TargetHandle, name: Name, scope: CaptureScope) -> bool {
        self.scope(scope)
            .get(&handle)
            .is_some_and(|set| set.find_any_kind(name).is_some())
    }

    /// Push the value of `name` captured in `scope` back and forget it.
    pub fn restore<T: RigTarget + ?Sized>(
        &mut self,
        handle: TargetHandle,
        target: &mut T,
        name: Name,
        scope: CaptureScope,
    ) -> bool {
        let map = self.scope_mut(scope);
        let Some(set) = map.get_mut(&handle) else {
            return false;
        };
        let restored = set.apply_and_remove(target, name);
        if set.is_empty() {
            map.remove(&handle);
        }
        restored
    }

    /// Targets with at least one snapshot held in `scope`.
    pub fn target_count(&self, scope: CaptureScope) -> usize {
        self.scope(scope).len()
    }

    /// Restore every value captured for `handle` in `scope`. Returns the
    /// number of values applied.
    pub fn restore_all<T: RigTarget + ?Sized>(
        &mut self,
        handle: TargetHandle,
        target: &mut T,
        scope: CaptureScope,
    ) -> usize {
        match self.scope_mut(scope).remove(&handle) {
            Some(set) => set.apply_to(target),
            None => 0,
        }
    }

    /// Forget everything captured for `handle` without applying it.
    pub fn discard(&mut self, handle: TargetHandle) {
        self.transient.remove(&handle);
        self.persistent.remove(&handle);
    }

    /// Captured values across both scopes.
    pub fn len(&self) -> usize {
        self.transient
            .values()
            .chain(self.persistent.values())
            .map(ParameterSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

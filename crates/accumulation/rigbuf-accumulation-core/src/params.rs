//! Name-keyed parameter collection spanning every value kind.

use rigbuf_api_core::{Name, NativeValue, RigTarget, Value, ValueKind};

use crate::apply::apply_value;
use crate::store::{IndexingMode, TypedValueStore};

/// One [`TypedValueStore`] per value kind.
///
/// A name is expected to live in at most one kind at a time; nothing here
/// enforces it. Gather writers only see stable stores. Lookup consumers call
/// [`ParameterSet::optimize_for_lookup`] first and stop inserting until the
/// next [`ParameterSet::reset`].
#[derive(Clone, Debug)]
pub struct ParameterSet {
    stores: [TypedValueStore; ValueKind::COUNT],
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::with_mode(IndexingMode::Stable)
    }

    pub fn with_mode(mode: IndexingMode) -> Self {
        Self {
            stores: ValueKind::ALL.map(|kind| TypedValueStore::new(kind, mode)),
        }
    }

    pub fn with_capacity(mode: IndexingMode, per_kind: usize) -> Self {
        Self {
            stores: ValueKind::ALL
                .map(|kind| TypedValueStore::with_capacity(kind, mode, per_kind)),
        }
    }

    #[inline]
    pub fn store(&self, kind: ValueKind) -> &TypedValueStore {
        &self.stores[kind.index()]
    }

    #[inline]
    pub fn store_mut(&mut self, kind: ValueKind) -> &mut TypedValueStore {
        &mut self.stores[kind.index()]
    }

    /// Add-or-get the slot for `name` and overwrite it with `value`.
    pub fn add<T: NativeValue>(&mut self, name: Name, value: T) -> usize {
        let store = self.store_mut(T::KIND);
        let index = store.add_or_get_index(name);
        *store.get_mut::<T>(index) = value;
        index
    }

    pub fn add_value(&mut self, name: Name, value: Value) -> usize {
        let store = self.store_mut(value.kind());
        let index = store.add_or_get_index(name);
        store.set_value(index, value);
        index
    }

    /// Add-or-get a default-initialized slot.
    #[inline]
    pub fn allocate(&mut self, name: Name, kind: ValueKind) -> usize {
        self.store_mut(kind).add_or_get_index(name)
    }

    pub fn find(&self, name: Name, kind: ValueKind) -> Option<Value> {
        let store = self.store(kind);
        store.find(name).map(|i| store.value(i))
    }

    pub fn find_typed<T: NativeValue>(&self, name: Name) -> Option<T> {
        let store = self.store(T::KIND);
        store.find(name).map(|i| *store.get::<T>(i))
    }

    /// Probe every kind in [`ValueKind::ALL`] order; the first hit wins.
    pub fn find_any_kind(&self, name: Name) -> Option<Value> {
        ValueKind::ALL
            .iter()
            .find_map(|kind| self.find(name, *kind))
    }

    pub fn remove(&mut self, name: Name, kind: ValueKind) -> bool {
        self.store_mut(kind).remove(name)
    }

    pub fn reset(&mut self) {
        for store in &mut self.stores {
            store.reset();
        }
    }

    pub fn reserve(&mut self, per_kind: usize) {
        for store in &mut self.stores {
            store.reserve(per_kind);
        }
    }

    /// Sort every stable store and switch it to binary-search lookup.
    pub fn optimize_for_lookup(&mut self) {
        for store in &mut self.stores {
            store.optimize_for_lookup();
        }
    }

    pub fn len(&self) -> usize {
        self.stores.iter().map(TypedValueStore::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.iter().all(TypedValueStore::is_empty)
    }

    /// Every `(name, value)` pair, kind by kind.
    pub fn iter(&self) -> impl Iterator<Item = (Name, Value)> + '_ {
        self.stores.iter().flat_map(TypedValueStore::iter)
    }

    /// Apply every pair to `target`. Returns the number of values applied.
    pub fn apply_to<T: RigTarget + ?Sized>(&self, target: &mut T) -> usize {
        let mut applied = 0;
        for (name, value) in self.iter() {
            apply_value(target, name, value);
            applied += 1;
        }
        applied
    }

    /// Apply the value stored for `name` (any kind) and forget it.
    pub fn apply_and_remove<T: RigTarget + ?Sized>(&mut self, target: &mut T, name: Name) -> bool {
        let Some(value) = self.find_any_kind(name) else {
            return false;
        };
        apply_value(target, name, value);
        self.remove(name, value.kind())
    }

    /// Sorted copy for read-only introspection; `self` is left untouched.
    pub fn snapshot(&self) -> ParameterSet {
        let mut copy = self.clone();
        copy.optimize_for_lookup();
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigbuf_api_core::{ParentSelector, SpaceKey};

    #[derive(Default)]
    struct Sink(Vec<(Name, Value)>);

    impl RigTarget for Sink {
        fn set_named_value(&mut self, name: Name, value: Value) {
            self.0.push((name, value));
        }
        fn switch_parent(&mut self, element: Name, parent: ParentSelector) {
            let key = match parent {
                ParentSelector::Default => SpaceKey::parent(),
                ParentSelector::World => SpaceKey::world(),
                ParentSelector::Element(e) => SpaceKey::element(e),
            };
            self.0.push((element, Value::Space(key)));
        }
    }

    #[test]
    fn values_land_in_their_kind() {
        let mut set = ParameterSet::new();
        set.add(Name::new("Speed"), 3.5f32);
        set.add(Name::new("Enabled"), true);
        set.add_value(Name::new("Mode"), Value::Enum(2));
        assert_eq!(set.store(ValueKind::Scalar).len(), 1);
        assert_eq!(set.store(ValueKind::Bool).len(), 1);
        assert_eq!(set.len(), 3);
        assert_eq!(set.find_typed::<f32>(Name::new("Speed")), Some(3.5));
        assert_eq!(set.find(Name::new("Speed"), ValueKind::Integer), None);
        assert_eq!(set.find_any_kind(Name::new("Mode")), Some(Value::Enum(2)));
        assert_eq!(set.find_any_kind(Name::new("Missing")), None);
    }

    #[test]
    fn find_any_kind_probes_in_fixed_order() {
        let mut set = ParameterSet::new();
        let name = Name::new("Shared");
        set.add(name, 1.0f32);
        set.add(name, false);
        assert_eq!(set.find_any_kind(name), Some(Value::Bool(false)));
    }

    #[test]
    fn snapshot_is_sorted_and_source_stays_stable() {
        let mut set = ParameterSet::new();
        for n in ["c", "a", "b"] {
            set.add(Name::new(n), 1i32);
        }
        let snap = set.snapshot();
        assert_eq!(set.store(ValueKind::Integer).mode(), IndexingMode::Stable);
        assert_eq!(snap.store(ValueKind::Integer).mode(), IndexingMode::Sorted);
        let names: Vec<&str> = snap.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn apply_and_remove_applies_once() {
        let mut set = ParameterSet::with_mode(IndexingMode::Sorted);
        let name = Name::new("ik_switch");
        set.add(name, SpaceKey::world());
        let mut sink = Sink::default();
        assert!(set.apply_and_remove(&mut sink, name));
        assert!(!set.apply_and_remove(&mut sink, name));
        assert_eq!(sink.0, vec![(name, Value::Space(SpaceKey::world()))]);
        assert!(set.is_empty());
    }

    #[test]
    fn reset_clears_every_kind() {
        let mut set = ParameterSet::with_capacity(IndexingMode::Stable, 4);
        set.add(Name::new("x"), [1.0f32, 2.0, 3.0]);
        set.add(Name::new("y"), 7u8);
        set.reset();
        assert!(set.is_empty());
        assert_eq!(set.store(ValueKind::Vector3).capacity(), 8);
    }

    #[test]
    fn apply_to_counts_values() {
        let mut set = ParameterSet::new();
        set.add(Name::new("a"), 1.0f32);
        set.add(Name::new("b"), 2i32);
        let mut sink = Sink::default();
        assert_eq!(set.apply_to(&mut sink), 2);
        assert_eq!(sink.0.len(), 2);
    }
}

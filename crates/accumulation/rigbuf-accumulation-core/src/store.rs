//! Packed `(name, value)` storage for a single value kind.
//!
//! Names and values live in one heap block laid out as
//! `[names; capacity][padding][values; capacity]`. The value region starts at
//! an offset that depends on `capacity`, so growing the block moves both
//! arrays. Every native representation is `Copy` without a destructor, which
//! lets the store copy, shift and forget elements as raw bytes.

use std::alloc::{self, Layout};
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use rigbuf_api_core::{Name, NativeValue, Value, ValueKind};

/// Capacity always grows to a multiple of this many slots.
pub const BLOCK_GRANULARITY: usize = 8;

/// Element count up to which `resort` keeps its scratch buffers inline.
const RESORT_INLINE_LEN: usize = 32;
/// Upper bound on any native value size, used to size the inline scratch.
const MAX_VALUE_SIZE: usize = 40;
const RESORT_INLINE_BYTES: usize = RESORT_INLINE_LEN * MAX_VALUE_SIZE;

/// How a store assigns and looks up slot indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexingMode {
    /// Append-only; indices never move until `reset`. Lookup is a linear scan.
    Stable,
    /// Names kept sorted; lookup, insert and remove use binary search.
    Sorted,
}

pub struct TypedValueStore {
    kind: ValueKind,
    mode: IndexingMode,
    /// Mode restored by `reset`.
    base_mode: IndexingMode,
    len: usize,
    capacity: usize,
    values_offset: usize,
    block: NonNull<u8>,
}

// SAFETY: the block only holds `Name` (a `&'static str`) and `Copy` native
// values, and is only reached through `&self`/`&mut self`.
unsafe impl Send for TypedValueStore {}
unsafe impl Sync for TypedValueStore {}

fn capacity_overflow() -> ! {
    panic!("TypedValueStore capacity overflow")
}

/// Block layout and value-region offset for `capacity` slots of `kind`.
fn block_layout(kind: ValueKind, capacity: usize) -> (Layout, usize) {
    let value = kind.layout();
    let names = Layout::array::<Name>(capacity).unwrap_or_else(|_| capacity_overflow());
    let values_size = value
        .size()
        .checked_mul(capacity)
        .unwrap_or_else(|| capacity_overflow());
    let values = Layout::from_size_align(values_size, value.align())
        .unwrap_or_else(|_| capacity_overflow());
    names.extend(values).unwrap_or_else(|_| capacity_overflow())
}

impl TypedValueStore {
    pub fn new(kind: ValueKind, mode: IndexingMode) -> Self {
        Self {
            kind,
            mode,
            base_mode: mode,
            len: 0,
            capacity: 0,
            values_offset: 0,
            block: NonNull::dangling(),
        }
    }

    pub fn with_capacity(kind: ValueKind, mode: IndexingMode, capacity: usize) -> Self {
        let mut store = Self::new(kind, mode);
        store.reserve(capacity);
        store
    }

    #[inline]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    #[inline]
    pub fn mode(&self) -> IndexingMode {
        self.mode
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn value_size(&self) -> usize {
        self.kind.layout().size()
    }

    #[inline]
    fn names_ptr(&self) -> *mut Name {
        self.block.as_ptr().cast::<Name>()
    }

    #[inline]
    fn values_ptr(&self) -> *mut u8 {
        self.block.as_ptr().wrapping_add(self.values_offset)
    }

    /// Base address of the value region. Only meaningful while the block is
    /// not reallocated; used by the gather writer.
    #[inline]
    pub(crate) fn values_base(&mut self) -> *mut u8 {
        self.values_ptr()
    }

    pub fn names(&self) -> &[Name] {
        if self.capacity == 0 {
            return &[];
        }
        // SAFETY: the first `len` names are initialized and the block is
        // aligned for `Name`.
        unsafe { std::slice::from_raw_parts(self.names_ptr(), self.len) }
    }

    #[inline]
    pub fn name(&self, index: usize) -> Name {
        self.names()[index]
    }

    /// Grow capacity to the next multiple of [`BLOCK_GRANULARITY`] that is at
    /// least `n`. Never shrinks.
    pub fn reserve(&mut self, n: usize) {
        if n <= self.capacity {
            return;
        }
        let new_capacity = n
            .checked_next_multiple_of(BLOCK_GRANULARITY)
            .unwrap_or_else(|| capacity_overflow());
        let (layout, values_offset) = block_layout(self.kind, new_capacity);
        // SAFETY: layout has non-zero size (capacity > 0, all kinds sized).
        let raw = unsafe { alloc::alloc(layout) };
        let Some(new_block) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout)
        };
        if self.capacity > 0 {
            let (old_layout, _) = block_layout(self.kind, self.capacity);
            // SAFETY: both blocks hold at least `len` slots; the value region
            // moves because its offset depends on capacity.
            unsafe {
                ptr::copy_nonoverlapping(
                    self.names_ptr(),
                    new_block.as_ptr().cast::<Name>(),
                    self.len,
                );
                ptr::copy_nonoverlapping(
                    self.values_ptr(),
                    new_block.as_ptr().add(values_offset),
                    self.len * self.value_size(),
                );
                alloc::dealloc(self.block.as_ptr(), old_layout);
            }
        }
        self.block = new_block;
        self.capacity = new_capacity;
        self.values_offset = values_offset;
    }

    fn insert_default_at(&mut self, index: usize, name: Name) {
        debug_assert!(index <= self.len);
        self.reserve(self.len + 1);
        let size = self.value_size();
        let tail = self.len - index;
        // SAFETY: capacity > len after reserve; the shifted ranges stay
        // inside the block and value slots are aligned for the kind.
        unsafe {
            let names = self.names_ptr();
            let values = self.values_ptr();
            if tail > 0 {
                ptr::copy(names.add(index), names.add(index + 1), tail);
                ptr::copy(
                    values.add(index * size),
                    values.add((index + 1) * size),
                    tail * size,
                );
            }
            names.add(index).write(name);
            self.kind.default_value().write_to(values.add(index * size));
        }
        self.len += 1;
    }

    fn remove_at(&mut self, index: usize) {
        assert!(index < self.len, "slot {index} out of range ({})", self.len);
        let size = self.value_size();
        let tail = self.len - index - 1;
        // SAFETY: index < len; moves the tail down by one slot.
        unsafe {
            let names = self.names_ptr();
            let values = self.values_ptr();
            if tail > 0 {
                ptr::copy(names.add(index + 1), names.add(index), tail);
                ptr::copy(
                    values.add((index + 1) * size),
                    values.add(index * size),
                    tail * size,
                );
            }
        }
        self.len -= 1;
    }

    /// Allocate (stable) or find-or-insert (sorted) the slot for `name`.
    ///
    /// Stable mode never deduplicates: asking twice for the same name in one
    /// cycle yields two slots.
    pub fn add_or_get_index(&mut self, name: Name) -> usize {
        match self.mode {
            IndexingMode::Stable => {
                let index = self.len;
                self.insert_default_at(index, name);
                index
            }
            IndexingMode::Sorted => match self.names().binary_search(&name) {
                Ok(index) => index,
                Err(index) => {
                    self.insert_default_at(index, name);
                    index
                }
            },
        }
    }

    pub fn find(&self, name: Name) -> Option<usize> {
        match self.mode {
            IndexingMode::Stable => self.names().iter().position(|n| *n == name),
            IndexingMode::Sorted => self.names().binary_search(&name).ok(),
        }
    }

    #[inline]
    fn check_access<T: NativeValue>(&self, index: usize) {
        assert!(
            T::KIND == self.kind,
            "{} access on a {} store",
            T::KIND,
            self.kind
        );
        assert!(index < self.len, "slot {index} out of range ({})", self.len);
    }

    pub fn get<T: NativeValue>(&self, index: usize) -> &T {
        self.check_access::<T>(index);
        // SAFETY: kind matches `T`, index is in range and initialized.
        unsafe { &*self.values_ptr().add(index * self.value_size()).cast::<T>() }
    }

    pub fn get_mut<T: NativeValue>(&mut self, index: usize) -> &mut T {
        self.check_access::<T>(index);
        // SAFETY: as in `get`, with exclusive access through `&mut self`.
        unsafe { &mut *self.values_ptr().add(index * self.value_size()).cast::<T>() }
    }

    /// Value at `index` as a dynamic [`Value`].
    pub fn value(&self, index: usize) -> Value {
        assert!(index < self.len, "slot {index} out of range ({})", self.len);
        // SAFETY: index in range, slot initialized for `self.kind`.
        unsafe { Value::read_from(self.kind, self.values_ptr().add(index * self.value_size())) }
    }

    /// Overwrite the value at `index`. The value's kind must match the store.
    pub fn set_value(&mut self, index: usize, value: Value) {
        assert!(
            value.kind() == self.kind,
            "{} value written to a {} store",
            value.kind(),
            self.kind
        );
        assert!(index < self.len, "slot {index} out of range ({})", self.len);
        // SAFETY: index in range; kind checked above.
        unsafe { value.write_to(self.values_ptr().add(index * self.value_size())) }
    }

    /// Remove the slot for `name`, shifting every later slot down by one.
    pub fn remove(&mut self, name: Name) -> bool {
        match self.find(name) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    /// Sort slots by name in place. Only valid on a stable store; the caller
    /// flips the mode afterwards.
    pub fn resort(&mut self) {
        debug_assert_eq!(
            self.mode,
            IndexingMode::Stable,
            "resort on an already sorted store"
        );
        let len = self.len;
        if len < 2 {
            return;
        }
        let size = self.value_size();
        let mut order: SmallVec<[(Name, usize); RESORT_INLINE_LEN]> =
            self.names().iter().copied().zip(0..len).collect();
        order.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let bytes = len * size;
        let mut scratch: SmallVec<[MaybeUninit<u8>; RESORT_INLINE_BYTES]> =
            SmallVec::with_capacity(bytes);
        // SAFETY: scratch has room for `bytes`; values are copied as raw
        // bytes (padding included) and written back slot by slot.
        unsafe {
            ptr::copy_nonoverlapping(
                self.values_ptr().cast::<MaybeUninit<u8>>(),
                scratch.as_mut_ptr(),
                bytes,
            );
            scratch.set_len(bytes);
            let names = self.names_ptr();
            let values = self.values_ptr();
            for (dst, (name, src)) in order.iter().enumerate() {
                names.add(dst).write(*name);
                ptr::copy_nonoverlapping(
                    scratch.as_ptr().add(src * size).cast::<u8>(),
                    values.add(dst * size),
                    size,
                );
            }
        }
    }

    pub(crate) fn mark_sorted(&mut self) {
        self.mode = IndexingMode::Sorted;
    }

    /// Sort once and switch to binary-search lookup.
    pub fn optimize_for_lookup(&mut self) {
        if self.mode == IndexingMode::Stable {
            self.resort();
            self.mark_sorted();
        }
    }

    /// Forget every slot, keeping capacity, and restore the creation mode.
    pub fn reset(&mut self) {
        self.len = 0;
        self.mode = self.base_mode;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Name, Value)> + '_ {
        (0..self.len).map(move |i| (self.name(i), self.value(i)))
    }
}

impl Drop for TypedValueStore {
    fn drop(&mut self) {
        if self.capacity > 0 {
            let (layout, _) = block_layout(self.kind, self.capacity);
            // SAFETY: the block was allocated with this layout.
            unsafe { alloc::dealloc(self.block.as_ptr(), layout) };
        }
    }
}

impl Clone for TypedValueStore {
    fn clone(&self) -> Self {
        let mut out = TypedValueStore::new(self.kind, self.base_mode);
        out.mode = self.mode;
        out.reserve(self.len);
        if self.len > 0 {
            // SAFETY: `out` holds at least `len` slots of the same kind.
            unsafe {
                ptr::copy_nonoverlapping(self.names_ptr(), out.names_ptr(), self.len);
                ptr::copy_nonoverlapping(
                    self.values_ptr(),
                    out.values_ptr(),
                    self.len * self.value_size(),
                );
            }
        }
        out.len = self.len;
        out
    }
}

impl fmt::Debug for TypedValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedValueStore")
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("slots", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigbuf_api_core::{EulerTransform, SpaceKey};

    fn names(prefix: &str, n: usize) -> Vec<Name> {
        (0..n).map(|i| Name::new(&format!("{prefix}{i:03}"))).collect()
    }

    fn sample(kind: ValueKind, i: usize) -> Value {
        let f = i as f32;
        match kind {
            ValueKind::Space => Value::Space(SpaceKey::element(Name::new(&format!("space{i}")))),
            ValueKind::Bool => Value::Bool(i % 2 == 1),
            ValueKind::Enum => Value::Enum((i % 250) as u8),
            ValueKind::Integer => Value::Integer(i as i32 - 7),
            ValueKind::Scalar => Value::Scalar(f * 0.5),
            ValueKind::Vector3 => Value::Vector3([f, f + 1.0, f + 2.0]),
            ValueKind::Transform => Value::Transform(EulerTransform::new([f; 3], [0.0, f, 0.0], [1.0; 3])),
        }
    }

    #[test]
    fn write_then_find_returns_value() {
        for mode in [IndexingMode::Stable, IndexingMode::Sorted] {
            for kind in ValueKind::ALL {
                let mut store = TypedValueStore::new(kind, mode);
                for (i, name) in names("ctrl_", 20).into_iter().enumerate().rev() {
                    let index = store.add_or_get_index(name);
                    store.set_value(index, sample(kind, i));
                }
                for (i, name) in names("ctrl_", 20).into_iter().enumerate() {
                    let index = store.find(name).expect("name present");
                    assert_eq!(store.value(index), sample(kind, i), "{kind} {mode:?}");
                }
            }
        }
    }

    #[test]
    fn new_slots_hold_the_kind_default() {
        let mut store = TypedValueStore::new(ValueKind::Transform, IndexingMode::Stable);
        let i = store.add_or_get_index(Name::new("root"));
        assert_eq!(*store.get::<EulerTransform>(i), EulerTransform::IDENTITY);
    }

    #[test]
    fn stable_indices_do_not_move() {
        let mut store = TypedValueStore::new(ValueKind::Scalar, IndexingMode::Stable);
        let ns = names("z_", 40);
        let assigned: Vec<usize> = ns.iter().map(|n| store.add_or_get_index(*n)).collect();
        assert_eq!(assigned, (0..40).collect::<Vec<_>>());
        for (i, n) in ns.iter().enumerate() {
            *store.get_mut::<f32>(assigned[i]) = i as f32;
            assert_eq!(store.find(*n), Some(assigned[i]));
        }
        // The names are reverse-sorted relative to insertion for some
        // prefixes; stable mode must not care.
        assert_eq!(*store.get::<f32>(assigned[39]), 39.0);
    }

    #[test]
    fn stable_mode_allows_duplicates() {
        let mut store = TypedValueStore::new(ValueKind::Bool, IndexingMode::Stable);
        let name = Name::new("Enabled");
        let a = store.add_or_get_index(name);
        let b = store.add_or_get_index(name);
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.find(name), Some(a));
    }

    #[test]
    fn sorted_mode_keeps_names_ordered() {
        let mut store = TypedValueStore::new(ValueKind::Integer, IndexingMode::Sorted);
        let mut seed: u32 = 17;
        for _ in 0..64 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let name = Name::new(&format!("n{}", (seed >> 16) % 50));
            if seed % 5 == 0 {
                store.remove(name);
            } else {
                let i = store.add_or_get_index(name);
                *store.get_mut::<i32>(i) = seed as i32;
            }
            assert!(store.names().windows(2).all(|w| w[0] <= w[1]));
        }
        // Re-requesting an existing name returns its slot.
        let first = store.names().first().copied();
        if let Some(first) = first {
            let before = store.len();
            assert_eq!(store.add_or_get_index(first), 0);
            assert_eq!(store.len(), before);
        }
    }

    #[test]
    fn resort_preserves_pairs() {
        for kind in ValueKind::ALL {
            let mut store = TypedValueStore::new(kind, IndexingMode::Stable);
            let mut expected = Vec::new();
            // 45 elements exceeds the inline scratch length.
            for i in (0..45).rev() {
                let name = Name::new(&format!("m{:02}", (i * 7) % 45));
                let index = store.add_or_get_index(name);
                store.set_value(index, sample(kind, i));
                expected.push((name, sample(kind, i)));
            }
            store.optimize_for_lookup();
            assert_eq!(store.mode(), IndexingMode::Sorted);
            assert!(store.names().windows(2).all(|w| w[0] <= w[1]));
            let mut got: Vec<(Name, Value)> = store.iter().collect();
            got.sort_by(|a, b| a.0.cmp(&b.0));
            expected.sort_by(|a, b| a.0.cmp(&b.0));
            assert_eq!(got, expected);
            for (name, value) in &expected {
                let index = store.find(*name).expect("findable after resort");
                assert_eq!(store.value(index), *value);
            }
        }
    }

    #[test]
    fn reserve_rounds_to_blocks() {
        let mut store = TypedValueStore::new(ValueKind::Vector3, IndexingMode::Stable);
        let mut last = 0;
        for n in [0, 1, 7, 8, 9, 3, 17, 64, 65, 10] {
            store.reserve(n);
            assert!(store.capacity() >= last);
            assert!(store.capacity() >= n);
            assert_eq!(store.capacity() % BLOCK_GRANULARITY, 0);
            last = store.capacity();
        }
        assert_eq!(store.capacity(), 72);
    }

    #[test]
    fn growth_moves_values_with_names() {
        let mut store = TypedValueStore::new(ValueKind::Transform, IndexingMode::Stable);
        for i in 0..8 {
            let index = store.add_or_get_index(Name::new(&format!("t{i}")));
            store.set_value(index, sample(ValueKind::Transform, i));
        }
        assert_eq!(store.capacity(), 8);
        store.add_or_get_index(Name::new("t8"));
        assert_eq!(store.capacity(), 16);
        for i in 0..8 {
            assert_eq!(store.value(i), sample(ValueKind::Transform, i));
            assert_eq!(store.name(i).as_str(), format!("t{i}"));
        }
    }

    #[test]
    fn remove_shifts_tail() {
        let mut store = TypedValueStore::new(ValueKind::Scalar, IndexingMode::Stable);
        for (i, n) in ["a", "b", "c", "d"].iter().enumerate() {
            let index = store.add_or_get_index(Name::new(n));
            *store.get_mut::<f32>(index) = i as f32;
        }
        assert!(store.remove(Name::new("b")));
        assert!(!store.remove(Name::new("b")));
        assert_eq!(store.find(Name::new("c")), Some(1));
        assert_eq!(*store.get::<f32>(1), 2.0);
        assert_eq!(*store.get::<f32>(2), 3.0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn reset_keeps_capacity_and_restores_mode() {
        let mut store = TypedValueStore::new(ValueKind::Enum, IndexingMode::Stable);
        for n in names("e", 12) {
            store.add_or_get_index(n);
        }
        store.optimize_for_lookup();
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 16);
        assert_eq!(store.mode(), IndexingMode::Stable);
    }

    #[test]
    fn clone_copies_slots() {
        let mut store = TypedValueStore::new(ValueKind::Space, IndexingMode::Sorted);
        let i = store.add_or_get_index(Name::new("hand_ik"));
        *store.get_mut::<SpaceKey>(i) = SpaceKey::world();
        let copy = store.clone();
        drop(store);
        assert_eq!(copy.mode(), IndexingMode::Sorted);
        assert_eq!(copy.value(0), Value::Space(SpaceKey::world()));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn get_out_of_range_panics() {
        let store = TypedValueStore::new(ValueKind::Scalar, IndexingMode::Stable);
        let _ = store.get::<f32>(0);
    }

    #[test]
    #[should_panic(expected = "access on a")]
    fn get_with_wrong_kind_panics() {
        let mut store = TypedValueStore::new(ValueKind::Scalar, IndexingMode::Stable);
        let i = store.add_or_get_index(Name::new("x"));
        let _ = store.get::<i32>(i);
    }
}

//! Per-track accumulation entries, cycle bookkeeping and the apply driver.
//!
//! `entries[..next_valid]` are the tracks primed this cycle, the rest are
//! stale. `index_by_owner` always mirrors entry positions: every swap in
//! [`AccumulationTable::mark_active`] rewrites both mappings.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use rigbuf_api_core::{Name, NativeValue, Value, ValueKind};

use crate::config::Config;
use crate::error::AccumulationError;
use crate::gather::{RawColumn, SlotBatch};
use crate::ids::TrackId;
use crate::params::ParameterSet;
use crate::store::IndexingMode;
use crate::target::{TargetHandle, TargetResolver};

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque reference to one slot, valid for the cycle it was allocated in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    entry_index: u16,
    slot_index: u16,
    kind: ValueKind,
}

impl SlotHandle {
    /// Handed out when the owner has no active entry. Writes through it are
    /// ignored.
    pub const INVALID: SlotHandle = SlotHandle {
        entry_index: u16::MAX,
        slot_index: u16::MAX,
        kind: ValueKind::Scalar,
    };

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.entry_index != u16::MAX
    }

    #[inline]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    #[inline]
    pub(crate) fn entry_index(&self) -> usize {
        self.entry_index as usize
    }

    #[inline]
    pub(crate) fn slot_index(&self) -> usize {
        self.slot_index as usize
    }
}

/// Accumulated values for one track.
#[derive(Debug)]
pub struct AccumulationEntry {
    target: TargetHandle,
    owner: TrackId,
    values: ParameterSet,
    is_active: bool,
}

impl AccumulationEntry {
    pub fn target(&self) -> TargetHandle {
        self.target
    }

    pub fn owner(&self) -> TrackId {
        self.owner
    }

    pub fn values(&self) -> &ParameterSet {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut ParameterSet {
        &mut self.values
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Outcome of one [`AccumulationTable::apply_all`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyStats {
    pub entries_applied: usize,
    /// Active entries whose target had expired.
    pub entries_skipped: usize,
    pub values_applied: usize,
}

#[derive(Debug)]
pub struct AccumulationTable {
    pub(crate) id: u64,
    pub(crate) cycle: u64,
    pub(crate) entries: Vec<AccumulationEntry>,
    index_by_owner: HashMap<TrackId, usize>,
    next_valid: usize,
    recycled: Vec<ParameterSet>,
    /// Raw value columns handed to the gather writer, reused every cycle.
    pub(crate) columns: Vec<RawColumn>,
    config: Config,
}

impl Default for AccumulationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulationTable {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            cycle: 0,
            entries: Vec::with_capacity(config.initial_entries),
            index_by_owner: HashMap::with_capacity(config.initial_entries),
            next_valid: 0,
            recycled: Vec::new(),
            columns: Vec::with_capacity(config.initial_entries * ValueKind::COUNT),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of `prime_for_cycle` calls so far.
    #[inline]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries primed this cycle.
    #[inline]
    pub fn active_len(&self) -> usize {
        self.next_valid
    }

    pub fn entries(&self) -> &[AccumulationEntry] {
        &self.entries
    }

    pub fn active_entries(&self) -> &[AccumulationEntry] {
        &self.entries[..self.next_valid]
    }

    pub fn entry(&self, index: usize) -> Option<&AccumulationEntry> {
        self.entries.get(index)
    }

    pub fn contains_owner(&self, owner: TrackId) -> bool {
        self.index_by_owner.contains_key(&owner)
    }

    pub fn find_parameters(&self, owner: TrackId) -> Option<&ParameterSet> {
        self.index_by_owner
            .get(&owner)
            .map(|&index| &self.entries[index].values)
    }

    /// Start a new population cycle: every entry becomes stale and empty
    /// (capacity retained). Outstanding handles and batches expire.
    pub fn prime_for_cycle(&mut self) {
        self.next_valid = 0;
        for entry in &mut self.entries {
            entry.is_active = false;
            entry.values.reset();
        }
        self.cycle = self.cycle.wrapping_add(1);
    }

    /// Find or create the entry for `owner`, refresh its target and mark it
    /// active. Returns the entry's current index.
    pub fn ensure_entry(&mut self, owner: TrackId, target: TargetHandle) -> usize {
        if let Some(&index) = self.index_by_owner.get(&owner) {
            self.entries[index].target = target;
            return self.mark_active(index);
        }
        let index = self.entries.len();
        assert!(
            index < u16::MAX as usize,
            "accumulation table is limited to {} entries",
            u16::MAX
        );
        let values = self.recycled.pop().unwrap_or_else(|| {
            ParameterSet::with_capacity(IndexingMode::Stable, self.config.initial_slots_per_kind)
        });
        self.entries.push(AccumulationEntry {
            target,
            owner,
            values,
            is_active: false,
        });
        self.index_by_owner.insert(owner, index);
        trace!("accumulation entry created for {owner:?} at {index}");
        self.mark_active(index)
    }

    /// Move entry `index` into the active partition. Returns its new index.
    pub fn mark_active(&mut self, index: usize) -> usize {
        assert!(
            index < self.entries.len(),
            "entry {index} out of range ({})",
            self.entries.len()
        );
        if self.entries[index].is_active {
            return index;
        }
        let dst = self.next_valid;
        if index != dst {
            self.entries.swap(index, dst);
            for position in [index, dst] {
                let owner = self.entries[position].owner;
                if let Some(slot) = self.index_by_owner.get_mut(&owner) {
                    *slot = position;
                }
            }
        }
        self.entries[dst].is_active = true;
        self.next_valid += 1;
        dst
    }

    /// Allocate a default-initialized slot for `name` in `owner`'s entry.
    ///
    /// Returns [`SlotHandle::INVALID`] when `owner` has no entry primed this
    /// cycle. Asking twice for the same name yields two distinct slots.
    pub fn allocate_slot(&mut self, owner: TrackId, name: Name, kind: ValueKind) -> SlotHandle {
        let Some(&entry_index) = self.index_by_owner.get(&owner) else {
            return SlotHandle::INVALID;
        };
        if entry_index >= self.next_valid {
            return SlotHandle::INVALID;
        }
        let values = &mut self.entries[entry_index].values;
        debug_assert_eq!(values.store(kind).mode(), IndexingMode::Stable);
        let slot_index = values.allocate(name, kind);
        assert!(
            slot_index <= u16::MAX as usize,
            "{kind} slots for {owner:?} exceed {}",
            u16::MAX
        );
        SlotHandle {
            entry_index: entry_index as u16,
            slot_index: slot_index as u16,
            kind,
        }
    }

    pub fn try_allocate_slot(
        &mut self,
        owner: TrackId,
        name: Name,
        kind: ValueKind,
    ) -> Result<SlotHandle, AccumulationError> {
        let handle = self.allocate_slot(owner, name, kind);
        if handle.is_valid() {
            Ok(handle)
        } else {
            Err(AccumulationError::UnknownOwner(owner))
        }
    }

    /// Allocate one slot per `(name, kind)` request into a fresh batch.
    pub fn allocate_batch<I>(&mut self, owner: TrackId, slots: I) -> SlotBatch
    where
        I: IntoIterator<Item = (Name, ValueKind)>,
    {
        let mut batch = SlotBatch::empty(owner);
        self.refill_batch(&mut batch, owner, slots);
        batch
    }

    /// Like [`Self::allocate_batch`], reusing `batch`'s buffer.
    pub fn refill_batch<I>(&mut self, batch: &mut SlotBatch, owner: TrackId, slots: I)
    where
        I: IntoIterator<Item = (Name, ValueKind)>,
    {
        batch.table = self.id;
        batch.cycle = self.cycle;
        batch.owner = owner;
        batch.handles.clear();
        for (name, kind) in slots {
            let handle = self.allocate_slot(owner, name, kind);
            batch.handles.push(handle);
        }
    }

    /// Overwrite the slot behind `handle`. Invalid handles are ignored.
    pub fn store<T: NativeValue>(&mut self, handle: SlotHandle, value: T) {
        if !handle.is_valid() {
            return;
        }
        assert!(
            handle.kind == T::KIND,
            "{} value stored through a {} handle",
            T::KIND,
            handle.kind
        );
        let entry = &mut self.entries[handle.entry_index()];
        *entry.values.store_mut(T::KIND).get_mut::<T>(handle.slot_index()) = value;
    }

    pub fn store_value(&mut self, handle: SlotHandle, value: Value) {
        if !handle.is_valid() {
            return;
        }
        let entry = &mut self.entries[handle.entry_index()];
        entry
            .values
            .store_mut(handle.kind)
            .set_value(handle.slot_index(), value);
    }

    /// Checked variant of [`Self::store_value`].
    pub fn try_store_value(
        &mut self,
        handle: SlotHandle,
        value: Value,
    ) -> Result<(), AccumulationError> {
        if !handle.is_valid() {
            return Err(AccumulationError::InvalidHandle);
        }
        if value.kind() != handle.kind {
            return Err(AccumulationError::KindMismatch {
                expected: handle.kind,
                actual: value.kind(),
            });
        }
        self.store_value(handle, value);
        Ok(())
    }

    /// Push every active entry's values onto its target. Entries whose
    /// target no longer resolves are skipped.
    pub fn apply_all<R>(&self, resolver: &mut R) -> ApplyStats
    where
        R: TargetResolver + ?Sized,
    {
        let mut stats = ApplyStats::default();
        for entry in &self.entries[..self.next_valid] {
            match resolver.resolve(entry.target) {
                Some(target) => {
                    stats.values_applied += entry.values.apply_to(target);
                    stats.entries_applied += 1;
                }
                None => {
                    trace!("skipping {:?}: target {:?} expired", entry.owner, entry.target);
                    stats.entries_skipped += 1;
                }
            }
        }
        stats
    }

    /// Drop every entry not primed this cycle. Returns how many were removed.
    pub fn compact(&mut self) -> usize {
        let removed = self.entries.len() - self.next_valid;
        if removed == 0 {
            return 0;
        }
        for mut entry in self.entries.drain(self.next_valid..) {
            self.index_by_owner.remove(&entry.owner);
            if self.recycled.len() < self.config.max_recycled_sets {
                entry.values.reset();
                self.recycled.push(entry.values);
            }
        }
        debug!(
            "compacted {removed} stale accumulation entries ({} live, {} recycled sets)",
            self.entries.len(),
            self.recycled.len()
        );
        removed
    }

    /// Parameter sets waiting to be reused by new entries.
    pub fn recycled_len(&self) -> usize {
        self.recycled.len()
    }

    /// Current position of `owner`'s entry.
    pub fn index_of(&self, owner: TrackId) -> Option<usize> {
        self.index_by_owner.get(&owner).copied()
    }

    #[cfg(test)]
    fn validate(&self) {
        assert!(self.next_valid <= self.entries.len());
        assert_eq!(self.index_by_owner.len(), self.entries.len());
        for (i, entry) in self.entries.iter().enumerate() {
            assert_eq!(entry.is_active, i < self.next_valid, "entry {i} partition");
            assert_eq!(self.index_by_owner.get(&entry.owner), Some(&i), "owner map for {i}");
        }
    }
}

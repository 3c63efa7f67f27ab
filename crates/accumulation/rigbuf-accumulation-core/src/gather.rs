//! Lock-free parallel writes into a primed table.
//!
//! Slots are allocated serially into [`SlotBatch`]es. A [`GatherWriter`]
//! borrows the table exclusively for the whole gather phase, so nothing can
//! insert, remove or resort while writers run. A batch is only written
//! through `&mut SlotBatch`, and stable-mode allocation never hands out the
//! same slot twice, so concurrent batch writers touch disjoint memory.

use rayon::prelude::*;

use rigbuf_api_core::{NativeValue, Value, ValueKind};

use crate::ids::TrackId;
use crate::store::TypedValueStore;
use crate::table::{AccumulationTable, SlotHandle};

/// Value region of one store, captured while the table is mutably borrowed.
#[derive(Copy, Clone, Debug)]
pub(crate) struct RawColumn {
    base: *mut u8,
    len: usize,
    stride: usize,
}

// SAFETY: columns are only dereferenced through `BatchWriter`, whose
// handles are disjoint across batches of one cycle.
unsafe impl Send for RawColumn {}
unsafe impl Sync for RawColumn {}

impl RawColumn {
    fn of(store: &mut TypedValueStore) -> Self {
        Self {
            len: store.len(),
            stride: store.kind().layout().size(),
            base: store.values_base(),
        }
    }
}

/// Slot handles allocated for one track in one cycle.
///
/// Not `Clone`: holding `&mut SlotBatch` is what makes a writer the only one
/// touching these slots.
#[derive(Debug)]
pub struct SlotBatch {
    pub(crate) table: u64,
    pub(crate) cycle: u64,
    pub(crate) owner: TrackId,
    pub(crate) handles: Vec<SlotHandle>,
}

impl SlotBatch {
    pub(crate) fn empty(owner: TrackId) -> Self {
        Self {
            table: u64::MAX,
            cycle: u64::MAX,
            owner,
            handles: Vec::new(),
        }
    }

    pub fn owner(&self) -> TrackId {
        self.owner
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn handles(&self) -> &[SlotHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Shared, thread-safe view of a table's value columns for one gather phase.
#[derive(Debug)]
pub struct GatherWriter<'t> {
    table: u64,
    cycle: u64,
    columns: &'t [RawColumn],
}

impl<'t> GatherWriter<'t> {
    #[inline]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Writer for the slots of `batch`. Panics if the batch was allocated
    /// by another table or in another cycle.
    pub fn batch<'w>(&'w self, batch: &'w mut SlotBatch) -> BatchWriter<'w> {
        assert!(
            batch.table == self.table && batch.cycle == self.cycle,
            "slot batch from cycle {} used in cycle {}",
            batch.cycle,
            self.cycle
        );
        BatchWriter {
            columns: self.columns,
            handles: &batch.handles,
            owner: batch.owner,
        }
    }
}

/// Writes the slots of one batch, addressed by position in the batch.
#[derive(Debug)]
pub struct BatchWriter<'w> {
    columns: &'w [RawColumn],
    handles: &'w [SlotHandle],
    owner: TrackId,
}

impl BatchWriter<'_> {
    pub fn owner(&self) -> TrackId {
        self.owner
    }

    pub fn handles(&self) -> &[SlotHandle] {
        self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn slot_ptr(&self, handle: SlotHandle) -> *mut u8 {
        let column = self.columns[handle.entry_index() * ValueKind::COUNT + handle.kind().index()];
        let slot = handle.slot_index();
        assert!(slot < column.len, "slot {slot} out of range ({})", column.len);
        column.base.wrapping_add(slot * column.stride)
    }

    /// Write `value` to the slot at `position`. Invalid handles are ignored.
    pub fn store<T: NativeValue>(&mut self, position: usize, value: T) {
        let handle = self.handles[position];
        if !handle.is_valid() {
            return;
        }
        assert!(
            handle.kind() == T::KIND,
            "{} value stored through a {} handle",
            T::KIND,
            handle.kind()
        );
        let dst = self.slot_ptr(handle);
        // SAFETY: in range, aligned for the kind, and owned by this batch.
        unsafe { dst.cast::<T>().write(value) }
    }

    pub fn store_value(&mut self, position: usize, value: Value) {
        let handle = self.handles[position];
        if !handle.is_valid() {
            return;
        }
        assert!(
            handle.kind() == value.kind(),
            "{} value stored through a {} handle",
            value.kind(),
            handle.kind()
        );
        let dst = self.slot_ptr(handle);
        // SAFETY: as in `store`.
        unsafe { value.write_to(dst) }
    }
}

impl AccumulationTable {
    /// Capture every value column for a gather phase. The table stays
    /// mutably borrowed until the writer is dropped.
    pub fn gather_writer(&mut self) -> GatherWriter<'_> {
        self.columns.clear();
        for entry in &mut self.entries {
            for kind in ValueKind::ALL {
                self.columns
                    .push(RawColumn::of(entry.values_mut().store_mut(kind)));
            }
        }
        GatherWriter {
            table: self.id,
            cycle: self.cycle,
            columns: &self.columns,
        }
    }

    /// Run `f` for every batch across rayon's worker threads.
    /// `f` receives the batch position and its writer.
    pub fn gather_parallel<F>(&mut self, batches: &mut [SlotBatch], f: F)
    where
        F: Fn(usize, &mut BatchWriter<'_>) + Sync + Send,
    {
        let writer = self.gather_writer();
        batches
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, batch)| f(i, &mut writer.batch(batch)));
    }

    /// Same contract as [`Self::gather_parallel`] on the calling thread.
    pub fn gather_serial<F>(&mut self, batches: &mut [SlotBatch], mut f: F)
    where
        F: FnMut(usize, &mut BatchWriter<'_>),
    {
        let writer = self.gather_writer();
        for (i, batch) in batches.iter_mut().enumerate() {
            f(i, &mut writer.batch(batch));
        }
    }

    /// Parallel or serial gather, as [`crate::Config::gather_in_parallel`]
    /// decides for this many batches.
    pub fn gather<F>(&mut self, batches: &mut [SlotBatch], f: F)
    where
        F: Fn(usize, &mut BatchWriter<'_>) + Sync + Send,
    {
        if self.config().gather_in_parallel(batches.len()) {
            self.gather_parallel(batches, f);
        } else {
            self.gather_serial(batches, f);
        }
    }
}

//! One full accumulation cycle over a set of track sources:
//!   prime -> ensure entries -> allocate -> gather -> apply -> compact

use log::debug;
use serde::{Deserialize, Serialize};

use rigbuf_api_core::{Name, Value, ValueKind};

use crate::gather::SlotBatch;
use crate::ids::TrackId;
use crate::table::{AccumulationTable, ApplyStats};
use crate::target::{TargetHandle, TargetResolver};

/// One animated value a track produces every cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: Name,
    pub kind: ValueKind,
}

impl Channel {
    pub fn new(name: Name, kind: ValueKind) -> Self {
        Self { name, kind }
    }
}

/// Producer of per-cycle values for one track. Sampled from worker threads.
pub trait TrackSource: Sync {
    fn owner(&self) -> TrackId;

    fn target(&self) -> TargetHandle;

    fn channels(&self) -> &[Channel];

    /// Value of `channels()[channel]` at `time`; must match its kind.
    fn sample(&self, channel: usize, time: f32) -> Value;
}

impl<S: TrackSource + ?Sized> TrackSource for Box<S> {
    fn owner(&self) -> TrackId {
        (**self).owner()
    }

    fn target(&self) -> TargetHandle {
        (**self).target()
    }

    fn channels(&self) -> &[Channel] {
        (**self).channels()
    }

    fn sample(&self, channel: usize, time: f32) -> Value {
        (**self).sample(channel, time)
    }
}

/// Summary of one [`FrameScheduler::run_cycle`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub entries: usize,
    pub slots: usize,
    pub batches: usize,
    pub parallel: bool,
    pub applied: ApplyStats,
    pub compacted: usize,
}

/// Drives cycles and keeps slot batches around between them.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    batches: Vec<SlotBatch>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_cycle<S, R>(
        &mut self,
        table: &mut AccumulationTable,
        sources: &[S],
        resolver: &mut R,
        time: f32,
    ) -> CycleReport
    where
        S: TrackSource,
        R: TargetResolver + ?Sized,
    {
        table.prime_for_cycle();
        for source in sources {
            table.ensure_entry(source.owner(), source.target());
        }

        for (i, source) in sources.iter().enumerate() {
            let slots = source.channels().iter().map(|c| (c.name, c.kind));
            match self.batches.get_mut(i) {
                Some(batch) => table.refill_batch(batch, source.owner(), slots),
                None => {
                    let batch = table.allocate_batch(source.owner(), slots);
                    self.batches.push(batch);
                }
            }
        }
        let batches = &mut self.batches[..sources.len()];
        let slots = batches.iter().map(SlotBatch::len).sum();
        let parallel = table.config().gather_in_parallel(batches.len());

        table.gather(batches, |i, writer| {
            let source = &sources[i];
            for channel in 0..writer.len() {
                writer.store_value(channel, source.sample(channel, time));
            }
        });

        let applied = table.apply_all(resolver);
        let compacted = table.compact();
        let report = CycleReport {
            cycle: table.cycle(),
            entries: table.active_len(),
            slots,
            batches: sources.len(),
            parallel,
            applied,
            compacted,
        };
        debug!(
            "cycle {}: {} entries, {} slots in {} batches (parallel: {}), {} values applied, {} skipped, {} compacted",
            report.cycle,
            report.entries,
            report.slots,
            report.batches,
            report.parallel,
            report.applied.values_applied,
            report.applied.entries_skipped,
            report.compacted
        );
        report
    }
}

//! Named-value accumulation for rig evaluation.
//!
//! Tracks write animated control values into per-track [`ParameterSet`]s
//! held by an [`AccumulationTable`]. A cycle primes the table, allocates
//! slot handles serially, gathers values in parallel without locks, then
//! applies the results to each track's rig target and drops tracks that
//! were not primed.

pub mod apply;
pub mod config;
pub mod error;
pub mod gather;
pub mod ids;
pub mod params;
pub mod pre_animated;
pub mod scheduler;
pub mod store;
pub mod table;
pub mod target;

pub use apply::apply_value;
pub use config::Config;
pub use error::AccumulationError;
pub use gather::{BatchWriter, GatherWriter, SlotBatch};
pub use ids::TrackId;
pub use params::ParameterSet;
pub use pre_animated::{CaptureScope, PreAnimatedCache};
pub use scheduler::{Channel, CycleReport, FrameScheduler, TrackSource};
pub use store::{IndexingMode, TypedValueStore, BLOCK_GRANULARITY};
pub use table::{AccumulationEntry, AccumulationTable, ApplyStats, SlotHandle};
pub use target::{TargetHandle, TargetRegistry, TargetResolver};

pub use rigbuf_api_core::{
    euler_to_quat, ControlType, EulerTransform, Name, NativeValue, ParentSelector, RigTarget,
    SpaceKey, SpaceType, Value, ValueKind,
};

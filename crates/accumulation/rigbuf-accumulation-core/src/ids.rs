//! Identifiers for tracks feeding the accumulation table.

use serde::{Deserialize, Serialize};

/// Opaque identity of a track (the entry owner). Unique per track for the
/// lifetime of the table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u32);

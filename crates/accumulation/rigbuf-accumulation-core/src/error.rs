use thiserror::Error;

use rigbuf_api_core::ValueKind;

use crate::ids::TrackId;

/// Recoverable failures at the edges of the accumulation API. Contract
/// violations inside a cycle panic instead.
#[derive(Debug, Error)]
pub enum AccumulationError {
    #[error("value kind mismatch: slot holds {expected}, got {actual}")]
    KindMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },
    #[error("slot handle is invalid")]
    InvalidHandle,
    #[error("no accumulation entry for track {0:?}")]
    UnknownOwner(TrackId),
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

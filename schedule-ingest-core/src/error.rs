//! Error types for the pure canonicalization/aggregation/diff pipeline.
//!
//! These are intentionally narrow: nothing in this crate touches a database or
//! the network, so there is no transient/retryable distinction here. The
//! worker crate wraps these into its own error taxonomy (`WorkerError`).

use thiserror::Error;

/// Failure modes of the canonicalizer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CanonicalizationError {
    #[error("invalid time string {raw:?}: expected HH:MM or HH.MM")]
    InvalidTime { raw: String },

    #[error("invalid schedule_date {raw:?}: expected ISO YYYY-MM-DD")]
    InvalidDate { raw: String },

    #[error("shift at index {index} has both start and end missing")]
    BothEndpointsMissing { index: usize },
}

//! Crate-wide error taxonomy for the worker.
//!
//! `schedule-ingest-core` only ever fails on bad input data
//! (`CanonicalizationError`); everything that can go wrong with the
//! database, the lease, or the (external) OCR/layout/normalize pipeline is
//! folded into [`WorkerError`] here, tagged with the [`ErrorStage`] it
//! occurred in so logs and the `failed` session row both carry where things
//! broke.

use thiserror::Error;

use schedule_ingest_core::CanonicalizationError;

/// Where in the pipeline an error originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Ocr,
    Layout,
    Diff,
    Db,
    Lifecycle,
}

impl std::fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorStage::Ocr => "ocr",
            ErrorStage::Layout => "layout",
            ErrorStage::Diff => "diff",
            ErrorStage::Db => "db",
            ErrorStage::Lifecycle => "lifecycle",
        };
        f.write_str(s)
    }
}

/// The closed set of failure kinds a session-processing iteration can hit.
/// Every variant carries the stage it happened in and a message
/// suitable for the session's `error` column.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("[{stage}] transient database error: {message}")]
    TransientDb { stage: ErrorStage, message: String },

    #[error("[{stage}] lost lease ownership mid-processing")]
    LeaseLost { stage: ErrorStage },

    #[error("[{stage}] canonicalization failed: {source}")]
    Canonicalization { stage: ErrorStage, #[source] source: CanonicalizationError },

    #[error("[{stage}] aggregation invariant violated: {message}")]
    Aggregation { stage: ErrorStage, message: String },

    #[error("[{stage}] schema contract violated: {message}")]
    SchemaContract { stage: ErrorStage, message: String },

    #[error("[{stage}] external collaborator failed: {message}")]
    External { stage: ErrorStage, message: String },

    #[error("[{stage}] unexpected error: {message}")]
    Unexpected { stage: ErrorStage, message: String },
}

impl WorkerError {
    pub fn stage(&self) -> ErrorStage {
        match self {
            WorkerError::TransientDb { stage, .. }
            | WorkerError::LeaseLost { stage, .. }
            | WorkerError::Canonicalization { stage, .. }
            | WorkerError::Aggregation { stage, .. }
            | WorkerError::SchemaContract { stage, .. }
            | WorkerError::External { stage, .. }
            | WorkerError::Unexpected { stage, .. } => *stage,
        }
    }

    /// `error.type` tag for structured logs and the session's `error`
    /// column prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::TransientDb { .. } => "transient_db",
            WorkerError::LeaseLost { .. } => "lease_lost",
            WorkerError::Canonicalization { .. } => "canonicalization",
            WorkerError::Aggregation { .. } => "aggregation",
            WorkerError::SchemaContract { .. } => "schema_contract",
            WorkerError::External { .. } => "external",
            WorkerError::Unexpected { .. } => "unexpected",
        }
    }

    /// Whether this error means the iteration must abandon without
    /// writing anything further (a lost lease guards every subsequent
    /// write from taking effect, so there is nothing left to do).
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, WorkerError::LeaseLost { .. })
    }

    pub fn transient_db(stage: ErrorStage, message: impl Into<String>) -> Self {
        WorkerError::TransientDb { stage, message: message.into() }
    }

    pub fn external(stage: ErrorStage, message: impl Into<String>) -> Self {
        WorkerError::External { stage, message: message.into() }
    }

    pub fn schema_contract(stage: ErrorStage, message: impl Into<String>) -> Self {
        WorkerError::SchemaContract { stage, message: message.into() }
    }

    pub fn unexpected(stage: ErrorStage, message: impl Into<String>) -> Self {
        WorkerError::Unexpected { stage, message: message.into() }
    }

    pub fn canonicalization(stage: ErrorStage, source: CanonicalizationError) -> Self {
        WorkerError::Canonicalization { stage, source }
    }
}

/// Wraps a `diesel::result::Error` as a `TransientDB` failure at the given
/// stage; callers attach the stage since the same diesel error type
/// surfaces from every repository method.
pub fn from_diesel(stage: ErrorStage, err: diesel::result::Error) -> WorkerError {
    WorkerError::TransientDb { stage, message: err.to_string() }
}

/// `diesel::Connection::transaction` requires the closure's error type to
/// implement `From<diesel::result::Error>` so a `?` inside the closure body
/// converts automatically; the stage is always `Db` here since this can
/// only come from the transaction machinery itself (e.g. a failed
/// `ROLLBACK`), not from any repository call already tagged with its own
/// stage.
impl From<diesel::result::Error> for WorkerError {
    fn from(err: diesel::result::Error) -> Self {
        WorkerError::TransientDb { stage: ErrorStage::Db, message: err.to_string() }
    }
}

/// Wraps an `r2d2::Error` (pool exhaustion / connection failure) the same
/// way.
pub fn from_pool(stage: ErrorStage, err: diesel::r2d2::Error) -> WorkerError {
    WorkerError::TransientDb { stage, message: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_and_kind_roundtrip() {
        let err = WorkerError::transient_db(ErrorStage::Db, "connection reset");
        assert_eq!(err.stage(), ErrorStage::Db);
        assert_eq!(err.kind(), "transient_db");
        assert!(!err.is_lease_lost());
    }

    #[test]
    fn lease_lost_is_tagged() {
        let err = WorkerError::LeaseLost { stage: ErrorStage::Lifecycle };
        assert!(err.is_lease_lost());
    }
}

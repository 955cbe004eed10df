//! Collaborator contracts. The real OCR backend, layout parser,
//! and semantic normalizer are out of scope; the runner depends only on
//! these narrow traits, mirroring the teacher's `EventStore` trait backed by
//! a concrete `PostgreSQLEventStore` adapter.
//!
//! All three are synchronous: OCR is CPU-bound blocking work, and the
//! runner already executes the whole per-session pipeline inside one
//! `spawn_blocking` alongside the Diesel calls, so there is no async
//! boundary to cross here.

use schedule_ingest_core::CanonicalShift;

use crate::error::WorkerError;

use super::types::{ImageRef, RawEntry, TextBox};

/// `image_bytes → list<Box>`. Takes an [`ImageRef`] rather than raw
/// bytes so this crate never has to know how to talk to object storage.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &ImageRef) -> Result<Vec<TextBox>, WorkerError>;
}

/// `boxes → entries`: deterministic geometry-only grouping.
pub trait LayoutParser: Send + Sync {
    fn parse_layout(&self, boxes: &[TextBox]) -> Result<Vec<RawEntry>, WorkerError>;
}

/// `entries → canonical shifts`: address decomposition, noise removal,
/// fingerprinting.
pub trait ShiftNormalizer: Send + Sync {
    fn normalize(&self, entries: &[RawEntry]) -> Result<Vec<CanonicalShift>, WorkerError>;
}

//! Deterministic in-memory collaborator implementations.
//!
//! None of the OCR/layout/normalization internals are in scope for this
//! crate — these stubs exist solely so the runner's orchestration
//! (C1–C9 composition, transactions, lease handling) is exercisable end to
//! end in tests without a real OCR backend. They are not meant to be wired
//! into a production deployment.
//!
//! The stub convention: each [`TextBox`] fixture is a single pipe-delimited
//! record — `start|end|customer_name|street|street_number|postal_code|postal_area|city`
//! — rather than anything resembling real OCR output, so a test can hand the
//! runner a fixture session without a geometry model.

use std::collections::HashMap;

use schedule_ingest_core::{CanonicalShift, ShiftType};

use crate::error::WorkerError;

use super::traits::{LayoutParser, OcrEngine, ShiftNormalizer};
use super::types::{ImageRef, RawEntry, TextBox};

/// Maps an [`ImageRef::r2_key`] to the fixture text boxes it "contains".
/// Keys absent from the map recognize as empty (an image with nothing to
/// report), not an error.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOcrEngine {
    fixtures: HashMap<String, Vec<TextBox>>,
}

impl InMemoryOcrEngine {
    pub fn new(fixtures: HashMap<String, Vec<TextBox>>) -> Self {
        Self { fixtures }
    }

    /// Convenience constructor for a single-entry-per-image fixture set,
    /// the common case in tests: one pipe-delimited record per image.
    pub fn from_records(records: HashMap<String, String>) -> Self {
        let fixtures = records
            .into_iter()
            .map(|(key, record)| {
                (
                    key,
                    vec![TextBox { text: record, x: 0.0, y: 0.0, w: 0.0, h: 0.0, confidence: 1.0 }],
                )
            })
            .collect();
        Self { fixtures }
    }
}

impl OcrEngine for InMemoryOcrEngine {
    fn recognize(&self, image: &ImageRef) -> Result<Vec<TextBox>, WorkerError> {
        Ok(self.fixtures.get(&image.r2_key).cloned().unwrap_or_default())
    }
}

/// Splits each box's pipe-delimited record straight into a [`RawEntry`]; no
/// actual geometry grouping.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLayoutParser;

impl LayoutParser for InMemoryLayoutParser {
    fn parse_layout(&self, boxes: &[TextBox]) -> Result<Vec<RawEntry>, WorkerError> {
        let mut entries = Vec::with_capacity(boxes.len());
        for b in boxes {
            let fields: Vec<&str> = b.text.split('|').collect();
            if fields.len() != 8 {
                return Err(WorkerError::external(
                    crate::error::ErrorStage::Layout,
                    format!("stub fixture record has {} fields, expected 8: {:?}", fields.len(), b.text),
                ));
            }
            entries.push(RawEntry {
                start: non_empty(fields[0]),
                end: non_empty(fields[1]),
                title: non_empty(fields[2]),
                location: non_empty(fields[3]),
                address: non_empty(&fields[4..8].join(",")),
            });
        }
        Ok(entries)
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Parses each [`RawEntry`] into a [`CanonicalShift`] with a trivial
/// lowercase-trim fingerprint and `shift_type` always `Unknown` — real
/// classification is the normalizer's job, out of scope here.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShiftNormalizer;

impl ShiftNormalizer for InMemoryShiftNormalizer {
    fn normalize(&self, entries: &[RawEntry]) -> Result<Vec<CanonicalShift>, WorkerError> {
        let mut shifts = Vec::with_capacity(entries.len());
        for entry in entries {
            let start = entry
                .start
                .as_deref()
                .map(schedule_ingest_core::ClockMinutes::parse)
                .transpose()
                .map_err(|e| WorkerError::canonicalization(crate::error::ErrorStage::Layout, e))?;
            let end = entry
                .end
                .as_deref()
                .map(schedule_ingest_core::ClockMinutes::parse)
                .transpose()
                .map_err(|e| WorkerError::canonicalization(crate::error::ErrorStage::Layout, e))?;

            let address_parts: Vec<&str> =
                entry.address.as_deref().map(|a| a.split(',').collect()).unwrap_or_default();
            let street_number = address_parts.first().copied().filter(|s| !s.is_empty()).map(str::to_string);
            let postal_code = address_parts.get(1).copied().filter(|s| !s.is_empty()).map(str::to_string);
            let postal_area = address_parts.get(2).copied().filter(|s| !s.is_empty()).map(str::to_string);
            let city = address_parts.get(3).copied().filter(|s| !s.is_empty()).map(str::to_string);

            let location_fingerprint = fingerprint(entry.location.as_deref().unwrap_or(""));
            let customer_fingerprint = fingerprint(entry.title.as_deref().unwrap_or(""));

            shifts.push(CanonicalShift {
                start,
                end,
                customer_name: entry.title.clone(),
                street: entry.location.clone(),
                street_number,
                postal_code,
                postal_area,
                city,
                shift_type: ShiftType::Unknown,
                location_fingerprint,
                customer_fingerprint,
            });
        }
        Ok(shifts)
    }
}

fn fingerprint(raw: &str) -> String {
    raw.trim().to_lowercase()
}

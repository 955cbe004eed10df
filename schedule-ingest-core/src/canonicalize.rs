//! Canonicalizer. Turns a set of aggregated shifts into the
//! deterministic per-day JSON payload and its SHA-256 hash.
//!
//! Time strings are validated once, at the point a [`crate::shift::CanonicalShift`]
//! is constructed from raw OCR/layout text (see [`crate::time::ClockMinutes::parse`]);
//! by the time shifts reach this module they are already typed, so
//! `CanonicalizationError::InvalidTime` can only originate from that shared
//! parse path. The canonicalizer still owns `schedule_date` validation and
//! the "both endpoints missing" check, since those are properties of a whole
//! shift/day rather than of one time string.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::error::CanonicalizationError;
use crate::shift::{AggregatedShift, DayCanonicalPayload};

/// Result of canonicalizing one day: the payload plus its stable hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalDay {
    pub payload: DayCanonicalPayload,
    pub payload_hash: String,
}

/// Build the canonical day payload and hash from aggregated shifts.
pub fn canonicalize(
    schedule_date: &str,
    shifts: &[AggregatedShift],
) -> Result<CanonicalDay, CanonicalizationError> {
    NaiveDate::parse_from_str(schedule_date, "%Y-%m-%d").map_err(|_| {
        CanonicalizationError::InvalidDate { raw: schedule_date.to_string() }
    })?;

    let mut canonical_shifts = Vec::with_capacity(shifts.len());
    for (index, agg) in shifts.iter().enumerate() {
        let shift = &agg.shift;
        if shift.start.is_none() && shift.end.is_none() {
            return Err(CanonicalizationError::BothEndpointsMissing { index });
        }
        canonical_shifts.push(normalize_strings(shift.clone()));
    }

    canonical_shifts.sort_by(|a, b| {
        (a.start, a.end, &a.location_fingerprint, &a.customer_fingerprint).cmp(&(
            b.start,
            b.end,
            &b.location_fingerprint,
            &b.customer_fingerprint,
        ))
    });

    let payload = DayCanonicalPayload {
        schedule_date: schedule_date.to_string(),
        shifts: canonical_shifts,
    };

    let payload_hash = hash_payload(&payload);

    Ok(CanonicalDay { payload, payload_hash })
}

/// Trim and collapse internal whitespace on every free-text field; customer
/// name additionally goes through NFC + case-fold per the normalizer
/// contract, applied defensively here in case a caller didn't already.
fn normalize_strings(mut shift: crate::shift::CanonicalShift) -> crate::shift::CanonicalShift {
    shift.customer_name = shift.customer_name.as_deref().map(normalize_display_text);
    shift.street = shift.street.as_deref().map(collapse_whitespace);
    shift.street_number = shift.street_number.as_deref().map(collapse_whitespace);
    shift.postal_code = shift.postal_code.as_deref().map(collapse_whitespace);
    shift.postal_area = shift.postal_area.as_deref().map(collapse_whitespace);
    shift.city = shift.city.as_deref().map(collapse_whitespace);
    shift
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_display_text(raw: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    collapse_whitespace(&raw.nfc().collect::<String>())
}

/// SHA-256 over the deterministically-ordered, whitespace-free JSON
/// serialization of the payload, lowercase hex.
pub fn hash_payload(payload: &DayCanonicalPayload) -> String {
    let bytes = serde_json::to_vec(payload).expect("DayCanonicalPayload always serializes");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

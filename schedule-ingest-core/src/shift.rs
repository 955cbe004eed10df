//! Canonical shift and day-payload types shared by the canonicalizer,
//! aggregator, diff engine, and notification mapper.

use serde::{Deserialize, Serialize};

use crate::time::ClockMinutes;

/// Coarse classification of a work shift, assigned by the (external)
/// normalizer. Ordered tie-break rules: `SCHOOL < OFFICE <
/// HOME_VISIT < UNKNOWN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftType {
    School,
    Office,
    HomeVisit,
    Unknown,
}

/// A single semantically normalized shift, as produced by the (external)
/// normalizer or by the aggregator after merging several observations of the
/// same shift.
///
/// Field order here is load-bearing: the canonicalizer serializes shifts with
/// this exact key order, so struct field order and any manual
/// `Serialize` impl elsewhere must stay in lockstep with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalShift {
    pub start: Option<ClockMinutes>,
    pub end: Option<ClockMinutes>,
    pub customer_name: Option<String>,
    pub street: Option<String>,
    pub street_number: Option<String>,
    pub postal_code: Option<String>,
    pub postal_area: Option<String>,
    pub city: Option<String>,
    pub shift_type: ShiftType,
    pub location_fingerprint: String,
    pub customer_fingerprint: String,
}

impl CanonicalShift {
    pub fn time_range(&self) -> (Option<ClockMinutes>, Option<ClockMinutes>) {
        (self.start, self.end)
    }

    /// Identity key used for diff grouping: location + customer.
    pub fn identity_key(&self) -> (String, String) {
        (self.location_fingerprint.clone(), self.customer_fingerprint.clone())
    }

    /// A total `(start, end)` pair usable by the circular time-distance
    /// machinery. An open-ended shift
    /// is treated as an instant at its one known bound.
    pub fn comparable_range(&self) -> (ClockMinutes, ClockMinutes) {
        match (self.start, self.end) {
            (Some(s), Some(e)) => (s, e),
            (Some(s), None) => (s, s),
            (None, Some(e)) => (e, e),
            (None, None) => (ClockMinutes(0), ClockMinutes(0)),
        }
    }
}

/// A [`CanonicalShift`] that resulted from merging one or more observations
/// of the same underlying shift across screenshots of the same session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedShift {
    pub shift: CanonicalShift,
    pub source_count: usize,
}

/// The full per-day canonical payload: `{ schedule_date, shifts }` with
/// shifts in the fixed sort order. This is the value that
/// gets hashed, stored as an immutable schedule version, and diffed against
/// the previous day snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCanonicalPayload {
    pub schedule_date: String,
    pub shifts: Vec<CanonicalShift>,
}

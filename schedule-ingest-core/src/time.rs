//! Circular clock-of-day arithmetic.
//!
//! Every shift boundary is stored as minutes-since-midnight (`0..=1439`) once
//! parsed. All distance and "earliest/latest" reasoning in the aggregator and
//! diff engine must go through here rather than comparing integers directly:
//! a naive `min`/`max` over raw minute counts gets cross-midnight shifts
//! (23:50 vs 00:10) backwards.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CanonicalizationError;

pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// Minutes since midnight, `0..=1439`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockMinutes(pub i32);

// Serializes as the canonical `HH:MM` string, never as the raw
// integer, so the payload JSON and its hash reflect what a reader sees.
impl Serialize for ClockMinutes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for ClockMinutes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ClockMinutes::parse(&raw).map_err(DeError::custom)
    }
}

impl ClockMinutes {
    /// Parse `HH:MM` or `HH.MM`, both zero-padded or not, 24h clock.
    pub fn parse(raw: &str) -> Result<Self, CanonicalizationError> {
        let sep = if raw.contains(':') {
            ':'
        } else if raw.contains('.') {
            '.'
        } else {
            return Err(CanonicalizationError::InvalidTime { raw: raw.to_string() });
        };

        let mut parts = raw.splitn(2, sep);
        let (h, m) = match (parts.next(), parts.next()) {
            (Some(h), Some(m)) => (h, m),
            _ => return Err(CanonicalizationError::InvalidTime { raw: raw.to_string() }),
        };

        if h.is_empty()
            || m.len() != 2
            || !h.chars().all(|c| c.is_ascii_digit())
            || !m.chars().all(|c| c.is_ascii_digit())
        {
            return Err(CanonicalizationError::InvalidTime { raw: raw.to_string() });
        }

        let hour: i32 = h.parse().map_err(|_| CanonicalizationError::InvalidTime { raw: raw.to_string() })?;
        let minute: i32 = m.parse().map_err(|_| CanonicalizationError::InvalidTime { raw: raw.to_string() })?;

        if !(0..24).contains(&hour) || !(0..60).contains(&minute) {
            return Err(CanonicalizationError::InvalidTime { raw: raw.to_string() });
        }

        Ok(ClockMinutes(hour * 60 + minute))
    }

    /// Render as zero-padded `HH:MM`.
    pub fn format(self) -> String {
        format!("{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Shortest distance between two clock-of-day instants on a 24h circle.
/// Always in `0..=720` and symmetric.
pub fn circular_distance(a: ClockMinutes, b: ClockMinutes) -> i32 {
    let raw = (a.0 - b.0).abs();
    raw.min(MINUTES_PER_DAY - raw)
}

/// `|Δstart| + |Δend|` for two (start, end) ranges, each leg computed on the
/// circular clock. Used both for merge-eligibility in the aggregator and for
/// the cost matrix in the diff engine's greedy pairing.
pub fn range_distance(a: (ClockMinutes, ClockMinutes), b: (ClockMinutes, ClockMinutes)) -> i32 {
    circular_distance(a.0, b.0) + circular_distance(a.1, b.1)
}

/// Whether range `inner` is fully contained within range `outer`, walking
/// clockwise from `outer.0` to `outer.1`. Containment on a circle is defined
/// relative to a direction of travel (clockwise, start → end).
pub fn range_contains(outer: (ClockMinutes, ClockMinutes), inner: (ClockMinutes, ClockMinutes)) -> bool {
    let span = clockwise_span(outer.0, outer.1);
    let inner_start_offset = clockwise_span(outer.0, inner.0);
    let inner_end_offset = clockwise_span(outer.0, inner.1);
    inner_start_offset <= span && inner_end_offset <= span
}

/// Minutes walking clockwise from `from` to `to`, in `0..=1439`.
fn clockwise_span(from: ClockMinutes, to: ClockMinutes) -> i32 {
    ((to.0 - from.0).rem_euclid(MINUTES_PER_DAY)).max(0)
}

/// Picks the representative "earliest start" (or, symmetrically, "latest
/// end") for a connected component of merged observations. The representative
/// is the candidate whose clockwise distance to the component centroid is
/// smallest, which is well-defined even when the component straddles
/// midnight (a plain numeric min/max would instead pick an outlier).
pub fn circular_representative(candidates: &[ClockMinutes]) -> ClockMinutes {
    debug_assert!(!candidates.is_empty());
    let centroid = circular_mean(candidates);
    *candidates
        .iter()
        .min_by_key(|c| circular_distance(**c, centroid))
        .expect("candidates is non-empty")
}

/// Circular mean of a set of clock instants, via the standard
/// vector-average-then-atan2 construction, discretized back to minutes.
fn circular_mean(candidates: &[ClockMinutes]) -> ClockMinutes {
    let n = candidates.len() as f64;
    let (mut sin_sum, mut cos_sum) = (0.0, 0.0);
    for c in candidates {
        let angle = 2.0 * std::f64::consts::PI * (c.0 as f64) / (MINUTES_PER_DAY as f64);
        sin_sum += angle.sin();
        cos_sum += angle.cos();
    }
    let mean_angle = (sin_sum / n).atan2(cos_sum / n);
    let minutes = (mean_angle / (2.0 * std::f64::consts::PI) * (MINUTES_PER_DAY as f64)).round() as i32;
    ClockMinutes(minutes.rem_euclid(MINUTES_PER_DAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_and_dot_forms() {
        assert_eq!(ClockMinutes::parse("09:05").unwrap(), ClockMinutes(545));
        assert_eq!(ClockMinutes::parse("09.05").unwrap(), ClockMinutes(545));
        assert_eq!(ClockMinutes::parse("9:05").unwrap(), ClockMinutes(545));
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(ClockMinutes::parse("25:00").is_err());
        assert!(ClockMinutes::parse("10:60").is_err());
        assert!(ClockMinutes::parse("10-00").is_err());
        assert!(ClockMinutes::parse("").is_err());
    }

    #[test]
    fn formats_zero_padded() {
        assert_eq!(ClockMinutes(5).format(), "00:05");
        assert_eq!(ClockMinutes(545).format(), "09:05");
    }

    #[test]
    fn circular_distance_is_symmetric_and_bounded() {
        let a = ClockMinutes::parse("23:50").unwrap();
        let b = ClockMinutes::parse("00:10").unwrap();
        assert_eq!(circular_distance(a, b), 20);
        assert_eq!(circular_distance(a, b), circular_distance(b, a));
        assert!(circular_distance(a, b) <= 720);
    }

    #[test]
    fn cross_midnight_containment() {
        let outer = (ClockMinutes::parse("23:00").unwrap(), ClockMinutes::parse("02:00").unwrap());
        let inner = (ClockMinutes::parse("23:30").unwrap(), ClockMinutes::parse("01:00").unwrap());
        assert!(range_contains(outer, inner));
        let outside = (ClockMinutes::parse("10:00").unwrap(), ClockMinutes::parse("11:00").unwrap());
        assert!(!range_contains(outer, outside));
    }

    #[test]
    fn representative_picks_sane_midpoint() {
        let candidates = vec![
            ClockMinutes::parse("10:00").unwrap(),
            ClockMinutes::parse("10:02").unwrap(),
        ];
        let rep = circular_representative(&candidates);
        assert!(rep.0 == 600 || rep.0 == 602);
    }
}

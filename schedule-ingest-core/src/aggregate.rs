//! C2: aggregator. Merges the canonical shifts observed across every
//! screenshot of one session into a single per-day list.

use std::collections::HashMap;

use crate::shift::{AggregatedShift, CanonicalShift, ShiftType};
use crate::time::{circular_representative, range_contains, range_distance, ClockMinutes};

/// Default merge tolerance: two shifts at the same location merge if their
/// start+end distance is within this many minutes.
pub const DEFAULT_TIME_TOLERANCE_MIN: i32 = 5;

/// One shift as it arrived on one screenshot, carrying enough provenance to
/// break ties deterministically.
#[derive(Debug, Clone)]
struct Candidate {
    shift: CanonicalShift,
    screenshot_index: usize,
    position: usize,
}

/// Merge per-screenshot canonical shift lists into the day's aggregated
/// shifts, using the default [`DEFAULT_TIME_TOLERANCE_MIN`] tolerance.
pub fn aggregate(per_screenshot: &[Vec<CanonicalShift>]) -> Vec<AggregatedShift> {
    aggregate_with_tolerance(per_screenshot, DEFAULT_TIME_TOLERANCE_MIN)
}

/// Merge per-screenshot canonical shift lists into the day's aggregated
/// shifts, with an explicit tolerance in minutes.
///
/// Infallible: [`connected_components`] never yields an empty group, so
/// `merge_component` always has at least one member to merge.
pub fn aggregate_with_tolerance(
    per_screenshot: &[Vec<CanonicalShift>],
    tolerance_min: i32,
) -> Vec<AggregatedShift> {
    let candidates = flatten(per_screenshot);

    let mut by_location: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, c) in candidates.iter().enumerate() {
        by_location.entry(c.shift.location_fingerprint.clone()).or_default().push(idx);
    }

    let mut result = Vec::new();
    for (_location, indices) in by_location {
        let components = connected_components(&candidates, &indices, tolerance_min);
        for component in &components {
            result.push(merge_component(&candidates, component));
        }
    }

    result
}

fn flatten(per_screenshot: &[Vec<CanonicalShift>]) -> Vec<Candidate> {
    let mut out = Vec::new();
    for (screenshot_index, shifts) in per_screenshot.iter().enumerate() {
        for (position, shift) in shifts.iter().enumerate() {
            out.push(Candidate { shift: shift.clone(), screenshot_index, position });
        }
    }
    out
}

fn mergeable(a: &CanonicalShift, b: &CanonicalShift, tolerance_min: i32) -> bool {
    let ra = a.comparable_range();
    let rb = b.comparable_range();
    range_distance(ra, rb) <= tolerance_min || range_contains(ra, rb) || range_contains(rb, ra)
}

/// Union-find over `indices` (positions into `candidates`), connecting any
/// pair eligible to merge per [`mergeable`]; returns each connected
/// component as a list of indices.
fn connected_components(candidates: &[Candidate], indices: &[usize], tolerance_min: i32) -> Vec<Vec<usize>> {
    let mut parent: HashMap<usize, usize> = indices.iter().map(|&i| (i, i)).collect();

    fn find(parent: &mut HashMap<usize, usize>, x: usize) -> usize {
        let p = parent[&x];
        if p != x {
            let root = find(parent, p);
            parent.insert(x, root);
            root
        } else {
            x
        }
    }

    fn union(parent: &mut HashMap<usize, usize>, a: usize, b: usize) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            parent.insert(ra, rb);
        }
    }

    for (i, &a) in indices.iter().enumerate() {
        for &b in &indices[i + 1..] {
            if mergeable(&candidates[a].shift, &candidates[b].shift, tolerance_min) {
                union(&mut parent, a, b);
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for &i in indices {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }

    let mut components: Vec<Vec<usize>> = groups.into_values().collect();
    for component in &mut components {
        component.sort_unstable();
    }
    components.sort_by_key(|c| c[0]);
    components
}

fn merge_component(candidates: &[Candidate], component: &[usize]) -> AggregatedShift {
    debug_assert!(!component.is_empty(), "connected_components never yields an empty group");

    let members: Vec<&Candidate> = component.iter().map(|&i| &candidates[i]).collect();

    let starts: Vec<ClockMinutes> = members.iter().filter_map(|m| m.shift.start).collect();
    let ends: Vec<ClockMinutes> = members.iter().filter_map(|m| m.shift.end).collect();

    let start = (!starts.is_empty()).then(|| circular_representative(&starts));
    let end = (!ends.is_empty()).then(|| circular_representative(&ends));

    let customer_name = pick_longest(&members, |m| m.shift.customer_name.as_deref());
    let street = pick_longest(&members, |m| m.shift.street.as_deref());
    let street_number = pick_longest(&members, |m| m.shift.street_number.as_deref());
    let postal_code = pick_longest(&members, |m| m.shift.postal_code.as_deref());
    let postal_area = pick_longest(&members, |m| m.shift.postal_area.as_deref());
    let city = pick_longest(&members, |m| m.shift.city.as_deref());

    let shift_type = majority_shift_type(&members);

    let location_fingerprint = members
        .iter()
        .map(|m| m.shift.location_fingerprint.clone())
        .min()
        .expect("component is non-empty");
    let customer_fingerprint = members
        .iter()
        .map(|m| m.shift.customer_fingerprint.clone())
        .min()
        .expect("component is non-empty");

    AggregatedShift {
        shift: CanonicalShift {
            start,
            end,
            customer_name,
            street,
            street_number,
            postal_code,
            postal_area,
            city,
            shift_type,
            location_fingerprint,
            customer_fingerprint,
        },
        source_count: members.len(),
    }
}

/// Longest non-empty value across the component; ties broken by
/// `(screenshot_index, position)` ascending.
fn pick_longest<'a, F>(members: &[&'a Candidate], field: F) -> Option<String>
where
    F: Fn(&'a Candidate) -> Option<&'a str>,
{
    let mut ordered: Vec<&Candidate> = members.to_vec();
    ordered.sort_by_key(|m| (m.screenshot_index, m.position));

    ordered
        .iter()
        .filter_map(|m| field(m).filter(|s| !s.is_empty()).map(|s| (s.len(), s.to_string())))
        .max_by_key(|(len, _)| *len)
        .map(|(_, s)| s)
}

fn majority_shift_type(members: &[&Candidate]) -> ShiftType {
    let mut counts: HashMap<ShiftType, usize> = HashMap::new();
    for m in members {
        *counts.entry(m.shift.shift_type).or_insert(0) += 1;
    }
    let max_count = counts.values().copied().max().unwrap_or(0);
    [ShiftType::School, ShiftType::Office, ShiftType::HomeVisit, ShiftType::Unknown]
        .into_iter()
        .find(|t| counts.get(t).copied().unwrap_or(0) == max_count)
        .unwrap_or(ShiftType::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(start: &str, end: &str, loc: &str, cust: &str, city: &str) -> CanonicalShift {
        CanonicalShift {
            start: Some(ClockMinutes::parse(start).unwrap()),
            end: Some(ClockMinutes::parse(end).unwrap()),
            customer_name: Some(cust.to_string()),
            street: None,
            street_number: None,
            postal_code: None,
            postal_area: None,
            city: Some(city.to_string()),
            shift_type: ShiftType::HomeVisit,
            location_fingerprint: loc.to_string(),
            customer_fingerprint: cust.to_string(),
        }
    }

    #[test]
    fn merges_near_duplicate_observations() {
        let s1 = shift("10:00", "14:00", "loc1", "acme", "Gothenburg");
        let s2 = shift("10:02", "14:05", "loc1", "acme", "Gothenburg");
        let result = aggregate(&[vec![s1], vec![s2]]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source_count, 2);
        assert_eq!(result[0].shift.start, Some(ClockMinutes::parse("10:00").unwrap()));
        assert_eq!(result[0].shift.end, Some(ClockMinutes::parse("14:05").unwrap()));
    }

    #[test]
    fn keeps_distant_shifts_at_same_location_separate() {
        let s1 = shift("10:00", "14:00", "loc1", "acme", "Gothenburg");
        let s2 = shift("18:00", "20:00", "loc1", "acme", "Gothenburg");
        let result = aggregate(&[vec![s1, s2]]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn merges_cross_midnight_ranges() {
        let s1 = shift("23:50", "23:59", "loc1", "acme", "Gothenburg");
        let s2 = shift("00:05", "00:10", "loc1", "acme", "Gothenburg");
        let result = aggregate(&[vec![s1], vec![s2]]);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn picks_longest_non_empty_string_field() {
        let mut s1 = shift("10:00", "14:00", "loc1", "acme", "GBG");
        s1.city = Some("GBG".to_string());
        let mut s2 = shift("10:01", "14:01", "loc1", "acme", "");
        s2.city = Some("Gothenburg".to_string());
        let result = aggregate(&[vec![s1], vec![s2]]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].shift.city.as_deref(), Some("Gothenburg"));
    }

    #[test]
    fn majority_shift_type_breaks_ties_by_enum_order() {
        let mut s1 = shift("10:00", "14:00", "loc1", "acme", "GBG");
        s1.shift_type = ShiftType::Office;
        let mut s2 = shift("10:01", "14:01", "loc1", "acme", "GBG");
        s2.shift_type = ShiftType::HomeVisit;
        let result = aggregate(&[vec![s1], vec![s2]]);
        assert_eq!(result[0].shift.shift_type, ShiftType::Office);
    }

    #[test]
    fn idempotent_on_a_single_already_merged_list() {
        let s1 = shift("10:00", "14:00", "loc1", "acme", "GBG");
        let first = aggregate(&[vec![s1.clone()]]);
        let refed: Vec<CanonicalShift> = first.iter().map(|a| a.shift.clone()).collect();
        let second = aggregate(&[refed]);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].shift, second[0].shift);
    }
}

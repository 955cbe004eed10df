//! Diff engine. Compares a prior day's shifts against a newly observed
//! day and emits a deterministic, ordered list of typed events.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::shift::CanonicalShift;
use crate::time::{range_distance, ClockMinutes};

/// Closed set of semantic change kinds a diff can produce. This is
/// a tagged sum type by construction (an enum); the notification mapper
/// dispatches on it without needing an open class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ShiftAdded,
    ShiftRemoved,
    ShiftTimeChanged,
    ShiftRelocated,
    ShiftRetitled,
    ShiftReclassified,
}

/// One detected semantic change between a prior and a new canonical shift.
/// `old_value`/`new_value` carry full copies rather than references into a
/// snapshot, so an event remains meaningful even after the snapshot it was
/// computed from has been overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub event_type: EventType,
    pub location_fingerprint: String,
    pub customer_fingerprint: String,
    pub old_value: Option<CanonicalShift>,
    pub new_value: Option<CanonicalShift>,
}

impl ScheduleEvent {
    /// The shift used to order/anchor this event: the new value when
    /// present (added, changed), else the removed old value.
    fn anchor(&self) -> &CanonicalShift {
        self.new_value.as_ref().or(self.old_value.as_ref()).expect("every event has at least one side")
    }
}

/// Compare prior shifts `prior` against newly observed shifts `new` and
/// return the ordered events. Both slices are assumed already
/// canonicalized (deterministically sorted); this function does not
/// re-sort its inputs, only its output.
pub fn diff(prior: &[CanonicalShift], new: &[CanonicalShift]) -> Vec<ScheduleEvent> {
    let prior_groups = group_by_identity(prior);
    let new_groups = group_by_identity(new);

    let mut events = Vec::new();

    let mut identities: Vec<(String, String)> =
        prior_groups.keys().chain(new_groups.keys()).cloned().collect();
    identities.sort();
    identities.dedup();

    for identity in identities {
        let p = prior_groups.get(&identity).cloned().unwrap_or_default();
        let n = new_groups.get(&identity).cloned().unwrap_or_default();

        let pairs = greedy_pair(&p, &n);
        let mut paired_p = vec![false; p.len()];
        let mut paired_n = vec![false; n.len()];

        for (pi, ni) in pairs {
            paired_p[pi] = true;
            paired_n[ni] = true;
            if let Some(event) = classify_pair(&p[pi], &n[ni]) {
                events.push(event);
            }
        }

        for (i, consumed) in paired_p.iter().enumerate() {
            if !consumed {
                events.push(ScheduleEvent {
                    event_type: EventType::ShiftRemoved,
                    location_fingerprint: identity.0.clone(),
                    customer_fingerprint: identity.1.clone(),
                    old_value: Some(p[i].clone()),
                    new_value: None,
                });
            }
        }
        for (i, consumed) in paired_n.iter().enumerate() {
            if !consumed {
                events.push(ScheduleEvent {
                    event_type: EventType::ShiftAdded,
                    location_fingerprint: identity.0.clone(),
                    customer_fingerprint: identity.1.clone(),
                    old_value: None,
                    new_value: Some(n[i].clone()),
                });
            }
        }
    }

    events.sort_by(order_events);
    events
}

fn group_by_identity(shifts: &[CanonicalShift]) -> HashMap<(String, String), Vec<CanonicalShift>> {
    let mut groups: HashMap<(String, String), Vec<CanonicalShift>> = HashMap::new();
    for shift in shifts {
        groups.entry(shift.identity_key()).or_default().push(shift.clone());
    }
    groups
}

/// Greedy minimum-cost pairing over the full cost matrix:
/// repeatedly pick the globally cheapest remaining `(p, n)` pair and remove
/// both rows/columns, until one side empties. Ties broken by index order so
/// the result is deterministic.
fn greedy_pair(p: &[CanonicalShift], n: &[CanonicalShift]) -> Vec<(usize, usize)> {
    let mut costs: Vec<(i32, usize, usize)> = Vec::with_capacity(p.len() * n.len());
    for (pi, ps) in p.iter().enumerate() {
        for (ni, ns) in n.iter().enumerate() {
            costs.push((range_distance(ps.comparable_range(), ns.comparable_range()), pi, ni));
        }
    }
    costs.sort_by_key(|&(cost, pi, ni)| (cost, pi, ni));

    let mut used_p = vec![false; p.len()];
    let mut used_n = vec![false; n.len()];
    let mut pairs = Vec::new();

    for (_, pi, ni) in costs {
        if !used_p[pi] && !used_n[ni] {
            used_p[pi] = true;
            used_n[ni] = true;
            pairs.push((pi, ni));
        }
    }
    pairs
}

/// Classification order for a paired `(old, new)` shift.
fn classify_pair(old: &CanonicalShift, new: &CanonicalShift) -> Option<ScheduleEvent> {
    let identity = old.identity_key();

    let event_type = if old.start != new.start || old.end != new.end {
        EventType::ShiftTimeChanged
    } else if old.shift_type != new.shift_type {
        EventType::ShiftReclassified
    } else if old.street != new.street || old.street_number != new.street_number || old.postal_code != new.postal_code {
        EventType::ShiftRelocated
    } else if old.customer_name != new.customer_name {
        EventType::ShiftRetitled
    } else {
        return None;
    };

    Some(ScheduleEvent {
        event_type,
        location_fingerprint: identity.0,
        customer_fingerprint: identity.1,
        old_value: Some(old.clone()),
        new_value: Some(new.clone()),
    })
}

fn order_events(a: &ScheduleEvent, b: &ScheduleEvent) -> Ordering {
    let anchor_a = a.anchor();
    let anchor_b = b.anchor();
    event_type_rank(a.event_type)
        .cmp(&event_type_rank(b.event_type))
        .then_with(|| a.location_fingerprint.cmp(&b.location_fingerprint))
        .then_with(|| clock_or_min(anchor_a.start).cmp(&clock_or_min(anchor_b.start)))
        .then_with(|| clock_or_min(anchor_a.end).cmp(&clock_or_min(anchor_b.end)))
}

fn clock_or_min(c: Option<ClockMinutes>) -> ClockMinutes {
    c.unwrap_or(ClockMinutes(-1))
}

fn event_type_rank(t: EventType) -> u8 {
    match t {
        EventType::ShiftAdded => 0,
        EventType::ShiftRemoved => 1,
        EventType::ShiftTimeChanged => 2,
        EventType::ShiftRelocated => 3,
        EventType::ShiftRetitled => 4,
        EventType::ShiftReclassified => 5,
    }
}

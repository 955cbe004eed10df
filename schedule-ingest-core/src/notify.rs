//! C5: notification mapper. Turns a processed session's persisted events
//! into zero or more human-readable notifications, suppressing storms of
//! simultaneous changes into a single summary.

use std::collections::{BTreeMap, HashSet};

use sha2::{Digest, Sha256};

use crate::diff::{EventType, ScheduleEvent};

/// Default number of remaining events at which individual `event`
/// notifications collapse into one `summary` notification.
pub const DEFAULT_SUMMARY_THRESHOLD: usize = 3;

/// A diff-engine event once it has been durably assigned an id by the event
/// store. The mapper only ever sees events that already exist in
/// storage, since suppressing already-notified events requires a stable id.
#[derive(Debug, Clone)]
pub struct IdentifiedEvent {
    pub event_id: String,
    pub event: ScheduleEvent,
}

/// Kind of outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Event,
    Summary,
}

/// A single outbound message, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub notification_id: String,
    pub notification_type: NotificationKind,
    pub message: String,
    pub event_ids: Vec<String>,
}

/// Map one session's persisted events into notifications.
///
/// `already_notified_event_ids` lets a retried/re-run session avoid re-notifying for events a previous
/// run of this worker already turned into a notification.
pub fn map_to_notifications(
    user_id: &str,
    schedule_date: &str,
    source_session_id: &str,
    events: &[IdentifiedEvent],
    already_notified_event_ids: &HashSet<String>,
) -> Vec<Notification> {
    map_to_notifications_with_threshold(
        user_id,
        schedule_date,
        source_session_id,
        events,
        already_notified_event_ids,
        DEFAULT_SUMMARY_THRESHOLD,
    )
}

/// As [`map_to_notifications`], with an explicit summary threshold.
pub fn map_to_notifications_with_threshold(
    user_id: &str,
    schedule_date: &str,
    source_session_id: &str,
    events: &[IdentifiedEvent],
    already_notified_event_ids: &HashSet<String>,
    summary_threshold: usize,
) -> Vec<Notification> {
    let remaining: Vec<&IdentifiedEvent> = events
        .iter()
        .filter(|e| !already_notified_event_ids.contains(&e.event_id))
        .collect();

    if remaining.is_empty() {
        return Vec::new();
    }

    if remaining.len() >= summary_threshold {
        let message = summary_message(schedule_date, &remaining);
        let event_ids: Vec<String> = remaining.iter().map(|e| e.event_id.clone()).collect();
        let notification_id =
            compute_notification_id(user_id, schedule_date, source_session_id, "summary", &event_ids);
        return vec![Notification {
            notification_id,
            notification_type: NotificationKind::Summary,
            message,
            event_ids,
        }];
    }

    remaining
        .iter()
        .map(|e| {
            let message = event_message(schedule_date, &e.event);
            let event_ids = vec![e.event_id.clone()];
            let notification_id = compute_notification_id(
                user_id,
                schedule_date,
                source_session_id,
                event_type_tag(e.event.event_type),
                &event_ids,
            );
            Notification {
                notification_id,
                notification_type: NotificationKind::Event,
                message,
                event_ids,
            }
        })
        .collect()
}

fn event_type_tag(t: EventType) -> &'static str {
    match t {
        EventType::ShiftAdded => "shift_added",
        EventType::ShiftRemoved => "shift_removed",
        EventType::ShiftTimeChanged => "shift_time_changed",
        EventType::ShiftRelocated => "shift_relocated",
        EventType::ShiftRetitled => "shift_retitled",
        EventType::ShiftReclassified => "shift_reclassified",
    }
}

fn customer_label(event: &ScheduleEvent) -> String {
    event
        .new_value
        .as_ref()
        .or(event.old_value.as_ref())
        .and_then(|s| s.customer_name.clone())
        .unwrap_or_else(|| "Unknown customer".to_string())
}

fn event_message(date: &str, event: &ScheduleEvent) -> String {
    let customer = customer_label(event);
    match event.event_type {
        EventType::ShiftTimeChanged => {
            let old = event.old_value.as_ref().expect("time_changed always carries old_value");
            let new = event.new_value.as_ref().expect("time_changed always carries new_value");
            match (old.start != new.start, old.end != new.end) {
                (true, false) => format!(
                    "{date}: {customer} moved {old} → {new}",
                    old = fmt_opt(old.start),
                    new = fmt_opt(new.start)
                ),
                (false, true) => format!(
                    "{date}: {customer} ends {old} → {new}",
                    old = fmt_opt(old.end),
                    new = fmt_opt(new.end)
                ),
                _ => format!(
                    "{date}: {customer} {old_start}-{old_end} → {new_start}-{new_end}",
                    old_start = fmt_opt(old.start),
                    old_end = fmt_opt(old.end),
                    new_start = fmt_opt(new.start),
                    new_end = fmt_opt(new.end)
                ),
            }
        }
        EventType::ShiftAdded => {
            let new = event.new_value.as_ref().expect("added always carries new_value");
            format!(
                "{date}: new shift for {customer} {start}-{end}",
                start = fmt_opt(new.start),
                end = fmt_opt(new.end)
            )
        }
        EventType::ShiftRemoved => {
            let old = event.old_value.as_ref().expect("removed always carries old_value");
            format!(
                "{date}: shift for {customer} {start}-{end} was removed",
                start = fmt_opt(old.start),
                end = fmt_opt(old.end)
            )
        }
        EventType::ShiftRelocated => format!("{date}: {customer} shift address changed"),
        EventType::ShiftRetitled => format!("{date}: {customer} shift customer name changed"),
        EventType::ShiftReclassified => format!("{date}: {customer} shift type changed"),
    }
}

fn fmt_opt(c: Option<crate::time::ClockMinutes>) -> String {
    c.map(|c| c.format()).unwrap_or_else(|| "?".to_string())
}

fn summary_message(date: &str, events: &[&IdentifiedEvent]) -> String {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for e in events {
        *counts.entry(event_type_tag(e.event.event_type)).or_insert(0) += 1;
    }
    let breakdown = counts
        .iter()
        .map(|(kind, count)| format!("{count} {kind}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{date}: {n} schedule changes ({breakdown})", n = events.len())
}

fn compute_notification_id(
    user_id: &str,
    schedule_date: &str,
    source_session_id: &str,
    type_tag: &str,
    event_ids: &[String],
) -> String {
    let mut sorted_ids = event_ids.to_vec();
    sorted_ids.sort();
    let key = format!(
        "{user_id}|{schedule_date}|{source_session_id}|{type_tag}|{}",
        sorted_ids.join(",")
    );
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

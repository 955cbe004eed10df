//! C4: event store. Loads the prior day snapshot, runs the diff engine
//! against a freshly aggregated/canonicalized day, persists newly detected
//! events idempotently, and upserts the snapshot — all within the caller's
//! transaction.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use schedule_ingest_core::{diff, CanonicalShift, EventType, ScheduleEvent};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ErrorStage, WorkerError};

use super::models::{DaySnapshotRow, ScheduleEventRow};
use super::schema::{day_snapshot, schedule_event};

/// A diff-engine event that made it past the dedupe key and now has a
/// durable id — the shape [`schedule_ingest_core::notify::IdentifiedEvent`]
/// expects as input to the notification mapper.
#[derive(Debug, Clone)]
pub struct PersistedEvent {
    pub event_id: Uuid,
    pub event: ScheduleEvent,
}

/// Run one diff cycle for `(user_id, schedule_date)` and persist the result.
/// Returns only the events that were newly inserted — a retried
/// session replaying an already-seen day produces the same diff, but every
/// row collides with the dedupe key and nothing new comes back.
pub fn process_diff(
    conn: &mut PgConnection,
    user_id: &str,
    schedule_date: NaiveDate,
    source_session_id: Uuid,
    new_shifts: &[CanonicalShift],
) -> Result<Vec<PersistedEvent>, WorkerError> {
    let prior_shifts = load_snapshot(conn, user_id, schedule_date)?;
    let events = diff(&prior_shifts, new_shifts);

    let mut persisted = Vec::with_capacity(events.len());
    for event in events {
        if let Some(event_id) = insert_event(conn, user_id, schedule_date, source_session_id, &event)? {
            persisted.push(PersistedEvent { event_id, event });
        }
    }

    upsert_snapshot(conn, user_id, schedule_date, new_shifts, source_session_id)?;

    Ok(persisted)
}

fn insert_event(
    conn: &mut PgConnection,
    user_id: &str,
    schedule_date: NaiveDate,
    source_session_id: Uuid,
    event: &ScheduleEvent,
) -> Result<Option<Uuid>, WorkerError> {
    let old_value = event.old_value.as_ref().map(to_json);
    let new_value = event.new_value.as_ref().map(to_json);
    let old_value_hash = hash_or_sentinel(old_value.as_ref());
    let new_value_hash = hash_or_sentinel(new_value.as_ref());

    let row = ScheduleEventRow {
        event_id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        schedule_date,
        event_type: event_type_tag(event.event_type).to_string(),
        location_fingerprint: event.location_fingerprint.clone(),
        customer_fingerprint: event.customer_fingerprint.clone(),
        old_value,
        new_value,
        old_value_hash,
        new_value_hash,
        detected_at: Utc::now(),
        source_session_id,
    };

    let inserted_ids: Vec<Uuid> = diesel::insert_into(schedule_event::table)
        .values(&row)
        .on_conflict((
            schedule_event::user_id,
            schedule_event::schedule_date,
            schedule_event::location_fingerprint,
            schedule_event::event_type,
            schedule_event::old_value_hash,
            schedule_event::new_value_hash,
        ))
        .do_nothing()
        .returning(schedule_event::event_id)
        .get_results(conn)
        .map_err(|e| WorkerError::transient_db(ErrorStage::Db, e.to_string()))?;

    Ok(inserted_ids.into_iter().next())
}

fn load_snapshot(
    conn: &mut PgConnection,
    user_id: &str,
    schedule_date: NaiveDate,
) -> Result<Vec<CanonicalShift>, WorkerError> {
    let row = day_snapshot::table
        .filter(day_snapshot::user_id.eq(user_id))
        .filter(day_snapshot::schedule_date.eq(schedule_date))
        .select(day_snapshot::snapshot_payload)
        .first::<Value>(conn)
        .optional()
        .map_err(|e| WorkerError::transient_db(ErrorStage::Db, e.to_string()))?;

    match row {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value).map_err(|e| {
            WorkerError::schema_contract(ErrorStage::Db, format!("malformed day_snapshot payload: {e}"))
        }),
    }
}

fn upsert_snapshot(
    conn: &mut PgConnection,
    user_id: &str,
    schedule_date: NaiveDate,
    shifts: &[CanonicalShift],
    source_session_id: Uuid,
) -> Result<(), WorkerError> {
    let snapshot_payload =
        serde_json::to_value(shifts).expect("a slice of CanonicalShift always serializes");

    let row = DaySnapshotRow {
        user_id: user_id.to_string(),
        schedule_date,
        snapshot_payload,
        source_session_id,
        updated_at: Utc::now(),
    };

    diesel::insert_into(day_snapshot::table)
        .values(&row)
        .on_conflict((day_snapshot::user_id, day_snapshot::schedule_date))
        .do_update()
        .set((
            day_snapshot::snapshot_payload.eq(excluded(day_snapshot::snapshot_payload)),
            day_snapshot::source_session_id.eq(excluded(day_snapshot::source_session_id)),
            day_snapshot::updated_at.eq(excluded(day_snapshot::updated_at)),
        ))
        .execute(conn)
        .map_err(|e| WorkerError::transient_db(ErrorStage::Db, e.to_string()))?;

    Ok(())
}

fn to_json(shift: &CanonicalShift) -> Value {
    serde_json::to_value(shift).expect("CanonicalShift always serializes")
}

/// SHA-256 of the canonical JSON bytes, or of a fixed sentinel for an absent
/// side, so both hash columns are always populated text.
fn hash_or_sentinel(value: Option<&Value>) -> String {
    let bytes = match value {
        Some(v) => serde_json::to_vec(v).expect("Value always serializes"),
        None => b"null".to_vec(),
    };
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_hash_is_stable_and_differs_from_null_value_hash() {
        let sentinel = hash_or_sentinel(None);
        let null_value = hash_or_sentinel(Some(&Value::Null));
        assert_eq!(sentinel.len(), 64);
        assert_ne!(sentinel, null_value);
    }
}

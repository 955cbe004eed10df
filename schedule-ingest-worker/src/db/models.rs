//! Row types for the tables in [`crate::db::schema`].
//!
//! Mirrors the teacher's `db::agent::Agent`/`NewAgent` split: a `Queryable`
//! struct for what comes back from a `SELECT`, and a matching `Insertable`
//! struct (often identical, sometimes narrower) for what goes into an
//! `INSERT`.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use super::schema::{
    capture_image, capture_session, day_snapshot, schedule_event, schedule_notification,
    schedule_version,
};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = capture_session)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CaptureSession {
    pub id: Uuid,
    pub user_id: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = capture_image)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CaptureImage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sequence: i32,
    pub r2_key: String,
    pub telegram_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = schedule_version)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScheduleVersionRow {
    pub id: Uuid,
    pub user_id: String,
    pub schedule_date: NaiveDate,
    pub version: i32,
    pub session_id: Uuid,
    pub payload: Value,
    pub payload_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = day_snapshot)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DaySnapshotRow {
    pub user_id: String,
    pub schedule_date: NaiveDate,
    pub snapshot_payload: Value,
    pub source_session_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = schedule_event)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScheduleEventRow {
    pub event_id: Uuid,
    pub user_id: String,
    pub schedule_date: NaiveDate,
    pub event_type: String,
    pub location_fingerprint: String,
    pub customer_fingerprint: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub old_value_hash: String,
    pub new_value_hash: String,
    pub detected_at: DateTime<Utc>,
    pub source_session_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = schedule_notification)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScheduleNotificationRow {
    pub notification_id: String,
    pub user_id: String,
    pub schedule_date: NaiveDate,
    pub source_session_id: Uuid,
    pub status: String,
    pub notification_type: String,
    pub message: String,
    pub event_ids: Value,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

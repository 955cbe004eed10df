//! C6: notification store. Persists mapper output idempotently; everything
//! beyond `status = "pending"` belongs to the downstream delivery actor.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use schedule_ingest_core::{Notification, NotificationKind};
use uuid::Uuid;

use crate::error::{ErrorStage, WorkerError};

use super::models::ScheduleNotificationRow;
use super::schema::schedule_notification;

/// Insert each notification with conflict-ignore on `notification_id`.
/// Returns the number of rows actually inserted — a retry of a
/// session that produced the same notifications inserts zero.
pub fn store_notifications(
    conn: &mut PgConnection,
    user_id: &str,
    schedule_date: NaiveDate,
    source_session_id: Uuid,
    notifications: &[Notification],
) -> Result<usize, WorkerError> {
    let mut stored = 0;
    for notification in notifications {
        let row = ScheduleNotificationRow {
            notification_id: notification.notification_id.clone(),
            user_id: user_id.to_string(),
            schedule_date,
            source_session_id,
            status: "pending".to_string(),
            notification_type: notification_type_tag(notification.notification_type).to_string(),
            message: notification.message.clone(),
            event_ids: serde_json::to_value(&notification.event_ids)
                .expect("a Vec<String> always serializes"),
            created_at: Utc::now(),
            sent_at: None,
        };

        let affected = diesel::insert_into(schedule_notification::table)
            .values(&row)
            .on_conflict(schedule_notification::notification_id)
            .do_nothing()
            .execute(conn)
            .map_err(|e| WorkerError::transient_db(ErrorStage::Db, e.to_string()))?;

        stored += affected;
    }
    Ok(stored)
}

fn notification_type_tag(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Event => "event",
        NotificationKind::Summary => "summary",
    }
}

//! C7: version writer. Serialized, idempotent insert of a new immutable
//! `schedule_version` row per `(user_id, schedule_date)`.
//!
//! Must run inside the same transaction as the rest of a session's effects;
//! the advisory lock this takes is a *transaction-scoped* lock
//! (`pg_advisory_xact_lock`), so it releases itself at `COMMIT`/`ROLLBACK`
//! with no explicit unlock call needed.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ErrorStage, WorkerError};

use super::models::ScheduleVersionRow;
use super::schema::schedule_version;

/// Outcome of one version-write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionOutcome {
    /// The payload hash differs from the latest stored version; a new row
    /// was inserted with the next sequential version number.
    Created { version: i32 },
    /// The payload hash is unchanged from the latest stored version; no row
    /// was written.
    Unchanged { version: i32 },
    /// A new row would have been inserted, but `session_id` already had one
    /// (a retried invocation of a session already processed) — the unique
    /// constraint on `session_id` absorbed the duplicate.
    AlreadyExisted,
}

/// Acquire the per-day advisory lock, read the latest version, and either
/// skip (hash unchanged) or insert the next version.
pub fn write_version(
    conn: &mut PgConnection,
    user_id: &str,
    schedule_date: NaiveDate,
    session_id: Uuid,
    payload: &serde_json::Value,
    payload_hash: &str,
) -> Result<VersionOutcome, WorkerError> {
    acquire_day_lock(conn, user_id, schedule_date)?;

    let latest = schedule_version::table
        .filter(schedule_version::user_id.eq(user_id))
        .filter(schedule_version::schedule_date.eq(schedule_date))
        .order(schedule_version::version.desc())
        .select((schedule_version::version, schedule_version::payload_hash))
        .first::<(i32, String)>(conn)
        .optional()
        .map_err(|e| WorkerError::transient_db(ErrorStage::Db, e.to_string()))?;

    if let Some((latest_version, latest_hash)) = &latest {
        if latest_hash == payload_hash {
            return Ok(VersionOutcome::Unchanged { version: *latest_version });
        }
    }

    let next_version = latest.map(|(v, _)| v + 1).unwrap_or(1);

    // `(user_id, schedule_date, version)` also carries a UNIQUE constraint
    // at the database level as a backstop against the dense-sequence
    // invariant; the advisory lock held above already serializes every
    // writer for this day, so that constraint is never the arbiter this
    // insert conflict-targets — only `session_id` (the retry case) is.
    let row = ScheduleVersionRow {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        schedule_date,
        version: next_version,
        session_id,
        payload: payload.clone(),
        payload_hash: payload_hash.to_string(),
        created_at: Utc::now(),
    };

    let inserted_ids: Vec<Uuid> = diesel::insert_into(schedule_version::table)
        .values(&row)
        .on_conflict(schedule_version::session_id)
        .do_nothing()
        .returning(schedule_version::id)
        .get_results(conn)
        .map_err(|e| WorkerError::transient_db(ErrorStage::Db, e.to_string()))?;

    if inserted_ids.is_empty() {
        Ok(VersionOutcome::AlreadyExisted)
    } else {
        Ok(VersionOutcome::Created { version: next_version })
    }
}

/// Transaction-scoped advisory lock keyed by a stable hash of
/// `(user_id, schedule_date)`, serializing concurrent version writers that
/// target the same day.
fn acquire_day_lock(conn: &mut PgConnection, user_id: &str, schedule_date: NaiveDate) -> Result<(), WorkerError> {
    let key = day_lock_key(user_id, schedule_date);
    diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(key)
        .execute(conn)
        .map_err(|e| WorkerError::transient_db(ErrorStage::Db, e.to_string()))?;
    Ok(())
}

fn day_lock_key(user_id: &str, schedule_date: NaiveDate) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"|");
    hasher.update(schedule_date.to_string().as_bytes());
    let digest = hasher.finalize();
    i64::from_be_bytes(digest[0..8].try_into().expect("sha256 digest is at least 8 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let a = day_lock_key("user-1", date);
        let b = day_lock_key("user-1", date);
        assert_eq!(a, b);
    }

    #[test]
    fn lock_key_differs_across_users_and_dates() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let other_date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        assert_ne!(day_lock_key("user-1", date), day_lock_key("user-2", date));
        assert_ne!(day_lock_key("user-1", date), day_lock_key("user-1", other_date));
    }
}

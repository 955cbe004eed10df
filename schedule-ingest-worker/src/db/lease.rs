//! C8: lease & lifecycle. Finalization gate, claim (with stale-lease
//! reclaim), heartbeat, and terminal-state finalize — all ownership-guarded
//! or atomic-conditional.
//!
//! The finalization gate and the claim algorithm are expressed as a single
//! SQL statement: a session is eligible either because it is `pending` and
//! has gone idle or because it is `processing` with an expired lease. Both
//! branches race the same way — `SELECT ... FOR UPDATE SKIP LOCKED LIMIT 1`
//! inside the `UPDATE ... WHERE id = (...)` — so two workers polling at once
//! never pick the same row. This mirrors the teacher's use of raw
//! `diesel::sql_query` for statements the query builder has no typed
//! vocabulary for (`db::tenant::TenantManager`'s `SET LOCAL`/`CREATE SCHEMA`
//! calls).

use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use uuid::Uuid;

use crate::config::{Config, StateNames};
use crate::error::{ErrorStage, WorkerError};

use super::models::CaptureSession;
use super::schema::capture_session;

#[derive(QueryableByName, Debug, Clone)]
#[diesel(table_name = capture_session)]
struct ClaimedRow {
    id: Uuid,
    user_id: String,
    state: String,
    created_at: chrono::DateTime<Utc>,
    error: Option<String>,
    locked_at: Option<chrono::DateTime<Utc>>,
    locked_by: Option<String>,
}

impl From<ClaimedRow> for CaptureSession {
    fn from(r: ClaimedRow) -> Self {
        CaptureSession {
            id: r.id,
            user_id: r.user_id,
            state: r.state,
            created_at: r.created_at,
            error: r.error,
            locked_at: r.locked_at,
            locked_by: r.locked_by,
        }
    }
}

/// Atomically finalize-and-claim the next eligible session, if any.
/// Returns `Ok(None)` when nothing is currently eligible — not an error.
pub fn claim_next_session(
    conn: &mut PgConnection,
    config: &Config,
) -> Result<Option<CaptureSession>, WorkerError> {
    let StateNames { pending, processing, .. } = &config.state_names;

    // Unqualified table names: the pooled connection's `search_path` is
    // already pinned to `config.db_schema` by `SearchPathCustomizer`
    // (see `crate::db::pool`), so this resolves the same way the
    // `diesel::table!` macros in `crate::db::schema` do.
    let sql = "UPDATE capture_session \
        SET state = $1, locked_at = now(), locked_by = $2 \
        WHERE id = ( \
            SELECT cs.id FROM capture_session cs \
            WHERE ( \
                cs.state = $3 \
                AND EXISTS (SELECT 1 FROM capture_image ci WHERE ci.session_id = cs.id) \
                AND now() - ( \
                    SELECT max(ci.created_at) FROM capture_image ci WHERE ci.session_id = cs.id \
                ) >= ($4::text || ' seconds')::interval \
            ) OR ( \
                cs.state = $1 \
                AND cs.locked_at <= now() - ($5::text || ' seconds')::interval \
            ) \
            ORDER BY (cs.state = $3) DESC, cs.created_at ASC \
            FOR UPDATE SKIP LOCKED \
            LIMIT 1 \
        ) \
        RETURNING id, user_id, state, created_at, error, locked_at, locked_by";

    let rows: Vec<ClaimedRow> = diesel::sql_query(sql)
        .bind::<Text, _>(processing.clone())
        .bind::<Text, _>(config.worker_id.clone())
        .bind::<Text, _>(pending.clone())
        .bind::<Integer, _>(config.session_idle_timeout.as_secs() as i32)
        .bind::<Integer, _>(config.lease_timeout.as_secs() as i32)
        .load(conn)
        .map_err(|e| WorkerError::transient_db(ErrorStage::Lifecycle, e.to_string()))?;

    Ok(rows.into_iter().next().map(CaptureSession::from))
}

/// Heartbeat: refresh `locked_at` for a session this worker still owns.
/// Returns `false` if zero rows matched — the lease has
/// been lost (stolen by a stale-lease reclaim), and the caller must abort
/// without performing any further ownership-guarded write.
pub fn heartbeat(conn: &mut PgConnection, config: &Config, session_id: Uuid) -> Result<bool, WorkerError> {
    let affected = diesel::update(capture_session::table)
        .filter(capture_session::id.eq(session_id))
        .filter(capture_session::locked_by.eq(&config.worker_id))
        .set(capture_session::locked_at.eq(Utc::now()))
        .execute(conn)
        .map_err(|e| WorkerError::transient_db(ErrorStage::Lifecycle, e.to_string()))?;
    Ok(affected == 1)
}

/// Finalize successfully: `state=done`, lease cleared, guarded by
/// ownership. Returns `false` if the lease was already
/// lost — the caller must treat this the same as a heartbeat failure.
pub fn finalize_done(conn: &mut PgConnection, config: &Config, session_id: Uuid) -> Result<bool, WorkerError> {
    let affected = diesel::update(capture_session::table)
        .filter(capture_session::id.eq(session_id))
        .filter(capture_session::locked_by.eq(&config.worker_id))
        .set((
            capture_session::state.eq(config.state_names.done.clone()),
            capture_session::locked_at.eq(None::<chrono::DateTime<Utc>>),
            capture_session::locked_by.eq(None::<String>),
            capture_session::error.eq(None::<String>),
        ))
        .execute(conn)
        .map_err(|e| WorkerError::transient_db(ErrorStage::Lifecycle, e.to_string()))?;
    Ok(affected == 1)
}

/// Finalize with failure: `state=failed`, `error` set, lease cleared, same
/// ownership guard.
pub fn finalize_failed(
    conn: &mut PgConnection,
    config: &Config,
    session_id: Uuid,
    error_message: &str,
) -> Result<bool, WorkerError> {
    debug_assert!(!error_message.is_empty(), "failed sessions must carry a non-empty error");
    let affected = diesel::update(capture_session::table)
        .filter(capture_session::id.eq(session_id))
        .filter(capture_session::locked_by.eq(&config.worker_id))
        .set((
            capture_session::state.eq(config.state_names.failed.clone()),
            capture_session::locked_at.eq(None::<chrono::DateTime<Utc>>),
            capture_session::locked_by.eq(None::<String>),
            capture_session::error.eq(Some(error_message.to_string())),
        ))
        .execute(conn)
        .map_err(|e| WorkerError::transient_db(ErrorStage::Lifecycle, e.to_string()))?;
    Ok(affected == 1)
}

/// Read a session's images in `sequence` order.
pub fn images_for_session(
    conn: &mut PgConnection,
    session_id: Uuid,
) -> Result<Vec<super::models::CaptureImage>, WorkerError> {
    use super::schema::capture_image;

    capture_image::table
        .filter(capture_image::session_id.eq(session_id))
        .order(capture_image::sequence.asc())
        .select(super::models::CaptureImage::as_select())
        .load(conn)
        .map_err(|e| WorkerError::transient_db(ErrorStage::Db, e.to_string()))
}

//! C9: runner loop. Drives one finalizable session per iteration, composing
//! C1–C8 in the order: finalize/claim → collaborator pipeline
//! → aggregate → canonicalize → version write → diff/persist → map to
//! notifications → store notifications → lifecycle finalize.
//!
//! The `tokio::time::interval` + sibling heartbeat task structure mirrors
//! the teacher's actor/worker composition style of `tokio::select!` between
//! a unit of work and a cancellation/heartbeat signal, adapted here to a
//! poll loop instead of a message-driven actor.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use diesel::Connection;
use schedule_ingest_core::{aggregate, canonicalize, map_to_notifications_with_threshold, IdentifiedEvent};
use uuid::Uuid;

use crate::config::Config;
use crate::db::models::CaptureSession;
use crate::db::{event_store, lease, notification_store, version_writer, DbPool};
use crate::error::{ErrorStage, WorkerError};
use crate::monitoring::logging::new_correlation_id;
use crate::pipeline::{ImageRef, LayoutParser, OcrEngine, ShiftNormalizer};
use crate::session_span;

#[cfg(feature = "monitoring")]
use crate::monitoring::metrics;

/// Everything the runner needs to drive one poll iteration: the pool, the
/// config, and the three collaborator implementations.
pub struct Runner {
    pool: DbPool,
    config: Config,
    ocr: Arc<dyn OcrEngine>,
    layout: Arc<dyn LayoutParser>,
    normalizer: Arc<dyn ShiftNormalizer>,
}

impl Runner {
    pub fn new(
        pool: DbPool,
        config: Config,
        ocr: Arc<dyn OcrEngine>,
        layout: Arc<dyn LayoutParser>,
        normalizer: Arc<dyn ShiftNormalizer>,
    ) -> Self {
        Self { pool, config, ocr, layout, normalizer }
    }

    /// Run forever, once per `WORKER_POLL_SECONDS`, until a shutdown signal
    /// arrives.
    pub async fn run(&self) {
        // A fleet of these processes is expected to run against the same
        // database (§5: "parallel processes, serialized by the database");
        // a random startup delay keeps them from all polling in lockstep
        // when deployed together, without needing any coordination between
        // them.
        tokio::time::sleep(jittered_startup_delay(self.config.worker_poll_interval)).await;

        let mut interval = tokio::time::interval(self.config.worker_poll_interval);
        let mut shutdown = Box::pin(shutdown_signal());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.run_once().await {
                        tracing::error!(
                            event = "runner.iteration_failed",
                            error.stage = %err.stage(),
                            error.type = err.kind(),
                            error.message = %err,
                            "runner iteration failed");
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!(event = "runner.shutdown", "shutdown signal received, exiting after in-flight work");
                    break;
                }
            }
        }
    }

    /// Claim-and-process at most one session. Returns `Ok(())` even
    /// when nothing was eligible to claim.
    pub async fn run_once(&self) -> Result<(), WorkerError> {
        let Some(session) = self.claim_next_session().await? else {
            tracing::debug!(event = "session.skipped_idle", "no finalizable session this iteration");
            return Ok(());
        };

        let correlation_id = new_correlation_id();
        let span = session_span!(correlation_id, session.id, session.user_id);
        let _guard = span.enter();

        tracing::info!(event = "session.finalized", "session claimed for processing");

        let lease_lost = Arc::new(AtomicBool::new(false));
        let heartbeat = self.spawn_heartbeat(session.id, Arc::clone(&lease_lost));

        let result = self.process_session(&session, &lease_lost).await;

        heartbeat.abort();

        match result {
            Ok(()) => {
                if self.finalize_done(session.id).await? {
                    tracing::info!(event = "session.processed", outcome = "done", "session finalized");
                    #[cfg(feature = "monitoring")]
                    metrics::SESSIONS_PROCESSED_TOTAL.inc();
                } else {
                    tracing::warn!(event = "session.lease_lost", "lease lost before finalize could commit");
                }
            }
            Err(err) if err.is_lease_lost() => {
                tracing::warn!(event = "session.lease_lost", "abandoning iteration, lease no longer owned");
            }
            Err(err) => {
                let message = err.to_string();
                if self.finalize_failed(session.id, &message).await? {
                    tracing::error!(
                        event = "session.processed",
                        outcome = "failed",
                        error.stage = %err.stage(),
                        error.type = err.kind(),
                        error.message = %message,
                        "session finalized as failed");
                    #[cfg(feature = "monitoring")]
                    metrics::SESSIONS_FAILED_TOTAL.inc();
                } else {
                    tracing::warn!(event = "session.lease_lost", "lease lost before failure could be recorded");
                }
            }
        }

        Ok(())
    }

    async fn process_session(
        &self,
        session: &CaptureSession,
        lease_lost: &Arc<AtomicBool>,
    ) -> Result<(), WorkerError> {
        let schedule_date = infer_schedule_date(session)?;
        let images = self.images_for_session(session.id).await?;

        let ocr = Arc::clone(&self.ocr);
        let layout = Arc::clone(&self.layout);
        let normalizer = Arc::clone(&self.normalizer);
        let user_id = session.user_id.clone();
        let session_id = session.id;
        let summary_threshold = self.config.summary_threshold;
        let lease_lost = Arc::clone(lease_lost);
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut per_screenshot = Vec::with_capacity(images.len());
            for image in &images {
                let image_ref = ImageRef { sequence: image.sequence, r2_key: image.r2_key.clone() };
                let boxes = ocr.recognize(&image_ref)?;
                tracing::debug!(event = "ocr.completed", sequence = image.sequence, boxes = boxes.len());

                let entries = layout.parse_layout(&boxes)?;
                let shifts = normalizer.normalize(&entries)?;
                tracing::debug!(
                    event = "layout.shifts_detected",
                    sequence = image.sequence,
                    shifts = shifts.len());
                per_screenshot.push(shifts);
            }

            let aggregated = aggregate(&per_screenshot);
            tracing::info!(event = "aggregation.completed", shifts = aggregated.len());

            let canonical = canonicalize(&schedule_date.to_string(), &aggregated)
                .map_err(|e| WorkerError::canonicalization(ErrorStage::Layout, e))?;

            if lease_lost.load(Ordering::SeqCst) {
                return Err(WorkerError::LeaseLost { stage: ErrorStage::Lifecycle });
            }

            let mut conn = pool.get().map_err(|e| crate::error::from_pool(ErrorStage::Db, e))?;

            conn.transaction::<(), WorkerError, _>(|conn| {
                let outcome = version_writer::write_version(
                    conn,
                    &user_id,
                    schedule_date,
                    session_id,
                    &serde_json::to_value(&canonical.payload).expect("DayCanonicalPayload always serializes"),
                    &canonical.payload_hash)?;

                #[cfg(feature = "monitoring")]
                if matches!(outcome, version_writer::VersionOutcome::Created { .. }) {
                    metrics::VERSIONS_CREATED_TOTAL.inc();
                }

                if let version_writer::VersionOutcome::Created { .. } = outcome {
                    let persisted = event_store::process_diff(
                        conn,
                        &user_id,
                        schedule_date,
                        session_id,
                        &canonical.payload.shifts)?;
                    tracing::info!(event = "diff.computed", events = persisted.len());

                    #[cfg(feature = "monitoring")]
                    metrics::EVENTS_EMITTED_TOTAL.inc_by(persisted.len() as u64);
                    tracing::info!(event = "events.persisted", events = persisted.len());

                    let identified: Vec<IdentifiedEvent> = persisted
                        .iter()
                        .map(|p| IdentifiedEvent { event_id: p.event_id.to_string(), event: p.event.clone() })
                        .collect();

                    let notifications = map_to_notifications_with_threshold(
                        &user_id,
                        &schedule_date.to_string(),
                        &session_id.to_string(),
                        &identified,
                        &HashSet::new(),
                        summary_threshold);
                    tracing::info!(event = "notifications.generated", notifications = notifications.len());

                    let stored = notification_store::store_notifications(
                        conn,
                        &user_id,
                        schedule_date,
                        session_id,
                        &notifications)?;
                    tracing::info!(event = "notifications.stored", notifications = stored);

                    #[cfg(feature = "monitoring")]
                    metrics::NOTIFICATIONS_STORED_TOTAL.inc_by(stored as u64);
                }

                Ok(())
            })
        })
        .await
        .map_err(|e| WorkerError::unexpected(ErrorStage::Lifecycle, format!("processing task panicked: {e}")))?
    }

    fn spawn_heartbeat(&self, session_id: Uuid, lease_lost: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
        let pool = self.pool.clone();
        let config_snapshot = self.config.clone();
        let interval = self.config.lease_heartbeat;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let pool = pool.clone();
                let config_snapshot = config_snapshot.clone();
                let ok = tokio::task::spawn_blocking(move || {
                    let mut conn = pool.get().ok()?;
                    lease::heartbeat(&mut conn, &config_snapshot, session_id).ok()
                })
                .await
                .ok()
                .flatten()
                .unwrap_or(false);

                if !ok {
                    lease_lost.store(true, Ordering::SeqCst);
                    tracing::warn!(event = "session.lease_lost", "heartbeat observed lost ownership");
                    break;
                }
            }
        })
    }

    async fn claim_next_session(&self) -> Result<Option<CaptureSession>, WorkerError> {
        let pool = self.pool.clone();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| crate::error::from_pool(ErrorStage::Lifecycle, e))?;
            lease::claim_next_session(&mut conn, &config)
        })
        .await
        .map_err(|e| WorkerError::unexpected(ErrorStage::Lifecycle, format!("claim task panicked: {e}")))?
    }

    async fn images_for_session(&self, session_id: Uuid) -> Result<Vec<crate::db::models::CaptureImage>, WorkerError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| crate::error::from_pool(ErrorStage::Db, e))?;
            lease::images_for_session(&mut conn, session_id)
        })
        .await
        .map_err(|e| WorkerError::unexpected(ErrorStage::Db, format!("image lookup task panicked: {e}")))?
    }

    async fn finalize_done(&self, session_id: Uuid) -> Result<bool, WorkerError> {
        let pool = self.pool.clone();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| crate::error::from_pool(ErrorStage::Lifecycle, e))?;
            lease::finalize_done(&mut conn, &config, session_id)
        })
        .await
        .map_err(|e| WorkerError::unexpected(ErrorStage::Lifecycle, format!("finalize task panicked: {e}")))?
    }

    async fn finalize_failed(&self, session_id: Uuid, message: &str) -> Result<bool, WorkerError> {
        let pool = self.pool.clone();
        let config = self.config.clone();
        let message = message.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| crate::error::from_pool(ErrorStage::Lifecycle, e))?;
            lease::finalize_failed(&mut conn, &config, session_id, &message)
        })
        .await
        .map_err(|e| WorkerError::unexpected(ErrorStage::Lifecycle, format!("finalize task panicked: {e}")))?
    }
}

/// `schedule_date` is not stored on `capture_session` directly in the data
/// model beyond what the day tables key on; a session's date is the one its
/// images were captured for, which upstream already pins to `user_id`'s
/// local day at session-creation time. This worker takes it from the
/// session's `created_at` date in UTC, matching the upstream convention of
/// creating a session once all of a day's screenshots have arrived.
fn infer_schedule_date(session: &CaptureSession) -> Result<NaiveDate, WorkerError> {
    Ok(session.created_at.date_naive())
}

/// A uniformly random delay in `[0, poll_interval)`, used once at startup to
/// desynchronize a fleet of worker processes.
fn jittered_startup_delay(poll_interval: std::time::Duration) -> std::time::Duration {
    use rand::Rng;
    let max_millis = poll_interval.as_millis().max(1) as u64;
    std::time::Duration::from_millis(rand::thread_rng().gen_range(0..max_millis))
}

#[cfg(test)]
mod jitter_tests {
    use super::*;

    #[test]
    fn jittered_delay_never_exceeds_the_poll_interval() {
        let interval = std::time::Duration::from_secs(5);
        for _ in 0..100 {
            let delay = jittered_startup_delay(interval);
            assert!(delay < interval);
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

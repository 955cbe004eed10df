//! Pure, database-free primitives for turning observed schedule shifts into
//! a canonical per-day payload, merging multi-screenshot observations,
//! diffing successive days, and mapping the result to notifications.
//!
//! Everything in this crate is deterministic and side-effect free; the
//! `schedule-ingest-worker` crate is what wires it to Postgres, a lease
//! model, and a poll loop.

pub mod aggregate;
pub mod canonicalize;
pub mod diff;
pub mod error;
pub mod notify;
pub mod shift;
pub mod time;

pub use aggregate::{aggregate, aggregate_with_tolerance, DEFAULT_TIME_TOLERANCE_MIN};
pub use canonicalize::{canonicalize, hash_payload, CanonicalDay};
pub use diff::{diff, EventType, ScheduleEvent};
pub use error::CanonicalizationError;
pub use notify::{
 map_to_notifications, map_to_notifications_with_threshold, IdentifiedEvent, Notification,
 NotificationKind, DEFAULT_SUMMARY_THRESHOLD,
};
pub use shift::{AggregatedShift, CanonicalShift, DayCanonicalPayload, ShiftType};
pub use time::ClockMinutes;

//! Structured JSON logging.
//!
//! This worker has no HTTP request boundary, so there is no middleware to
//! mint a correlation id per inbound request the way the teacher's Actix
//! layer does. Instead the runner mints one `tracing::Span` per claimed
//! session and every log emitted while that span is entered carries its
//! `correlation_id` field automatically — the same mint-and-attach idea,
//! moved from "per HTTP request" to "per poll-loop iteration".

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize the global `tracing` subscriber with JSON-formatted output and
/// an `EnvFilter` (`RUST_LOG`, defaulting to `info`).
pub fn init_structured_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let formatting_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .json();

    tracing_subscriber::registry().with(env_filter).with(formatting_layer).init();
}

/// A fresh correlation id for one runner iteration.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Build the span a runner iteration enters for its whole lifetime, so every
/// event logged underneath it (`session.*`, `ocr.*`, `diff.*`, ...) carries
/// `correlation_id`, `session_id`, and `user_id` without repeating them at
/// every call site.
#[macro_export]
macro_rules! session_span {
    ($correlation_id:expr, $session_id:expr, $user_id:expr) => {
        tracing::info_span!(
            "session",
            correlation_id = %$correlation_id,
            session_id = %$session_id,
            user_id = %$user_id
        )
    };
}

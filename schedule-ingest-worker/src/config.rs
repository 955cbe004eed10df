//! Typed configuration loaded from the environment.
//!
//! Mirrors the teacher's `workflow-engine-app::config::AppConfig` shape:
//! fail fast on a missing required variable, validate tunables as they're
//! parsed, sane built-in defaults for everything that has one in the spec.

use std::env;
use std::time::Duration;

/// Errors that can occur while assembling [`Config`] from the process
/// environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {var_name}")]
    MissingEnvVar { var_name: String },

    #[error("invalid value for {var_name}: {value:?}")]
    InvalidEnvVar { var_name: String, value: String },

    #[error("LEASE_HEARTBEAT_SECONDS * 3 must be less than LEASE_TIMEOUT_SECONDS (got heartbeat={heartbeat}s, timeout={timeout}s)")]
    HeartbeatTooSlow { heartbeat: u64, timeout: u64 },
}

/// State-name aliasing, so the worker can run against a test schema
/// that spells the `capture_session.state` enum values differently.
#[derive(Debug, Clone)]
pub struct StateNames {
    pub pending: String,
    pub processing: String,
    pub done: String,
    pub failed: String,
}

impl Default for StateNames {
    fn default() -> Self {
        Self {
            pending: "pending".to_string(),
            processing: "processing".to_string(),
            done: "done".to_string(),
            failed: "failed".to_string(),
        }
    }
}

/// Fully resolved worker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_schema: String,
    pub worker_id: String,

    pub lease_timeout: Duration,
    pub lease_heartbeat: Duration,
    pub session_idle_timeout: Duration,
    pub worker_poll_interval: Duration,

    pub summary_threshold: usize,
    pub state_names: StateNames,
}

impl Config {
    /// Load from the process environment, applying the spec's defaults
    /// for anything not set. `.env` loading (via `dotenvy`) is
    /// the caller's responsibility (done once in `main`), matching the
    /// teacher's `main.rs`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require_var("DATABASE_URL")?;
        let db_schema = env::var("DB_SCHEMA").unwrap_or_else(|_| "schedule_ingest".to_string());
        let worker_id = env::var("WORKER_ID").unwrap_or_else(|_| default_worker_id());

        let lease_timeout_secs = parse_u64("LEASE_TIMEOUT_SECONDS", 300)?;
        let lease_heartbeat_secs = parse_u64("LEASE_HEARTBEAT_SECONDS", 10)?;
        let session_idle_timeout_secs = parse_u64("SESSION_IDLE_TIMEOUT_SECONDS", 25)?;
        let worker_poll_secs = parse_u64("WORKER_POLL_SECONDS", 5)?;
        let summary_threshold = parse_u64("SUMMARY_THRESHOLD", 3)? as usize;

        if lease_heartbeat_secs * 3 >= lease_timeout_secs {
            return Err(ConfigError::HeartbeatTooSlow {
                heartbeat: lease_heartbeat_secs,
                timeout: lease_timeout_secs,
            });
        }

        let state_names = StateNames {
            pending: env::var("PENDING_STATE").unwrap_or_else(|_| "pending".to_string()),
            processing: env::var("PROCESSING_STATE").unwrap_or_else(|_| "processing".to_string()),
            done: env::var("DONE_STATE").unwrap_or_else(|_| "done".to_string()),
            failed: env::var("FAILED_STATE").unwrap_or_else(|_| "failed".to_string()),
        };

        Ok(Config {
            database_url,
            db_schema,
            worker_id,
            lease_timeout: Duration::from_secs(lease_timeout_secs),
            lease_heartbeat: Duration::from_secs(lease_heartbeat_secs),
            session_idle_timeout: Duration::from_secs(session_idle_timeout_secs),
            worker_poll_interval: Duration::from_secs(worker_poll_secs),
            summary_threshold,
            state_names,
        })
    }
}

/// Open Question (1): `locked_by` is a stable worker identity, not
/// the OS PID, so a restart of the same logical worker still recognizes
/// (and can heartbeat/reclaim) its own leases rather than orphaning them.
/// Defaults to `host:random` when `WORKER_ID` isn't pinned by the deployer.
fn default_worker_id() -> String {
    let host = env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string());
    format!("{host}-{}", uuid::Uuid::new_v4())
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar { var_name: name.to_string() })
}

fn parse_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidEnvVar { var_name: name.to_string(), value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_all() {
        for var in [
            "DATABASE_URL",
            "DB_SCHEMA",
            "WORKER_ID",
            "LEASE_TIMEOUT_SECONDS",
            "LEASE_HEARTBEAT_SECONDS",
            "SESSION_IDLE_TIMEOUT_SECONDS",
            "WORKER_POLL_SECONDS",
            "SUMMARY_THRESHOLD",
            "PENDING_STATE",
            "PROCESSING_STATE",
            "DONE_STATE",
            "FAILED_STATE",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn missing_database_url_fails_fast() {
        clear_all();
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar { var_name } if var_name == "DATABASE_URL"));
    }

    #[test]
    #[serial]
    fn defaults_applied_when_only_database_url_set() {
        clear_all();
        env::set_var("DATABASE_URL", "postgres://localhost/test");
        let config = Config::from_env().unwrap();
        assert_eq!(config.db_schema, "schedule_ingest");
        assert_eq!(config.lease_timeout, Duration::from_secs(300));
        assert_eq!(config.lease_heartbeat, Duration::from_secs(10));
        assert_eq!(config.session_idle_timeout, Duration::from_secs(25));
        assert_eq!(config.worker_poll_interval, Duration::from_secs(5));
        assert_eq!(config.summary_threshold, 3);
        env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn rejects_heartbeat_too_close_to_timeout() {
        clear_all();
        env::set_var("DATABASE_URL", "postgres://localhost/test");
        env::set_var("LEASE_TIMEOUT_SECONDS", "30");
        env::set_var("LEASE_HEARTBEAT_SECONDS", "10");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::HeartbeatTooSlow { .. }));
        clear_all();
    }

    #[test]
    #[serial]
    fn invalid_numeric_env_var_reported() {
        clear_all();
        env::set_var("DATABASE_URL", "postgres://localhost/test");
        env::set_var("WORKER_POLL_SECONDS", "not-a-number");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { var_name, .. } if var_name == "WORKER_POLL_SECONDS"));
        clear_all();
    }

    #[test]
    #[serial]
    fn state_name_aliasing_overrides_defaults() {
        clear_all();
        env::set_var("DATABASE_URL", "postgres://localhost/test");
        env::set_var("PENDING_STATE", "queued");
        let config = Config::from_env().unwrap();
        assert_eq!(config.state_names.pending, "queued");
        assert_eq!(config.state_names.done, "done");
        clear_all();
    }
}

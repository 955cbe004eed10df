//! Database-facing layer: Diesel schema, connection pool, row models, and
//! one module per component that touches Postgres (C4, C6, C7, C8).

pub mod event_store;
pub mod lease;
pub mod models;
pub mod notification_store;
pub mod pool;
pub mod schema;
pub mod version_writer;

pub use pool::{establish, init_pool, DbConnection, DbPool};

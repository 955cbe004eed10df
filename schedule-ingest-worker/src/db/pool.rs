//! Connection pool setup, mirroring the teacher's
//! `db::session::init_pool`.

use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::{Connection, PgConnection, RunQueryDsl};

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Sets `search_path` on every connection checked out of the pool, so the
/// tables compiled against the `schedule_ingest` schema in
/// [`crate::db::schema`] resolve against whatever schema `DB_SCHEMA` names
/// (a differently-named integration-test schema, for instance) without
/// needing a second copy of the schema module.
#[derive(Debug)]
struct SearchPathCustomizer {
    schema: String,
}

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for SearchPathCustomizer {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        // `self.schema` is interpolated unescaped; it comes from `DB_SCHEMA`,
        // an operator-controlled deployment setting, never user input.
        let query = format!("SET search_path TO {}, public", self.schema);
        diesel::sql_query(query)
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        Ok(())
    }
}

/// Build the connection pool for `database_url`, pinning every connection's
/// `search_path` to `schema`.
pub fn init_pool(database_url: &str, schema: &str) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .connection_customizer(Box::new(SearchPathCustomizer { schema: schema.to_string() }))
        .build(manager)
}

/// Standalone connection, used by tests that want a single connection
/// rather than a pool (mirrors the teacher's direct-`PgConnection::establish`
/// test helpers).
pub fn establish(database_url: &str, schema: &str) -> Result<PgConnection, diesel::ConnectionError> {
    let mut conn = PgConnection::establish(database_url)?;
    let query = format!("SET search_path TO {}, public", schema);
    diesel::sql_query(query)
        .execute(&mut conn)
        .map_err(diesel::ConnectionError::CouldntSetupConfiguration)?;
    Ok(conn)
}

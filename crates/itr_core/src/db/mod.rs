use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::error::AppError;

/// Value of `PRAGMA user_version` once the schema below is in place.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../migrations/0001_init.sql"
));

pub fn open(path: &Path) -> Result<Connection, AppError> {
    Connection::open(path).map_err(|e| {
        AppError::new("DB_OPEN_FAILED", "Failed to open SQLite database")
            .with_details(format!("path={}: {}", path.display(), e))
    })
}

pub fn open_in_memory() -> Result<Connection, AppError> {
    Connection::open_in_memory().map_err(|e| {
        AppError::new("DB_OPEN_FAILED", "Failed to open in-memory SQLite database")
            .with_details(e.to_string())
    })
}

pub fn schema_version(conn: &Connection) -> Result<i64, AppError> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| {
            AppError::new("DB_SCHEMA_VERSION_FAILED", "Failed to read schema version")
                .with_details(e.to_string())
        })
}

/// Idempotently bring the schema up to date.
///
/// The schema and its version stamp are written in one transaction.
pub fn migrate(conn: &mut Connection) -> Result<(), AppError> {
    let current = schema_version(conn)?;
    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to start migration transaction")
            .with_details(e.to_string())
    })?;
    tx.execute_batch(SCHEMA_SQL).map_err(|e| {
        AppError::new("DB_MIGRATION_FAILED", "Failed to create incident schema")
            .with_details(e.to_string())
    })?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|e| {
            AppError::new("DB_MIGRATION_FAILED", "Failed to stamp schema version")
                .with_details(e.to_string())
        })?;
    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit migration transaction")
            .with_details(e.to_string())
    })?;

    debug!(from = current, to = SCHEMA_VERSION, "migrated incident schema");
    Ok(())
}

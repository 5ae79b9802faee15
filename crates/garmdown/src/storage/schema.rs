//! Database schema and migrations

use rusqlite::Connection;

use crate::error::{GarmdownError, Result};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all pending migrations
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        )",
        [],
    )
    .map_err(|e| GarmdownError::database("Failed to create migrations table", e))?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| GarmdownError::database("Failed to read schema version", e))?;

    if current_version < 1 {
        migration_v1(conn)?;
    }

    Ok(())
}

/// Migration v1: activities and backups
fn migration_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS activities (
            activity_id TEXT PRIMARY KEY,
            start_time TEXT NOT NULL,
            type_code TEXT NOT NULL,
            raw_json TEXT NOT NULL,
            downloaded_at TEXT,
            imported_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_activities_start_time
        ON activities(start_time);

        CREATE TABLE IF NOT EXISTS backups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            time TEXT NOT NULL,
            path TEXT NOT NULL
        );
        "#,
    )
    .map_err(|e| GarmdownError::database("Failed to create tables", e))?;

    conn.execute(
        "INSERT INTO schema_migrations (version) VALUES (?)",
        [SCHEMA_VERSION],
    )
    .map_err(|e| GarmdownError::database("Failed to record migration", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('activities', 'backups')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }
}

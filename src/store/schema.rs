//! Database schema definitions and migrations.
//!
//! Two databases share this versioning scheme: the photo cache and the
//! small key-value preferences store holding the tracking flag.

use rusqlite::Connection;

use super::error::StoreError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Photo cache DDL for version 1.
const PHOTOS_V1: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    owner TEXT NOT NULL DEFAULT '',
    latitude REAL NOT NULL DEFAULT 0.0,
    longitude REAL NOT NULL DEFAULT 0.0,
    image_url TEXT NOT NULL DEFAULT '',
    width INTEGER NOT NULL DEFAULT 0,
    height INTEGER NOT NULL DEFAULT 0,
    uploaded_at INTEGER NOT NULL DEFAULT 0,
    cached_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_photos_cached_at ON photos(cached_at);
"#;

/// Preferences DDL for version 1.
const PREFERENCES_V1: &str = r#"
CREATE TABLE IF NOT EXISTS preferences (
    key TEXT PRIMARY KEY NOT NULL,
    value INTEGER NOT NULL
);
"#;

/// Get the current schema version from the database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the photo cache schema.
///
/// Idempotent; safe on both new and existing databases.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StoreError> {
    apply(conn, PHOTOS_V1)
}

/// Initialize or migrate the preferences schema.
pub(crate) fn migrate_preferences(conn: &Connection) -> Result<(), StoreError> {
    apply(conn, PREFERENCES_V1)
}

fn apply(conn: &Connection, ddl: &str) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version < SCHEMA_VERSION {
        conn.execute_batch(ddl)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::debug!("Initialized database schema at version {}", SCHEMA_VERSION);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_db_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_idempotent_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_unsupported_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        let result = migrate(&conn);
        assert!(matches!(
            result,
            Err(StoreError::UnsupportedSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let conn = Connection::open_in_memory().unwrap();
        migrate_preferences(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM preferences", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_cached_at_index_created() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name = 'idx_photos_cached_at'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}

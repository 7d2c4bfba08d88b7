//! Photo store trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use tokio::sync::watch;

use super::error::StoreError;
use super::schema;
use super::types::PhotoRecord;

/// Snapshot published by the live query, newest-cached first.
pub type PhotoSnapshot = Arc<Vec<PhotoRecord>>;

/// Trait for photo cache operations.
///
/// Object-safe so it can be shared as `Arc<dyn PhotoStore>` between the
/// ingestion tasks and the presentation layer.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Insert a record unless one with the same id already exists.
    ///
    /// Returns `true` if the record was written. An existing row is never
    /// touched, including its `cached_at`.
    async fn insert_if_absent(&self, record: &PhotoRecord) -> Result<bool, StoreError>;

    /// Insert every record whose id is not cached yet, in one transaction.
    ///
    /// Returns the number of records written. Observers of
    /// [`PhotoStore::query_all_live`] are notified once for the whole batch,
    /// and not at all when nothing was written.
    async fn insert_all_if_absent(&self, records: &[PhotoRecord]) -> Result<usize, StoreError>;

    /// Live view of every cached record ordered by `cached_at`, newest first.
    ///
    /// The receiver holds the current snapshot immediately and wakes after
    /// each committed insert batch or clear. Notifications coalesce: an
    /// observer that is slow to look sees only the latest snapshot, not
    /// every intermediate one. No committed change is ever missing from
    /// the snapshot it eventually reads.
    fn query_all_live(&self) -> watch::Receiver<PhotoSnapshot>;

    /// Delete every cached record. Returns the number of rows removed.
    async fn clear_all(&self) -> Result<u64, StoreError>;

    /// One-shot read of every cached record, newest first.
    async fn get_all(&self) -> Result<Vec<PhotoRecord>, StoreError>;

    /// Number of cached records.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Cache time of the most recently cached record, if any.
    async fn newest_cached_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
}

/// Connection plus the insert clock, guarded together so that commits and
/// `cached_at` assignment happen in one order.
struct Writer {
    conn: Connection,
    last_cached_at: i64,
}

struct Shared {
    /// rusqlite::Connection is not Sync; the mutex is also the single-writer lock.
    writer: Mutex<Writer>,
    live: watch::Sender<PhotoSnapshot>,
}

/// SQLite implementation of the photo cache.
pub struct SqlitePhotoStore {
    shared: Arc<Shared>,
    /// Path to the database file (for error messages).
    path: PathBuf,
}

impl std::fmt::Debug for SqlitePhotoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePhotoStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

const INSERT_IGNORE: &str = "INSERT INTO photos (id, title, owner, latitude, longitude, image_url, width, height, uploaded_at, cached_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) ON CONFLICT(id) DO NOTHING";

const SELECT_ALL: &str = "SELECT id, title, owner, latitude, longitude, image_url, width, height, uploaded_at, cached_at FROM photos ORDER BY cached_at DESC, rowid DESC";

impl SqlitePhotoStore {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone).map_err(|e| StoreError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(StoreError::Migration)?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(StoreError::Migration)?;

            schema::migrate(&conn)?;

            Ok::<_, StoreError>(conn)
        })
        .await??;

        Self::from_connection(conn, path)
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, path: PathBuf) -> Result<Self, StoreError> {
        let last_cached_at: i64 = conn
            .query_row("SELECT COALESCE(MAX(cached_at), 0) FROM photos", [], |row| {
                row.get(0)
            })
            .map_err(StoreError::query)?;
        let initial = load_all(&conn)?;
        let (live, _) = watch::channel(Arc::new(initial));

        Ok(Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(Writer {
                    conn,
                    last_cached_at,
                }),
                live,
            }),
            path,
        })
    }

    /// Get the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the writer on the blocking pool.
    async fn with_writer<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Writer, &watch::Sender<PhotoSnapshot>) -> Result<T, StoreError>
            + Send
            + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let mut writer = shared
                .writer
                .lock()
                .map_err(|_| StoreError::Poisoned)?;
            f(&mut writer, &shared.live)
        })
        .await?
    }
}

#[async_trait]
impl PhotoStore for SqlitePhotoStore {
    async fn insert_if_absent(&self, record: &PhotoRecord) -> Result<bool, StoreError> {
        let inserted = self
            .insert_all_if_absent(std::slice::from_ref(record))
            .await?;
        Ok(inserted == 1)
    }

    async fn insert_all_if_absent(&self, records: &[PhotoRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let records = records.to_vec();
        self.with_writer(move |writer, live| {
            let floor = writer.last_cached_at.max(Utc::now().timestamp_millis());
            let mut newest = writer.last_cached_at;
            let mut inserted = 0;

            let tx = writer.conn.transaction().map_err(StoreError::query)?;
            {
                let mut stmt = tx.prepare_cached(INSERT_IGNORE).map_err(StoreError::query)?;
                for record in &records {
                    let cached_at = record.cached_at.unwrap_or(floor);
                    let changed = stmt
                        .execute(rusqlite::params![
                            &record.id,
                            &record.title,
                            &record.owner,
                            record.latitude,
                            record.longitude,
                            &record.image_url,
                            record.width,
                            record.height,
                            record.uploaded_at,
                            cached_at,
                        ])
                        .map_err(StoreError::query)?;
                    if changed > 0 {
                        inserted += 1;
                        newest = newest.max(cached_at);
                        tracing::debug!(id = %record.id, cached_at, "Cached photo");
                    } else {
                        tracing::trace!(id = %record.id, "Photo already cached, skipping");
                    }
                }
            }
            tx.commit().map_err(StoreError::query)?;

            if inserted > 0 {
                writer.last_cached_at = newest;
                live.send_replace(Arc::new(load_all(&writer.conn)?));
            }
            Ok(inserted)
        })
        .await
    }

    fn query_all_live(&self) -> watch::Receiver<PhotoSnapshot> {
        self.shared.live.subscribe()
    }

    async fn clear_all(&self) -> Result<u64, StoreError> {
        self.with_writer(|writer, live| {
            let removed = writer
                .conn
                .execute("DELETE FROM photos", [])
                .map_err(StoreError::query)? as u64;
            live.send_replace(Arc::new(Vec::new()));
            tracing::debug!(removed, "Cleared photo cache");
            Ok(removed)
        })
        .await
    }

    async fn get_all(&self) -> Result<Vec<PhotoRecord>, StoreError> {
        self.with_writer(|writer, _| load_all(&writer.conn)).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.with_writer(|writer, _| {
            let count: i64 = writer
                .conn
                .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
                .map_err(StoreError::query)?;
            Ok(count as u64)
        })
        .await
    }

    async fn newest_cached_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let newest: Option<i64> = self
            .with_writer(|writer, _| {
                writer
                    .conn
                    .query_row("SELECT MAX(cached_at) FROM photos", [], |row| row.get(0))
                    .map_err(StoreError::query)
            })
            .await?;
        Ok(newest.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }
}

fn load_all(conn: &Connection) -> Result<Vec<PhotoRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(SELECT_ALL).map_err(StoreError::query)?;
    let records = stmt
        .query_map([], row_to_record)
        .map_err(StoreError::query)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::query)?;
    Ok(records)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PhotoRecord> {
    Ok(PhotoRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        owner: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        image_url: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        uploaded_at: row.get(8)?,
        cached_at: Some(row.get(9)?),
    })
}

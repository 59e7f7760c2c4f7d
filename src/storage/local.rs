//! Local SQLite storage implementation.
//!
//! Records live in a single `records` table keyed by a UNIQUE profile id,
//! so check-then-insert is atomic for every connection on the database, not
//! just for callers sharing one `LocalStore`. Status updates run inside an
//! immediate transaction. The database is opened in WAL mode with a busy
//! timeout, so separate handles and processes on the same directory queue
//! behind each other instead of overwriting each other's rows.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── records.db            # records table + indexes on id, status, requested
//! └── records.db-wal        # write-ahead log (while open)
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, ErrorCode, OptionalExtension, ToSql, TransactionBehavior, params};

use crate::error::{AppError, Result};
use crate::models::{ActionStatus, Profile, Record, StoreStats};
use crate::storage::{RecordStore, StoreId};

const RECORDS_FILE: &str = "records.db";

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    row_id              INTEGER PRIMARY KEY AUTOINCREMENT,
    id                  TEXT NOT NULL UNIQUE,
    display_name        TEXT NOT NULL DEFAULT '',
    badge_type          TEXT NOT NULL DEFAULT '',
    role_title          TEXT NOT NULL DEFAULT '',
    organization        TEXT NOT NULL DEFAULT '',
    bio_text            TEXT NOT NULL DEFAULT '',
    location_text       TEXT NOT NULL DEFAULT '',
    category_text       TEXT NOT NULL DEFAULT '',
    groups              TEXT NOT NULL DEFAULT '[]',
    source_url          TEXT NOT NULL,
    discovered_at       TEXT NOT NULL,
    last_updated_at     TEXT NOT NULL,
    action_requested    INTEGER NOT NULL DEFAULT 0,
    action_status       TEXT NOT NULL DEFAULT 'pending',
    action_completed_at TEXT,
    last_error_message  TEXT
);
CREATE INDEX IF NOT EXISTS idx_records_id ON records(id);
CREATE INDEX IF NOT EXISTS idx_records_status ON records(action_status);
CREATE INDEX IF NOT EXISTS idx_records_requested ON records(action_requested);
";

const RECORD_COLUMNS: &str = "id, display_name, badge_type, role_title, organization, \
     bio_text, location_text, category_text, groups, source_url, discovered_at, \
     last_updated_at, action_requested, action_status, action_completed_at, last_error_message";

impl ToSql for ActionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ActionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "pending" => Ok(ActionStatus::Pending),
            "sent" => Ok(ActionStatus::Sent),
            "failed" => Ok(ActionStatus::Failed),
            other => Err(FromSqlError::Other(
                format!("unknown action status '{other}'").into(),
            )),
        }
    }
}

/// Map a row selected with `RECORD_COLUMNS` back into a record.
fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let groups: String = row.get(8)?;
    let groups = serde_json::from_str(&groups)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

    Ok(Record {
        profile: Profile {
            id: row.get(0)?,
            display_name: row.get(1)?,
            badge_type: row.get(2)?,
            role_title: row.get(3)?,
            organization: row.get(4)?,
            bio_text: row.get(5)?,
            location_text: row.get(6)?,
            category_text: row.get(7)?,
            groups,
            source_url: row.get(9)?,
        },
        discovered_at: row.get(10)?,
        last_updated_at: row.get(11)?,
        action_requested: row.get(12)?,
        action_status: row.get(13)?,
        action_completed_at: row.get(14)?,
        last_error_message: row.get(15)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// SQLite backed record store.
pub struct LocalStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// Open (or create) the store under the given directory.
    pub async fn open(root_dir: impl AsRef<Path>) -> Result<Self> {
        let root_dir = root_dir.as_ref();
        tokio::fs::create_dir_all(root_dir).await?;
        let path = root_dir.join(RECORDS_FILE);

        let db_path = path.clone();
        let (conn, count) = tokio::task::spawn_blocking(move || -> Result<_> {
            let conn = Connection::open(&db_path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn.execute_batch(SCHEMA)?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok((conn, count))
        })
        .await
        .map_err(AppError::storage)??;

        log::debug!(
            "Opened record store at {} ({} records)",
            path.display(),
            count
        );

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a blocking database call off the async runtime.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| AppError::storage("record database lock poisoned"))?;
            f(&mut conn)
        })
        .await
        .map_err(AppError::storage)?
    }

    /// Apply `change` to a record inside a write transaction. Absent ids are
    /// ignored. Nothing is written when `change` reports no change.
    async fn update<F>(&self, id: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut Record) -> bool + Send + 'static,
    {
        let id = id.to_string();
        self.call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let found = tx
                .query_row(
                    &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
                    params![id],
                    record_from_row,
                )
                .optional()?;

            let Some(mut record) = found else {
                log::debug!("Ignoring status update for unknown record {}", id);
                return Ok(());
            };

            if change(&mut record) {
                tx.execute(
                    "UPDATE records SET action_requested = ?2, action_status = ?3, \
                     action_completed_at = ?4, last_error_message = ?5, last_updated_at = ?6 \
                     WHERE id = ?1",
                    params![
                        id,
                        record.action_requested,
                        record.action_status,
                        record.action_completed_at,
                        record.last_error_message,
                        record.last_updated_at,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Remove a record. Only used by tests.
    #[cfg(test)]
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.call(move |conn| Ok(conn.execute("DELETE FROM records WHERE id = ?1", params![id])? > 0))
            .await
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row("SELECT 1 FROM records WHERE id = ?1", params![id], |_| Ok(()))
                .optional()?
                .is_some())
        })
        .await
    }

    async fn insert(&self, profile: &Profile) -> Result<StoreId> {
        let record = Record::new(profile.clone(), Utc::now());
        let groups = serde_json::to_string(&record.profile.groups)?;

        self.call(move |conn| {
            let p = &record.profile;
            let inserted = conn.execute(
                &format!(
                    "INSERT INTO records ({RECORD_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
                ),
                params![
                    p.id,
                    p.display_name,
                    p.badge_type,
                    p.role_title,
                    p.organization,
                    p.bio_text,
                    p.location_text,
                    p.category_text,
                    groups,
                    p.source_url,
                    record.discovered_at,
                    record.last_updated_at,
                    record.action_requested,
                    record.action_status,
                    record.action_completed_at,
                    record.last_error_message,
                ],
            );

            match inserted {
                Ok(_) => Ok(conn.last_insert_rowid() as StoreId),
                Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateKey(p.id.clone())),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Record> {
        let id = id.to_string();
        self.call(move |conn| {
            let found = conn
                .query_row(
                    &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
                    params![id],
                    record_from_row,
                )
                .optional()?;
            found.ok_or(AppError::NotFound(id))
        })
        .await
    }

    async fn mark_sent(&self, id: &str) -> Result<()> {
        self.update(id, |record| {
            record.mark_sent(Utc::now());
            true
        })
        .await
    }

    async fn mark_failed(&self, id: &str, message: &str) -> Result<()> {
        let message = message.to_string();
        self.update(id, move |record| {
            let changed = record.mark_failed(&message, Utc::now());
            if !changed {
                log::warn!(
                    "Record {} already sent; keeping status despite failure: {}",
                    record.id(),
                    message
                );
            }
            changed
        })
        .await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.call(|conn| {
            let (total, sent, pending, failed): (i64, i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*), \
                        COALESCE(SUM(action_status = 'sent'), 0), \
                        COALESCE(SUM(action_requested = 0), 0), \
                        COALESCE(SUM(action_status = 'failed'), 0) \
                 FROM records",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
            Ok(StoreStats {
                total: total as usize,
                action_sent: sent as usize,
                pending: pending as usize,
                failed: failed as usize,
            })
        })
        .await
    }

    async fn pending(&self, limit: Option<usize>) -> Result<Vec<Record>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map_or(-1, |n| n as i64);
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM records WHERE action_requested = 0 \
                 ORDER BY discovered_at, row_id LIMIT ?1"
            ))?;
            let records = stmt
                .query_map(params![limit], record_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}

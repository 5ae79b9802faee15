//! SQLite-backed activity and backup storage
//!
//! This module is the only owner of the database file:
//! - activities: fetched metadata plus the download/import markers
//! - backups: when and where the database file was copied
//!
//! Every operation opens its own connection and commits before returning,
//! so a crash never loses more than the operation in flight.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Params};

use super::schema;
use crate::config::ensure_dir;
use crate::error::{GarmdownError, Result};
use crate::models::activity::DATE_FORMAT;
use crate::models::{Activity, ActivityFactory, Backup};

/// Format of every timestamp column
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SELECT_ACTIVITY: &str =
    "SELECT raw_json, type_code, downloaded_at, imported_at FROM activities";

/// Activity counts for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreSummary {
    pub activities: u32,
    pub not_downloaded: u32,
    pub not_imported: u32,
}

/// Columns of an activity row before it is thawed
struct StoredActivity {
    raw_json: String,
    type_code: String,
    downloaded_at: Option<String>,
    imported_at: Option<String>,
}

/// Activity database
pub struct ActivityStore {
    db_file: PathBuf,
    factory: ActivityFactory,
    /// Default cap for [`ActivityStore::get_missing_downloaded`]
    download_chunk_size: u32,
}

impl ActivityStore {
    pub fn new(db_file: impl Into<PathBuf>, factory: ActivityFactory, download_chunk_size: u32) -> Self {
        Self {
            db_file: db_file.into(),
            factory,
            download_chunk_size,
        }
    }

    pub fn db_file(&self) -> &Path {
        &self.db_file
    }

    /// Factory used to thaw stored activities
    pub fn factory(&self) -> &ActivityFactory {
        &self.factory
    }

    /// Create and migrate the database file if it does not exist yet
    pub fn ensure_initialized(&self) -> Result<()> {
        self.connect().map(drop)
    }

    /// Open a connection, creating and initializing the database file if it
    /// does not exist yet
    fn connect(&self) -> Result<Connection> {
        let created = !self.db_file.exists();
        if created {
            if let Some(parent) = self.db_file.parent().filter(|p| !p.as_os_str().is_empty()) {
                ensure_dir(parent)?;
            }
            tracing::info!(path = %self.db_file.display(), "creating sqlite db file");
        }

        let conn = Connection::open(&self.db_file)
            .map_err(|e| GarmdownError::database("Failed to open activity database", e))?;

        if created {
            tracing::info!("initializing database");
            if let Err(e) = schema::migrate(&conn) {
                drop(conn);
                // an uninitialized file would never be initialized again
                let _ = fs::remove_file(&self.db_file);
                return Err(e);
            }
        }
        Ok(conn)
    }

    // =========================================================================
    // Activities
    // =========================================================================

    /// Insert activities not already in the database.
    ///
    /// Existing identifiers are skipped, so re-delivered activities are
    /// harmless. The batch commits as a whole. Returns the number inserted.
    pub fn insert_activities(&self, activities: &[Activity]) -> Result<usize> {
        tracing::info!(count = activities.len(), "persisting activities");
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .map_err(|e| GarmdownError::database("Failed to begin transaction", e))?;

        let mut inserted = 0;
        for act in activities {
            if activity_exists(&tx, &act.id)? {
                tracing::debug!(activity = %act, "already found in database, skipping");
                continue;
            }
            let raw = serde_json::to_string(&act.raw)?;
            tx.execute(
                "INSERT INTO activities (activity_id, start_time, type_code, raw_json)
                 VALUES (?, ?, ?, ?)",
                params![
                    act.id,
                    act.start_time.format(TIMESTAMP_FORMAT).to_string(),
                    act.type_code.to_string(),
                    raw,
                ],
            )
            .map_err(|e| GarmdownError::database("Failed to insert activity", e))?;
            tracing::info!(activity = %act, "adding activity to db");
            inserted += 1;
        }

        tx.commit()
            .map_err(|e| GarmdownError::database("Failed to commit activities", e))?;
        tracing::info!(
            inserted,
            skipped = activities.len() - inserted,
            "activities persisted"
        );
        Ok(inserted)
    }

    /// Look up one activity by identifier
    pub fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>> {
        let sql = format!("{} WHERE activity_id = ?", SELECT_ACTIVITY);
        Ok(self.query_activities(&sql, params![activity_id])?.pop())
    }

    /// Activities without a download marker, oldest first, at most `limit`
    /// (default: the TCX chunk size)
    pub fn get_missing_downloaded(&self, limit: Option<u32>) -> Result<Vec<Activity>> {
        let limit = limit.unwrap_or(self.download_chunk_size);
        let sql = format!(
            "{} WHERE downloaded_at IS NULL ORDER BY start_time, activity_id LIMIT ?",
            SELECT_ACTIVITY
        );
        self.query_activities(&sql, params![limit])
    }

    /// Set the download marker; returns the number of rows updated
    pub fn mark_downloaded(&self, activity: &Activity) -> Result<usize> {
        self.mark_state("downloaded_at", "downloaded", activity)
    }

    /// Downloaded activities without an import marker, oldest first
    /// (default: unbounded)
    pub fn get_missing_imported(&self, limit: Option<u32>) -> Result<Vec<Activity>> {
        // SQLite treats a negative LIMIT as no limit
        let limit = limit.map(i64::from).unwrap_or(-1);
        let sql = format!(
            "{} WHERE imported_at IS NULL AND downloaded_at IS NOT NULL
             ORDER BY start_time, activity_id LIMIT ?",
            SELECT_ACTIVITY
        );
        self.query_activities(&sql, params![limit])
    }

    /// Set the import marker; returns the number of rows updated
    pub fn mark_imported(&self, activity: &Activity) -> Result<usize> {
        self.mark_state("imported_at", "imported", activity)
    }

    /// Activities starting on the given calendar day
    pub fn get_activities_by_date(&self, date: NaiveDate) -> Result<Vec<Activity>> {
        let sql = format!(
            "{} WHERE date(start_time) = ? ORDER BY start_time, activity_id",
            SELECT_ACTIVITY
        );
        self.query_activities(&sql, params![date.format(DATE_FORMAT).to_string()])
    }

    /// Activities starting on or after the given calendar day
    pub fn get_activities_on_after_date(&self, date: NaiveDate) -> Result<Vec<Activity>> {
        let sql = format!(
            "{} WHERE date(start_time) >= ? ORDER BY start_time, activity_id",
            SELECT_ACTIVITY
        );
        self.query_activities(&sql, params![date.format(DATE_FORMAT).to_string()])
    }

    /// Count activities and outstanding work
    pub fn count_summary(&self) -> Result<StoreSummary> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT COUNT(*),
                    COUNT(*) - COUNT(downloaded_at),
                    SUM(CASE WHEN downloaded_at IS NOT NULL AND imported_at IS NULL
                             THEN 1 ELSE 0 END)
             FROM activities",
            [],
            |row| {
                Ok(StoreSummary {
                    activities: row.get(0)?,
                    not_downloaded: row.get(1)?,
                    not_imported: row.get::<_, Option<u32>>(2)?.unwrap_or(0),
                })
            },
        )
        .map_err(|e| GarmdownError::database("Failed to count activities", e))
    }

    fn mark_state(&self, column: &str, action: &str, activity: &Activity) -> Result<usize> {
        let now = Local::now().naive_local();
        tracing::info!(activity_id = %activity.id, %now, "mark activity {}", action);

        let conn = self.connect()?;
        let sql = format!("UPDATE activities SET {} = ? WHERE activity_id = ?", column);
        let updated = conn
            .execute(
                &sql,
                params![now.format(TIMESTAMP_FORMAT).to_string(), activity.id],
            )
            .map_err(|e| GarmdownError::database(&format!("Failed to mark {}", action), e))?;
        tracing::debug!(updated, "updated row(s)");
        Ok(updated)
    }

    fn query_activities<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Activity>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| GarmdownError::database("Failed to prepare query", e))?;

        let rows = stmt
            .query_map(params, |row| {
                Ok(StoredActivity {
                    raw_json: row.get(0)?,
                    type_code: row.get(1)?,
                    downloaded_at: row.get(2)?,
                    imported_at: row.get(3)?,
                })
            })
            .map_err(|e| GarmdownError::database("Failed to query activities", e))?;

        let mut activities = Vec::new();
        for row in rows {
            let row = row.map_err(|e| GarmdownError::database("Failed to read activity", e))?;
            activities.push(self.thaw(row)?);
        }
        Ok(activities)
    }

    fn thaw(&self, row: StoredActivity) -> Result<Activity> {
        let raw = serde_json::from_str(&row.raw_json)?;
        let mut chars = row.type_code.chars();
        let code = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(GarmdownError::UnknownActivityType(row.type_code)),
        };
        let mut activity = self.factory.thaw(raw, code)?;
        activity.downloaded_at = row.downloaded_at.as_deref().and_then(parse_timestamp);
        activity.imported_at = row.imported_at.as_deref().and_then(parse_timestamp);
        Ok(activity)
    }

    // =========================================================================
    // Backups
    // =========================================================================

    /// Record a backup of the database file
    pub fn insert_backup(&self, backup: &Backup) -> Result<()> {
        let path = std::path::absolute(&backup.path)?;
        tracing::info!(backup = %backup, "inserting backup to db");

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO backups (time, path) VALUES (?, ?)",
            params![
                backup.time.format(TIMESTAMP_FORMAT).to_string(),
                path.display().to_string()
            ],
        )
        .map_err(|e| GarmdownError::database("Failed to insert backup", e))?;
        Ok(())
    }

    /// The most recent backup, if any
    pub fn get_last_backup(&self) -> Result<Option<Backup>> {
        let conn = self.connect()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT time, path FROM backups ORDER BY time DESC, id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| GarmdownError::database("Failed to get last backup", e))?;

        row.map(|(time, path)| {
            let time = parse_timestamp(&time).ok_or_else(|| {
                GarmdownError::Database(format!("Invalid backup time '{}'", time))
            })?;
            Ok(Backup::at(PathBuf::from(path), time))
        })
        .transpose()
    }
}

fn activity_exists(conn: &Connection, activity_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM activities WHERE activity_id = ?",
        params![activity_id],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|e| GarmdownError::database("Failed to look up activity", e))
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> ActivityStore {
        let factory = Config::default().activity_factory().unwrap();
        ActivityStore::new(temp.path().join("db").join("activities.sqlite3"), factory, 10)
    }

    fn activity(store: &ActivityStore, id: &str, start: &str) -> Activity {
        let raw = json!({
            "activityId": id,
            "startTimeLocal": start,
            "activityType": { "typeKey": "running" },
            "duration": 1800.0,
            "movingDuration": 1800.0
        });
        store.factory.create(raw).unwrap()
    }

    #[test]
    fn test_first_use_creates_file() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(!store.db_file().exists());

        assert!(store.get_last_backup().unwrap().is_none());
        assert!(store.db_file().exists());
    }

    #[test]
    fn test_ensure_initialized_creates_schema() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store.ensure_initialized().unwrap();
        let conn = Connection::open(store.db_file()).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('activities', 'backups')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);

        // a second call leaves the file alone
        store.ensure_initialized().unwrap();
        assert_eq!(store.count_summary().unwrap().activities, 0);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let a1 = activity(&store, "A1", "2024-03-01 07:00:00");

        assert_eq!(store.insert_activities(&[a1.clone()]).unwrap(), 1);
        assert_eq!(store.insert_activities(&[a1.clone()]).unwrap(), 0);
        // duplicates inside one batch are also collapsed
        assert_eq!(store.insert_activities(&[a1.clone(), a1]).unwrap(), 0);

        assert_eq!(store.count_summary().unwrap().activities, 1);
    }

    #[test]
    fn test_thaw_round_trips_payload() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let a1 = activity(&store, "A1", "2024-03-01 07:00:00");
        store.insert_activities(&[a1.clone()]).unwrap();

        let loaded = store.get_activity("A1").unwrap().unwrap();
        assert_eq!(loaded.raw, a1.raw);
        assert_eq!(loaded.type_code, 'r');
        assert_eq!(loaded.downloaded_at, None);
    }

    #[test]
    fn test_missing_downloaded_respects_limit_and_order() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let acts = vec![
            activity(&store, "A3", "2024-03-03 07:00:00"),
            activity(&store, "A1", "2024-03-01 07:00:00"),
            activity(&store, "A2", "2024-03-02 07:00:00"),
        ];
        store.insert_activities(&acts).unwrap();

        let missing = store.get_missing_downloaded(Some(2)).unwrap();
        let ids: Vec<_> = missing.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2"]);

        assert_eq!(store.get_missing_downloaded(None).unwrap().len(), 3);
    }

    #[test]
    fn test_mark_downloaded_is_monotonic() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let a1 = activity(&store, "A1", "2024-03-01 07:00:00");
        store.insert_activities(&[a1.clone()]).unwrap();

        assert_eq!(store.mark_downloaded(&a1).unwrap(), 1);
        assert_eq!(store.mark_downloaded(&a1).unwrap(), 1);
        assert!(store.get_missing_downloaded(None).unwrap().is_empty());
        assert_eq!(store.count_summary().unwrap().activities, 1);

        let loaded = store.get_activity("A1").unwrap().unwrap();
        assert!(loaded.downloaded_at.is_some());
    }

    #[test]
    fn test_mark_unknown_activity_updates_nothing() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let ghost = activity(&store, "GHOST", "2024-03-01 07:00:00");
        assert_eq!(store.mark_imported(&ghost).unwrap(), 0);
    }

    #[test]
    fn test_missing_imported_requires_download() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let a1 = activity(&store, "A1", "2024-03-01 07:00:00");
        let a2 = activity(&store, "A2", "2024-03-02 07:00:00");
        store.insert_activities(&[a1.clone(), a2]).unwrap();

        assert!(store.get_missing_imported(None).unwrap().is_empty());

        store.mark_downloaded(&a1).unwrap();
        let missing = store.get_missing_imported(None).unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, "A1");

        store.mark_imported(&a1).unwrap();
        assert!(store.get_missing_imported(None).unwrap().is_empty());

        let summary = store.count_summary().unwrap();
        assert_eq!(summary.not_downloaded, 1);
        assert_eq!(summary.not_imported, 0);
    }

    #[test]
    fn test_activities_by_date() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store
            .insert_activities(&[
                activity(&store, "A1", "2024-03-01 07:00:00"),
                activity(&store, "A2", "2024-03-01 18:30:00"),
                activity(&store, "A3", "2024-03-02 00:00:01"),
            ])
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(store.get_activities_by_date(day).unwrap().len(), 2);
        assert_eq!(store.get_activities_on_after_date(day).unwrap().len(), 3);

        let next = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let on_after = store.get_activities_on_after_date(next).unwrap();
        assert_eq!(on_after.len(), 1);
        assert_eq!(on_after[0].id, "A3");
    }

    #[test]
    fn test_last_backup() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(store.get_last_backup().unwrap().is_none());

        let now = Local::now().naive_local();
        let older = Backup::at(temp.path().join("old"), now - Duration::days(10));
        let newer = Backup::at(temp.path().join("new"), now - Duration::days(1));
        store.insert_backup(&newer).unwrap();
        store.insert_backup(&older).unwrap();

        let last = store.get_last_backup().unwrap().unwrap();
        assert_eq!(last.path, temp.path().join("new"));
    }

    #[test]
    fn test_existing_file_is_not_reinitialized() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store
            .insert_activities(&[activity(&store, "A1", "2024-03-01 07:00:00")])
            .unwrap();

        let reopened = ActivityStore::new(
            store.db_file().to_path_buf(),
            Config::default().activity_factory().unwrap(),
            10,
        );
        assert_eq!(reopened.count_summary().unwrap().activities, 1);
    }
}

//! Periodic copies of the activity database

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::config::{ensure_dir, BackupConfig};
use crate::error::Result;
use crate::models::backup::timestr;
use crate::models::Backup;
use crate::storage::ActivityStore;

/// Copies the database file when the last backup is old enough
pub struct BackupScheduler<'a> {
    store: &'a ActivityStore,
    db_backup_dir: PathBuf,
    /// Days between backups
    days: u32,
}

impl<'a> BackupScheduler<'a> {
    pub fn new(store: &'a ActivityStore, config: &BackupConfig) -> Self {
        Self {
            store,
            db_backup_dir: config.db_backup_dir.clone(),
            days: config.days,
        }
    }

    /// Back up if forced, if there is no recorded backup, or if the last one
    /// is at least `days` whole days old. Returns the backup taken, if any.
    pub fn backup(&self, force: bool) -> Result<Option<Backup>> {
        let now = Local::now().naive_local();
        if !force && !self.is_due(now)? {
            tracing::debug!("backup not due");
            return Ok(None);
        }
        self.execute(now).map(Some)
    }

    fn is_due(&self, now: NaiveDateTime) -> Result<bool> {
        let Some(last) = self.store.get_last_backup()? else {
            tracing::info!("no recorded backup");
            return Ok(true);
        };
        tracing::debug!(last = %last, "last backup");

        let days_since = (now - last.time).num_days();
        tracing::info!(days_since, every = self.days, "days since last backup");
        Ok(days_since >= i64::from(self.days))
    }

    /// Copy the database file, then record the copy. A crash in between
    /// leaves an unrecorded file, and the next run backs up again.
    fn execute(&self, now: NaiveDateTime) -> Result<Backup> {
        // a forced backup may be the first thing to touch the database
        self.store.ensure_initialized()?;
        ensure_dir(&self.db_backup_dir)?;
        let src = self.store.db_file();
        let dst = unused_backup_path(&self.db_backup_dir, src, now);

        tracing::info!(from = %src.display(), to = %dst.display(), "backing up database");
        fs::copy(src, &dst)?;

        let backup = Backup::at(dst, now);
        self.store.insert_backup(&backup)?;
        Ok(backup)
    }
}

/// `<backup dir>/<db file name>-<yyyy-mm-dd_HH-MM>`
fn backup_path(dir: &Path, db_file: &Path, time: NaiveDateTime) -> PathBuf {
    let name = db_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "activities.sqlite3".to_string());
    dir.join(format!("{}-{}", name, timestr(time)))
}

/// [`backup_path`], with a `-<n>` suffix when an earlier backup in the same
/// minute already took the name
fn unused_backup_path(dir: &Path, db_file: &Path, time: NaiveDateTime) -> PathBuf {
    let base = backup_path(dir, db_file, time);
    if !base.exists() {
        return base;
    }
    (1u32..)
        .map(|n| {
            let mut name = base.as_os_str().to_os_string();
            name.push(format!("-{}", n));
            PathBuf::from(name)
        })
        .find(|path| !path.exists())
        .unwrap_or(base)
}

//! Sync module for Garmin activity synchronization
//!
//! Provides the three resumable phases of a sync run:
//! - Metadata: list remote activities and persist the new ones
//! - Track files: download the TCX file of every activity not yet downloaded
//! - Import: copy downloaded files to the import directory
//!
//! Each phase only sets an activity's marker after its side effect fully
//! succeeded, so any phase may be re-run after a crash. A file that exists
//! while its marker is unset is treated as already done.

pub mod fetcher;

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::client::ActivitySource;
use crate::config::{ensure_dir, DownloadConfig};
use crate::error::{GarmdownError, Result};
use crate::models::Activity;
use crate::storage::ActivityStore;

pub use fetcher::{ActivityFetcher, FetchedActivities};

/// Whether a phase's side effect was performed or found already done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Done,
    Recovered,
    /// Marker and file were both already in place
    Unchanged,
}

/// Sync engine for orchestrating the download phases
pub struct SyncEngine<'a> {
    store: &'a ActivityStore,
    source: Option<&'a dyn ActivitySource>,
    download: &'a DownloadConfig,
}

impl<'a> SyncEngine<'a> {
    /// Create an engine for the local phases only; remote phases fail until
    /// a source is attached with [`SyncEngine::with_source`]
    pub fn new(store: &'a ActivityStore, download: &'a DownloadConfig) -> Self {
        Self {
            store,
            source: None,
            download,
        }
    }

    pub fn with_source(mut self, source: &'a dyn ActivitySource) -> Self {
        self.source = Some(source);
        self
    }

    fn source(&self) -> Result<&'a dyn ActivitySource> {
        self.source
            .ok_or_else(|| GarmdownError::NotAuthenticated("connect".to_string()))
    }

    fn track_path(&self, activity: &Activity) -> PathBuf {
        self.download.activities_dir.join(activity.tcx_filename())
    }

    fn import_path(&self, activity: &Activity) -> PathBuf {
        self.download.import_dir.join(activity.tcx_filename())
    }

    // =========================================================================
    // Phase 1: activity metadata
    // =========================================================================

    /// Fetch up to `limit` activities starting at the 0-based `start` index
    /// and persist the ones not already stored. TCX files are not downloaded.
    pub fn sync_activities(&self, limit: Option<u32>, start: u32) -> Result<SyncStats> {
        let fetcher = ActivityFetcher::new(
            self.source()?,
            self.store.factory(),
            self.download.activity_chunk_size,
            self.download.activity_num,
        );
        let fetched = fetcher.fetch(limit, start)?;
        let inserted = self.store.insert_activities(&fetched.activities)?;

        Ok(SyncStats {
            fetched: count(fetched.activities.len()),
            inserted: count(inserted),
            unknown_types: count(fetched.unknown_types.len()),
            ..SyncStats::default()
        })
    }

    // =========================================================================
    // Phase 2: track files
    // =========================================================================

    /// Download TCX files of activities missing a download marker, at most
    /// `limit` (default: the TCX chunk size), marking each one as it lands
    pub fn sync_tcx(&self, limit: Option<u32>) -> Result<SyncStats> {
        let activities = self.store.get_missing_downloaded(limit)?;
        tracing::info!(count = activities.len(), "downloading tcx files");
        if activities.is_empty() {
            return Ok(SyncStats::default());
        }
        ensure_dir(&self.download.activities_dir)?;

        let mut stats = SyncStats::default();
        for activity in &activities {
            match self.write_activity(activity)? {
                Outcome::Done => stats.downloaded += 1,
                Outcome::Recovered => stats.recovered_downloads += 1,
                Outcome::Unchanged => {}
            }
            self.store.mark_downloaded(activity)?;
        }
        Ok(stats)
    }

    /// Stream one TCX file to disk. The bytes land in a `.part` file that is
    /// only renamed into place once its size has been checked.
    fn write_activity(&self, activity: &Activity) -> Result<Outcome> {
        let path = self.track_path(activity);
        if path.exists() {
            tracing::warn!(
                activity_id = %activity.id,
                "activity is downloaded but not marked, marking now"
            );
            return Ok(Outcome::Recovered);
        }

        tracing::debug!(path = %path.display(), "downloading");
        let part = part_path(&path);
        let mut reader = self.source()?.stream_track_file(&activity.id)?;
        let written = File::create(&part).and_then(|mut file| {
            let size = io::copy(&mut reader, &mut file)?;
            file.sync_all()?;
            Ok(size)
        });
        let size = match written {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&part);
                return Err(e.into());
            }
        };

        tracing::debug!(path = %path.display(), size, "downloaded");
        let min = self.download.download_min_size;
        if size < min {
            let _ = fs::remove_file(&part);
            return Err(GarmdownError::UndersizedDownload { path, size, min });
        }
        fs::rename(&part, &path)?;
        Ok(Outcome::Done)
    }

    // =========================================================================
    // Phase 3: import
    // =========================================================================

    /// Copy downloaded TCX files not yet imported to the import directory
    /// (default: all of them)
    pub fn import_tcx(&self, limit: Option<u32>) -> Result<SyncStats> {
        let activities = self.store.get_missing_imported(limit)?;
        self.import_activities(&activities)
    }

    /// Import every downloaded activity starting on or after `date`, whether
    /// or not it was imported before
    pub fn import_tcx_from_date(&self, date: NaiveDate) -> Result<SyncStats> {
        tracing::info!(%date, "importing files on or after date");
        let activities: Vec<Activity> = self
            .store
            .get_activities_on_after_date(date)?
            .into_iter()
            .filter(|activity| {
                let downloaded = activity.downloaded_at.is_some();
                if !downloaded {
                    tracing::debug!(activity = %activity, "not downloaded, skipping");
                }
                downloaded
            })
            .collect();
        self.import_activities(&activities)
    }

    fn import_activities(&self, activities: &[Activity]) -> Result<SyncStats> {
        let import_dir = &self.download.import_dir;
        if !import_dir.exists() {
            tracing::info!(path = %import_dir.display(), "creating import directory");
            ensure_dir(import_dir)?;
        }
        tracing::info!(count = activities.len(), "importing activities");

        let mut stats = SyncStats::default();
        for activity in activities {
            match self.import_activity(activity)? {
                Outcome::Done => stats.imported += 1,
                Outcome::Recovered => stats.recovered_imports += 1,
                Outcome::Unchanged => {}
            }
            self.store.mark_imported(activity)?;
        }
        Ok(stats)
    }

    fn import_activity(&self, activity: &Activity) -> Result<Outcome> {
        let import_path = self.import_path(activity);
        if import_path.exists() {
            if activity.imported_at.is_some() {
                tracing::debug!(activity_id = %activity.id, "import copy already present");
                return Ok(Outcome::Unchanged);
            }
            tracing::warn!(
                activity_id = %activity.id,
                "activity is imported but not marked, marking now"
            );
            return Ok(Outcome::Recovered);
        }

        let track_path = self.track_path(activity);
        if !track_path.exists() {
            return Err(GarmdownError::MissingTrackFile(track_path));
        }
        tracing::info!(
            from = %track_path.display(),
            to = %import_path.display(),
            "copying"
        );
        fs::copy(&track_path, &import_path)?;
        Ok(Outcome::Done)
    }

    // =========================================================================
    // Housekeeping and reports
    // =========================================================================

    /// Run all three phases in order: metadata, track files, import
    pub fn sync(&self, limit: Option<u32>) -> Result<SyncStats> {
        let mut stats = self.sync_activities(limit, 0)?;
        stats += self.sync_tcx(limit)?;
        stats += self.import_tcx(None)?;
        Ok(stats)
    }

    /// Delete every file in the import directory so the importer does not
    /// pick them up again. Returns the number removed.
    pub fn clean_imported(&self) -> Result<u32> {
        let import_dir = &self.download.import_dir;
        tracing::info!(path = %import_dir.display(), "removing import files");
        if !import_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(import_dir)? {
            let path = entry?.path();
            if path.is_file() {
                tracing::info!(path = %path.display(), "removing");
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Describe activities not yet downloaded
    pub fn write_not_downloaded(
        &self,
        writer: &mut dyn Write,
        detail: bool,
        limit: Option<u32>,
    ) -> Result<()> {
        for activity in self.store.get_missing_downloaded(limit)? {
            activity.write(writer, detail)?;
        }
        Ok(())
    }

    /// Describe downloaded activities not yet imported
    pub fn write_not_imported(
        &self,
        writer: &mut dyn Write,
        detail: bool,
        limit: Option<u32>,
    ) -> Result<()> {
        for activity in self.store.get_missing_imported(limit)? {
            activity.write(writer, detail)?;
        }
        Ok(())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Statistics from a sync run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// Activities listed from the remote service
    pub fetched: u32,
    /// Listed activities that were new to the database
    pub inserted: u32,
    /// Listed records skipped for an unconfigured type
    pub unknown_types: u32,
    /// TCX files downloaded
    pub downloaded: u32,
    /// TCX files found on disk without a marker
    pub recovered_downloads: u32,
    /// Files copied to the import directory
    pub imported: u32,
    /// Import copies found without a marker
    pub recovered_imports: u32,
}

impl AddAssign for SyncStats {
    fn add_assign(&mut self, other: Self) {
        self.fetched += other.fetched;
        self.inserted += other.inserted;
        self.unknown_types += other.unknown_types;
        self.downloaded += other.downloaded;
        self.recovered_downloads += other.recovered_downloads;
        self.imported += other.imported;
        self.recovered_imports += other.recovered_imports;
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fetched: {} ({} new), Downloaded: {}, Imported: {}",
            self.fetched, self.inserted, self.downloaded, self.imported
        )?;
        let recovered = self.recovered_downloads + self.recovered_imports;
        if recovered > 0 {
            write!(f, ", Recovered: {}", recovered)?;
        }
        if self.unknown_types > 0 {
            write!(f, ", Unknown type: {}", self.unknown_types)?;
        }
        Ok(())
    }
}

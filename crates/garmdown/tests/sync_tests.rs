//! Integration tests for the download phases
//!
//! A fake activity source stands in for Garmin Connect and records every
//! track file it is asked for.

use std::cell::RefCell;
use std::fs;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use chrono::NaiveDate;
use garmdown::client::ActivitySource;
use garmdown::config::{Config, DownloadConfig};
use garmdown::storage::ActivityStore;
use garmdown::sync::SyncEngine;
use garmdown::{GarmdownError, Result};
use serde_json::{json, Value};
use tempfile::TempDir;

struct FakeSource {
    records: Vec<Value>,
    track: Vec<u8>,
    downloads: RefCell<Vec<String>>,
}

impl FakeSource {
    fn new(records: Vec<Value>, track_size: usize) -> Self {
        Self {
            records,
            track: vec![b'x'; track_size],
            downloads: RefCell::new(Vec::new()),
        }
    }

    fn download_count(&self) -> usize {
        self.downloads.borrow().len()
    }
}

impl ActivitySource for FakeSource {
    fn list_activities(&self, offset: u32, count: u32) -> Result<Vec<Value>> {
        Ok(self
            .records
            .iter()
            .skip(offset as usize)
            .take(count as usize)
            .cloned()
            .collect())
    }

    fn stream_track_file(&self, activity_id: &str) -> Result<Box<dyn Read + '_>> {
        self.downloads.borrow_mut().push(activity_id.to_string());
        Ok(Box::new(Cursor::new(self.track.clone())))
    }
}

fn record(id: &str, start: &str, type_key: &str) -> Value {
    json!({
        "activityId": id,
        "startTimeLocal": start,
        "activityType": { "typeKey": type_key },
        "duration": 1800.0,
        "movingDuration": 1800.0
    })
}

struct Fixture {
    _temp: TempDir,
    store: ActivityStore,
    download: DownloadConfig,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config = Config::default();
        let download = DownloadConfig {
            activities_dir: temp.path().join("tcx"),
            import_dir: temp.path().join("import"),
            activity_chunk_size: 5,
            activity_num: 50,
            download_min_size: 100,
            ..config.download.clone()
        };
        let store = ActivityStore::new(
            temp.path().join("activities.sqlite3"),
            config.activity_factory().unwrap(),
            config.download.tcx_chunk_size,
        );
        Self {
            _temp: temp,
            store,
            download,
        }
    }

    fn engine<'a>(&'a self, source: &'a FakeSource) -> SyncEngine<'a> {
        SyncEngine::new(&self.store, &self.download).with_source(source)
    }

    fn track_path(&self, name: &str) -> PathBuf {
        self.download.activities_dir.join(name)
    }

    fn import_path(&self, name: &str) -> PathBuf {
        self.download.import_dir.join(name)
    }

    fn insert(&self, records: &[Value]) {
        let activities: Vec<_> = records
            .iter()
            .map(|r| self.store.factory().create(r.clone()).unwrap())
            .collect();
        self.store.insert_activities(&activities).unwrap();
    }
}

#[test]
fn test_download_and_import_scenario() {
    let fx = Fixture::new();
    let source = FakeSource::new(vec![record("A1", "2024-03-01 07:00:00", "running")], 500);
    let engine = fx.engine(&source);

    let stats = engine.sync_activities(None, 0).unwrap();
    assert_eq!(stats.inserted, 1);
    let stored = fx.store.get_activity("A1").unwrap().unwrap();
    assert_eq!(stored.type_code, 'r');
    assert_eq!(stored.downloaded_at, None);
    assert_eq!(stored.imported_at, None);

    let stats = engine.sync_tcx(None).unwrap();
    assert_eq!(stats.downloaded, 1);
    assert!(fx.store.get_missing_downloaded(None).unwrap().is_empty());
    let track = fx.track_path("2024-03-01_A1.tcx");
    assert_eq!(fs::metadata(&track).unwrap().len(), 500);

    let stats = engine.import_tcx(None).unwrap();
    assert_eq!(stats.imported, 1);
    assert!(fx.store.get_missing_imported(None).unwrap().is_empty());
    assert_eq!(
        fs::read(fx.import_path("2024-03-01_A1.tcx")).unwrap(),
        fs::read(&track).unwrap()
    );
}

#[test]
fn test_refetch_is_idempotent() {
    let fx = Fixture::new();
    let source = FakeSource::new(
        vec![
            record("A1", "2024-03-01 07:00:00", "running"),
            record("A2", "2024-03-02 07:00:00", "cycling"),
        ],
        500,
    );
    let engine = fx.engine(&source);

    let first = engine.sync(None).unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(first.downloaded, 2);
    assert_eq!(first.imported, 2);

    let second = engine.sync(None).unwrap();
    assert_eq!(second.fetched, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.imported, 0);
    assert_eq!(source.download_count(), 2);
    assert_eq!(fx.store.count_summary().unwrap().activities, 2);
}

#[test]
fn test_existing_track_file_is_marked_without_download() {
    let fx = Fixture::new();
    fx.insert(&[record("A1", "2024-03-01 07:00:00", "running")]);
    fs::create_dir_all(&fx.download.activities_dir).unwrap();
    fs::write(fx.track_path("2024-03-01_A1.tcx"), vec![b'y'; 300]).unwrap();

    let source = FakeSource::new(Vec::new(), 500);
    let stats = fx.engine(&source).sync_tcx(None).unwrap();

    assert_eq!(source.download_count(), 0);
    assert_eq!(stats.recovered_downloads, 1);
    assert_eq!(stats.downloaded, 0);
    assert!(fx.store.get_missing_downloaded(None).unwrap().is_empty());
}

#[test]
fn test_undersized_download_is_rejected() {
    let fx = Fixture::new();
    fx.insert(&[record("A1", "2024-03-01 07:00:00", "running")]);

    let source = FakeSource::new(Vec::new(), 50);
    let err = fx.engine(&source).sync_tcx(None).unwrap_err();
    match err {
        GarmdownError::UndersizedDownload { size, min, .. } => {
            assert_eq!(size, 50);
            assert_eq!(min, 100);
        }
        other => panic!("expected undersized download, got {:?}", other),
    }

    // nothing left behind that a later run would mistake for a finished file
    assert_eq!(fs::read_dir(&fx.download.activities_dir).unwrap().count(), 0);
    assert_eq!(fx.store.get_missing_downloaded(None).unwrap().len(), 1);

    // the next run downloads again
    let source = FakeSource::new(Vec::new(), 500);
    let stats = fx.engine(&source).sync_tcx(None).unwrap();
    assert_eq!(stats.downloaded, 1);
}

#[test]
fn test_tcx_limit_caps_downloads() {
    let fx = Fixture::new();
    fx.insert(&[
        record("A1", "2024-03-01 07:00:00", "running"),
        record("A2", "2024-03-02 07:00:00", "running"),
        record("A3", "2024-03-03 07:00:00", "running"),
    ]);

    let source = FakeSource::new(Vec::new(), 500);
    fx.engine(&source).sync_tcx(Some(2)).unwrap();
    assert_eq!(*source.downloads.borrow(), vec!["A1".to_string(), "A2".to_string()]);

    let missing = fx.store.get_missing_downloaded(None).unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].id, "A3");
}

#[test]
fn test_unknown_activity_type_is_skipped() {
    let fx = Fixture::new();
    let source = FakeSource::new(
        vec![
            record("A1", "2024-03-01 07:00:00", "running"),
            record("A2", "2024-03-02 07:00:00", "paragliding"),
        ],
        500,
    );

    let stats = fx.engine(&source).sync_activities(Some(10), 0).unwrap();
    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.unknown_types, 1);
    assert!(fx.store.get_activity("A2").unwrap().is_none());
}

#[test]
fn test_existing_import_copy_is_marked_without_copy() {
    let fx = Fixture::new();
    fx.insert(&[record("A1", "2024-03-01 07:00:00", "running")]);
    let activity = fx.store.get_activity("A1").unwrap().unwrap();
    fx.store.mark_downloaded(&activity).unwrap();
    fs::create_dir_all(&fx.download.import_dir).unwrap();
    fs::write(fx.import_path("2024-03-01_A1.tcx"), b"already here").unwrap();

    let engine = SyncEngine::new(&fx.store, &fx.download);
    let stats = engine.import_tcx(None).unwrap();
    assert_eq!(stats.recovered_imports, 1);
    assert_eq!(
        fs::read(fx.import_path("2024-03-01_A1.tcx")).unwrap(),
        b"already here"
    );
    assert!(fx.store.get_missing_imported(None).unwrap().is_empty());
}

#[test]
fn test_import_requires_track_file() {
    let fx = Fixture::new();
    fx.insert(&[record("A1", "2024-03-01 07:00:00", "running")]);
    let activity = fx.store.get_activity("A1").unwrap().unwrap();
    fx.store.mark_downloaded(&activity).unwrap();

    let engine = SyncEngine::new(&fx.store, &fx.download);
    let err = engine.import_tcx(None).unwrap_err();
    assert!(matches!(err, GarmdownError::MissingTrackFile(_)));
    assert_eq!(fx.store.get_missing_imported(None).unwrap().len(), 1);
}

#[test]
fn test_import_from_date() {
    let fx = Fixture::new();
    let source = FakeSource::new(
        vec![
            record("A1", "2024-03-01 07:00:00", "running"),
            record("A2", "2024-03-05 07:00:00", "running"),
            record("A3", "2024-03-09 07:00:00", "running"),
        ],
        500,
    );
    let engine = fx.engine(&source);
    engine.sync_activities(None, 0).unwrap();
    engine.sync_tcx(Some(2)).unwrap();
    engine.import_tcx(None).unwrap();
    assert_eq!(engine.clean_imported().unwrap(), 2);

    // A3 is not downloaded, so only A2 qualifies
    let stats = engine
        .import_tcx_from_date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
        .unwrap();
    assert_eq!(stats.imported, 1);
    assert!(fx.import_path("2024-03-05_A2.tcx").exists());
    assert!(!fx.import_path("2024-03-01_A1.tcx").exists());
    assert!(!fx.import_path("2024-03-09_A3.tcx").exists());
}

#[test]
fn test_clean_imported_without_directory() {
    let fx = Fixture::new();
    let engine = SyncEngine::new(&fx.store, &fx.download);
    assert_eq!(engine.clean_imported().unwrap(), 0);
}

#[test]
fn test_remote_phase_without_source() {
    let fx = Fixture::new();
    fx.insert(&[record("A1", "2024-03-01 07:00:00", "running")]);

    let engine = SyncEngine::new(&fx.store, &fx.download);
    let err = engine.sync_tcx(None).unwrap_err();
    assert!(matches!(err, GarmdownError::NotAuthenticated(_)));
    assert!(matches!(
        engine.sync_activities(None, 0),
        Err(GarmdownError::NotAuthenticated(_))
    ));
}

#[test]
fn test_not_downloaded_report() {
    let fx = Fixture::new();
    fx.insert(&[
        record("A1", "2024-03-01 07:00:00", "running"),
        record("A2", "2024-03-02 07:00:00", "cycling"),
    ]);
    let engine = SyncEngine::new(&fx.store, &fx.download);

    let mut out = Vec::new();
    engine.write_not_downloaded(&mut out, false, None).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text,
        "A1: start: 2024-03-01 07:00:00, type: running\n\
         A2: start: 2024-03-02 07:00:00, type: cycling\n"
    );

    let mut out = Vec::new();
    engine.write_not_imported(&mut out, false, None).unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_reimport_with_copies_in_place_is_not_recovery() {
    let fx = Fixture::new();
    let source = FakeSource::new(
        vec![
            record("A1", "2024-03-01 07:00:00", "running"),
            record("A2", "2024-03-05 07:00:00", "running"),
        ],
        500,
    );
    let engine = fx.engine(&source);
    let first = engine.sync(None).unwrap();
    assert_eq!(first.imported, 2);

    // both copies are still in the import directory and both are marked
    let again = engine
        .import_tcx_from_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        .unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.recovered_imports, 0);

    // a copy removed after import is copied again
    fs::remove_file(fx.import_path("2024-03-05_A2.tcx")).unwrap();
    let again = engine
        .import_tcx_from_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        .unwrap();
    assert_eq!(again.imported, 1);
    assert_eq!(again.recovered_imports, 0);
    assert!(fx.import_path("2024-03-05_A2.tcx").exists());
}

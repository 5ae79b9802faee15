//! Application configuration loaded from a TOML file
//!
//! Every section is optional; missing values fall back to the defaults
//! documented on each field. The configuration is validated once after
//! loading so the rest of the program can rely on it.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{config_dir, expand_home};
use crate::error::{GarmdownError, Result};
use crate::models::ActivityFactory;
use crate::storage::{default_db_path, default_storage_path};

/// Env var naming an explicit config file
pub const CONFIG_ENV: &str = "GARMDOWN_CONFIG";

const DEFAULT_CONNECT_URL: &str = "https://connectapi.garmin.com";
const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com";

const DEFAULT_ACTIVITY_TYPES: &[(&str, &str)] = &[
    ("running", "r"),
    ("treadmill_running", "r"),
    ("trail_running", "r"),
    ("track_running", "r"),
    ("cycling", "b"),
    ("road_biking", "b"),
    ("indoor_cycling", "b"),
    ("mountain_biking", "b"),
    ("gravel_cycling", "b"),
    ("virtual_ride", "b"),
    ("lap_swimming", "s"),
    ("open_water_swimming", "s"),
    ("strength_training", "w"),
    ("walking", "k"),
    ("hiking", "h"),
    ("yoga", "y"),
    ("other", "o"),
];

const DEFAULT_ACTIVITY_NAMES: &[(&str, &str)] = &[
    ("r", "running"),
    ("b", "cycling"),
    ("s", "swimming"),
    ("w", "strength"),
    ("k", "walking"),
    ("h", "hiking"),
    ("y", "yoga"),
    ("o", "other"),
];

const DEFAULT_COLUMNS: &[(&str, ColumnTarget)] = &[
    ("s", ColumnTarget::Swim),
    ("b", ColumnTarget::Bike),
    ("r", ColumnTarget::Run),
    ("w", ColumnTarget::Strength),
    ("k", ColumnTarget::Skip),
    ("h", ColumnTarget::Skip),
    ("y", ColumnTarget::Skip),
    ("o", ColumnTarget::Skip),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub download: DownloadConfig,
    pub backup: BackupConfig,
    pub connect: ConnectConfig,
    /// Garmin type key to single character type code
    pub activity_type: BTreeMap<String, String>,
    /// Type code to human readable sport name
    pub activity_name: BTreeMap<String, String>,
    pub sheet: SheetConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            download: DownloadConfig::default(),
            backup: BackupConfig::default(),
            connect: ConnectConfig::default(),
            activity_type: string_table(DEFAULT_ACTIVITY_TYPES),
            activity_name: string_table(DEFAULT_ACTIVITY_NAMES),
            sheet: SheetConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file holding activities and backups
    pub db_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_file: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Where TCX files are downloaded
    pub activities_dir: PathBuf,
    /// Where downloaded TCX files are copied for an external importer
    pub import_dir: PathBuf,
    /// Page size when listing remote activities
    pub activity_chunk_size: u32,
    /// Highest activity offset ever requested from the remote service
    pub activity_num: u32,
    /// Default number of TCX files downloaded per run
    pub tcx_chunk_size: u32,
    /// Smallest acceptable TCX file in bytes
    pub download_min_size: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        let base = default_storage_path();
        Self {
            activities_dir: base.join("tcx"),
            import_dir: base.join("import"),
            activity_chunk_size: 20,
            activity_num: 10_000,
            tcx_chunk_size: 10,
            download_min_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub db_backup_dir: PathBuf,
    /// Days between scheduled backups
    pub days: u32,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            db_backup_dir: default_storage_path().join("backup"),
            days: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    pub base_url: String,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CONNECT_URL.to_string(),
        }
    }
}

/// Spreadsheet column an activity type's minutes are summed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnTarget {
    Swim,
    Bike,
    Run,
    Strength,
    /// Excluded from every column
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Spreadsheet ID from the document URL; required for sheet sync
    pub sheet_id: Option<String>,
    pub base_url: String,
    /// Sheet row of the first data entry
    pub row_offset: u32,
    /// Last sheet row considered
    pub max_row: u32,
    /// Date column, e.g. `Training!A2:A367` with dates in mm/dd/yyyy
    pub date_cell_range: String,
    /// Swim/bike/run/strength columns with `{start}` and `{end}` row placeholders
    pub completed_cell_range_format: String,
    /// Type code to column
    pub columns: BTreeMap<String, ColumnTarget>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            sheet_id: None,
            base_url: DEFAULT_SHEETS_URL.to_string(),
            row_offset: 2,
            max_row: 367,
            date_cell_range: "Training!A2:A367".to_string(),
            completed_cell_range_format: "Training!C{start}:F{end}".to_string(),
            columns: DEFAULT_COLUMNS
                .iter()
                .map(|(code, target)| (code.to_string(), *target))
                .collect(),
        }
    }
}

impl SheetConfig {
    /// Completed-data range between two sheet rows
    pub fn completed_cell_range(&self, start: u32, end: u32) -> String {
        self.completed_cell_range_format
            .replace("{start}", &start.to_string())
            .replace("{end}", &end.to_string())
    }

    /// Column mapping keyed by type code
    pub fn column_map(&self) -> Result<BTreeMap<char, ColumnTarget>> {
        self.columns
            .iter()
            .map(|(code, target)| Ok((single_char(code, "sheet.columns")?, *target)))
            .collect()
    }
}

impl Config {
    /// Resolve the config file: explicit path, then `GARMDOWN_CONFIG`, then
    /// the platform config directory
    pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path);
        }
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load and validate the config, or the defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| {
                GarmdownError::config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            Self::from_toml(&raw).map_err(|e| match e {
                GarmdownError::Config(msg) => {
                    GarmdownError::config(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.expand_paths();
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(raw).map_err(|e| GarmdownError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn expand_paths(&mut self) {
        self.store.db_file = expand_home(&self.store.db_file);
        self.download.activities_dir = expand_home(&self.download.activities_dir);
        self.download.import_dir = expand_home(&self.download.import_dir);
        self.backup.db_backup_dir = expand_home(&self.backup.db_backup_dir);
    }

    pub fn validate(&self) -> Result<()> {
        if self.download.activity_chunk_size == 0 {
            return Err(GarmdownError::config(
                "download.activity_chunk_size must be positive",
            ));
        }
        if self.download.tcx_chunk_size == 0 {
            return Err(GarmdownError::config("download.tcx_chunk_size must be positive"));
        }
        if self.sheet.row_offset == 0 {
            return Err(GarmdownError::config("sheet.row_offset is 1-based and must be positive"));
        }
        if self.sheet.max_row < self.sheet.row_offset {
            return Err(GarmdownError::config(format!(
                "sheet.max_row ({}) is before sheet.row_offset ({})",
                self.sheet.max_row, self.sheet.row_offset
            )));
        }
        let format = &self.sheet.completed_cell_range_format;
        if !format.contains("{start}") || !format.contains("{end}") {
            return Err(GarmdownError::config(format!(
                "sheet.completed_cell_range_format '{}' needs {{start}} and {{end}}",
                format
            )));
        }

        let names = self.code_names()?;
        for (type_key, code) in &self.activity_type {
            let code = single_char(code, "activity_type")?;
            if !names.contains_key(&code) {
                return Err(GarmdownError::config(format!(
                    "activity type '{}' maps to code '{}' which has no activity_name entry",
                    type_key, code
                )));
            }
        }
        self.sheet.column_map()?;
        Ok(())
    }

    /// Build the activity factory from the type tables
    pub fn activity_factory(&self) -> Result<ActivityFactory> {
        let types = self
            .activity_type
            .iter()
            .map(|(key, code)| Ok((key.clone(), single_char(code, "activity_type")?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(ActivityFactory::new(types, self.code_names()?))
    }

    fn code_names(&self) -> Result<BTreeMap<char, String>> {
        self.activity_name
            .iter()
            .map(|(code, name)| Ok((single_char(code, "activity_name")?, name.clone())))
            .collect()
    }
}

fn single_char(code: &str, section: &str) -> Result<char> {
    let mut chars = code.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(GarmdownError::config(format!(
            "{}: type code '{}' must be a single character",
            section, code
        ))),
    }
}

fn string_table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

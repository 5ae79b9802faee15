use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;

/// Timestamp format used in backup file names (minute granularity)
pub const BACKUP_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// A copy of the activity database taken at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    pub path: PathBuf,
    pub time: NaiveDateTime,
}

impl Backup {
    pub fn at(path: PathBuf, time: NaiveDateTime) -> Self {
        Self { path, time }
    }

    pub fn timestr(&self) -> String {
        timestr(self.time)
    }
}

impl fmt::Display for Backup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.timestr(), self.path.display())
    }
}

/// Format a time the way backup file names carry it
pub fn timestr(time: NaiveDateTime) -> String {
    time.format(BACKUP_TIME_FORMAT).to_string()
}

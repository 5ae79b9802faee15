//! Training spreadsheet reconciliation
//!
//! The sheet has one row per day: a date column (`mm/dd/yyyy`) and four
//! columns of minutes trained (swim, bike, run, strength). Rows are only ever
//! filled forward: everything after the last row holding any minutes, up to
//! the present, is computed from the activity database and written back in
//! one contiguous range.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::client::SheetClient;
use crate::config::{ColumnTarget, SheetConfig};
use crate::error::{GarmdownError, Result};
use crate::models::Activity;
use crate::storage::ActivityStore;

/// Date format of the sheet's date column
pub const SHEET_DATE_FORMAT: &str = "%m/%d/%Y";

/// One day's row of the training sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedEntry {
    /// 0-based index into the data rows
    pub idx: u32,
    /// Sheet row of the first data row
    pub row_offset: u32,
    pub date: NaiveDate,
    pub swim: f64,
    pub bike: f64,
    pub run: f64,
    pub strength: f64,
    /// Whether any sport cell had a value when read
    pub exists: bool,
}

impl CompletedEntry {
    /// Build an entry from its date cell and its (possibly short) row of
    /// sport cells
    pub fn from_cells(idx: u32, row_offset: u32, date: &str, cells: &[String]) -> Result<Self> {
        let date = NaiveDate::parse_from_str(date.trim(), SHEET_DATE_FORMAT).map_err(|e| {
            GarmdownError::invalid_sheet(format!(
                "row {}: bad date '{}': {}",
                idx + row_offset,
                date,
                e
            ))
        })?;
        let cell = |i: usize| cells.get(i).map(|c| c.trim()).filter(|c| !c.is_empty());
        let exists = (0..4).any(|i| cell(i).is_some());
        let minutes = |i: usize| -> Result<f64> {
            match cell(i) {
                None => Ok(0.0),
                Some(text) => text.parse().map_err(|_| {
                    GarmdownError::invalid_sheet(format!(
                        "row {}: '{}' is not a number",
                        idx + row_offset,
                        text
                    ))
                }),
            }
        };

        Ok(Self {
            idx,
            row_offset,
            date,
            swim: minutes(0)?,
            bike: minutes(1)?,
            run: minutes(2)?,
            strength: minutes(3)?,
            exists,
        })
    }

    /// Absolute sheet row
    pub fn rowidx(&self) -> u32 {
        self.idx + self.row_offset
    }

    /// Cells to write back; zero minutes are left blank
    pub fn row(&self) -> Vec<String> {
        [self.swim, self.bike, self.run, self.strength]
            .iter()
            .map(|&minutes| {
                if minutes == 0.0 {
                    String::new()
                } else {
                    minutes.to_string()
                }
            })
            .collect()
    }

    /// Set each sport column that has activities to their summed minutes
    pub fn update(
        &mut self,
        activities: &[Activity],
        columns: &BTreeMap<char, ColumnTarget>,
    ) -> Result<()> {
        let mut by_sport: BTreeMap<ColumnTarget, f64> = BTreeMap::new();
        for activity in activities {
            let Some(&target) = columns.get(&activity.type_code) else {
                tracing::warn!(
                    activity = %activity,
                    type_code = %activity.type_code,
                    "no sheet column for type code, excluding"
                );
                continue;
            };
            tracing::debug!(type_code = %activity.type_code, ?target, activity = %activity, "bucketing");
            if target == ColumnTarget::Skip {
                continue;
            }
            *by_sport.entry(target).or_default() += activity.move_time_seconds()?;
        }

        for (target, seconds) in by_sport {
            let minutes = seconds / 60.0;
            tracing::debug!(?target, minutes, "setting");
            match target {
                ColumnTarget::Swim => self.swim = minutes,
                ColumnTarget::Bike => self.bike = minutes,
                ColumnTarget::Run => self.run = minutes,
                ColumnTarget::Strength => self.strength = minutes,
                ColumnTarget::Skip => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for CompletedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: date={}: exist={}, s={}, b={}, r={}, w={}",
            self.rowidx(),
            self.date,
            self.exists,
            self.swim,
            self.bike,
            self.run,
            self.strength
        )
    }
}

/// Positions of the entries eligible for update: after the last existing
/// entry (or `last_idx` when given) and dated before `end`
pub fn candidate_positions(
    entries: &[CompletedEntry],
    last_idx: Option<u32>,
    end: NaiveDateTime,
) -> Vec<usize> {
    let last_idx = last_idx.or_else(|| entries.iter().filter(|e| e.exists).map(|e| e.idx).last());
    tracing::debug!(?last_idx, "last existing completed row");
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| last_idx.map_or(true, |last| e.idx > last))
        .filter(|(_, e)| e.date.and_time(NaiveTime::MIN) < end)
        .map(|(pos, _)| pos)
        .collect()
}

/// Fills the training sheet from the activity database
pub struct SheetUpdater<'a> {
    client: &'a dyn SheetClient,
    store: &'a ActivityStore,
    config: &'a SheetConfig,
    columns: BTreeMap<char, ColumnTarget>,
}

impl<'a> SheetUpdater<'a> {
    pub fn new(
        client: &'a dyn SheetClient,
        store: &'a ActivityStore,
        config: &'a SheetConfig,
    ) -> Result<Self> {
        Ok(Self {
            client,
            store,
            config,
            columns: config.column_map()?,
        })
    }

    /// Read the date and sport columns into entries aligned by row. Rows
    /// missing from the sport columns are treated as not yet filled.
    pub fn completed_entries(&self) -> Result<Vec<CompletedEntry>> {
        tracing::info!("getting existing completed workout data");
        let dates = self.client.read(&self.config.date_cell_range)?;
        let completed = self.client.read(
            &self
                .config
                .completed_cell_range(self.config.row_offset, self.config.max_row),
        )?;
        tracing::debug!(dates = dates.len(), completed = completed.len(), "read sheet");

        dates
            .iter()
            .enumerate()
            .map(|(idx, date_row)| {
                let idx = idx as u32;
                let date = date_row.first().ok_or_else(|| {
                    GarmdownError::invalid_sheet(format!(
                        "row {} has no date",
                        idx + self.config.row_offset
                    ))
                })?;
                let cells = completed.get(idx as usize).map(Vec::as_slice).unwrap_or(&[]);
                CompletedEntry::from_cells(idx, self.config.row_offset, date, cells)
            })
            .collect()
    }

    /// Entries that would be updated: after `last_idx` (default: the last
    /// existing entry) and dated before `end` (default: now)
    pub fn update_range_entries(
        &self,
        last_idx: Option<u32>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<CompletedEntry>> {
        let end = end.unwrap_or_else(|| Local::now().naive_local());
        let entries = self.completed_entries()?;
        Ok(candidate_positions(&entries, last_idx, end)
            .into_iter()
            .map(|pos| entries[pos].clone())
            .collect())
    }

    /// Fill every stale row up to now; returns the number of rows written
    pub fn sync(&self) -> Result<usize> {
        self.sync_until(Local::now().naive_local())
    }

    /// Fill every stale row dated before `end`
    pub fn sync_until(&self, end: NaiveDateTime) -> Result<usize> {
        let mut entries = self.completed_entries()?;
        let positions = candidate_positions(&entries, None, end);
        let (Some(&first), Some(&last)) = (positions.first(), positions.last()) else {
            tracing::info!("no updates necessary");
            return Ok(0);
        };

        tracing::info!(count = positions.len(), "syncing entries with activity database");
        for &pos in &positions {
            let entry = &mut entries[pos];
            if !entry.exists {
                let activities = self.store.get_activities_by_date(entry.date)?;
                tracing::debug!(count = activities.len(), entry = %entry, "found activities");
                entry.update(&activities, &self.columns)?;
            }
            tracing::debug!(entry = %entry, "updated");
        }

        // one contiguous range from the first to the last candidate
        let span = &entries[first..=last];
        let rows: Vec<Vec<String>> = span.iter().map(CompletedEntry::row).collect();
        let range = self
            .config
            .completed_cell_range(entries[first].rowidx(), entries[last].rowidx());
        tracing::info!(rows = rows.len(), %range, "updating rows");
        self.client.write(&range, &rows)?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn entry(idx: u32, date: &str, values: &[&str]) -> CompletedEntry {
        CompletedEntry::from_cells(idx, 2, date, &cells(values)).unwrap()
    }

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_from_cells() {
        let e = entry(3, "03/01/2024", &["", "45.5"]);
        assert_eq!(e.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(e.rowidx(), 5);
        assert!(e.exists);
        assert_eq!(e.bike, 45.5);
        assert_eq!(e.run, 0.0);

        let empty = entry(0, "03/02/2024", &["", " "]);
        assert!(!empty.exists);
    }

    #[test]
    fn test_bad_cells() {
        let err = CompletedEntry::from_cells(0, 2, "2024-03-01", &[]).unwrap_err();
        assert!(matches!(err, GarmdownError::InvalidSheet(_)));

        let err = CompletedEntry::from_cells(0, 2, "03/01/2024", &cells(&["lots"])).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn test_row_blanks_zero() {
        let mut e = entry(0, "03/01/2024", &[]);
        e.run = 30.0;
        e.swim = 12.5;
        assert_eq!(e.row(), cells(&["12.5", "", "30", ""]));
    }

    #[test]
    fn test_update_buckets_by_column() {
        let factory = Config::default().activity_factory().unwrap();
        let make = |id: &str, key: &str, secs: f64| {
            factory
                .create(json!({
                    "activityId": id,
                    "startTimeLocal": "2024-03-01 07:00:00",
                    "activityType": { "typeKey": key },
                    "duration": secs,
                    "movingDuration": secs
                }))
                .unwrap()
        };
        let activities = vec![
            make("1", "running", 1800.0),
            make("2", "trail_running", 600.0),
            make("3", "cycling", 3600.0),
            make("4", "yoga", 900.0),
            make("5", "walking", 1200.0),
        ];
        let mut columns = Config::default().sheet.column_map().unwrap();
        // walking has no column at all
        columns.remove(&'k');

        let mut e = entry(0, "03/01/2024", &[]);
        e.update(&activities, &columns).unwrap();
        assert_eq!(e.run, 40.0);
        assert_eq!(e.bike, 60.0);
        assert_eq!(e.swim, 0.0);
        assert_eq!(e.strength, 0.0);
    }

    #[test]
    fn test_candidates_after_last_existing() {
        let mut entries: Vec<_> = (0..10)
            .map(|i| entry(i, &format!("03/{:02}/2024", i + 1), &[]))
            .collect();
        for e in entries.iter_mut().take(5) {
            e.exists = true;
        }
        // a gap before the last existing row is never reopened
        entries[2].exists = false;

        let positions = candidate_positions(&entries, None, midnight(2025, 1, 1));
        assert_eq!(positions, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_candidates_exclude_future() {
        let entries: Vec<_> = (0..10)
            .map(|i| entry(i, &format!("03/{:02}/2024", i + 1), &[]))
            .collect();

        // 03/08 at midnight is not before the end
        let positions = candidate_positions(&entries, None, midnight(2024, 3, 8));
        assert_eq!(positions, vec![0, 1, 2, 3, 4, 5, 6]);

        // the current day counts once it has started
        let positions =
            candidate_positions(&entries, None, midnight(2024, 3, 8) + chrono::Duration::hours(9));
        assert_eq!(positions.last(), Some(&7));
    }

    #[test]
    fn test_candidates_with_explicit_last_idx() {
        let entries: Vec<_> = (0..4)
            .map(|i| entry(i, &format!("03/{:02}/2024", i + 1), &[]))
            .collect();
        let positions = candidate_positions(&entries, Some(1), midnight(2025, 1, 1));
        assert_eq!(positions, vec![2, 3]);
    }
}

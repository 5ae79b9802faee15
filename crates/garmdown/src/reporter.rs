//! Reports of the activities recorded on a day

use std::io::Write;

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::Result;
use crate::storage::ActivityStore;

/// How a day's activities are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    /// One line per activity
    #[default]
    Summary,
    /// Every derived attribute
    Detail,
    /// The raw payloads, pretty printed
    Json,
}

pub struct Reporter<'a> {
    store: &'a ActivityStore,
}

impl<'a> Reporter<'a> {
    pub fn new(store: &'a ActivityStore) -> Self {
        Self { store }
    }

    pub fn write(&self, date: NaiveDate, format: ReportFormat, writer: &mut dyn Write) -> Result<()> {
        tracing::debug!(%date, ?format, "reporting on day");
        let activities = self.store.get_activities_by_date(date)?;
        match format {
            ReportFormat::Summary => {
                for activity in &activities {
                    writeln!(writer, "{}", activity)?;
                }
            }
            ReportFormat::Detail => {
                for activity in &activities {
                    activity.write(writer, true)?;
                }
            }
            ReportFormat::Json => {
                let raw: Vec<&Value> = activities.iter().map(|a| &a.raw).collect();
                serde_json::to_writer_pretty(&mut *writer, &raw)?;
                writeln!(writer)?;
            }
        }
        Ok(())
    }
}

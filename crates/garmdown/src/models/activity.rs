//! Activity data models for Garmin Connect activities
//!
//! An [`Activity`] wraps the raw JSON record returned by the activity list
//! endpoint. The raw payload is kept verbatim so it can be re-exported
//! losslessly; everything else is derived from it when the activity is built.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::{GarmdownError, Result};

/// Format of `startTimeLocal` in activity payloads
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format used in track file names and date queries
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Type code of swims, which always count their total duration
const SWIM_CODE: char = 's';

/// Sports where the moving duration is meaningless and the total duration is used
const NO_MOVE_SPORTS: &[&str] = &["indoor_cycling", "treadmill_running", "strength_training"];

/// Type keys that select a category-specific metric set
const CATEGORY_TABLE: &[(&str, SportCategory)] = &[
    ("cycling", SportCategory::Cycling),
    ("road_biking", SportCategory::Cycling),
    ("indoor_cycling", SportCategory::Cycling),
    ("mountain_biking", SportCategory::Cycling),
    ("gravel_cycling", SportCategory::Cycling),
    ("virtual_ride", SportCategory::Cycling),
    ("running", SportCategory::Running),
    ("treadmill_running", SportCategory::Running),
    ("trail_running", SportCategory::Running),
    ("track_running", SportCategory::Running),
    ("lap_swimming", SportCategory::Swimming),
    ("open_water_swimming", SportCategory::Swimming),
    ("swimming", SportCategory::Swimming),
];

/// Closed set of sport categories with their own metric fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SportCategory {
    Cycling,
    Running,
    Swimming,
    General,
}

impl SportCategory {
    /// Look up the category for a Garmin type key
    pub fn from_type_key(type_key: &str) -> Self {
        CATEGORY_TABLE
            .iter()
            .find(|(key, _)| *key == type_key)
            .map(|(_, category)| *category)
            .unwrap_or(SportCategory::General)
    }
}

/// Cycling specific metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CyclingMetrics {
    pub cadence: Option<f64>,
    pub power_average: Option<f64>,
    pub power_norm: Option<f64>,
    pub power_max: Option<f64>,
    pub strokes: Option<f64>,
    pub intensity: Option<f64>,
}

/// Running specific metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningMetrics {
    pub cadence_steps_per_minute: Option<f64>,
    pub stride_average: Option<f64>,
    pub ground_contact_balance_average: Option<f64>,
    pub ground_contact_time_average: Option<f64>,
    pub steps: Option<f64>,
}

/// Swimming specific metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwimmingMetrics {
    pub strokes: Option<f64>,
    pub pool_length: Option<f64>,
}

/// Category-specific metrics, selected by the activity's type key
#[derive(Debug, Clone, PartialEq)]
pub enum SportMetrics {
    Cycling(CyclingMetrics),
    Running(RunningMetrics),
    Swimming(SwimmingMetrics),
    General,
}

impl SportMetrics {
    fn from_raw(category: SportCategory, raw: &Value) -> Self {
        match category {
            SportCategory::Cycling => SportMetrics::Cycling(CyclingMetrics {
                cadence: number(raw, "averageBikingCadenceInRevPerMinute"),
                power_average: number(raw, "avgPower"),
                power_norm: number(raw, "normPower"),
                power_max: number(raw, "maxPower"),
                strokes: number(raw, "strokes"),
                intensity: number(raw, "intensityFactor"),
            }),
            SportCategory::Running => SportMetrics::Running(RunningMetrics {
                cadence_steps_per_minute: number(raw, "averageRunningCadenceInStepsPerMinute"),
                stride_average: number(raw, "avgStrideLength"),
                ground_contact_balance_average: number(raw, "avgGroundContactBalance"),
                ground_contact_time_average: number(raw, "avgGroundContactTime"),
                steps: number(raw, "steps"),
            }),
            SportCategory::Swimming => SportMetrics::Swimming(SwimmingMetrics {
                strokes: number(raw, "strokes"),
                pool_length: number(raw, "poolLength"),
            }),
            SportCategory::General => SportMetrics::General,
        }
    }

    /// Name/value pairs for the detail report
    fn attributes(&self) -> Vec<(&'static str, Option<f64>)> {
        match self {
            SportMetrics::Cycling(m) => vec![
                ("cadence", m.cadence),
                ("power average", m.power_average),
                ("power norm", m.power_norm),
                ("power max", m.power_max),
                ("strokes", m.strokes),
                ("intensity", m.intensity),
            ],
            SportMetrics::Running(m) => vec![
                ("cadence step per minute", m.cadence_steps_per_minute),
                ("stride average", m.stride_average),
                ("ground contact balance average", m.ground_contact_balance_average),
                ("ground contact time average", m.ground_contact_time_average),
                ("steps", m.steps),
            ],
            SportMetrics::Swimming(m) => {
                vec![("strokes", m.strokes), ("pool length", m.pool_length)]
            }
            SportMetrics::General => Vec::new(),
        }
    }
}

/// A single recorded workout
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    /// Remote identifier, unique per Garmin account
    pub id: String,
    /// Single character type code from the `[activity_type]` table
    pub type_code: char,
    /// Garmin type key (e.g. "running", "indoor_cycling")
    pub type_key: String,
    /// Human readable sport name from the `[activity_name]` table
    pub type_name: String,
    pub start_time: NaiveDateTime,
    pub name: Option<String>,
    pub location: Option<String>,
    /// Total duration in seconds
    pub total_duration: Option<f64>,
    /// Moving duration in seconds
    pub moving_duration: Option<f64>,
    pub calories: Option<f64>,
    pub heart_rate_average: Option<f64>,
    pub vo2max: Option<f64>,
    pub stress_score: Option<f64>,
    pub metrics: SportMetrics,
    /// Record as returned by Garmin Connect
    pub raw: Value,
    pub downloaded_at: Option<NaiveDateTime>,
    pub imported_at: Option<NaiveDateTime>,
}

impl Activity {
    /// Build an activity from its raw record and an already resolved type code
    pub fn from_raw(raw: Value, type_code: char, type_name: impl Into<String>) -> Result<Self> {
        let id = activity_id(&raw)?;
        let type_key = type_key_from_raw(&raw)?;
        let start_str = raw
            .get("startTimeLocal")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GarmdownError::invalid_activity(format!("activity {} has no startTimeLocal", id))
            })?;
        let start_time = parse_start_time(start_str).ok_or_else(|| {
            GarmdownError::invalid_activity(format!(
                "activity {} has unparseable start time '{}'",
                id, start_str
            ))
        })?;
        let metrics = SportMetrics::from_raw(SportCategory::from_type_key(&type_key), &raw);

        Ok(Self {
            id,
            type_code,
            type_name: type_name.into(),
            start_time,
            name: text(&raw, "activityName"),
            location: text(&raw, "locationName"),
            total_duration: number(&raw, "duration"),
            moving_duration: number(&raw, "movingDuration"),
            calories: number(&raw, "calories"),
            heart_rate_average: number(&raw, "averageHR"),
            vo2max: number(&raw, "vO2MaxValue"),
            stress_score: number(&raw, "trainingStressScore"),
            metrics,
            type_key,
            raw,
            downloaded_at: None,
            imported_at: None,
        })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_time.date()
    }

    pub fn start_date_str(&self) -> String {
        self.start_time.format(DATE_FORMAT).to_string()
    }

    /// File name (without directory) of this activity's TCX file
    pub fn tcx_filename(&self) -> String {
        format!("{}_{}.tcx", self.start_date_str(), self.id)
    }

    /// Duration appropriate for the sport: total time for stationary sports,
    /// moving time otherwise
    pub fn duration(&self) -> Option<f64> {
        if NO_MOVE_SPORTS.contains(&self.type_key.as_str()) {
            self.total_duration
        } else {
            self.moving_duration
        }
    }

    /// Seconds of training counted toward the spreadsheet totals
    pub fn move_time_seconds(&self) -> Result<f64> {
        let duration = if self.type_code == SWIM_CODE {
            self.total_duration
        } else {
            self.duration()
        };
        duration.or(self.total_duration).ok_or_else(|| {
            GarmdownError::invalid_activity(format!("no such duration: {}", self))
        })
    }

    /// Write a human readable description
    pub fn write(&self, writer: &mut dyn Write, detail: bool) -> io::Result<()> {
        if !detail {
            return writeln!(
                writer,
                "{}: start: {}, type: {}",
                self.id, self.start_time, self.type_key
            );
        }

        writeln!(
            writer,
            "{}: {}",
            self.start_date_str(),
            self.name.as_deref().unwrap_or("Unnamed Activity")
        )?;
        writeln!(writer, "type: {}", self.type_key)?;
        writeln!(writer, "  name: {}", display_opt(&self.name))?;
        writeln!(writer, "  location: {}", display_opt(&self.location))?;
        writeln!(writer, "  start date: {}", self.start_date_str())?;
        writeln!(writer, "  duration: {}", display_num(self.duration()))?;
        let move_time = self.move_time_seconds().ok();
        writeln!(writer, "  move time seconds: {}", display_num(move_time))?;
        writeln!(writer, "  heart rate average: {}", display_num(self.heart_rate_average))?;
        writeln!(writer, "  v02max: {}", display_num(self.vo2max))?;
        writeln!(writer, "  stress score: {}", display_num(self.stress_score))?;
        writeln!(writer, "  calories: {}", display_num(self.calories))?;
        for (name, value) in self.metrics.attributes() {
            writeln!(writer, "  {}: {}", name, display_num(value))?;
        }
        Ok(())
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: date={}, sport={}",
            self.id,
            self.start_date_str(),
            self.type_name
        )
    }
}

/// Creates activities, resolving type keys to codes and names
#[derive(Debug, Clone)]
pub struct ActivityFactory {
    type_to_code: BTreeMap<String, char>,
    code_to_name: BTreeMap<char, String>,
}

impl ActivityFactory {
    pub fn new(type_to_code: BTreeMap<String, char>, code_to_name: BTreeMap<char, String>) -> Self {
        Self {
            type_to_code,
            code_to_name,
        }
    }

    /// Create an activity from a freshly fetched record
    pub fn create(&self, raw: Value) -> Result<Activity> {
        let type_key = type_key_from_raw(&raw)?;
        let code = *self
            .type_to_code
            .get(&type_key)
            .ok_or(GarmdownError::UnknownActivityType(type_key))?;
        self.with_code(raw, code)
    }

    /// Recreate an activity from a stored record and its stored type code
    pub fn thaw(&self, raw: Value, code: char) -> Result<Activity> {
        self.with_code(raw, code)
    }

    /// Human readable name for a type code
    pub fn type_name(&self, code: char) -> Option<&str> {
        self.code_to_name.get(&code).map(String::as_str)
    }

    fn with_code(&self, raw: Value, code: char) -> Result<Activity> {
        let name = self
            .type_name(code)
            .ok_or_else(|| GarmdownError::UnknownActivityType(code.to_string()))?
            .to_string();
        Activity::from_raw(raw, code, name)
    }
}

/// Extract the activity identifier, which Garmin sends as a number
pub fn activity_id(raw: &Value) -> Result<String> {
    match raw.get("activityId") {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(GarmdownError::invalid_activity("record has no activityId")),
    }
}

/// Extract `activityType.typeKey`
pub fn type_key_from_raw(raw: &Value) -> Result<String> {
    raw.get("activityType")
        .and_then(|t| t.get("typeKey"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            let id = activity_id(raw).unwrap_or_else(|_| "?".to_string());
            GarmdownError::invalid_activity(format!("activity {} has no activityType.typeKey", id))
        })
}

fn parse_start_time(s: &str) -> Option<NaiveDateTime> {
    // Handle both space-separated and ISO (T separator) formats
    NaiveDateTime::parse_from_str(s, START_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

fn number(raw: &Value, key: &str) -> Option<f64> {
    raw.get(key).and_then(Value::as_f64)
}

fn text(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

fn display_opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn display_num(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

//! Domain models for activities and database backups

pub mod activity;
pub mod backup;

pub use activity::{
    Activity, ActivityFactory, CyclingMetrics, RunningMetrics, SportCategory, SportMetrics,
    SwimmingMetrics,
};
pub use backup::Backup;

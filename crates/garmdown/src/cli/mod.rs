//! Command line front end

pub mod commands;
mod context;

pub use context::{parse_date, AppContext};

pub mod backup;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod reporter;
pub mod sheet;
pub mod storage;
pub mod sync;

pub use error::{GarmdownError, Result};

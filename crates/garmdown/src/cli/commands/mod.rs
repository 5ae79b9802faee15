pub mod backup;
pub mod report;
pub mod sheet;
pub mod sync;
pub mod token;

pub use backup::backup;
pub use report::report;
pub use sheet::sheet;
pub use sync::{
    activities, clean, download, import, not_downloaded, not_imported, status, sync_all, tcx,
};
pub use token::{clear as token_clear, set as token_set, status as token_status};

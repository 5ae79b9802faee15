use std::io;

use chrono::Local;

use crate::cli::{parse_date, AppContext};
use crate::error::Result;
use crate::reporter::{ReportFormat, Reporter};

/// Report the activities of a day (default: today)
pub fn report(ctx: &AppContext, date: Option<String>, format: ReportFormat) -> Result<()> {
    let date = match date {
        Some(s) => parse_date(&s)?,
        None => Local::now().date_naive(),
    };
    let store = ctx.store()?;
    Reporter::new(&store).write(date, format, &mut io::stdout().lock())
}

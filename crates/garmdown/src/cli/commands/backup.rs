use crate::backup::BackupScheduler;
use crate::cli::AppContext;
use crate::error::Result;

/// Back up the database now, regardless of when the last backup was taken
pub fn backup(ctx: &AppContext) -> Result<()> {
    let store = ctx.store()?;
    let scheduler = BackupScheduler::new(&store, &ctx.config.backup);

    if let Some(backup) = scheduler.backup(true)? {
        println!("Backed up database: {}", backup);
    }
    Ok(())
}

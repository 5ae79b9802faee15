//! Download, import and status commands for garmdown

use std::io;

use crate::backup::BackupScheduler;
use crate::cli::{parse_date, AppContext};
use crate::error::Result;
use crate::sync::SyncEngine;

use super::sheet::sheet;

/// Fetch activity metadata from Garmin Connect into the database
pub fn activities(ctx: &AppContext, limit: Option<u32>, start: u32) -> Result<()> {
    let store = ctx.store()?;
    let client = ctx.connect_client()?;
    let engine = SyncEngine::new(&store, &ctx.config.download).with_source(&client);

    let stats = engine.sync_activities(limit, start)?;
    println!("{}", stats);
    Ok(())
}

/// Download TCX files not yet downloaded
pub fn tcx(ctx: &AppContext, limit: Option<u32>) -> Result<()> {
    let store = ctx.store()?;
    let client = ctx.connect_client()?;
    let engine = SyncEngine::new(&store, &ctx.config.download).with_source(&client);

    let stats = engine.sync_tcx(limit)?;
    println!("{}", stats);
    Ok(())
}

/// Copy downloaded TCX files to the import directory
pub fn import(ctx: &AppContext, from: Option<String>) -> Result<()> {
    let store = ctx.store()?;
    let engine = SyncEngine::new(&store, &ctx.config.download);

    let stats = match from {
        Some(date) => engine.import_tcx_from_date(parse_date(&date)?)?,
        None => engine.import_tcx(None)?,
    };
    println!("{}", stats);
    Ok(())
}

/// Run all download phases, then back up the database if one is due
pub fn download(ctx: &AppContext, limit: Option<u32>) -> Result<()> {
    let store = ctx.store()?;
    let client = ctx.connect_client()?;
    let engine = SyncEngine::new(&store, &ctx.config.download).with_source(&client);

    println!("Using database: {}", store.db_file().display());
    let stats = engine.sync(limit)?;
    println!("Sync complete: {}", stats);

    if let Some(backup) = BackupScheduler::new(&store, &ctx.config.backup).backup(false)? {
        println!("Backed up database: {}", backup);
    }
    Ok(())
}

/// Download everything, then update the training sheet
pub fn sync_all(ctx: &AppContext, limit: Option<u32>) -> Result<()> {
    download(ctx, limit)?;
    sheet(ctx)
}

/// Remove every file from the import directory
pub fn clean(ctx: &AppContext) -> Result<()> {
    let store = ctx.store()?;
    let engine = SyncEngine::new(&store, &ctx.config.download);

    let removed = engine.clean_imported()?;
    println!(
        "Removed {} file(s) from {}",
        removed,
        ctx.config.download.import_dir.display()
    );
    Ok(())
}

/// List activities whose TCX file has not been downloaded
pub fn not_downloaded(ctx: &AppContext, detail: bool, limit: Option<u32>) -> Result<()> {
    let store = ctx.store()?;
    let engine = SyncEngine::new(&store, &ctx.config.download);
    engine.write_not_downloaded(&mut io::stdout().lock(), detail, limit)
}

/// List downloaded activities not yet imported
pub fn not_imported(ctx: &AppContext, detail: bool, limit: Option<u32>) -> Result<()> {
    let store = ctx.store()?;
    let engine = SyncEngine::new(&store, &ctx.config.download);
    engine.write_not_imported(&mut io::stdout().lock(), detail, limit)
}

/// Show database counts and the last backup
pub fn status(ctx: &AppContext) -> Result<()> {
    let store = ctx.store()?;

    if !store.db_file().exists() {
        println!("No database found at: {}", store.db_file().display());
        println!("Run 'garmdown download' to create one.");
        return Ok(());
    }

    let summary = store.count_summary()?;
    println!("Database: {}", store.db_file().display());
    println!(
        "Profile: {}",
        ctx.profile.as_deref().unwrap_or("default")
    );
    println!();
    println!("Activities:");
    println!("  Stored:          {:>8}", summary.activities);
    println!("  Not downloaded:  {:>8}", summary.not_downloaded);
    println!("  Not imported:    {:>8}", summary.not_imported);
    println!();
    match store.get_last_backup()? {
        Some(backup) => println!("Last backup: {}", backup),
        None => println!("Last backup: never"),
    }
    Ok(())
}

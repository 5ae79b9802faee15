use crate::cli::AppContext;
use crate::error::Result;
use crate::sheet::SheetUpdater;

/// Fill the training sheet's stale rows from the database
pub fn sheet(ctx: &AppContext) -> Result<()> {
    let store = ctx.store()?;
    let client = ctx.sheets_client()?;
    let updater = SheetUpdater::new(&client, &store, &ctx.config.sheet)?;

    let rows = updater.sync()?;
    if rows == 0 {
        println!("Sheet is up to date.");
    } else {
        println!("Updated {} sheet row(s).", rows);
    }
    Ok(())
}

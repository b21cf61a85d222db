//! Loads and saves a [`Database`] against a JSON file on disk. The engine
//! itself has no I/O; this is the thin file-backed front end a CLI needs.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use etymolog_core::store::ExportFormat;
use etymolog_core::Database;

pub fn load(path: &str) -> Result<Database> {
    let mut db = Database::init();
    if Path::new(path).exists() {
        let bytes = fs::read(path).with_context(|| format!("reading store file {path}"))?;
        db.import(&bytes)
            .with_context(|| format!("importing store file {path}"))?;
        debug!("loaded store from {path}");
    } else {
        debug!("no store file at {path}, starting fresh");
    }
    Ok(db)
}

pub fn save(path: &str, db: &mut Database) -> Result<()> {
    let bytes = db
        .export(ExportFormat::Json)
        .context("exporting store to JSON")?;
    fs::write(path, bytes).with_context(|| format!("writing store file {path}"))?;
    debug!("saved store to {path}");
    Ok(())
}

mod cli;
mod commands;
mod render;
mod store_file;

use std::fs::File;
use std::io::Write;

use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

#[macro_use]
extern crate log;

fn main() -> Result<()> {
    let cli = cli::Args::parse();

    let log_level = if cli.verbose == 0 {
        LevelFilter::Info
    } else if cli.verbose == 1 {
        LevelFilter::Debug
    } else {
        LevelFilter::Trace
    };
    if !cli.quiet {
        Builder::new().filter_level(log_level).init();
    }

    let mut db = store_file::load(&cli.db)?;
    let out_data = commands::dispatch(&mut db, cli.command)?;
    store_file::save(&cli.db, &mut db)?;

    if let Some(out_path) = cli.output {
        let mut out_file = File::create(out_path)?;
        write!(out_file, "{out_data}")?;
    } else if !out_data.is_empty() {
        println!("{out_data}");
    }

    Ok(())
}

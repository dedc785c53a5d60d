//! Storage inspection CLI.
//!
//! Usage: `telecare_cli [db_path]`
//!
//! Opens (and migrates) the database, then prints the core version, schema
//! version and per-table row counts. Configuration comes from `.env` and the
//! `TELECARE_*` environment variables; a positional path overrides
//! `TELECARE_DB_PATH`.

use std::path::PathBuf;
use std::process::ExitCode;
use telecare_core::db::migrations::current_version;
use telecare_core::{core_version, init_logging, open_db, table_row_counts, CoreConfig};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let mut config = CoreConfig::from_env();
    if let Some(path) = std::env::args_os().nth(1) {
        config.db_path = PathBuf::from(path);
    }

    if let Some(log_dir) = config.log_dir.as_deref() {
        let started = log_dir
            .to_str()
            .ok_or_else(|| "log directory is not valid UTF-8".to_string())
            .and_then(|dir| init_logging(&config.log_level, dir).map_err(|err| err.to_string()));
        if let Err(err) = started {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &CoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db(&config.db_path)?;

    println!("telecare_core version={}", core_version());
    println!("db_path={}", config.db_path.display());
    println!("schema_version={}", current_version(&conn)?);
    for (table, rows) in table_row_counts(&conn)? {
        println!("table={table} rows={rows}");
    }
    Ok(())
}

#![cfg(not(tarpaulin_include))]

use log::info;
use sheetstore::document::{Projection, ValueMode, read_range};
use sheetstore::{Config, DocumentStore, SheetStore, infer_schema, resolve_read_range};
use std::env;
use std::process::ExitCode;

const USAGE: &str = "Usage: sheet-inspect <document-id> [range] [--sparse] [--computed]";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let flags: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| a.starts_with("--"))
        .collect();
    let positional: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| !a.starts_with("--"))
        .collect();

    let Some(id) = positional.first().and_then(|s| s.parse::<u64>().ok()) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    match run(id, positional.get(1).copied(), &flags) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(id: u64, range: Option<&str>, flags: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
    let config = Config::from_env();
    info!("opening data directory {}", config.data_dir.display());
    let store = SheetStore::open(&config.data_dir)?;
    let document = store
        .load(id)?
        .ok_or_else(|| format!("document {id} not found"))?;

    let output = match range {
        None => serde_json::to_string_pretty(&serde_json::json!({
            "id": document.id,
            "name": document.name,
            "owner_id": document.owner_id,
            "updated_at": document.updated_at,
            "schema": infer_schema(&document.state, config.max_schema_cols),
        }))?,
        Some(range) => {
            let bounds = resolve_read_range(range, config.max_read_cells)?;
            let projection = if flags.contains(&"--sparse") {
                Projection::Sparse
            } else {
                Projection::Grid
            };
            let mode = if flags.contains(&"--computed") {
                ValueMode::Computed
            } else {
                ValueMode::Raw
            };
            serde_json::to_string_pretty(&read_range(&document.state, bounds, projection, mode))?
        }
    };
    Ok(output)
}

//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `signage_core` linkage.
//! - Open a database (in-memory unless a path is given), run one
//!   create/link/read cycle, and print what came back.
//! - `SIGNAGE_LOG_DIR` (absolute path) turns on rolling file logs.

use signage_core::db::migrations::{current_user_version, latest_version};
use signage_core::db::{open_db_in_memory, open_db_with_config};
use signage_core::{CatalogService, EngineConfig, ItemDraft, SiteDraft};
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("signage_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("signage_core ping={}", signage_core::ping());
    println!("signage_core version={}", signage_core::core_version());

    if let Ok(log_dir) = std::env::var("SIGNAGE_LOG_DIR") {
        signage_core::init_logging(signage_core::default_log_level(), &log_dir)?;
    }

    let config = match std::env::var("SIGNAGE_CONFIG") {
        Ok(path) => EngineConfig::from_json_file(path)?,
        Err(_) => EngineConfig::default(),
    };

    let mut conn = match std::env::args().nth(1) {
        Some(path) => open_db_with_config(path, &config)?,
        None => open_db_in_memory()?,
    };
    println!(
        "schema version={} latest={}",
        current_user_version(&conn)?,
        latest_version()
    );

    let mut catalog = CatalogService::with_config(&mut conn, config);
    let run_tag = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    let site = catalog.create_site(
        SiteDraft::new(format!("smoke-lobby-{run_tag}"), ""),
        &[],
        &[],
    )?;
    let item = catalog.create_item(ItemDraft::new("smoke-item", 15), &[site.site.id])?;
    println!(
        "item id={} linked_sites={} play_duration_secs={:?}",
        item.item.id,
        item.sites.len(),
        item.sites.first().and_then(|link| link.play_duration_secs)
    );
    Ok(())
}

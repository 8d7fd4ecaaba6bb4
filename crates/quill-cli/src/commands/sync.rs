use std::path::Path;
use std::time::Instant;

use quill_core::config::QuillConfig;
use quill_core::workbench::WorkbenchClient;
use quill_entra_sync::run::SyncRunner;
use tracing::{error, info, warn};

/// Run the `sync` command: mirror Entra ID membership onto the workbench.
pub async fn run(config_path: &str, simulate: bool) -> anyhow::Result<()> {
    let config = QuillConfig::load(Path::new(config_path))?;
    config.validate()?;

    info!("Loaded configuration from {}", config_path);

    if !config.entra_sync.enabled {
        warn!("Entra ID sync is not enabled in the configuration");
        println!("Entra ID sync is disabled. Enable it in your config file first.");
        return Ok(());
    }

    let workbench = WorkbenchClient::new(&config.workbench.base_url, &config.workbench.api_token);

    let mut sync_config = config.entra_sync.clone();
    // The flag only ever forces simulation on; the config can not be
    // overridden into applying for real.
    if simulate {
        sync_config.simulate = true;
    }

    if sync_config.simulate {
        println!("Simulation mode - no account will be touched");
    }

    let start = Instant::now();
    let runner = SyncRunner::new(sync_config, &workbench)
        .with_progress(Box::new(|phase| info!("Completed phase {phase}/4")));
    let outcome = runner.run().await;

    for row in outcome.log.to_table() {
        println!("{}  {:<7}  {}  {}", row[0], row[2], row[1], row[3]);
    }

    if outcome.log.has_errors() {
        error!("Sync run failed");
        anyhow::bail!("sync run finished with errors, see the log above");
    }

    let duration = start.elapsed();
    println!("Sync completed in {:.1}s", duration.as_secs_f64());
    println!("  Created:   {}", outcome.summary.created);
    println!("  Updated:   {}", outcome.summary.updated);
    println!("  Deleted:   {}", outcome.summary.deleted);
    println!("  Skipped:   {}", outcome.summary.skipped);
    println!("  Warnings:  {}", outcome.summary.warned);
    println!("  Unchanged: {}", outcome.summary.unchanged);

    Ok(())
}

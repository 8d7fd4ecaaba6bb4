use std::path::Path;

use quill_core::config::QuillConfig;
use quill_core::mapping::MappingTable;
use tracing::info;

/// Run the `validate` command: check everything that can be checked without
/// touching the network.
pub fn run(config_path: &str) -> anyhow::Result<()> {
    let config = QuillConfig::load(Path::new(config_path))?;
    config.validate()?;
    println!("Configuration: OK ({config_path})");

    if !config.entra_sync.enabled {
        println!("Entra ID sync: disabled");
        return Ok(());
    }

    let mapping = MappingTable::from_csv_path(Path::new(&config.entra_sync.group_mapping))?;
    println!(
        "Group mapping: OK ({} groups in {})",
        mapping.rows().len(),
        config.entra_sync.group_mapping
    );

    let credentials = config.entra_sync.resolve_credentials()?;
    println!(
        "Graph credentials: OK (tenant {})",
        credentials.tenant_id()
    );

    info!("Validation passed");
    Ok(())
}

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "quill", about = "Self-hosted analytics workbench tooling", version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "quill.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Mirror Entra ID group membership onto workbench accounts
    Sync {
        /// Compute and report decisions without applying them
        #[arg(long)]
        simulate: bool,
    },
    /// Check the configuration, group mapping, and credentials
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { simulate } => {
            commands::sync::run(&cli.config, simulate).await?;
        }
        Commands::Validate => {
            commands::validate::run(&cli.config)?;
        }
    }

    Ok(())
}

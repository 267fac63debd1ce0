//! PolyModel Chat - multi-model streaming chat CLI
//!
#![doc = "PolyModel Chat - multi-model streaming chat CLI"]
#![doc = "Main entry point for the polychat application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use polychat::cli::{Cli, Commands};
use polychat::commands::{self, AppContext};
use polychat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    let ctx = AppContext::open(config)?;

    // Execute command
    match cli.command {
        Commands::Chat { session } => {
            tracing::info!("Starting interactive chat");
            commands::chat::run_chat(&ctx, session).await?;
        }
        Commands::Ask { prompt, session } => {
            tracing::info!("Sending one-shot prompt");
            commands::chat::run_ask(&ctx, &prompt, session).await?;
        }
        Commands::Sessions { command } => {
            commands::sessions::handle_sessions(&ctx, command)?;
        }
        Commands::Export {
            id,
            all,
            format,
            output,
        } => {
            commands::transfer::handle_export(&ctx, id, all, format, output)?;
        }
        Commands::Import { path } => {
            commands::transfer::handle_import(&ctx, &path)?;
        }
        Commands::Settings { command } => {
            commands::settings::handle_settings(&ctx, command)?;
        }
        Commands::Models { command } => {
            commands::models::handle_models(&ctx, command)?;
        }
    }

    Ok(())
}

/// Initialize tracing on stderr so streamed replies stay clean on stdout
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "polychat=debug"
    } else {
        "polychat=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ABOUTME: Entry point for the bcbot MCP server
// ABOUTME: Parses the CLI, sets up logging and metrics, then serves over HTTP or stdio

use anyhow::Result;
use bcbot::{
    config::{Config, Transport},
    logging,
    mcp::{self, McpState},
    metrics, server, stdio,
};
use bcbot_core::ClientRegistry;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// MCP server that drives a Bondage Club chat bot
#[derive(Parser)]
#[command(name = "bcbot", version, about, long_about = None)]
struct Cli {
    /// Config file (default: $BCBOT_CONFIG_PATH, ./config.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server (default)
    Serve {
        /// Override the configured transport (http or stdio)
        #[arg(long)]
        transport: Option<Transport>,
    },
    /// Print the tool catalogue as JSON
    Tools,
    /// Load and validate the config, then print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { transport: None }) {
        Commands::Tools => {
            let tools = serde_json::to_string_pretty(&mcp::tool_definitions())?;
            println!("{}", tools);
            Ok(())
        }
        Commands::CheckConfig => {
            let config = logging::load_config(cli.config.as_deref())?;
            println!("{:#?}", config);
            Ok(())
        }
        Commands::Serve { transport } => {
            let mut config = logging::load_config(cli.config.as_deref())?;
            if let Some(transport) = transport {
                config.server.transport = transport;
            }
            let _guard = logging::init_logging(&config)?;
            serve(config).await
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    tracing::info!(
        transport = %config.server.transport,
        client = config.client.client_type(),
        event_capacity = config.events.capacity,
        "Configuration loaded"
    );

    let metrics_handle = match metrics::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics disabled");
            None
        }
    };

    let registry = ClientRegistry::default();
    let state = McpState::from_config(&config, &registry)?;

    match config.server.transport {
        Transport::Http => server::serve_http(&config, Arc::new(state), metrics_handle).await,
        Transport::Stdio => stdio::serve_stdio(&state).await,
    }
}

//! ferriclaw CLI - the main entry point.
//!
//! Commands:
//! - `onboard` - Initialize config & workspace
//! - `agent`   - Interactive chat or single-message mode
//! - `server`  - Start the headless API server runtime
//! - `status`  - Show configuration status

use clap::{Parser, Subcommand};

mod app;
mod commands;

#[derive(Parser)]
#[command(
    name = "ferriclaw",
    about = "ferriclaw - autonomous agent orchestration runtime",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and workspace
    Onboard,

    /// Chat with the agent
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session key to converse under
        #[arg(short, long, default_value = "cli:default")]
        session: String,
    },

    /// Start the headless API server (agent loop + heartbeat + REST)
    Server {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run()?,
        Commands::Agent { message, session } => commands::agent::run(message, session).await?,
        Commands::Server { port } => commands::server::run(port).await?,
        Commands::Status => commands::status::run()?,
    }

    Ok(())
}

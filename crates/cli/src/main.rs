//! ToolRelay CLI: the main entry point.
//!
//! Commands:
//! - `agent`    Interactive chat or single-message mode
//! - `gateway`  Start the HTTP request/response server
//! - `bot`      Run the Discord knowledge-sharing bot
//! - `tools`    List the tools advertised to the model
//! - `status`   Show configuration status

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "toolrelay",
    about = "ToolRelay: relay questions to an LLM that can call local tools",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging and show tool activity
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs (and `tools` output) as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the Discord bot (scheduled posts + mention replies)
    Bot,

    /// List the built-in tools
    Tools,

    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Agent { message } => commands::agent::run(message, cli.verbose).await?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Bot => commands::bot::run().await?,
        Commands::Tools => commands::tools::run(cli.json)?,
        Commands::Status => commands::status::run()?,
    }

    Ok(())
}

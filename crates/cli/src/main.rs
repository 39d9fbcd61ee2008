//! CarnaticGuru CLI: the main entry point.
//!
//! Commands:
//! - `init`    : Write the default config
//! - `chat`    : Interactive or single-message tutoring
//! - `history` : Show a stored session
//! - `users`   : List the configured learners
//! - `serve`   : Start the HTTP gateway

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "carnaticguru",
    about = "CarnaticGuru: lessons, raga information and swara practice patterns",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.carnaticguru/config.toml)
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Init,

    /// Chat with the tutor
    Chat {
        /// Learner id from the user directory
        #[arg(short, long, default_value = "learner_1")]
        user: String,

        /// Session id (defaults to "<user>_session")
        #[arg(short, long)]
        session: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Category tag shown to the router, e.g. "patterns"
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show the events of a session
    History {
        #[arg(short, long, default_value = "learner_1")]
        user: String,

        #[arg(short, long)]
        session: Option<String>,

        /// List the user's sessions instead
        #[arg(long)]
        list: bool,
    },

    /// List configured learners
    Users,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(carnaticguru_config::AppConfig::default_path);

    match cli.command {
        Commands::Init => commands::init::run(&config_path).await?,
        Commands::Chat {
            user,
            session,
            message,
            category,
        } => commands::chat::run(&config_path, user, session, message, category).await?,
        Commands::History {
            user,
            session,
            list,
        } => commands::history::run(&config_path, user, session, list).await?,
        Commands::Users => commands::users::run(&config_path)?,
        Commands::Serve { port } => commands::serve::run(&config_path, port).await?,
    }

    Ok(())
}

//! txscope CLI
//!
//! Drives the sample user flows against a fresh in-memory store and prints
//! the resulting users and lifecycle statistics.
//!
//! # Commands
//!
//! - `list` - List users, optionally seeding the store first
//! - `create-and-update` - Create a user and rename it, in one transaction
//! - `create-and-throw` - Create a user and fail, rolling the insert back
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::Session;
use tracing_subscriber::EnvFilter;

/// Runs the txscope sample flows.
#[derive(Parser)]
#[command(name = "txscope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Suspend at every store operation
    #[arg(global = true, long)]
    slow_io: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List users
    List {
        /// Number of users to create before listing
        #[arg(short, long, default_value = "0")]
        seed: usize,
    },

    /// Create a user and append "!" to its name, in one transaction
    CreateAndUpdate {
        /// Number of times to run the flow
        #[arg(short, long, default_value = "1")]
        times: usize,
    },

    /// Create a user and then fail, rolling the insert back
    CreateAndThrow,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let session = Session::open(cli.slow_io)?;

    let report = match cli.command {
        Commands::List { seed } => commands::list::run(&session, seed).await?,
        Commands::CreateAndUpdate { times } => {
            commands::create_and_update::run(&session, times).await?
        }
        Commands::CreateAndThrow => commands::create_and_throw::run(&session).await?,
        Commands::Version => {
            println!("txscope CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("txscope Core v{}", txscope_core::VERSION);
            return Ok(());
        }
    };

    match cli.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => report.print_text(),
    }

    Ok(())
}

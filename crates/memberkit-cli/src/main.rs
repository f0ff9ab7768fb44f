//! # memberkit CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;

/// memberkit: declared-member classes from the command line.
///
/// Builds classes from YAML schemas, prints their layout, and captures
/// instance state as JSON.
#[derive(Parser, Debug)]
#[command(name = "memberkit", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the layout of every class in a schema.
    Inspect(memberkit_cli::inspect::InspectArgs),
    /// Capture the state of a fresh or restored instance.
    Capture(memberkit_cli::capture::CaptureArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Inspect(args) => memberkit_cli::inspect::run(args),
        Commands::Capture(args) => memberkit_cli::capture::run(args),
    }
}

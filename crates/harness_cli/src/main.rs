//! Harness CLI - inspect and maintain ledger test run directories.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Run directory tools for ledger end-to-end tests", long_about = None)]
#[command(version)]
struct Cli {
    /// Run directory
    #[arg(short, long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a session.toml template
    Init {
        /// Network name
        #[arg(short, long, default_value = "devnet")]
        network: String,
        /// Overwrite an existing session.toml
        #[arg(long)]
        force: bool,
    },
    /// List what the store holds
    Show {
        /// What to list
        #[arg(value_enum)]
        what: ShowTarget,
    },
    /// Print the last rendered report
    Report {
        /// Print report.json instead of the text report
        #[arg(long)]
        json: bool,
    },
    /// Remove all artifacts, accounts and reports
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum ShowTarget {
    Accounts,
    Tokens,
    Addresses,
    Breadcrumbs,
}

fn main() -> Result<()> {
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { network, force } => commands::init::run(&cli.dir, &network, force),
        Commands::Show { what } => match what {
            ShowTarget::Accounts => commands::show::accounts(&cli.dir),
            ShowTarget::Tokens => commands::show::tokens(&cli.dir),
            ShowTarget::Addresses => commands::show::addresses(&cli.dir),
            ShowTarget::Breadcrumbs => commands::show::breadcrumbs(&cli.dir),
        },
        Commands::Report { json } => commands::report::run(&cli.dir, json),
        Commands::Clear => commands::clear::run(&cli.dir),
    }
}

// Desktop/tooling crate: unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod build_index;
mod check;
mod index;
mod sim_boot;
mod test;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Wiki reader storage development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the no_std crates and run clippy/fmt over the workspace
    Check,
    /// Run all tests (unit, integration with every feature, doc)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
    /// Build a WOM index from a tab-separated titles file
    BuildIndex {
        /// One article per line: `title<TAB>body`
        #[arg(long)]
        titles: PathBuf,
        /// Output index file (conventionally `pedia.wom`)
        #[arg(long)]
        out: PathBuf,
    },
    /// Look up a key in an index, optionally listing the entries after it
    Find {
        /// Index file; relative paths resolve under $WIKI_ROOT when it is
        /// set [default: $WIKI_ROOT/pedia.wom]
        #[arg(long)]
        index: Option<PathBuf>,
        key: String,
        /// Number of further entries to print after the match
        #[arg(long, default_value_t = 0)]
        then: usize,
    },
    /// Print the entries of an index in file order
    List {
        /// Index file; relative paths resolve under $WIKI_ROOT when it is
        /// set [default: $WIKI_ROOT/pedia.wom]
        #[arg(long)]
        index: Option<PathBuf>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the header of an index and verify its checksum
    Inspect {
        /// Index file; relative paths resolve under $WIKI_ROOT when it is
        /// set [default: $WIKI_ROOT/pedia.wom]
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Boot a simulated SD card holding the index and look up a key through it
    SimBoot {
        /// Index file; relative paths resolve under $WIKI_ROOT when it is
        /// set [default: $WIKI_ROOT/pedia.wom]
        #[arg(long)]
        index: Option<PathBuf>,
        key: String,
        /// Sector the index is placed at on the simulated card
        #[arg(long, default_value_t = sim_boot::DEFAULT_FIRST_SECTOR)]
        sector: u32,
        /// ACMD41 polls answered "busy" before the card reports ready
        #[arg(long, default_value_t = 3)]
        latency: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check => check::run(),
        Commands::Test { unit, integration } => test::run(unit, integration),
        Commands::BuildIndex { titles, out } => build_index::run(&titles, &out),
        Commands::Find { index, key, then } => index::find(index.as_deref(), &key, then),
        Commands::List { index, limit } => index::list(index.as_deref(), limit),
        Commands::Inspect { index } => index::inspect(index.as_deref()),
        Commands::SimBoot {
            index,
            key,
            sector,
            latency,
        } => sim_boot::run(index.as_deref(), &key, sector, latency),
    }
}

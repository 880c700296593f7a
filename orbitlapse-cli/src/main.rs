//! OrbitLapse CLI - Command-line interface
//!
//! Thin front end over the `orbitlapse` library: every command builds one
//! `ImageryLoader`, calls a single facade operation and prints the result.

mod commands;
mod error;

use std::process;

use clap::{Parser, Subcommand};
use orbitlapse::logging::init_logging;

use commands::common::{self, GlobalArgs, ProviderArg, SearchArgs};
use commands::config::ConfigCommands;
use commands::series::SeriesArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "orbitlapse")]
#[command(version, about = "Multi-year satellite image series for a single location")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List imagery sources and their availability
    Sources,

    /// Show the active source
    Status,

    /// Make another source active
    Switch {
        #[arg(value_enum)]
        provider: ProviderArg,
    },

    /// Search the active source for images
    Search(SearchArgs),

    /// Search, then download and save the clearest images
    Fetch {
        #[command(flatten)]
        search: SearchArgs,

        /// Number of images to save
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Output size in pixels (defaults to the configured resolution)
        #[arg(long)]
        resolution: Option<u32>,
    },

    /// Build a one-image-per-year series
    Series(SeriesArgs),

    /// List images saved by the active source
    List,

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = common::load_config(&cli.global)?;

    let filter = if cli.global.verbose { "debug" } else { "info" };
    let log_dir = config.data_root.join("logs");
    let _guard = init_logging(filter, Some(&log_dir));

    let open = |config| common::open_loader(&cli.global, config);
    match cli.command {
        Commands::Config(command) => {
            commands::config::run(command, cli.global.config.as_deref(), &config)
        }
        Commands::Sources => commands::sources::run_sources(&open(config)?),
        Commands::Status => commands::sources::run_status(&open(config)?),
        Commands::Switch { provider } => {
            commands::sources::run_switch(&mut open(config)?, provider.into())
        }
        Commands::Search(args) => commands::search::run_search(&mut open(config)?, &args),
        Commands::Fetch {
            search,
            count,
            resolution,
        } => commands::search::run_fetch(&mut open(config)?, &search, count, resolution),
        Commands::Series(args) => commands::series::run(&mut open(config)?, &args),
        Commands::List => commands::list::run(&open(config)?),
    }
}

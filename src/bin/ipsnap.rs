#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::{Parser, Subcommand};
use ipsnap::database::{ensure_data_dir, IpsnapDatabase};
use ipsnap::{IpsnapConfig, OutputFormat};
use tracing::Level;

mod commands;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.ipsnap/ipsnap.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the stage, current and backup tables of each dataset
    Setup(commands::setup::SetupArgs),

    /// Import snapshots into stage and activate them if clean
    Update(commands::update::UpdateArgs),

    /// Promote the stage of one dataset to current
    Activate(commands::update::ActivateArgs),

    /// Swap backup and current, undoing the last activation
    Restore(commands::restore::RestoreArgs),

    /// Show row counts of each generation
    Rowcount(commands::status::StatusArgs),

    /// Show row counts and release dates of each generation
    Status(commands::status::StatusArgs),

    /// Show the effective configuration
    Config,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level DEBUG or higher.
            .with_max_level(Level::DEBUG)
            .init();
    }

    let config = match IpsnapConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Commands::Config = cli.command {
        println!("{}", config.summary());
        return;
    }

    if let Err(e) = ensure_data_dir(&config.data_dir) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let db = match IpsnapDatabase::open_with_timeout(&config.sqlite_path(), config.busy_timeout()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database {}: {}", config.sqlite_path(), e);
            std::process::exit(1);
        }
    };

    let success = match cli.command {
        Commands::Setup(args) => commands::setup::run(&db, args, cli.format),
        Commands::Update(args) => commands::update::run(&db, &config, args, cli.format),
        Commands::Activate(args) => commands::update::run_activate(&db, args, cli.format),
        Commands::Restore(args) => commands::restore::run(&db, args, cli.format),
        Commands::Rowcount(args) => commands::status::run_rowcount(&db, args, cli.format),
        Commands::Status(args) => commands::status::run_status(&db, args, cli.format),
        Commands::Config => true,
    };

    if !success {
        std::process::exit(1);
    }
}

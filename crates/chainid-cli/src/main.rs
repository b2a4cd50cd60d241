use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::{BackendArg, PolicyArg};

/// chainid-db: operator tool for the chainid data store.
///
/// Inspect the schema version, preview and run migrations, and export
/// records as JSON.
#[derive(Parser)]
#[command(name = "chainid-db", version, about, long_about = None)]
struct Cli {
    /// TOML file with data store settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage backend. Overrides the config file.
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendArg>,

    /// Show debug logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the stored schema version.
    Version {
        /// Database file. Defaults to the config file's path.
        db: Option<PathBuf>,
    },

    /// Show schema version, pending steps and bucket sizes.
    Status {
        /// Database file. Defaults to the config file's path.
        db: Option<PathBuf>,
    },

    /// List the steps a migration would apply.
    Plan {
        /// Database file. Defaults to the config file's path.
        db: Option<PathBuf>,

        /// Version to migrate to. Defaults to the latest.
        #[arg(short, long)]
        target: Option<u32>,
    },

    /// Migrate the database.
    Migrate {
        /// Database file. Defaults to the config file's path.
        db: Option<PathBuf>,

        /// Version to migrate to. Defaults to the latest.
        #[arg(short, long)]
        target: Option<u32>,

        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,

        /// When to advance the version record.
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    /// Show the steps applied so far.
    History {
        /// Database file. Defaults to the config file's path.
        db: Option<PathBuf>,
    },

    /// Export records as JSON.
    Export {
        /// Database file. Defaults to the config file's path.
        db: Option<PathBuf>,

        /// Only export this bucket.
        #[arg(short, long)]
        bucket: Option<String>,
    },
}

impl Commands {
    fn take_db(&mut self) -> Option<PathBuf> {
        match self {
            Commands::Version { db }
            | Commands::Status { db }
            | Commands::Plan { db, .. }
            | Commands::Migrate { db, .. }
            | Commands::History { db }
            | Commands::Export { db, .. } => db.take(),
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

fn main() {
    let mut cli = Cli::parse();
    init_logging(cli.verbose);

    let db = cli.command.take_db();
    let result: Result<(), Box<dyn std::error::Error>> =
        config::resolve(cli.config.as_deref(), db, cli.backend).and_then(|mut config| {
            match cli.command {
                Commands::Version { .. } => commands::version(&config),
                Commands::Status { .. } => commands::status(&config),
                Commands::Plan { target, .. } => commands::plan(&config, target),
                Commands::Migrate {
                    target,
                    yes,
                    policy,
                    ..
                } => {
                    if let Some(policy) = policy {
                        config.migration.persist = policy.into();
                    }
                    commands::migrate(&config, target, yes)
                }
                Commands::History { .. } => commands::history(&config),
                Commands::Export { bucket, .. } => commands::export(&config, bucket.as_deref()),
            }
        });

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

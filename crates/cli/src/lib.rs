pub mod commands;
pub mod tables;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pricebook_core::config::{AppConfig, LogFormat};
use tracing_subscriber::EnvFilter;

use crate::commands::GlobalArgs;

#[derive(Debug, Parser)]
#[command(
    name = "pricebook",
    about = "Service quote calculator over delimited reference tables",
    long_about = "Build a quoting session from the UI config and reference tables in a data directory, apply field values, and print the priced quote as JSON.",
    after_help = "Examples:\n  pricebook quote --set country=Brazil --set currency=Local --set qty=2\n  pricebook fields --section sidebar\n  pricebook doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file (default: pricebook.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "DIR", help = "Directory with the reference CSVs")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply field assignments to a new session and print the priced quote")]
    Quote {
        #[arg(long = "set", value_name = "FIELD=VALUE", help = "Assign a field; repeatable")]
        assignments: Vec<String>,
    },
    #[command(about = "List schema fields with default values and current options")]
    Fields {
        #[arg(long, help = "Only fields whose section matches this name")]
        section: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, reference files, field schema and a default quote")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let args = GlobalArgs { config_path: cli.config, data_dir: cli.data_dir };
    init_logging(&args);

    let result = match cli.command {
        Command::Quote { assignments } => commands::quote::run(&args, &assignments),
        Command::Fields { section } => commands::fields::run(&args, section.as_deref()),
        Command::Config => commands::config::run(&args),
        Command::Doctor { json } => commands::doctor::run(&args, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays machine readable. `RUST_LOG` takes
/// precedence over the configured level.
fn init_logging(args: &GlobalArgs) {
    let config = args.load_config().unwrap_or_default();
    init_logging_with(&config);
}

pub fn init_logging_with(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.trim().to_ascii_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

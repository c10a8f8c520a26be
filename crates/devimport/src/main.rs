use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::check::{handle_check, CheckArgs};
use commands::formats::handle_formats;
use commands::import::{handle_import, ImportArgs};

/// Bulk import of LoRaWAN end devices into a device registry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log line format written to stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import every end device described in a file
    Import(ImportArgs),
    /// List the supported input formats
    Formats,
    /// Decode and validate a file without registering anything
    Check(CheckArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogFormat {
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Import(args) => handle_import(args).await,
        Command::Formats => handle_formats(),
        Command::Check(args) => handle_check(args),
    }
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

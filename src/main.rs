//! CLI entry point for hostfetch.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cli;
mod commands;

use cli::{AccountsCommand, Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries command output only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let context = commands::Context::load(args.config.as_deref(), args.accounts_file.as_deref())?;

    match args.command {
        Command::Resolve(resolve) => commands::run_resolve_command(&context, &resolve).await,
        Command::Get(get) => commands::run_get_command(&context, &get).await,
        Command::Providers => {
            commands::run_providers_command(context);
            Ok(())
        }
        Command::Accounts(AccountsCommand::Add { provider }) => {
            commands::run_accounts_add_command(context, &provider).await
        }
        Command::Accounts(AccountsCommand::List) => {
            commands::run_accounts_list_command(&context);
            Ok(())
        }
    }
}

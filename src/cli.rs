//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Resolve and fetch files from third-party file-hosting services.
///
/// Hostfetch turns hoster links (single files, folders, redirects) into
/// concrete files and downloads them through the best available provider
/// and account.
#[derive(Parser, Debug)]
#[command(name = "hostfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/hostfetch/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Accounts file (overrides the config file setting)
    #[arg(long, global = true, value_name = "PATH")]
    pub accounts_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve URLs and print one line per resulting file or failure
    Resolve(ResolveArgs),

    /// Resolve URLs, pick a retriever for each file and download it
    Get(GetArgs),

    /// List providers in priority order with their capabilities
    Providers,

    /// Manage hoster accounts
    #[command(subcommand)]
    Accounts(AccountsCommand),
}

#[derive(ClapArgs, Debug)]
pub struct ResolveArgs {
    /// URLs to resolve
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Maximum expansion depth for redirects and folders (1-64)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub max_depth: Option<u8>,

    /// Concurrent provider calls per wave (1-64)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub concurrency: Option<u8>,
}

#[derive(ClapArgs, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub resolve: ResolveArgs,

    /// Output directory (defaults to the config value, then the current directory)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Subcommand, Debug)]
pub enum AccountsCommand {
    /// Add an account for a provider (prompts for credentials)
    Add {
        /// Provider name as shown by `hostfetch providers`
        provider: String,
    },

    /// List stored accounts with secrets hidden
    List,
}

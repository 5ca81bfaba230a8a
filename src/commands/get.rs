//! Get command handler: resolve, route each file to a retriever, download.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use hostfetch_core::{Outcome, Resolution, RetrievalRouter, Transport};
use tracing::{info, warn};

use super::resolve::{format_terminal, resolve_all};
use super::{Context, headline};
use crate::cli::GetArgs;

pub async fn run_get_command(context: &Context, args: &GetArgs) -> Result<()> {
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| context.settings.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let show_progress = !args.no_progress && std::io::stderr().is_terminal();
    let transport = Transport::new(&context.settings.http)
        .context("failed to set up the download client")?
        .with_progress(show_progress);
    let router = RetrievalRouter::new(&context.registry);

    let (resolutions, rejected) = resolve_all(context, &args.resolve).await;
    let mut failed = rejected.len();
    let mut total = rejected.len();
    for (input, reason) in &rejected {
        println!("error\t{input}\tinvalid URL: {reason}");
    }

    for terminal in resolutions.iter().flat_map(Resolution::terminals) {
        total += 1;
        let Outcome::ResolvedTo(file) = terminal.outcome() else {
            failed += 1;
            println!("{}", format_terminal(terminal));
            continue;
        };

        let retrieval = match router.retrieve(file).await {
            Ok(retrieval) => retrieval,
            Err(error) => {
                warn!(file = file.name(), error = %error, "Retrieval failed");
                failed += 1;
                println!("error\t{}\t{}", file.url(), headline(&error));
                continue;
            }
        };

        match transport.fetch(&retrieval.request, file, &output_dir).await {
            Ok(outcome) => {
                let verified = outcome
                    .verified_with
                    .map(|algorithm| format!("\t{algorithm} ok"))
                    .unwrap_or_default();
                println!(
                    "saved\t{}\t{} bytes\t{}{verified}",
                    outcome.path.display(),
                    outcome.bytes,
                    retrieval.provider
                );
            }
            Err(error) => {
                warn!(file = file.name(), transient = error.is_transient(), error = %error, "Download failed");
                failed += 1;
                println!("error\t{}\t{}", file.url(), headline(&error));
            }
        }
    }

    info!(total, failed, output_dir = %output_dir.display(), "Get finished");
    if failed > 0 {
        bail!("{failed} of {total} items failed");
    }
    Ok(())
}

//! Resolve command handler: print one line per terminal outcome.

use anyhow::{Result, bail};
use hostfetch_core::{EngineOptions, Outcome, Resolution, ResolutionEngine};
use tracing::info;

use super::{Context, headline, parse_seeds};
use crate::cli::ResolveArgs;

pub async fn run_resolve_command(context: &Context, args: &ResolveArgs) -> Result<()> {
    let (resolutions, rejected) = resolve_all(context, args).await;

    let mut failed = rejected.len();
    for (input, reason) in &rejected {
        println!("error\t{input}\tinvalid URL: {reason}");
    }
    let mut total = rejected.len();
    for terminal in resolutions.iter().flat_map(Resolution::terminals) {
        total += 1;
        if !matches!(terminal.outcome(), Outcome::ResolvedTo(_)) {
            failed += 1;
        }
        println!("{}", format_terminal(terminal));
    }

    info!(total, failed, "Resolve finished");
    if failed > 0 {
        bail!("{failed} of {total} items could not be resolved");
    }
    Ok(())
}

/// Runs the engine over the parsed arguments, honoring per-command overrides.
pub(super) async fn resolve_all(
    context: &Context,
    args: &ResolveArgs,
) -> (Vec<Resolution>, Vec<(String, String)>) {
    let (seeds, rejected) = parse_seeds(&args.urls);
    let engine = ResolutionEngine::new(&context.registry, engine_options(context, args));
    let resolutions = if seeds.is_empty() {
        Vec::new()
    } else {
        engine.resolve(seeds).await
    };
    (resolutions, rejected)
}

fn engine_options(context: &Context, args: &ResolveArgs) -> EngineOptions {
    let mut options = context.settings.engine;
    if let Some(max_depth) = args.max_depth {
        options.max_depth = usize::from(max_depth);
    }
    if let Some(concurrency) = args.concurrency {
        options.concurrency = usize::from(concurrency);
    }
    options
}

/// Tab-separated line for a terminal node: label, URL, then details.
pub(super) fn format_terminal(node: &Resolution) -> String {
    match node.outcome() {
        Outcome::ResolvedTo(file) => {
            let mut line = format!(
                "resolved\t{}\t{}\t{}\t{}",
                file.url(),
                file.name(),
                file.size(),
                file.origin()
            );
            if let Some(checksum) = file.checksum() {
                line.push_str(&format!("\t{}:{}", checksum.algorithm().name(), checksum.to_hex()));
            }
            line
        }
        Outcome::Deadend(normalized) => {
            format!("deadend\t{}", normalized.as_ref().unwrap_or(node.url()))
        }
        Outcome::Errs(normalized, error) => format!(
            "error\t{}\t{}",
            normalized.as_ref().unwrap_or(node.url()),
            headline(error)
        ),
        other => format!("{}\t{}", other.label(), node.url()),
    }
}

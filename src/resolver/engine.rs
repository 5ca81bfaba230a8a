//! Wave-based resolution engine.
//!
//! Each wave classifies every pending request, dispatches `Single` requests
//! individually and `Multi` requests as one batch per provider, and runs
//! those calls concurrently (bounded). `Yields` and `Bundles` outcomes spawn
//! child requests for the next wave until every leaf is terminal.

use std::collections::BTreeMap;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use url::Url;

use crate::provider::{Classification, ProviderRegistry};

use super::{File, Outcome, Request, ResolveError, Resolvability, Settled};

/// Default limit on yields/bundles nesting.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Default number of provider calls in flight per wave.
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 4;

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Children deeper than this settle as [`ResolveError::TooDeep`].
    pub max_depth: usize,
    /// Provider calls in flight per wave.
    pub concurrency: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            concurrency: DEFAULT_RESOLVE_CONCURRENCY,
        }
    }
}

/// Resolution tree for one URL.
#[derive(Debug, Clone)]
pub struct Resolution {
    url: Url,
    provider: Option<String>,
    outcome: Outcome,
    children: Vec<Resolution>,
}

impl Resolution {
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Provider that settled this node; `None` for unsupported URLs and guard errors.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Nodes spawned by a `Yields` (one) or `Bundles` (many) outcome.
    #[must_use]
    pub fn children(&self) -> &[Resolution] {
        &self.children
    }

    /// Terminal leaves of this tree, depth first.
    #[must_use]
    pub fn terminals(&self) -> Vec<&Resolution> {
        if self.outcome.is_terminal() {
            return vec![self];
        }
        self.children
            .iter()
            .flat_map(Resolution::terminals)
            .collect()
    }

    /// Files among the terminal leaves.
    #[must_use]
    pub fn files(&self) -> Vec<&File> {
        self.terminals()
            .into_iter()
            .filter_map(|node| match node.outcome() {
                Outcome::ResolvedTo(file) => Some(file),
                _ => None,
            })
            .collect()
    }
}

struct Node {
    url: Url,
    provider: Option<String>,
    outcome: Option<Outcome>,
    children: Vec<usize>,
}

impl Node {
    fn new(url: Url) -> Self {
        Self {
            url,
            provider: None,
            outcome: None,
            children: Vec::new(),
        }
    }
}

enum Job<'a> {
    Single {
        classification: Classification<'a>,
        node: usize,
        request: Request,
    },
    Batch {
        classification: Classification<'a>,
        items: Vec<(usize, Request)>,
    },
}

/// A settled node: arena index, settling provider, originating request, outcome.
type Step = (usize, Option<String>, Request, Outcome);

/// Drives requests through a provider registry.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionEngine<'a> {
    registry: &'a ProviderRegistry,
    options: EngineOptions,
}

impl<'a> ResolutionEngine<'a> {
    #[must_use]
    pub fn new(registry: &'a ProviderRegistry, options: EngineOptions) -> Self {
        Self { registry, options }
    }

    #[must_use]
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Resolves every seed URL to a tree whose leaves are terminal.
    ///
    /// Never fails as a whole: per-URL failures are `Errs` leaves.
    #[tracing::instrument(skip(self, seeds), fields(seed_count = seeds.len()))]
    pub async fn resolve(&self, seeds: Vec<Url>) -> Vec<Resolution> {
        let mut arena: Vec<Node> = Vec::with_capacity(seeds.len());
        let mut roots = Vec::with_capacity(seeds.len());
        let mut pending = Vec::with_capacity(seeds.len());
        for url in seeds {
            let id = arena.len();
            arena.push(Node::new(url.clone()));
            roots.push(id);
            pending.push((id, Request::new(url)));
        }

        let mut wave = 0usize;
        while !pending.is_empty() {
            wave += 1;
            debug!(wave, requests = pending.len(), "Starting resolution wave");
            let steps = self.run_wave(std::mem::take(&mut pending)).await;
            for (id, provider, request, outcome) in steps {
                match &outcome {
                    Outcome::Yields(url) => {
                        let child = self.spawn_child(&mut arena, id, &request, url.clone());
                        pending.extend(child);
                    }
                    Outcome::Bundles(urls) => {
                        for url in urls {
                            let child = self.spawn_child(&mut arena, id, &request, url.clone());
                            pending.extend(child);
                        }
                    }
                    _ => {}
                }
                let node = &mut arena[id];
                node.provider = provider;
                node.outcome = Some(outcome);
            }
        }

        info!(waves = wave, nodes = arena.len(), "Resolution complete");
        roots
            .into_iter()
            .map(|id| assemble(&mut arena, id))
            .collect()
    }

    /// Adds a child node for `url`; returns its request unless a guard settled it.
    fn spawn_child(
        &self,
        arena: &mut Vec<Node>,
        parent: usize,
        request: &Request,
        url: Url,
    ) -> Option<(usize, Request)> {
        let id = arena.len();
        arena.push(Node::new(url.clone()));
        arena[parent].children.push(id);

        if request.has_visited(&url) {
            warn!(url = %url, "Redirect cycle detected");
            arena[id].outcome = Some(Outcome::Errs(None, ResolveError::redirect_cycle(url.as_str())));
            return None;
        }
        if request.depth() + 1 > self.options.max_depth {
            warn!(url = %url, max_depth = self.options.max_depth, "Maximum resolution depth exceeded");
            arena[id].outcome = Some(Outcome::Errs(
                None,
                ResolveError::too_deep(url.as_str(), self.options.max_depth),
            ));
            return None;
        }
        Some((id, request.child(url)))
    }

    async fn run_wave(&self, requests: Vec<(usize, Request)>) -> Vec<Step> {
        let mut steps: Vec<Step> = Vec::new();
        let mut jobs: Vec<Job<'a>> = Vec::new();
        let mut batches: BTreeMap<usize, (Classification<'a>, Vec<(usize, Request)>)> =
            BTreeMap::new();

        for (node, request) in requests {
            match self.registry.classify(request.url()) {
                None => {
                    debug!(url = %request.url(), "No provider claims URL");
                    let error = ResolveError::unsupported(request.url().as_str());
                    steps.push((node, None, request, Outcome::Errs(None, error)));
                }
                Some(classification) if classification.tier == Resolvability::Single => {
                    jobs.push(Job::Single {
                        classification,
                        node,
                        request,
                    });
                }
                Some(classification) => {
                    batches
                        .entry(classification.index)
                        .or_insert_with(|| (classification, Vec::new()))
                        .1
                        .push((node, request));
                }
            }
        }
        jobs.extend(
            batches
                .into_values()
                .map(|(classification, items)| Job::Batch {
                    classification,
                    items,
                }),
        );

        let results: Vec<Vec<Step>> = stream::iter(jobs)
            .map(run_job)
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;
        steps.extend(results.into_iter().flatten());
        steps
    }
}

async fn run_job(job: Job<'_>) -> Vec<Step> {
    match job {
        Job::Single {
            classification,
            node,
            request,
        } => {
            let name = classification.provider.name().to_string();
            debug!(provider = %name, url = %request.url(), "Resolving single request");
            let outcome = match classification.resolver.resolve_one(request.clone()).await {
                Ok(settled) if settled.url() == request.url() => settled.into_parts().1,
                Ok(settled) => {
                    warn!(provider = %name, expected = %request.url(), got = %settled.url(), "Provider settled a different request");
                    Outcome::Errs(
                        None,
                        ResolveError::misaligned_batch(&name, "settled a different URL"),
                    )
                }
                Err(error) => Outcome::Errs(None, error),
            };
            vec![(node, Some(name), request, outcome)]
        }
        Job::Batch {
            classification,
            items,
        } => {
            let name = classification.provider.name().to_string();
            let (nodes, requests): (Vec<usize>, Vec<Request>) = items.into_iter().unzip();
            debug!(provider = %name, size = requests.len(), "Resolving batch");
            let outcomes: Vec<Outcome> =
                match classification.resolver.resolve_many(requests.clone()).await {
                    Ok(settled) => match alignment_error(&requests, &settled) {
                        None => settled
                            .into_iter()
                            .map(|item| item.into_parts().1)
                            .collect(),
                        Some(reason) => {
                            warn!(provider = %name, reason = %reason, "Misaligned batch");
                            let error = ResolveError::misaligned_batch(&name, reason);
                            requests
                                .iter()
                                .map(|_| Outcome::Errs(None, error.clone()))
                                .collect()
                        }
                    },
                    Err(error) => {
                        warn!(provider = %name, error = %error, "Batch failed as a whole");
                        requests
                            .iter()
                            .map(|_| Outcome::Errs(None, error.clone()))
                            .collect()
                    }
                };
            nodes
                .into_iter()
                .zip(requests)
                .zip(outcomes)
                .map(|((node, request), outcome)| (node, Some(name.clone()), request, outcome))
                .collect()
        }
    }
}

/// Describes how `settled` fails to line up with `requests`, if it does.
fn alignment_error(requests: &[Request], settled: &[Settled]) -> Option<String> {
    if requests.len() != settled.len() {
        return Some(format!(
            "{} results for {} requests",
            settled.len(),
            requests.len()
        ));
    }
    requests
        .iter()
        .zip(settled)
        .position(|(request, item)| request.url() != item.url())
        .map(|index| format!("result {index} is for a different URL"))
}

fn assemble(arena: &mut [Node], id: usize) -> Resolution {
    let child_ids = std::mem::take(&mut arena[id].children);
    let children = child_ids
        .into_iter()
        .map(|child| assemble(arena, child))
        .collect();
    let node = &mut arena[id];
    let outcome = node.outcome.take().unwrap_or_else(|| {
        Outcome::Errs(
            None,
            ResolveError::resolution_failed("engine", node.url.as_str(), "request was never settled"),
        )
    });
    Resolution {
        url: node.url.clone(),
        provider: node.provider.take(),
        outcome,
        children,
    }
}

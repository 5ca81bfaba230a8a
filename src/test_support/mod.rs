//! Mock providers shared by unit tests.

#![allow(clippy::unwrap_used)]

pub mod socket_guard;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use crate::account::{AccountError, Field, Prompter};
use crate::config::Settings;
use crate::provider::{ConfigureError, Configured, Provider};
use crate::resolver::{
    File, FileSize, Request, ResolveError, Resolvability, Resolver, Settled,
};
use crate::retrieve::{FetchRequest, RetrieveError, Retriever};

/// What a [`MockResolver`] does with one URL.
#[derive(Debug, Clone)]
pub enum Route {
    File(String),
    Deadend,
    Yields(String),
    Bundles(Vec<String>),
    Fail,
}

pub struct MockResolver {
    domain: Option<&'static str>,
    tier: Resolvability,
    routes: HashMap<String, Route>,
    calls: Arc<AtomicUsize>,
    batches: Arc<Mutex<Vec<usize>>>,
    misaligned: bool,
    failing_batch: bool,
}

impl MockResolver {
    /// Claims URLs whose host is exactly `domain`.
    pub fn new(domain: &'static str, tier: Resolvability) -> Self {
        Self {
            domain: Some(domain),
            tier,
            routes: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            batches: Arc::new(Mutex::new(Vec::new())),
            misaligned: false,
            failing_batch: false,
        }
    }

    /// Claims every URL.
    pub fn any(tier: Resolvability) -> Self {
        Self {
            domain: None,
            ..Self::new("", tier)
        }
    }

    pub fn route(mut self, url: &str, route: Route) -> Self {
        self.routes.insert(url.to_string(), route);
        self
    }

    /// Returns batch results in reverse order.
    pub fn misaligned(mut self) -> Self {
        self.misaligned = true;
        self
    }

    /// Fails every batch as a whole.
    pub fn failing_batch(mut self) -> Self {
        self.failing_batch = true;
        self
    }

    /// Counter of resolve calls (one per `resolve_one`, one per batch).
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Sizes of every batch received.
    pub fn batches(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.batches)
    }

    fn settle(&self, request: Request) -> Settled {
        match self.routes.get(request.url().as_str()).cloned() {
            Some(Route::File(name)) => {
                let file = File::new("mock", request.url().clone(), name, FileSize::Known(1));
                request.resolves_to(file)
            }
            Some(Route::Deadend) => request.deadend(None),
            Some(Route::Yields(url)) => request.yields(Url::parse(&url).unwrap()),
            Some(Route::Bundles(urls)) => request.bundles(
                urls.iter().map(|url| Url::parse(url).unwrap()).collect(),
            ),
            Some(Route::Fail) => {
                let url = request.url().to_string();
                request.errs(None, ResolveError::resolution_failed("mock", &url, "route failure"))
            }
            None => {
                let name = request
                    .url()
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|segment| !segment.is_empty())
                    .unwrap_or("index")
                    .to_string();
                let file = File::new("mock", request.url().clone(), name, FileSize::Unknown);
                request.resolves_to(file)
            }
        }
    }
}

#[async_trait]
impl Resolver for MockResolver {
    fn can_resolve(&self, url: &Url) -> Resolvability {
        match self.domain {
            None => self.tier,
            Some(domain) if url.host_str() == Some(domain) => self.tier,
            Some(_) => Resolvability::Next,
        }
    }

    async fn resolve_one(&self, request: Request) -> Result<Settled, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.settle(request))
    }

    async fn resolve_many(&self, requests: Vec<Request>) -> Result<Vec<Settled>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(requests.len());
        tokio::task::yield_now().await;
        if self.failing_batch {
            return Err(ResolveError::http("mock", "batch", 503));
        }
        let mut settled: Vec<Settled> = requests.into_iter().map(|r| self.settle(r)).collect();
        if self.misaligned {
            settled.reverse();
        }
        Ok(settled)
    }
}

pub struct MockRetriever {
    provider: &'static str,
    weight: u32,
    needs_account: bool,
}

#[async_trait]
impl Retriever for MockRetriever {
    fn can_retrieve(&self, _file: &File) -> u32 {
        self.weight
    }

    async fn retrieve(&self, file: &File) -> Result<FetchRequest, RetrieveError> {
        if self.needs_account {
            return Err(RetrieveError::no_usable_account(self.provider));
        }
        Ok(FetchRequest::get(file.url().clone()))
    }
}

pub struct MockConfigured {
    fail: bool,
}

impl Configured for MockConfigured {
    fn configure(&mut self, _settings: &Settings) -> Result<(), ConfigureError> {
        if self.fail {
            return Err(ConfigureError::InvalidOption {
                provider: "mock".to_string(),
                key: "x".to_string(),
                reason: "rejected".to_string(),
            });
        }
        Ok(())
    }
}

pub struct MockProvider {
    name: &'static str,
    resolver: Option<MockResolver>,
    retriever: Option<MockRetriever>,
    configured: Option<MockConfigured>,
}

impl MockProvider {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            resolver: None,
            retriever: None,
            configured: None,
        }
    }

    pub fn with_resolver(mut self, resolver: MockResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_retriever(mut self, weight: u32) -> Self {
        self.retriever = Some(MockRetriever {
            provider: self.name,
            weight,
            needs_account: false,
        });
        self
    }

    /// A retriever that bids `weight` but holds no usable account.
    pub fn with_account_bound_retriever(mut self, weight: u32) -> Self {
        self.retriever = Some(MockRetriever {
            provider: self.name,
            weight,
            needs_account: true,
        });
        self
    }

    pub fn configurable(mut self) -> Self {
        self.configured = Some(MockConfigured { fail: false });
        self
    }

    pub fn configurable_failing(mut self) -> Self {
        self.configured = Some(MockConfigured { fail: true });
        self
    }
}

impl Provider for MockProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn resolver(&self) -> Option<&dyn Resolver> {
        self.resolver.as_ref().map(|r| r as &dyn Resolver)
    }

    fn retriever(&self) -> Option<&dyn Retriever> {
        self.retriever.as_ref().map(|r| r as &dyn Retriever)
    }

    fn configured(&mut self) -> Option<&mut dyn Configured> {
        self.configured.as_mut().map(|c| c as &mut dyn Configured)
    }
}

/// Answers prompts from a fixed map.
pub struct MockPrompter {
    answers: HashMap<String, String>,
}

impl MockPrompter {
    pub fn new(answers: &[(&str, &str)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

impl Prompter for MockPrompter {
    fn prompt(&self, fields: &[Field]) -> Result<HashMap<String, String>, AccountError> {
        Ok(fields
            .iter()
            .filter_map(|field| {
                self.answers
                    .get(field.key)
                    .cloned()
                    .or_else(|| field.default.clone())
                    .map(|value| (field.key.to_string(), value))
            })
            .collect())
    }
}

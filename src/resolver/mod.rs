//! URL resolution: the request state machine and the engine that drives it.
//!
//! Providers expose a [`Resolver`] that classifies URLs into a
//! [`Resolvability`] tier and settles [`Request`]s one at a time (`Single`)
//! or in index-aligned batches (`Multi`). The [`ResolutionEngine`] feeds
//! requests through the provider registry in waves, follows `Yields` and
//! `Bundles` outcomes, and returns one [`Resolution`] tree per seed URL.
//!
//! # Architecture
//!
//! - [`Resolver`] - Async trait that provider resolvers implement
//! - [`Request`] / [`Settled`] - Pending request and its immutable outcome
//! - [`ResolutionEngine`] - Wave-based driver with depth and cycle guards
//! - [`File`] - Concrete file produced by resolution
//!
//! # Example
//!
//! ```no_run
//! use hostfetch_core::{build_default_registry, HttpSettings, ResolutionEngine, EngineOptions};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = build_default_registry(&HttpSettings::default());
//! let engine = ResolutionEngine::new(&registry, EngineOptions::default());
//! let seeds = vec![Url::parse("https://example.com/file.zip")?];
//! for resolution in engine.resolve(seeds).await {
//!     for file in resolution.files() {
//!         println!("{} ({})", file.name(), file.size());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod file;
mod request;
pub(crate) mod utils;

pub use engine::{
    DEFAULT_MAX_DEPTH, DEFAULT_RESOLVE_CONCURRENCY, EngineOptions, Resolution, ResolutionEngine,
};
pub use error::ResolveError;
pub use file::{Checksum, File, FileSize, HashAlgorithm};
pub use request::{Outcome, Request, Settled};

use std::fmt;

use async_trait::async_trait;
use url::Url;

/// How a resolver can handle a URL.
///
/// Registry order is the tie-break: the first provider answering `Single`
/// or `Multi` wins the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolvability {
    /// Resolved one request at a time via [`Resolver::resolve_one`].
    Single,
    /// Batched with other requests for the same provider via [`Resolver::resolve_many`].
    Multi,
    /// Not handled; ask the next provider.
    Next,
}

impl fmt::Display for Resolvability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::Multi => "multi",
            Self::Next => "next",
        })
    }
}

/// Resolution capability of a provider.
///
/// A resolver only needs to implement the method matching the tiers its
/// classifier returns; the other keeps its default, which reports
/// [`ResolveError::UnsupportedTier`].
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Classifies a URL. Must not perform I/O.
    fn can_resolve(&self, url: &Url) -> Resolvability;

    /// Settles one request.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the call fails as a whole. Per-item
    /// failures should be expressed as [`Request::errs`] instead.
    async fn resolve_one(&self, request: Request) -> Result<Settled, ResolveError> {
        let _ = request;
        Err(ResolveError::unsupported_tier("resolver", "single"))
    }

    /// Settles a batch of requests.
    ///
    /// The output must have the same length and order as `requests`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the batch fails as a whole; every
    /// item is then settled with that error.
    async fn resolve_many(&self, requests: Vec<Request>) -> Result<Vec<Settled>, ResolveError> {
        let _ = requests;
        Err(ResolveError::unsupported_tier("resolver", "multi"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct SingleOnly;

    #[async_trait]
    impl Resolver for SingleOnly {
        fn can_resolve(&self, _url: &Url) -> Resolvability {
            Resolvability::Single
        }

        async fn resolve_one(&self, request: Request) -> Result<Settled, ResolveError> {
            Ok(request.deadend(None))
        }
    }

    #[tokio::test]
    async fn test_default_resolve_many_reports_unsupported_tier() {
        let resolver = SingleOnly;
        let request = Request::new(Url::parse("https://a.example/").unwrap());
        let result = resolver.resolve_many(vec![request]).await;
        assert!(matches!(
            result,
            Err(ResolveError::UnsupportedTier { tier: "multi", .. })
        ));
    }

    #[test]
    fn test_resolvability_display() {
        assert_eq!(Resolvability::Single.to_string(), "single");
        assert_eq!(Resolvability::Multi.to_string(), "multi");
        assert_eq!(Resolvability::Next.to_string(), "next");
    }
}

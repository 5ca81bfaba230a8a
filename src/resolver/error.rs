//! Error types for resolver operations.
//!
//! This module defines structured errors for URL resolution,
//! following the What/Why/Fix pattern used across the project.

use thiserror::Error;

use crate::session::SessionError;

/// Errors that can occur while resolving a URL.
///
/// Cloneable so a batch-wide failure can settle every item of the batch
/// with the same error.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No registered provider claims the URL
    #[error("unsupported URL '{url}': no registered provider can resolve it\n  Suggestion: Run `hostfetch providers` to see supported hosters")]
    Unsupported {
        /// The URL no provider claimed
        url: String,
    },

    /// A provider failed to resolve the URL
    #[error("resolution failed for '{url}' ({provider}): {reason}\n  Suggestion: {suggestion}")]
    ResolutionFailed {
        /// Provider that attempted the resolution
        provider: String,
        /// The URL being resolved
        url: String,
        /// Why resolution failed
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// The hoster answered with an unexpected HTTP status
    #[error("{provider} returned HTTP {status} for '{url}'\n  Suggestion: The hoster may be down; try again later")]
    Http {
        /// Provider that issued the request
        provider: String,
        /// The requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The request never produced a response
    #[error("network error contacting {provider} for '{url}': {message}\n  Suggestion: Check your connection and proxy settings")]
    Network {
        /// Provider that issued the request
        provider: String,
        /// The requested URL
        url: String,
        /// Transport error message
        message: String,
    },

    /// The hoster's response could not be understood
    #[error("malformed response from {provider}: {reason}\n  Suggestion: The hoster API may have changed; please report this")]
    Protocol {
        /// Provider whose response was malformed
        provider: String,
        /// What was wrong with the response
        reason: String,
    },

    /// Authorization was rejected after the single permitted re-login
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Expansion went deeper than the configured limit
    #[error("resolution of '{url}' exceeded maximum depth {max_depth}\n  Suggestion: Raise `max_depth` in the config file if the nesting is legitimate")]
    TooDeep {
        /// The URL that would have exceeded the limit
        url: String,
        /// Configured maximum depth
        max_depth: usize,
    },

    /// A child URL already appeared in its own lineage
    #[error("redirect cycle detected at '{url}'\n  Suggestion: The hoster is redirecting in a loop; report the link")]
    RedirectCycle {
        /// The URL that closed the cycle
        url: String,
    },

    /// A provider returned results that do not line up with its inputs
    #[error("{provider} returned a misaligned batch ({reason})\n  Suggestion: This is a provider bug; please report it")]
    MisalignedBatch {
        /// Provider that violated the alignment contract
        provider: String,
        /// What did not line up
        reason: String,
    },

    /// The provider was dispatched with a tier it does not implement
    #[error("{provider} does not implement {tier} resolution\n  Suggestion: This is a provider bug; its classifier and resolver disagree")]
    UnsupportedTier {
        /// Provider name
        provider: String,
        /// The tier that is not implemented
        tier: &'static str,
    },

    /// The provider needs an account but none is configured
    #[error("{provider} requires an account to resolve links\n  Suggestion: Run `hostfetch accounts add {provider}`")]
    MissingCredentials {
        /// Provider name
        provider: String,
    },

    /// The provider needs a configuration value that is absent
    #[error("{provider} requires the `{key}` option\n  Suggestion: Add `{key}` under [providers.\"{provider}\"] in the config file")]
    MissingConfiguration {
        /// Provider name
        provider: String,
        /// Missing option key
        key: String,
    },
}

impl ResolveError {
    /// Creates an `Unsupported` error.
    #[must_use]
    pub fn unsupported(url: &str) -> Self {
        Self::Unsupported {
            url: url.to_string(),
        }
    }

    /// Creates a `ResolutionFailed` error.
    #[must_use]
    pub fn resolution_failed(provider: &str, url: &str, reason: &str) -> Self {
        Self::ResolutionFailed {
            provider: provider.to_string(),
            url: url.to_string(),
            reason: reason.to_string(),
            suggestion: "Check the link and try again".to_string(),
        }
    }

    /// Creates an `Http` error for an unexpected status.
    #[must_use]
    pub fn http(provider: &str, url: &str, status: u16) -> Self {
        Self::Http {
            provider: provider.to_string(),
            url: url.to_string(),
            status,
        }
    }

    /// Creates a `Network` error from a transport failure.
    #[must_use]
    pub fn network(provider: &str, url: &str, error: &reqwest::Error) -> Self {
        Self::Network {
            provider: provider.to_string(),
            url: url.to_string(),
            message: error.to_string(),
        }
    }

    /// Creates a `Protocol` error.
    #[must_use]
    pub fn protocol(provider: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `TooDeep` error.
    #[must_use]
    pub fn too_deep(url: &str, max_depth: usize) -> Self {
        Self::TooDeep {
            url: url.to_string(),
            max_depth,
        }
    }

    /// Creates a `RedirectCycle` error.
    #[must_use]
    pub fn redirect_cycle(url: &str) -> Self {
        Self::RedirectCycle {
            url: url.to_string(),
        }
    }

    /// Creates a `MisalignedBatch` error.
    #[must_use]
    pub fn misaligned_batch(provider: &str, reason: impl Into<String>) -> Self {
        Self::MisalignedBatch {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `UnsupportedTier` error.
    #[must_use]
    pub fn unsupported_tier(provider: &str, tier: &'static str) -> Self {
        Self::UnsupportedTier {
            provider: provider.to_string(),
            tier,
        }
    }

    /// Creates a `MissingCredentials` error.
    #[must_use]
    pub fn missing_credentials(provider: &str) -> Self {
        Self::MissingCredentials {
            provider: provider.to_string(),
        }
    }

    /// Creates a `MissingConfiguration` error.
    #[must_use]
    pub fn missing_configuration(provider: &str, key: &str) -> Self {
        Self::MissingConfiguration {
            provider: provider.to_string(),
            key: key.to_string(),
        }
    }
}

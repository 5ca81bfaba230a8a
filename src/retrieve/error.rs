//! Error types for retrieval routing and provider retrievers.

use thiserror::Error;

use crate::session::SessionError;

/// Errors that can occur while turning a resolved file into a fetch request.
#[derive(Debug, Clone, Error)]
pub enum RetrieveError {
    /// No provider bid on the file
    #[error("no provider can retrieve '{file}'\n  Suggestion: Add an account for a provider that supports this hoster")]
    NoRetriever {
        /// Name of the file nobody bid on
        file: String,
    },

    /// The selected provider needs an account and has no usable one
    #[error("{provider} has no usable account (premium and not expired)\n  Suggestion: Run `hostfetch accounts add {provider}` or renew the existing account")]
    NoUsableAccount {
        /// Provider name
        provider: String,
    },

    /// The hoster refused the account or link
    #[error("{provider} refused the download: {reason}\n  Suggestion: Check that the account is active and premium")]
    Rejected {
        /// Provider name
        provider: String,
        /// Why the hoster refused
        reason: String,
    },

    /// The hoster answered with an unexpected HTTP status
    #[error("{provider} returned HTTP {status} for '{url}'\n  Suggestion: The hoster may be down; try again later")]
    Http {
        /// Provider name
        provider: String,
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The request never produced a response
    #[error("network error contacting {provider} for '{url}': {message}\n  Suggestion: Check your connection and proxy settings")]
    Network {
        /// Provider name
        provider: String,
        /// Requested URL
        url: String,
        /// Transport error message
        message: String,
    },

    /// The hoster's response could not be understood
    #[error("malformed response from {provider}: {reason}\n  Suggestion: The hoster API may have changed; please report this")]
    Protocol {
        /// Provider name
        provider: String,
        /// What was wrong with the response
        reason: String,
    },

    /// The hoster API reported an error code
    #[error("{provider} API error {code}: {message}")]
    Api {
        /// Provider name
        provider: String,
        /// Hoster-specific error code
        code: i64,
        /// Human-readable message for the code
        message: String,
    },

    /// Authorization was rejected after the single permitted re-login
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl RetrieveError {
    /// Creates a `NoRetriever` error.
    #[must_use]
    pub fn no_retriever(file: &str) -> Self {
        Self::NoRetriever {
            file: file.to_string(),
        }
    }

    /// Creates a `NoUsableAccount` error.
    #[must_use]
    pub fn no_usable_account(provider: &str) -> Self {
        Self::NoUsableAccount {
            provider: provider.to_string(),
        }
    }

    /// Creates a `Rejected` error.
    #[must_use]
    pub fn rejected(provider: &str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `Http` error.
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

    /// Creates an `Api` error.
    #[must_use]
    pub fn api(provider: &str, code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.to_string(),
            code,
            message: message.into(),
        }
    }
}

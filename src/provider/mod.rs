//! Provider capability protocol.
//!
//! A provider integrates one file-hosting service. It always has a name and
//! may expose any subset of four capabilities through optional accessors:
//! resolution, retrieval, account provisioning and configuration. Callers
//! query a capability and skip providers that return `None`.

mod registry;

pub use registry::{Classification, ProviderRegistry};

use thiserror::Error;

use crate::account::Accountant;
use crate::config::Settings;
use crate::resolver::Resolver;
use crate::retrieve::Retriever;

/// A pluggable integration for one file-hosting service.
pub trait Provider: Send + Sync {
    /// Unique provider name (usually the hoster's domain).
    fn name(&self) -> &str;

    fn resolver(&self) -> Option<&dyn Resolver> {
        None
    }

    fn retriever(&self) -> Option<&dyn Retriever> {
        None
    }

    fn accountant(&self) -> Option<&dyn Accountant> {
        None
    }

    fn configured(&mut self) -> Option<&mut dyn Configured> {
        None
    }
}

/// Capability for providers that take global settings (accounts, options).
pub trait Configured {
    /// Applies settings. Called once after registry construction.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigureError`] when the provider's accounts or options are invalid.
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigureError>;
}

/// Which capabilities a provider exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub resolve: bool,
    pub retrieve: bool,
    pub accounts: bool,
    pub configure: bool,
}

impl Capabilities {
    /// Queries every capability accessor of `provider`.
    #[must_use]
    pub fn of(provider: &mut dyn Provider) -> Self {
        Self {
            resolve: provider.resolver().is_some(),
            retrieve: provider.retriever().is_some(),
            accounts: provider.accountant().is_some(),
            configure: provider.configured().is_some(),
        }
    }

    /// Capability names, in a fixed order, for display.
    #[must_use]
    pub fn labels(self) -> Vec<&'static str> {
        [
            (self.resolve, "resolve"),
            (self.retrieve, "retrieve"),
            (self.accounts, "accounts"),
            (self.configure, "configure"),
        ]
        .into_iter()
        .filter_map(|(enabled, label)| enabled.then_some(label))
        .collect()
    }
}

/// Errors raised while configuring a provider.
#[derive(Debug, Error)]
pub enum ConfigureError {
    /// A persisted account record could not be decoded
    #[error("invalid {provider} account record #{index}: {reason}\n  Suggestion: Fix or remove the entry in the accounts file")]
    InvalidAccount {
        /// Provider name
        provider: String,
        /// Position of the record in the accounts file
        index: usize,
        /// Decode failure
        reason: String,
    },

    /// A provider option has an unusable value
    #[error("invalid option `{key}` for {provider}: {reason}\n  Suggestion: Check [providers.\"{provider}\"] in the config file")]
    InvalidOption {
        /// Provider name
        provider: String,
        /// Option key
        key: String,
        /// Why the value is unusable
        reason: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct NameOnly;

    impl Provider for NameOnly {
        fn name(&self) -> &str {
            "name-only"
        }
    }

    #[test]
    fn test_default_capabilities_are_empty() {
        let mut provider = NameOnly;
        let caps = Capabilities::of(&mut provider);
        assert_eq!(caps, Capabilities::default());
        assert!(caps.labels().is_empty());
    }

    #[test]
    fn test_capability_labels_order() {
        let caps = Capabilities {
            resolve: true,
            retrieve: false,
            accounts: true,
            configure: true,
        };
        assert_eq!(caps.labels(), vec!["resolve", "accounts", "configure"]);
    }

    #[test]
    fn test_configure_error_message() {
        let err = ConfigureError::InvalidAccount {
            provider: "basic".to_string(),
            index: 2,
            reason: "missing field `password`".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("#2"));
        assert!(msg.contains("accounts file"));
    }
}

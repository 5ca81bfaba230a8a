//! Priority-ordered provider registry.
//!
//! Registration order is the total order used for every tie-break:
//! classification picks the first provider that claims a URL, and retrieval
//! bidding prefers the earlier provider when weights are equal.

use std::fmt;

use tracing::{debug, warn};
use url::Url;

use crate::config::Settings;
use crate::resolver::{Resolvability, Resolver};

use super::{Capabilities, Provider};

/// The provider that claimed a URL and the tier it claimed it with.
#[derive(Clone, Copy)]
pub struct Classification<'a> {
    /// Position of the provider in registration order.
    pub index: usize,
    pub provider: &'a dyn Provider,
    pub resolver: &'a dyn Resolver,
    /// Either [`Resolvability::Single`] or [`Resolvability::Multi`].
    pub tier: Resolvability,
}

impl fmt::Debug for Classification<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classification")
            .field("index", &self.index)
            .field("provider", &self.provider.name())
            .field("tier", &self.tier)
            .finish()
    }
}

/// An ordered collection of providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Appends a provider. Returns false (and drops `provider`) if a provider
    /// with the same name is already registered.
    #[tracing::instrument(skip(self, provider), fields(provider_name))]
    pub fn register(&mut self, provider: Box<dyn Provider>) -> bool {
        tracing::Span::current().record("provider_name", provider.name());
        if self.get(provider.name()).is_some() {
            debug!("Provider already registered; ignoring");
            return false;
        }
        debug!(priority = self.providers.len(), "Registering provider");
        self.providers.push(provider);
        true
    }

    /// Returns the first provider whose resolver claims `url`.
    #[must_use]
    pub fn classify(&self, url: &Url) -> Option<Classification<'_>> {
        self.providers
            .iter()
            .enumerate()
            .find_map(|(index, provider)| {
                let resolver = provider.resolver()?;
                match resolver.can_resolve(url) {
                    Resolvability::Next => None,
                    tier => Some(Classification {
                        index,
                        provider: provider.as_ref(),
                        resolver,
                        tier,
                    }),
                }
            })
    }

    /// Passes `settings` to every provider with the `Configured` capability.
    ///
    /// A provider that rejects its settings is logged and left unconfigured;
    /// the others still receive theirs. Returns the number of providers
    /// configured successfully.
    pub fn configure(&mut self, settings: &Settings) -> usize {
        let mut configured = 0;
        for provider in &mut self.providers {
            let name = provider.name().to_string();
            let Some(target) = provider.configured() else {
                continue;
            };
            match target.configure(settings) {
                Ok(()) => {
                    debug!(provider = %name, "Provider configured");
                    configured += 1;
                }
                Err(error) => warn!(
                    provider = %name,
                    error = %error,
                    "Provider configuration rejected; continuing with defaults"
                ),
            }
        }
        configured
    }

    /// Looks a provider up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Provider> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
            .map(AsRef::as_ref)
    }

    /// Iterates providers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Provider> {
        self.providers.iter().map(AsRef::as_ref)
    }

    /// Provider names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// Capabilities of every provider, in registration order.
    pub fn capabilities(&mut self) -> Vec<(String, Capabilities)> {
        self.providers
            .iter_mut()
            .map(|provider| {
                (
                    provider.name().to_string(),
                    Capabilities::of(provider.as_mut()),
                )
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{MockProvider, MockResolver};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_register_is_idempotent_by_name() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.register(Box::new(MockProvider::named("a"))));
        assert!(!registry.register(Box::new(MockProvider::named("a"))));
        assert!(registry.register(Box::new(MockProvider::named("b"))));
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_classify_returns_first_claiming_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(
            MockProvider::named("specific")
                .with_resolver(MockResolver::new("files.example", Resolvability::Single)),
        ));
        registry.register(Box::new(
            MockProvider::named("fallback").with_resolver(MockResolver::any(Resolvability::Single)),
        ));

        let specific = registry.classify(&url("https://files.example/f/1")).unwrap();
        assert_eq!(specific.provider.name(), "specific");
        assert_eq!(specific.index, 0);
        assert_eq!(specific.tier, Resolvability::Single);

        let fallback = registry.classify(&url("https://other.example/x")).unwrap();
        assert_eq!(fallback.provider.name(), "fallback");
        assert_eq!(fallback.index, 1);
    }

    #[test]
    fn test_classify_skips_providers_without_resolver() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(MockProvider::named("retrieve-only").with_retriever(10)));
        registry.register(Box::new(
            MockProvider::named("multi").with_resolver(MockResolver::any(Resolvability::Multi)),
        ));
        let hit = registry.classify(&url("https://x.example/")).unwrap();
        assert_eq!(hit.provider.name(), "multi");
        assert_eq!(hit.tier, Resolvability::Multi);
    }

    #[test]
    fn test_classify_unsupported_when_all_next() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(
            MockProvider::named("a").with_resolver(MockResolver::new("a.example", Resolvability::Single)),
        ));
        assert!(registry.classify(&url("https://b.example/")).is_none());
    }

    #[test]
    fn test_configure_reaches_configured_providers_only() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(MockProvider::named("plain")));
        registry.register(Box::new(MockProvider::named("conf").configurable()));
        registry.register(Box::new(MockProvider::named("broken").configurable_failing()));

        let configured = registry.configure(&Settings::default());
        assert_eq!(configured, 1, "failing provider must not abort the others");
    }

    #[test]
    fn test_capabilities_in_registration_order() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(
            MockProvider::named("r").with_resolver(MockResolver::any(Resolvability::Single)),
        ));
        registry.register(Box::new(MockProvider::named("w").with_retriever(1)));
        let caps = registry.capabilities();
        assert_eq!(caps[0].0, "r");
        assert!(caps[0].1.resolve && !caps[0].1.retrieve);
        assert!(caps[1].1.retrieve && !caps[1].1.resolve);
    }

    #[test]
    fn test_debug_lists_names() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(MockProvider::named("a")));
        assert!(format!("{registry:?}").contains("\"a\""));
    }
}

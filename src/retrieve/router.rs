//! Retrieval routing by bidding.

use tracing::{debug, info};

use crate::provider::{Provider, ProviderRegistry};
use crate::resolver::File;

use super::{FetchRequest, RetrieveError, Retriever};

/// One provider's answer to `can_retrieve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    pub provider: String,
    pub weight: u32,
}

/// The outcome of routing: who retrieves the file and how.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub provider: String,
    pub weight: u32,
    pub request: FetchRequest,
}

/// Selects a retriever for resolved files.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalRouter<'a> {
    registry: &'a ProviderRegistry,
}

impl<'a> RetrievalRouter<'a> {
    #[must_use]
    pub fn new(registry: &'a ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Every retriever's bid for `file`, in registration order (zeros included).
    #[must_use]
    pub fn bids(&self, file: &File) -> Vec<Bid> {
        self.registry
            .iter()
            .filter_map(|provider| {
                provider.retriever().map(|retriever| Bid {
                    provider: provider.name().to_string(),
                    weight: retriever.can_retrieve(file),
                })
            })
            .collect()
    }

    /// Returns the highest positive bidder; the earlier provider wins ties.
    #[must_use]
    pub fn select(&self, file: &File) -> Option<(&'a dyn Provider, &'a dyn Retriever, u32)> {
        let mut best: Option<(&'a dyn Provider, &'a dyn Retriever, u32)> = None;
        for provider in self.registry.iter() {
            let Some(retriever) = provider.retriever() else {
                continue;
            };
            let weight = retriever.can_retrieve(file);
            debug!(provider = provider.name(), weight, file = file.name(), "Retrieval bid");
            if weight == 0 {
                continue;
            }
            if best.is_none_or(|(_, _, top)| weight > top) {
                best = Some((provider, retriever, weight));
            }
        }
        best
    }

    /// Routes `file` to the best bidder and builds its fetch request.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieveError::NoRetriever`] when nobody bids, otherwise
    /// whatever the selected retriever returns.
    #[tracing::instrument(skip(self, file), fields(file = file.name(), origin = file.origin()))]
    pub async fn retrieve(&self, file: &File) -> Result<Retrieval, RetrieveError> {
        let (provider, retriever, weight) = self
            .select(file)
            .ok_or_else(|| RetrieveError::no_retriever(file.name()))?;
        info!(provider = provider.name(), weight, "Selected retriever");
        let request = retriever.retrieve(file).await?;
        Ok(Retrieval {
            provider: provider.name().to_string(),
            weight,
            request,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::FileSize;
    use crate::test_support::MockProvider;
    use url::Url;

    fn file() -> File {
        File::new(
            "origin",
            Url::parse("https://files.example/a.bin").unwrap(),
            "a.bin",
            FileSize::Unknown,
        )
    }

    fn registry_with(weights: &[(&'static str, u32)]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for &(name, weight) in weights {
            registry.register(Box::new(MockProvider::named(name).with_retriever(weight)));
        }
        registry
    }

    #[test]
    fn test_highest_bid_wins_regardless_of_order() {
        for order in [
            [("zero", 0), ("fifty", 50), ("five-hundred", 500)],
            [("five-hundred", 500), ("zero", 0), ("fifty", 50)],
            [("fifty", 50), ("five-hundred", 500), ("zero", 0)],
        ] {
            let registry = registry_with(&order);
            let router = RetrievalRouter::new(&registry);
            let (provider, _, weight) = router.select(&file()).unwrap();
            assert_eq!(provider.name(), "five-hundred");
            assert_eq!(weight, 500);
        }
    }

    #[test]
    fn test_tie_goes_to_earlier_registration() {
        let registry = registry_with(&[("first", 500), ("second", 500)]);
        let router = RetrievalRouter::new(&registry);
        let (provider, _, _) = router.select(&file()).unwrap();
        assert_eq!(provider.name(), "first");
    }

    #[test]
    fn test_zero_bids_are_ineligible() {
        let registry = registry_with(&[("a", 0), ("b", 0)]);
        let router = RetrievalRouter::new(&registry);
        assert!(router.select(&file()).is_none());
        assert_eq!(router.bids(&file()).len(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_without_bidder_is_no_retriever() {
        let registry = registry_with(&[("a", 0)]);
        let router = RetrievalRouter::new(&registry);
        let err = router.retrieve(&file()).await.unwrap_err();
        assert!(matches!(err, RetrieveError::NoRetriever { .. }));
    }

    #[tokio::test]
    async fn test_retrieve_surfaces_no_usable_account() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(
            MockProvider::named("premium-only").with_account_bound_retriever(100),
        ));
        registry.register(Box::new(MockProvider::named("fallback").with_retriever(1)));
        let router = RetrievalRouter::new(&registry);
        let err = router.retrieve(&file()).await.unwrap_err();
        assert!(
            matches!(err, RetrieveError::NoUsableAccount { ref provider } if provider == "premium-only"),
            "selected provider without account must fail distinctly, got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_retrieve_returns_selected_request() {
        let registry = registry_with(&[("low", 1), ("high", 100)]);
        let router = RetrievalRouter::new(&registry);
        let retrieval = router.retrieve(&file()).await.unwrap();
        assert_eq!(retrieval.provider, "high");
        assert_eq!(retrieval.weight, 100);
        assert_eq!(retrieval.request.url(), file().url());
    }
}

//! Concrete hoster integrations.
//!
//! [`build_default_registry`] registers every built-in provider in priority
//! order. The generic [`BasicProvider`] comes last so hoster-specific
//! providers always get the first chance at a URL.

mod basic;
mod nitroflare;
mod oboom;
mod rapidgator;
mod real_debrid;
mod share_online;
mod uploaded;
mod zippyshare;

pub use basic::{BasicAccount, BasicProvider};
pub use nitroflare::NitroflareProvider;
pub use oboom::OboomProvider;
pub use rapidgator::{RapidgatorAccount, RapidgatorProvider};
pub use real_debrid::{RealDebridAccount, RealDebridProvider};
pub use share_online::ShareOnlineProvider;
pub use uploaded::{UploadedAccount, UploadedProvider};
pub use zippyshare::ZippyshareProvider;

use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::HttpSettings;
use crate::http_client::ClientBuildError;
use crate::provider::{Provider, ProviderRegistry};
use crate::resolver::ResolveError;

type Constructor = fn(&HttpSettings) -> Result<Box<dyn Provider>, ClientBuildError>;

fn boxed<P: Provider + 'static>(
    provider: Result<P, ClientBuildError>,
) -> Result<Box<dyn Provider>, ClientBuildError> {
    provider.map(|p| Box::new(p) as Box<dyn Provider>)
}

/// Builds the registry with every built-in provider, in priority order.
///
/// A provider whose HTTP client cannot be built is skipped with a warning.
#[must_use]
pub fn build_default_registry(settings: &HttpSettings) -> ProviderRegistry {
    let constructors: [Constructor; 8] = [
        |s| boxed(OboomProvider::new(s)),
        |s| boxed(RapidgatorProvider::new(s)),
        |s| boxed(UploadedProvider::new(s)),
        |s| boxed(ZippyshareProvider::new(s)),
        |s| boxed(ShareOnlineProvider::new(s)),
        |s| boxed(NitroflareProvider::new(s)),
        |s| boxed(RealDebridProvider::new(s)),
        |s| boxed(BasicProvider::new(s)),
    ];

    let mut registry = ProviderRegistry::new();
    for constructor in constructors {
        match constructor(settings) {
            Ok(provider) => {
                registry.register(provider);
            }
            Err(error) => warn!(error = %error, "Skipping provider"),
        }
    }
    debug!(providers = registry.len(), "Built default provider registry");
    registry
}

/// Sends a resolution request, mapping transport failures to [`ResolveError::Network`].
pub(crate) async fn send(
    provider: &str,
    url: &Url,
    request: RequestBuilder,
) -> Result<Response, ResolveError> {
    request
        .send()
        .await
        .map_err(|error| ResolveError::network(provider, url.as_str(), &error))
}

/// Reads a response body as text.
pub(crate) async fn body_text(
    provider: &str,
    url: &Url,
    response: Response,
) -> Result<String, ResolveError> {
    response
        .text()
        .await
        .map_err(|error| ResolveError::network(provider, url.as_str(), &error))
}

/// Reads a size that hosters report either as a JSON number or a numeric string.
pub(crate) fn parse_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

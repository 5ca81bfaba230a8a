//! zippyshare.com - computes the direct link from the download page script.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{body_text, send};
use crate::config::HttpSettings;
use crate::http_client::{ClientBuildError, ClientOptions, build_http_client};
use crate::provider::Provider;
use crate::resolver::utils::{compile_static_regex, rebase};
use crate::resolver::{Request, ResolveError, Resolvability, Resolver, Settled};

const NAME: &str = "zippyshare.com";

// document.getElementById('dlbutton').href = "/d/<ref>/" + (a % b + a % c) + "/<name>";
static DLBUTTON_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"document\.getElementById\('dlbutton'\)\.href = "/(p)?d/(.*?)/" \+ \((\d+) % (\d+) \+ \d+ % (\d+)\) \+ "/(.*?)";"#,
    )
});

/// The pieces of the `dlbutton` expression.
#[derive(Debug, PartialEq, Eq)]
struct DownloadButton {
    needs_activation: bool,
    reference: String,
    ticket: u64,
    name: String,
}

/// Resolver for zippyshare.com `/v/` pages.
pub struct ZippyshareProvider {
    client: Client,
    page_base: Option<Url>,
}

impl ZippyshareProvider {
    /// Creates the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_http_client(NAME, settings, ClientOptions::default())?,
            page_base: None,
        })
    }

    /// Creates the provider with page fetches sent to `base_url` (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if the HTTP client cannot be built.
    pub fn with_base_url(settings: &HttpSettings, base_url: Url) -> Result<Self, ClientBuildError> {
        let mut provider = Self::new(settings)?;
        provider.page_base = Some(base_url);
        Ok(provider)
    }

    fn fetch_url(&self, url: &Url) -> Url {
        self.page_base
            .as_ref()
            .map_or_else(|| url.clone(), |base| rebase(url, base))
    }

    async fn direct_link(&self, page: &Url) -> Result<Url, ResolveError> {
        let fetch = self.fetch_url(page);
        let response = send(NAME, &fetch, self.client.get(fetch.clone())).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::http(NAME, page.as_str(), status.as_u16()));
        }
        let html = body_text(NAME, &fetch, response).await?;
        let button = parse_download_button(&html).ok_or_else(|| {
            ResolveError::protocol(NAME, "download button script not found on page")
        })?;

        let mut direct = page.clone();
        direct.set_path(&format!("/d/{}/{}/{}", button.reference, button.ticket, button.name));
        direct.set_query(None);

        if button.needs_activation {
            // `/pd/` links only work after the ticket has been requested once.
            let mut activation = direct.clone();
            activation.set_path(&direct.path().replacen("/d/", "/pd/", 1));
            let activation = self.fetch_url(&activation);
            debug!(url = %activation, "Activating zippyshare ticket");
            send(NAME, &activation, self.client.head(activation.clone())).await?;
        }
        Ok(direct)
    }
}

fn parse_download_button(html: &str) -> Option<DownloadButton> {
    let caps = DLBUTTON_RE.captures(html)?;
    let number = |caps: &Captures<'_>, i: usize| caps.get(i)?.as_str().parse::<u64>().ok();
    let base = number(&caps, 3)?;
    let first_mod = number(&caps, 4)?;
    let second_mod = number(&caps, 5)?;
    let ticket = base.checked_rem(first_mod)? + base.checked_rem(second_mod)?;
    Some(DownloadButton {
        needs_activation: caps.get(1).is_some(),
        reference: caps.get(2)?.as_str().to_string(),
        ticket,
        name: caps.get(6)?.as_str().to_string(),
    })
}

impl std::fmt::Debug for ZippyshareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZippyshareProvider")
            .field("page_base", &self.page_base.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl Provider for ZippyshareProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

#[async_trait]
impl Resolver for ZippyshareProvider {
    fn can_resolve(&self, url: &Url) -> Resolvability {
        let subdomain = url
            .host_str()
            .is_some_and(|host| host.to_ascii_lowercase().ends_with(".zippyshare.com"));
        if subdomain && url.path().starts_with("/v/") {
            Resolvability::Single
        } else {
            Resolvability::Next
        }
    }

    #[tracing::instrument(skip(self, request), fields(url = %request.url()))]
    async fn resolve_one(&self, request: Request) -> Result<Settled, ResolveError> {
        Ok(match self.direct_link(request.url()).await {
            Ok(direct) => request.yields(direct),
            Err(error) => request.errs(None, error),
        })
    }
}

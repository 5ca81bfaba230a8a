//! oboom.com - batch link checking through the public info API.
//!
//! The API answers every call with a `[code, payload]` array. A guest
//! session token is required and lives for roughly a day.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{body_text, parse_size, send};
use crate::config::HttpSettings;
use crate::http_client::{ClientBuildError, ClientOptions, build_http_client};
use crate::provider::Provider;
use crate::resolver::utils::{endpoint, host_matches, path_segments};
use crate::resolver::{
    File, FileSize, Request, ResolveError, Resolvability, Resolver, Settled,
};
use crate::session::{Attempt, Session, SessionCache};

const NAME: &str = "oboom.com";
const DEFAULT_API_BASE: &str = "https://api.oboom.com";
const DEFAULT_WWW_BASE: &str = "https://www.oboom.com";
const SESSION_TTL: Duration = Duration::from_secs(23 * 60 * 60);

#[derive(Debug, Deserialize)]
struct ItemInfo {
    id: String,
    state: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: Value,
}

/// Resolver for `oboom.com` links.
pub struct OboomProvider {
    client: Client,
    api_base: Url,
    www_base: Url,
    session: SessionCache,
}

impl OboomProvider {
    /// Creates the provider against the public endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientBuildError> {
        let api_base = parse_static(DEFAULT_API_BASE)?;
        let www_base = parse_static(DEFAULT_WWW_BASE)?;
        Self::build(settings, api_base, www_base)
    }

    /// Creates the provider with both API hosts pointed at `base_url` (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if the HTTP client cannot be built.
    pub fn with_base_url(settings: &HttpSettings, base_url: Url) -> Result<Self, ClientBuildError> {
        Self::build(settings, base_url.clone(), base_url)
    }

    fn build(settings: &HttpSettings, api_base: Url, www_base: Url) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_http_client(NAME, settings, ClientOptions::default())?,
            api_base,
            www_base,
            session: SessionCache::new(NAME),
        })
    }

    async fn login(&self) -> Result<Session, ResolveError> {
        let url = endpoint(&self.www_base, "1.0/guestsession");
        let (code, payload) = self.call(&url, self.client.get(url.clone())).await?;
        if code != 200 {
            return Err(ResolveError::http(NAME, url.as_str(), code));
        }
        let token = payload
            .as_str()
            .ok_or_else(|| ResolveError::protocol(NAME, "guest session token is not a string"))?;
        Ok(Session::new(token, SESSION_TTL))
    }

    async fn info(&self, token: &str, ids: &[&str]) -> Result<Attempt<Vec<ItemInfo>>, ResolveError> {
        let url = endpoint(&self.api_base, "1.0/info");
        let items = ids.join(",");
        let form = [("token", token), ("items", items.as_str()), ("http_errors", "0")];
        let (code, payload) = self
            .call(&url, self.client.post(url.clone()).form(&form))
            .await?;
        match code {
            200 => serde_json::from_value(payload)
                .map(Attempt::Done)
                .map_err(|e| ResolveError::protocol(NAME, format!("info payload: {e}"))),
            403 => Ok(Attempt::Rejected),
            other => Err(ResolveError::http(NAME, url.as_str(), other)),
        }
    }

    async fn call(
        &self,
        url: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<(u16, Value), ResolveError> {
        let response = send(NAME, url, request).await?;
        let body = body_text(NAME, url, response).await?;
        parse_envelope(&body)
    }
}

fn parse_static(raw: &str) -> Result<Url, ClientBuildError> {
    Url::parse(raw).map_err(|e| ClientBuildError {
        component: NAME.to_string(),
        reason: format!("invalid base URL {raw}: {e}"),
    })
}

/// Splits a `[code, payload]` response.
fn parse_envelope(body: &str) -> Result<(u16, Value), ResolveError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ResolveError::protocol(NAME, format!("response is not JSON: {e}")))?;
    let Value::Array(mut parts) = value else {
        return Err(ResolveError::protocol(NAME, "response is not an array"));
    };
    if parts.len() < 2 {
        return Err(ResolveError::protocol(NAME, "response array is too short"));
    }
    let code = parts[0]
        .as_u64()
        .and_then(|code| u16::try_from(code).ok())
        .ok_or_else(|| ResolveError::protocol(NAME, "response code is not a status"))?;
    Ok((code, parts.swap_remove(1)))
}

fn canonical_url(id: &str) -> Option<Url> {
    Url::parse(&format!("https://oboom.com/{id}")).ok()
}

impl std::fmt::Debug for OboomProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OboomProvider")
            .field("api_base", &self.api_base.as_str())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Provider for OboomProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

#[async_trait]
impl Resolver for OboomProvider {
    fn can_resolve(&self, url: &Url) -> Resolvability {
        if host_matches(url, "oboom.com") {
            Resolvability::Multi
        } else {
            Resolvability::Next
        }
    }

    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    async fn resolve_many(&self, requests: Vec<Request>) -> Result<Vec<Settled>, ResolveError> {
        let ids: Vec<Option<String>> = requests
            .iter()
            .map(|request| path_segments(request.url()).first().map(|id| (*id).to_string()))
            .collect();
        let mut seen = HashSet::new();
        let wanted: Vec<&str> = ids
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        let mut records: HashMap<String, ItemInfo> = HashMap::new();
        if !wanted.is_empty() {
            debug!(items = wanted.len(), "Checking oboom items");
            let infos = self
                .session
                .run(|| self.login(), |token| {
                    let wanted = &wanted;
                    async move { self.info(&token, wanted).await }
                })
                .await?;
            records = infos.into_iter().map(|info| (info.id.clone(), info)).collect();
        }

        Ok(requests
            .into_iter()
            .zip(ids)
            .map(|(request, id)| {
                let Some(id) = id else {
                    let reason = ResolveError::resolution_failed(
                        NAME,
                        request.url().as_str(),
                        "URL has no file id",
                    );
                    return request.errs(None, reason);
                };
                let canonical = canonical_url(&id);
                match records.get(&id) {
                    None => {
                        let error = ResolveError::protocol(NAME, format!("no record for item {id}"));
                        request.errs(canonical, error)
                    }
                    Some(info) if info.state != "online" => request.deadend(canonical),
                    Some(info) => {
                        let url = canonical.unwrap_or_else(|| request.url().clone());
                        let size = parse_size(&info.size).map_or(FileSize::Unknown, FileSize::Known);
                        request.resolves_to(File::new(NAME, url, info.name.clone(), size))
                    }
                }
            })
            .collect())
    }
}

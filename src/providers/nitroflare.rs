//! nitroflare.com - batch lookups through the v2 file info API.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{body_text, parse_size, send};
use crate::config::HttpSettings;
use crate::http_client::{ClientBuildError, ClientOptions, build_http_client};
use crate::provider::Provider;
use crate::resolver::utils::{endpoint, host_matches, path_segments};
use crate::resolver::{File, FileSize, Request, ResolveError, Resolvability, Resolver, Settled};

const NAME: &str = "nitroflare.com";
const DEFAULT_BASE: &str = "https://nitroflare.com";

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    result: Option<InfoResult>,
}

#[derive(Debug, Default, Deserialize)]
struct InfoResult {
    #[serde(default)]
    files: HashMap<String, FileInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileInfo {
    status: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: Value,
}

/// Resolver for nitroflare.com `/view/` links.
#[derive(Debug)]
pub struct NitroflareProvider {
    client: Client,
    base_url: Url,
}

impl NitroflareProvider {
    /// Creates the provider against the public API.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientBuildError> {
        let base_url = Url::parse(DEFAULT_BASE).map_err(|e| ClientBuildError {
            component: NAME.to_string(),
            reason: e.to_string(),
        })?;
        Self::with_base_url(settings, base_url)
    }

    /// Creates the provider with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if the HTTP client cannot be built.
    pub fn with_base_url(settings: &HttpSettings, base_url: Url) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_http_client(NAME, settings, ClientOptions::default())?,
            base_url,
        })
    }

    async fn file_info(&self, ids: &[&str]) -> Result<HashMap<String, FileInfo>, ResolveError> {
        let mut url = endpoint(&self.base_url, "api/v2/getFileInfo");
        url.query_pairs_mut().append_pair("files", &ids.join(","));
        let response = send(NAME, &url, self.client.get(url.clone())).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::http(NAME, url.as_str(), status.as_u16()));
        }
        let body = body_text(NAME, &url, response).await?;
        let info: InfoResponse = serde_json::from_str(&body)
            .map_err(|e| ResolveError::protocol(NAME, format!("file info: {e}")))?;
        if info.kind != "success" {
            return Err(ResolveError::protocol(
                NAME,
                format!("API answered with type '{}'", info.kind),
            ));
        }
        Ok(info.result.unwrap_or_default().files)
    }
}

fn view_id(url: &Url) -> Option<String> {
    match path_segments(url).as_slice() {
        ["view", id, ..] => Some((*id).to_string()),
        _ => None,
    }
}

fn canonical_url(id: &str) -> Option<Url> {
    Url::parse(&format!("https://www.nitroflare.com/view/{id}")).ok()
}

impl Provider for NitroflareProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

#[async_trait]
impl Resolver for NitroflareProvider {
    fn can_resolve(&self, url: &Url) -> Resolvability {
        if host_matches(url, "nitroflare.com") && url.path().starts_with("/view/") {
            Resolvability::Multi
        } else {
            Resolvability::Next
        }
    }

    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    async fn resolve_many(&self, requests: Vec<Request>) -> Result<Vec<Settled>, ResolveError> {
        let ids: Vec<Option<String>> = requests.iter().map(|r| view_id(r.url())).collect();
        let mut seen = HashSet::new();
        let wanted: Vec<&str> = ids
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();
        let files = if wanted.is_empty() {
            HashMap::new()
        } else {
            self.file_info(&wanted).await?
        };

        // Walk the inputs, not the response map, so output order follows input order.
        Ok(requests
            .into_iter()
            .zip(ids)
            .map(|(request, id)| {
                let Some((id, canonical)) = id.and_then(|id| canonical_url(&id).map(|u| (id, u)))
                else {
                    let error = ResolveError::resolution_failed(
                        NAME,
                        request.url().as_str(),
                        "cannot extract a file id from the URL",
                    );
                    return request.errs(None, error);
                };
                match files.get(&id) {
                    None => {
                        let error = ResolveError::protocol(NAME, format!("no info for file {id}"));
                        request.errs(Some(canonical), error)
                    }
                    Some(info) if info.status != "online" => request.deadend(Some(canonical)),
                    Some(info) => match parse_size(&info.size) {
                        Some(size) => request.resolves_to(File::new(
                            NAME,
                            canonical,
                            info.name.clone(),
                            FileSize::Known(size),
                        )),
                        None => {
                            let error = ResolveError::protocol(
                                NAME,
                                format!("bad size {} for file {id}", info.size),
                            );
                            request.errs(Some(canonical), error)
                        }
                    },
                }
            })
            .collect())
    }
}

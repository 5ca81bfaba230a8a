//! share-online.biz - batch link checking with MD5 checksums.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{body_text, send};
use crate::config::HttpSettings;
use crate::http_client::{ClientBuildError, ClientOptions, build_http_client};
use crate::provider::Provider;
use crate::resolver::utils::{endpoint, host_matches, path_segments};
use crate::resolver::{
    Checksum, File, FileSize, HashAlgorithm, Request, ResolveError, Resolvability, Resolver,
    Settled,
};

const NAME: &str = "share-online.biz";
const DEFAULT_BASE: &str = "https://api.share-online.biz";

/// One `ID;STATUS;NAME;SIZE;MD5` line.
#[derive(Debug, PartialEq, Eq)]
struct LinkStatus<'a> {
    id: &'a str,
    status: &'a str,
    name: &'a str,
    size: &'a str,
    md5: &'a str,
}

/// Resolver for share-online.biz `/dl/` links.
#[derive(Debug)]
pub struct ShareOnlineProvider {
    client: Client,
    base_url: Url,
}

impl ShareOnlineProvider {
    /// Creates the provider against the public link checker.
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

    async fn link_check(&self, links: &[&str]) -> Result<String, ResolveError> {
        let mut url = endpoint(&self.base_url, "linkcheck.php");
        url.set_query(Some("md5=1"));
        let request = self.client.post(url.clone()).body(links.join("\n"));
        let response = send(NAME, &url, request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::http(NAME, url.as_str(), status.as_u16()));
        }
        body_text(NAME, &url, response).await
    }
}

fn parse_statuses(body: &str) -> Vec<LinkStatus<'_>> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut fields = line.split(';').map(str::trim);
            Some(LinkStatus {
                id: fields.next()?,
                status: fields.next().unwrap_or_default(),
                name: fields.next().unwrap_or_default(),
                size: fields.next().unwrap_or_default(),
                md5: fields.next().unwrap_or_default(),
            })
        })
        .collect()
}

fn link_id(url: &Url) -> Option<&str> {
    match path_segments(url).as_slice() {
        ["dl", id, ..] => Some(*id),
        _ => None,
    }
}

fn canonical_url(id: &str) -> Option<Url> {
    Url::parse(&format!("http://www.share-online.biz/dl/{id}")).ok()
}

fn settle(request: Request, canonical: Url, line: &LinkStatus<'_>) -> Settled {
    if line.status != "OK" {
        // "DELETED", "NOT FOUND" and friends
        return request.deadend(Some(canonical));
    }
    let parsed = line
        .size
        .parse::<u64>()
        .map_err(|e| format!("bad size '{}': {e}", line.size))
        .and_then(|size| {
            Checksum::from_hex(HashAlgorithm::Md5, line.md5)
                .map(|checksum| (size, checksum))
                .map_err(|e| format!("bad MD5 '{}': {e}", line.md5))
        });
    match parsed {
        Ok((size, checksum)) => {
            let file = File::new(NAME, canonical, line.name, FileSize::Known(size))
                .with_checksum(checksum);
            request.resolves_to(file)
        }
        Err(reason) => request.errs(Some(canonical), ResolveError::protocol(NAME, reason)),
    }
}

impl Provider for ShareOnlineProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

#[async_trait]
impl Resolver for ShareOnlineProvider {
    fn can_resolve(&self, url: &Url) -> Resolvability {
        if host_matches(url, "share-online.biz") && url.path().starts_with("/dl/") {
            Resolvability::Multi
        } else {
            Resolvability::Next
        }
    }

    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    async fn resolve_many(&self, requests: Vec<Request>) -> Result<Vec<Settled>, ResolveError> {
        let links: Vec<&str> = requests.iter().map(|r| r.url().as_str()).collect();
        let body = self.link_check(&links).await?;
        let statuses: HashMap<&str, LinkStatus<'_>> = parse_statuses(&body)
            .into_iter()
            .map(|line| (line.id, line))
            .collect();

        Ok(requests
            .into_iter()
            .map(|request| {
                let Some((id, canonical)) = link_id(request.url())
                    .and_then(|id| canonical_url(id).map(|u| (id.to_string(), u)))
                else {
                    let error = ResolveError::resolution_failed(
                        NAME,
                        request.url().as_str(),
                        "cannot extract a link id from the URL",
                    );
                    return request.errs(None, error);
                };
                match statuses.get(id.as_str()) {
                    Some(line) => settle(request, canonical, line),
                    None => {
                        let error = ResolveError::protocol(NAME, format!("no status for link {id}"));
                        request.errs(Some(canonical), error)
                    }
                }
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::Outcome;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    fn request(s: &str) -> Request {
        Request::new(Url::parse(s).unwrap())
    }

    #[test]
    fn test_can_resolve() {
        let provider = ShareOnlineProvider::new(&HttpSettings::default()).unwrap();
        let tier = |s: &str| provider.can_resolve(&Url::parse(s).unwrap());
        assert_eq!(tier("http://www.share-online.biz/dl/ABC"), Resolvability::Multi);
        assert_eq!(tier("http://www.share-online.biz/about"), Resolvability::Next);
        assert_eq!(tier("http://example.com/dl/ABC"), Resolvability::Next);
    }

    #[test]
    fn test_parse_statuses() {
        let lines = parse_statuses("A;OK;a.bin;3;d41d8cd98f00b204e9800998ecf8427e\n\nB;DELETED\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "a.bin");
        assert_eq!(lines[1].status, "DELETED");
        assert_eq!(lines[1].md5, "");
    }

    #[tokio::test]
    async fn test_resolve_many_by_id() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .and(path("/linkcheck.php"))
            .and(query_param("md5", "1"))
            .and(body_string_contains("http://www.share-online.biz/dl/AAA\nhttp://www.share-online.biz/dl/BBB"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "BBB;NOT FOUND;;0;\nAAA;OK;a.bin;3;d41d8cd98f00b204e9800998ecf8427e\nCCC;OK;c.bin;x;\n",
            ))
            .mount(&server)
            .await;

        let provider = ShareOnlineProvider::with_base_url(
            &HttpSettings::default(),
            Url::parse(&server.uri()).unwrap(),
        )
        .unwrap();
        let results = provider
            .resolve_many(vec![
                request("http://www.share-online.biz/dl/AAA"),
                request("http://www.share-online.biz/dl/BBB"),
                request("http://www.share-online.biz/dl/CCC"),
                request("http://www.share-online.biz/dl/DDD"),
            ])
            .await
            .unwrap();

        let Outcome::ResolvedTo(file) = results[0].outcome() else {
            panic!("expected file, got {:?}", results[0].outcome());
        };
        assert_eq!(file.size(), FileSize::Known(3));
        assert_eq!(file.checksum().unwrap().algorithm(), HashAlgorithm::Md5);
        assert!(matches!(results[1].outcome(), Outcome::Deadend(Some(_))));
        assert!(matches!(
            results[2].outcome(),
            Outcome::Errs(Some(_), ResolveError::Protocol { .. })
        ));
        assert!(matches!(
            results[3].outcome(),
            Outcome::Errs(Some(_), ResolveError::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn test_server_error_fails_whole_batch() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let provider = ShareOnlineProvider::with_base_url(
            &HttpSettings::default(),
            Url::parse(&server.uri()).unwrap(),
        )
        .unwrap();
        let result = provider
            .resolve_many(vec![request("http://www.share-online.biz/dl/AAA")])
            .await;
        assert!(matches!(result, Err(ResolveError::Http { status: 502, .. })));
    }
}

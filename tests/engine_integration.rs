//! Integration tests for the resolution engine.
//!
//! Drives real providers against wiremock servers and a few in-test
//! providers through the public API.

use async_trait::async_trait;
use hostfetch_core::providers::{BasicProvider, UploadedProvider, ZippyshareProvider};
use hostfetch_core::{
    EngineOptions, FileSize, HttpSettings, Outcome, Provider, ProviderRegistry, Request,
    ResolutionEngine, ResolveError, Resolvability, Resolver, Settings, Settled,
    build_default_registry,
};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// `https://loop.test/<n>` yields `https://loop.test/<n + 1>` forever.
struct CountingProvider;

/// `/a` and `/b` on `cycle.test` yield each other.
struct PingPongProvider;

impl Provider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    fn resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

#[async_trait]
impl Resolver for CountingProvider {
    fn can_resolve(&self, url: &Url) -> Resolvability {
        if url.host_str() == Some("loop.test") {
            Resolvability::Single
        } else {
            Resolvability::Next
        }
    }

    async fn resolve_one(&self, request: Request) -> Result<Settled, ResolveError> {
        let n: u32 = request.url().path().trim_start_matches('/').parse().unwrap_or(0);
        let next = Url::parse(&format!("https://loop.test/{}", n + 1)).unwrap();
        Ok(request.yields(next))
    }
}

impl Provider for PingPongProvider {
    fn name(&self) -> &str {
        "ping-pong"
    }

    fn resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }
}

#[async_trait]
impl Resolver for PingPongProvider {
    fn can_resolve(&self, url: &Url) -> Resolvability {
        if url.host_str() == Some("cycle.test") {
            Resolvability::Single
        } else {
            Resolvability::Next
        }
    }

    async fn resolve_one(&self, request: Request) -> Result<Settled, ResolveError> {
        let other = if request.url().path() == "/a" { "/b" } else { "/a" };
        let next = request.url().join(other).unwrap();
        Ok(request.yields(next))
    }
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[tokio::test]
async fn test_folder_bundle_expands_to_three_files_in_one_batch() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/f/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table id="fileList">
                 <tr id="aaa"><td>a.bin</td></tr>
                 <tr id="bbb"><td>b.bin</td></tr>
                 <tr id="ccc"><td>c.bin</td></tr>
               </table>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/filemultiple"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "online,ccc,30,,c.bin\nonline,aaa,10,da39a3ee5e6b4b0d3255bfef95601890afd80709,a.bin\nonline,bbb,20,,b.bin\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(
        UploadedProvider::with_base_url(&HttpSettings::default(), url(&server.uri())).unwrap(),
    ));
    registry.configure(&Settings::default().with_provider_option("uploaded.net", "api_key", "k"));

    let engine = ResolutionEngine::new(&registry, EngineOptions::default());
    let resolutions = engine.resolve(vec![url("https://uploaded.net/f/abc123")]).await;

    assert_eq!(resolutions.len(), 1);
    let root = &resolutions[0];
    assert!(matches!(root.outcome(), Outcome::Bundles(urls) if urls.len() == 3));
    let files = root.files();
    assert_eq!(files.len(), 3);
    assert_eq!(root.terminals().len(), 3);
    let names: Vec<&str> = files.iter().map(|f| f.name()).collect();
    assert_eq!(names, ["a.bin", "b.bin", "c.bin"]);
    assert!(files[0].checksum().is_some());
}

#[tokio::test]
async fn test_yields_chain_reaches_generic_fallback() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/v/AbCdEf/file.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<script>document.getElementById('dlbutton').href = "/d/AbCdEf/" + (10 % 3 + 10 % 4) + "/movie.mp4";</script>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/d/AbCdEf/3/movie.mp4"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", "42"))
        .mount(&server)
        .await;

    let settings = HttpSettings::default();
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(
        ZippyshareProvider::with_base_url(&settings, url(&server.uri())).unwrap(),
    ));
    registry.register(Box::new(
        BasicProvider::with_base_url(&settings, url(&server.uri())).unwrap(),
    ));

    let engine = ResolutionEngine::new(&registry, EngineOptions::default());
    let resolutions = engine
        .resolve(vec![url("https://www42.zippyshare.com/v/AbCdEf/file.html")])
        .await;

    let root = &resolutions[0];
    assert_eq!(root.provider(), Some("zippyshare.com"));
    assert!(matches!(root.outcome(), Outcome::Yields(_)));
    let files = root.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].origin(), "basic");
    assert_eq!(files[0].name(), "movie.mp4");
    assert_eq!(files[0].size(), FileSize::Known(42));
    assert_eq!(
        files[0].url().as_str(),
        "https://www42.zippyshare.com/d/AbCdEf/3/movie.mp4"
    );
}

#[tokio::test]
async fn test_depth_guard_stops_endless_yields() {
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(CountingProvider));
    let options = EngineOptions {
        max_depth: 3,
        ..EngineOptions::default()
    };

    let resolutions = ResolutionEngine::new(&registry, options)
        .resolve(vec![url("https://loop.test/0")])
        .await;

    let terminals = resolutions[0].terminals();
    assert_eq!(terminals.len(), 1);
    assert!(matches!(
        terminals[0].outcome(),
        Outcome::Errs(None, ResolveError::TooDeep { .. })
    ));
    assert_eq!(terminals[0].url().as_str(), "https://loop.test/4");
}

#[tokio::test]
async fn test_cycle_guard_stops_ping_pong() {
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(PingPongProvider));

    let resolutions = ResolutionEngine::new(&registry, EngineOptions::default())
        .resolve(vec![url("https://cycle.test/a")])
        .await;

    let terminals = resolutions[0].terminals();
    assert_eq!(terminals.len(), 1);
    assert!(matches!(
        terminals[0].outcome(),
        Outcome::Errs(None, ResolveError::RedirectCycle { .. })
    ));
}

#[tokio::test]
async fn test_unclaimed_url_is_unsupported() {
    let registry = build_default_registry(&HttpSettings::default());
    let resolutions = ResolutionEngine::new(&registry, EngineOptions::default())
        .resolve(vec![url("ftp://files.example.com/a.bin")])
        .await;

    assert_eq!(resolutions[0].provider(), None);
    assert!(matches!(
        resolutions[0].outcome(),
        Outcome::Errs(None, ResolveError::Unsupported { .. })
    ));
}

#[tokio::test]
async fn test_results_keep_seed_order() {
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(PingPongProvider));
    let seeds = vec![
        url("ftp://nobody.example/x"),
        url("https://cycle.test/a"),
        url("ftp://nobody.example/y"),
    ];

    let resolutions = ResolutionEngine::new(&registry, EngineOptions::default())
        .resolve(seeds.clone())
        .await;

    let urls: Vec<&Url> = resolutions.iter().map(|r| r.url()).collect();
    assert_eq!(urls, seeds.iter().collect::<Vec<_>>());
}

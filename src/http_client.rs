//! Shared HTTP client construction policy.
//!
//! Every provider and the transport build their `reqwest` client here so
//! timeouts, user-agent, compression, proxy handling and cookie support stay
//! consistent.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Proxy};
use thiserror::Error;
use tracing::warn;

use crate::config::HttpSettings;
use crate::user_agent;

/// The HTTP client could not be constructed.
#[derive(Debug, Error)]
#[error("failed to build HTTP client for {component}: {reason}")]
pub struct ClientBuildError {
    /// Provider or subsystem that requested the client
    pub component: String,
    /// Why construction failed
    pub reason: String,
}

/// Per-client variations on the shared policy.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Cookie store shared with the caller (e.g. to read a login cookie).
    pub cookie_jar: Option<Arc<Jar>>,
    /// Return 3xx responses to the caller instead of following them.
    pub no_redirects: bool,
}

/// Builds an HTTP client using shared project policy.
///
/// `component` is used only for error messages and logging.
///
/// # Errors
///
/// Returns [`ClientBuildError`] when client construction fails.
pub fn build_http_client(
    component: &str,
    settings: &HttpSettings,
    options: ClientOptions,
) -> Result<Client, ClientBuildError> {
    let failure = |reason: String| ClientBuildError {
        component: component.to_string(),
        reason,
    };

    match try_build_client(settings, options.clone(), false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; retry with env-proxy lookup only.
            warn!(
                component,
                "HTTP client hit system proxy panic; using env-proxy fallback builder"
            );
            match try_build_client(settings, options, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(failure(
                    "client construction panicked while reading proxy settings".to_string(),
                )),
                Err(BuildClientFailure::Build(error)) => Err(failure(error.to_string())),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(failure(error.to_string())),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    settings: &HttpSettings,
    options: ClientOptions,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let settings = *settings;
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(&settings, options);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(settings: &HttpSettings, options: ClientOptions) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(settings.connect_timeout)
        .read_timeout(settings.read_timeout)
        .user_agent(user_agent::default_user_agent())
        .gzip(true);

    if let Some(jar) = options.cookie_jar {
        builder = builder.cookie_provider(jar);
    }
    if options.no_redirects {
        builder = builder.redirect(Policy::none());
    }

    builder
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

//! Hostfetch Core Library
//!
//! This library turns URLs pointing at third-party file-hosting services into
//! concrete, retrievable files (name, size, checksum) and fetches their bytes,
//! choosing among several credentialed accounts and competing retrieval paths.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`provider`] - Provider capability traits and the priority-ordered registry
//! - [`resolver`] - Request state machine and the resolution engine
//! - [`session`] - Per-provider session token cache with double-checked refresh
//! - [`retrieve`] - Retrieval routing (bidding) and fetch request descriptions
//! - [`account`] - Typed per-provider accounts, provisioning and persistence
//! - [`providers`] - Concrete hoster integrations
//! - [`download`] - Streaming transport with checksum verification
//! - [`config`] - Configuration file loading and runtime settings

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod account;
pub mod config;
pub mod download;
pub mod http_client;
pub mod provider;
pub mod providers;
pub mod resolver;
pub mod retrieve;
pub mod session;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use account::{
    Account, AccountError, AccountRecord, AccountStore, Accountant, AccountsFile, Field, Prompter,
    default_accounts_path,
};
pub use config::{ConfigError, FileConfig, HttpSettings, Settings, resolve_default_config_path};
pub use download::{DownloadError, DownloadOutcome, Transport};
pub use provider::{Capabilities, ConfigureError, Configured, Provider, ProviderRegistry};
pub use providers::build_default_registry;
pub use resolver::{
    Checksum, DEFAULT_MAX_DEPTH, DEFAULT_RESOLVE_CONCURRENCY, EngineOptions, File, FileSize,
    HashAlgorithm, Outcome, Request, Resolution, ResolutionEngine, ResolveError, Resolvability,
    Resolver, Settled,
};
pub use retrieve::{FetchRequest, RetrievalRouter, Retrieval, RetrieveError, Retriever};
pub use session::{Attempt, Session, SessionCache, SessionError};

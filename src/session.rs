//! Per-provider session token cache.
//!
//! Providers that authenticate with short-lived tokens keep one
//! [`SessionCache`]. Reading a valid token is lock-free (an atomic expiry
//! check on the monotonic clock); refreshing is serialized by an async mutex
//! and double-checked so concurrent callers trigger at most one login.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Errors surfaced by the session layer.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Authorization was rejected again after one re-login
    #[error("{provider} rejected the session twice in a row\n  Suggestion: Check the account credentials with `hostfetch accounts list`")]
    Rejected {
        /// Provider that rejected the session
        provider: String,
    },
}

impl SessionError {
    /// Creates a `Rejected` error.
    #[must_use]
    pub fn rejected(provider: &str) -> Self {
        Self::Rejected {
            provider: provider.to_string(),
        }
    }
}

/// A freshly obtained session token and its expiry.
#[derive(Clone)]
pub struct Session {
    token: Arc<str>,
    expires_at: Instant,
}

impl Session {
    /// Creates a session valid for `ttl` from now.
    #[must_use]
    pub fn new(token: impl Into<Arc<str>>, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: Instant::now() + ttl,
        }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of one authenticated operation.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The operation completed (successfully or with a non-auth failure folded into `T`).
    Done(T),
    /// The hoster rejected the token; the cache will re-login and retry once.
    Rejected,
}

/// Cached session token for one provider.
pub struct SessionCache {
    provider: String,
    epoch: Instant,
    // Milliseconds since `epoch`; 0 means expired or never set.
    expires_at_ms: AtomicU64,
    token: RwLock<Option<Arc<str>>>,
    refresh: Mutex<()>,
    refreshes: AtomicU64,
}

impl SessionCache {
    /// Creates an empty cache for `provider`.
    #[must_use]
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            epoch: Instant::now(),
            expires_at_ms: AtomicU64::new(0),
            token: RwLock::new(None),
            refresh: Mutex::new(()),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Number of logins performed so far.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Returns the cached token if it has not expired.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<str>> {
        let expires_at = self.expires_at_ms.load(Ordering::Acquire);
        if expires_at == 0 || self.now_ms() >= expires_at {
            return None;
        }
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns a valid token, calling `login` if the cache is empty or expired.
    ///
    /// Concurrent callers that find the cache expired queue on the refresh
    /// lock; only the first performs the login.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `login`.
    pub async fn token<F, Fut, E>(&self, login: F) -> Result<Arc<str>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session, E>>,
    {
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        debug!(provider = %self.provider, "Session expired; logging in");
        let session = login().await?;
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        info!(provider = %self.provider, "Session refreshed");
        Ok(self.store(session))
    }

    /// Force-expires the cache.
    pub fn invalidate(&self) {
        self.expires_at_ms.store(0, Ordering::Release);
    }

    /// Force-expires the cache only if `rejected` is still the cached token.
    ///
    /// A caller holding a stale token must not discard a session another
    /// caller has already refreshed.
    pub fn invalidate_token(&self, rejected: &str) {
        let current = self.token.read().unwrap_or_else(PoisonError::into_inner);
        if current.as_deref() == Some(rejected) {
            self.invalidate();
        }
    }

    /// Runs `op` with a valid token, re-logging in and retrying exactly once
    /// if the hoster rejects the token.
    ///
    /// # Errors
    ///
    /// Propagates errors from `login` and `op`; returns
    /// [`SessionError::Rejected`] (converted into `E`) when the retry is
    /// rejected too.
    pub async fn run<T, E, L, LFut, O, OFut>(&self, mut login: L, mut op: O) -> Result<T, E>
    where
        L: FnMut() -> LFut,
        LFut: Future<Output = Result<Session, E>>,
        O: FnMut(Arc<str>) -> OFut,
        OFut: Future<Output = Result<Attempt<T>, E>>,
        E: From<SessionError>,
    {
        for attempt in 1..=2 {
            let token = self.token(&mut login).await?;
            match op(Arc::clone(&token)).await? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Rejected => {
                    debug!(provider = %self.provider, attempt, "Session rejected by hoster");
                    self.invalidate_token(&token);
                }
            }
        }
        Err(SessionError::rejected(&self.provider).into())
    }

    fn store(&self, session: Session) -> Arc<str> {
        let token = Arc::clone(&session.token);
        {
            let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
            *slot = Some(Arc::clone(&token));
        }
        let expires_at = session.expires_at.saturating_duration_since(self.epoch);
        let expires_at_ms = u64::try_from(expires_at.as_millis()).unwrap_or(u64::MAX);
        self.expires_at_ms.store(expires_at_ms, Ordering::Release);
        token
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("provider", &self.provider)
            .field("valid", &self.cached().is_some())
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

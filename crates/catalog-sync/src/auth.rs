//! API key to bearer token exchange and per-key token caching.
//!
//! Concurrent callers asking for the same key while no usable token is
//! cached share one in-flight exchange.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::models::TokenGrant;
use crate::{SyncError, SyncResult};

/// Exchanges an API key for a short-lived bearer token.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, api_key: &str) -> SyncResult<TokenGrant>;
}

/// Bearer token cached for one API key.
#[derive(Clone)]
pub struct CredentialToken {
    pub api_key: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CredentialToken {
    /// A token is usable only while `now < expires_at`.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }
}

impl fmt::Debug for CredentialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialToken")
            .field("api_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Upper bound applied to the server-reported token lifetime.
const MAX_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

type ExchangeFuture = Shared<BoxFuture<'static, Result<CredentialToken, String>>>;

enum Slot {
    Ready(CredentialToken),
    Pending { generation: u64, fut: ExchangeFuture },
}

#[derive(Default)]
struct CacheState {
    slots: HashMap<String, Slot>,
    next_generation: u64,
}

/// Cache of bearer tokens keyed by API key.
pub struct CredentialCache {
    exchanger: Arc<dyn TokenExchanger>,
    safety_margin: chrono::Duration,
    state: Mutex<CacheState>,
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCache")
            .field("safety_margin", &self.safety_margin)
            .finish_non_exhaustive()
    }
}

impl CredentialCache {
    /// Creates a cache backed by `exchanger`.
    ///
    /// `safety_margin` is subtracted from the server TTL so a token is never
    /// used right before it expires. Server TTLs above 30 days are capped.
    pub fn new(exchanger: Arc<dyn TokenExchanger>, safety_margin: Duration) -> Self {
        Self {
            exchanger,
            safety_margin: chrono::Duration::from_std(safety_margin)
                .unwrap_or_else(|_| chrono::Duration::seconds(60))
                .min(chrono::Duration::seconds(MAX_TOKEN_TTL_SECS)),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns a usable token for `api_key`, exchanging the key if needed.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Auth` when the exchange fails. Failures are not
    /// cached: the next call starts a new exchange.
    #[instrument(skip_all)]
    pub async fn get_token(&self, api_key: &str) -> SyncResult<CredentialToken> {
        loop {
            let (generation, fut, joined) = {
                let mut state = self.state.lock().await;
                match state.slots.get(api_key) {
                    Some(Slot::Ready(token)) if token.is_usable() => {
                        debug!("Using cached token");
                        return Ok(token.clone());
                    }
                    Some(Slot::Pending { generation, fut }) => {
                        debug!("Joining in-flight token exchange");
                        (*generation, fut.clone(), true)
                    }
                    _ => {
                        debug!("Exchanging API key for a new token");
                        let generation = state.next_generation;
                        state.next_generation += 1;
                        let fut = self.start_exchange(api_key);
                        state.slots.insert(
                            api_key.to_string(),
                            Slot::Pending {
                                generation,
                                fut: fut.clone(),
                            },
                        );
                        (generation, fut, false)
                    }
                }
            };

            let outcome = fut.await;

            let mut state = self.state.lock().await;
            let still_pending = matches!(
                state.slots.get(api_key),
                Some(Slot::Pending { generation: g, .. }) if *g == generation
            );
            match outcome {
                // A joined exchange may have completed long ago.
                Ok(token) if joined && !token.is_usable() => {
                    debug!("Joined exchange yielded an expired token");
                    if still_pending {
                        state.slots.remove(api_key);
                    }
                }
                Ok(token) => {
                    if still_pending {
                        state
                            .slots
                            .insert(api_key.to_string(), Slot::Ready(token.clone()));
                    }
                    return Ok(token);
                }
                Err(message) => {
                    if still_pending {
                        state.slots.remove(api_key);
                    }
                    return Err(SyncError::Auth(message));
                }
            }
        }
    }

    fn start_exchange(&self, api_key: &str) -> ExchangeFuture {
        let exchanger = Arc::clone(&self.exchanger);
        let margin = self.safety_margin;
        let api_key = api_key.to_string();

        async move {
            let grant = exchanger
                .exchange(&api_key)
                .await
                .map_err(|e| e.to_string())?;
            let ttl = chrono::Duration::seconds(grant.expires_in.clamp(0, MAX_TOKEN_TTL_SECS));
            let expires_at = Utc::now() + ttl - margin;
            debug!(expires_at = %expires_at, "Acquired new token");
            Ok(CredentialToken {
                api_key,
                access_token: grant.access_token,
                expires_at,
            })
        }
        .boxed()
        .shared()
    }

    /// Drops the cached token for `api_key`; an in-flight exchange for it
    /// will not repopulate the cache.
    pub async fn invalidate(&self, api_key: &str) {
        let mut state = self.state.lock().await;
        if state.slots.remove(api_key).is_some() {
            debug!("Invalidated cached token");
        }
    }

    /// Drops every cached token.
    pub async fn invalidate_all(&self) {
        let mut state = self.state.lock().await;
        let count = state.slots.len();
        state.slots.clear();
        debug!(count, "Invalidated all cached tokens");
    }

    /// API keys with a cached or in-flight token.
    pub async fn cached_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().await.slots.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of keys with a cached or in-flight token.
    pub async fn len(&self) -> usize {
        self.state.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    api_key: &'a str,
}

/// Exchanges keys against `POST {base_url}/apikey/token`.
#[derive(Debug, Clone)]
pub struct HttpTokenExchanger {
    http_client: reqwest::Client,
    token_url: String,
}

impl HttpTokenExchanger {
    #[must_use]
    pub fn new(http_client: reqwest::Client, base_url: &str) -> Self {
        Self {
            http_client,
            token_url: format!("{}/apikey/token", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    #[instrument(skip_all, fields(url = %self.token_url))]
    async fn exchange(&self, api_key: &str) -> SyncResult<TokenGrant> {
        let response = self
            .http_client
            .post(&self.token_url)
            .json(&TokenRequest { api_key })
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Token exchange rejected");
            return Err(SyncError::Auth(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| SyncError::Auth(format!("Failed to parse token response: {e}")))
    }
}

//! HTTP client for the Remote Catalog Service.
//!
//! Every request carries a bearer token from the [`CredentialCache`] and goes
//! through a bounded retry loop. Mutating calls additionally wait on the
//! [`MutationThrottle`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::{CredentialCache, HttpTokenExchanger};
use crate::config::{RemoteCatalogConfig, MAX_PAGE_SIZE};
use crate::models::{
    ProductBatchOutcome, ProductBatchRequest, ProductBatchResponse, RemoteCategory,
    RemoteCategoryCreate, RemoteCollection, RemotePage, RemoteProduct, RemoteProductCreate,
};
use crate::pagination::fetch_all_pages;
use crate::query::{ListFilter, ListQuery};
use crate::throttle::MutationThrottle;
use crate::{SyncError, SyncResult};

const TOTAL_COUNT_KEY: &str = "totalCount";

/// Client for the Remote Catalog Service.
#[derive(Debug)]
pub struct RemoteCatalogClient {
    http_client: reqwest::Client,
    config: RemoteCatalogConfig,
    credentials: Arc<CredentialCache>,
    throttle: MutationThrottle,
}

impl RemoteCatalogClient {
    /// Creates a client with its own credential cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: RemoteCatalogConfig) -> SyncResult<Self> {
        let http_client = build_http_client(&config)?;
        let exchanger = HttpTokenExchanger::new(http_client.clone(), &config.base_url);
        let credentials = Arc::new(CredentialCache::new(
            Arc::new(exchanger),
            config.token_safety_margin,
        ));
        Self::from_parts(http_client, config, credentials)
    }

    /// Creates a client sharing an existing credential cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn with_credentials(
        config: RemoteCatalogConfig,
        credentials: Arc<CredentialCache>,
    ) -> SyncResult<Self> {
        let http_client = build_http_client(&config)?;
        Self::from_parts(http_client, config, credentials)
    }

    fn from_parts(
        http_client: reqwest::Client,
        config: RemoteCatalogConfig,
        credentials: Arc<CredentialCache>,
    ) -> SyncResult<Self> {
        config.validate()?;
        let throttle = MutationThrottle::new(config.throttle);
        Ok(Self {
            http_client,
            config,
            credentials,
            throttle,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RemoteCatalogConfig {
        &self.config
    }

    /// Credential cache used by this client.
    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    /// Throttle applied to mutating calls.
    #[must_use]
    pub fn throttle(&self) -> &MutationThrottle {
        &self.throttle
    }

    /// Fetches one page of collection `C`.
    ///
    /// # Errors
    ///
    /// Returns an error on authentication, transport or decoding failure, or
    /// when `query.limit` exceeds [`MAX_PAGE_SIZE`].
    #[instrument(skip(self, api_key), fields(path = C::PATH, start = query.start, limit = query.limit))]
    pub async fn fetch_page<C: RemoteCollection>(
        &self,
        api_key: &str,
        query: &ListQuery,
    ) -> SyncResult<RemotePage<C>> {
        if query.limit == 0 || query.limit > MAX_PAGE_SIZE {
            return Err(SyncError::Config(format!(
                "limit must be in 1..={MAX_PAGE_SIZE}, got {}",
                query.limit
            )));
        }

        let mut url = self.endpoint(C::PATH)?;
        url.set_query(Some(&query.to_query_string()));

        let response = self
            .execute(api_key, Method::GET, url, None::<&()>)
            .await?;
        let body: Value = response.json().await?;
        let page = parse_envelope::<C>(body)?;
        debug!(items = page.items.len(), total_count = page.total_count, "Fetched page");
        Ok(page)
    }

    /// Fetches the whole collection `C` matching `filter`.
    ///
    /// # Errors
    ///
    /// Fails as a whole when any page request fails.
    pub async fn fetch_all<C: RemoteCollection>(
        &self,
        api_key: &str,
        filter: &ListFilter,
        page_size: u32,
    ) -> SyncResult<Vec<C>> {
        self.fetch_all_with_cancel(api_key, filter, page_size, &CancellationToken::new())
            .await
    }

    /// Same as [`fetch_all`](Self::fetch_all), honouring `cancel` between pages.
    ///
    /// # Errors
    ///
    /// Fails as a whole when any page request fails, or with
    /// `SyncError::Cancelled`.
    #[instrument(skip(self, api_key, filter, cancel), fields(path = C::PATH))]
    pub async fn fetch_all_with_cancel<C: RemoteCollection>(
        &self,
        api_key: &str,
        filter: &ListFilter,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> SyncResult<Vec<C>> {
        // Resolve the token up front so an auth failure aborts before any page.
        self.credentials.get_token(api_key).await?;

        let items = fetch_all_pages(
            page_size,
            self.config.max_concurrent_pages,
            cancel,
            |start, limit| async move {
                self.fetch_page::<C>(api_key, &filter.page(start, limit))
                    .await
            },
        )
        .await?;
        debug!(count = items.len(), "Fetched collection");
        Ok(items)
    }

    /// Creates a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is empty.
    #[instrument(skip(self, api_key, params), fields(description = %params.description))]
    pub async fn create_category(
        &self,
        api_key: &str,
        params: &RemoteCategoryCreate,
    ) -> SyncResult<RemoteCategory> {
        let url = self.endpoint("/categories")?;
        self.mutate(api_key, Method::POST, url, Some(params))
            .await?
            .ok_or_else(|| SyncError::Protocol("empty response to category create".to_string()))
    }

    /// Updates a category. A `204` response yields the submitted category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, api_key, category), fields(id = %category.id))]
    pub async fn update_category(
        &self,
        api_key: &str,
        category: &RemoteCategory,
    ) -> SyncResult<RemoteCategory> {
        let url = self.item_endpoint("/categories", &category.id)?;
        Ok(self
            .mutate(api_key, Method::PUT, url, Some(category))
            .await?
            .unwrap_or_else(|| category.clone()))
    }

    /// Deletes a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, api_key))]
    pub async fn delete_category(&self, api_key: &str, id: &str) -> SyncResult<()> {
        let url = self.item_endpoint("/categories", id)?;
        self.mutate::<Value, ()>(api_key, Method::DELETE, url, None)
            .await?;
        Ok(())
    }

    /// Creates a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is empty.
    #[instrument(skip(self, api_key, params), fields(description = %params.description))]
    pub async fn create_product(
        &self,
        api_key: &str,
        params: &RemoteProductCreate,
    ) -> SyncResult<RemoteProduct> {
        let url = self.endpoint("/products")?;
        self.mutate(api_key, Method::POST, url, Some(params))
            .await?
            .ok_or_else(|| SyncError::Protocol("empty response to product create".to_string()))
    }

    /// Updates a product. A `204` response yields the submitted product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, api_key, product), fields(id = %product.id))]
    pub async fn update_product(
        &self,
        api_key: &str,
        product: &RemoteProduct,
    ) -> SyncResult<RemoteProduct> {
        let url = self.item_endpoint("/products", &product.id)?;
        Ok(self
            .mutate(api_key, Method::PUT, url, Some(product))
            .await?
            .unwrap_or_else(|| product.clone()))
    }

    /// Deletes a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, api_key))]
    pub async fn delete_product(&self, api_key: &str, id: &str) -> SyncResult<()> {
        let url = self.item_endpoint("/products", id)?;
        self.mutate::<Value, ()>(api_key, Method::DELETE, url, None)
            .await?;
        Ok(())
    }

    /// Creates and updates products in one call.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, api_key, batch), fields(create = batch.create.len(), update = batch.update.len()))]
    pub async fn batch_products(
        &self,
        api_key: &str,
        batch: &ProductBatchRequest,
    ) -> SyncResult<ProductBatchOutcome> {
        let url = self.endpoint("/products/batch")?;
        let response: Option<ProductBatchResponse> =
            self.mutate(api_key, Method::POST, url, Some(batch)).await?;
        Ok(response.map(|r| r.batch_response).unwrap_or_default())
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        Ok(Url::parse(&format!("{}{path}", self.config.base_url))?)
    }

    fn item_endpoint(&self, path: &str, id: &str) -> SyncResult<Url> {
        self.endpoint(&format!("{path}/{}", urlencoding::encode(id)))
    }

    /// Throttled request whose response body may be absent.
    async fn mutate<T, B>(
        &self,
        api_key: &str,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> SyncResult<Option<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.throttle.acquire().await;
        let response = self.execute(api_key, method, url, body).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Sends a request and returns the successful response.
    ///
    /// Transient failures are retried with backoff; a `401` drops the cached
    /// token and is retried once with a fresh one.
    async fn execute<B>(
        &self,
        api_key: &str,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> SyncResult<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let retry = &self.config.retry;
        let mut attempt = 0u32;
        let mut reauthenticated = false;

        loop {
            let token = self.credentials.get_token(api_key).await?;

            let mut request = self
                .http_client
                .request(method.clone(), url.clone())
                .bearer_auth(&token.access_token)
                .header(CONTENT_TYPE, "application/json")
                .header("X-Version", &self.config.api_version)
                .header("X-Requested-With", "*");
            if let Some(b) = body {
                request = request.json(b);
            }

            let (error, retry_after) = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                        reauthenticated = true;
                        warn!("Remote rejected token, re-authenticating");
                        self.credentials.invalidate(api_key).await;
                        continue;
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let message = response.text().await.unwrap_or_default();
                    (SyncError::remote(status.as_u16(), message), retry_after)
                }
                Err(e) => (SyncError::Http(e), None),
            };

            if !error.is_transient() {
                return Err(error);
            }
            if attempt >= retry.max_retries {
                if attempt == 0 {
                    return Err(error);
                }
                warn!(attempts = attempt, error = %error, "Giving up after retries");
                return Err(SyncError::MaxRetriesExceeded { attempts: attempt });
            }

            attempt += 1;
            let max_delay = Duration::from_millis(retry.max_backoff_ms);
            let delay = retry_after
                .map_or_else(|| retry.backoff(attempt), |d| d.min(max_delay));
            warn!(
                status = ?error.status(),
                attempt,
                max_retries = retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Transient remote failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn build_http_client(config: &RemoteCatalogConfig) -> SyncResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {e}")))
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Splits a list response envelope into its items and total count.
///
/// A missing or null collection key is an empty page; a missing
/// `totalCount` is taken to be the number of items on the page.
pub(crate) fn parse_envelope<C: RemoteCollection>(mut body: Value) -> SyncResult<RemotePage<C>> {
    if !body.is_object() {
        return Err(SyncError::Protocol(format!(
            "expected an object envelope for {}",
            C::PATH
        )));
    }

    let items: Vec<C> = match body.get_mut(C::ENVELOPE_KEY).map(Value::take) {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value(raw)?,
    };
    let total_count = body
        .get(TOTAL_COUNT_KEY)
        .and_then(Value::as_u64)
        .unwrap_or(items.len() as u64);

    Ok(RemotePage { items, total_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RemoteSalesPoint, RemoteTable};
    use serde_json::json;

    #[test]
    fn test_parse_envelope() {
        let page: RemotePage<RemoteTable> = parse_envelope(json!({
            "tables": [{"id": "T1", "name": "One"}, {"id": "T2", "name": "Two"}],
            "totalCount": 12
        }))
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_count, 12);
    }

    #[test]
    fn test_parse_envelope_missing_parts() {
        let page: RemotePage<RemoteSalesPoint> =
            parse_envelope(json!({"salesPoint": [{"id": 5, "name": "Main"}]})).unwrap();
        assert_eq!(page.total_count, 1);

        let page: RemotePage<RemoteSalesPoint> = parse_envelope(json!({"totalCount": 0})).unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_parse_envelope_rejects_non_object() {
        let result = parse_envelope::<RemoteTable>(json!([1, 2]));
        assert!(matches!(result, Err(SyncError::Protocol(_))));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, "3".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = RemoteCatalogClient::new(RemoteCatalogConfig::default());
        assert!(matches!(result, Err(SyncError::Config(_))));
    }
}

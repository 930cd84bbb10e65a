//! Local Catalog Store backed by the back-office REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::LocalCatalogStore;
use crate::error::StoreError;
use crate::models::{LocalCatalog, LocalCategory, LocalProduct, LocalTable};

/// HTTP implementation of `LocalCatalogStore`.
///
/// Collections live under `{base_url}/categories`, `/products` and
/// `/tables`; listing filters by `?projectId=`.
#[derive(Debug, Clone)]
pub struct HttpCatalogStore {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogStore {
    /// Creates a store for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the URL is invalid or the HTTP
    /// client cannot be created.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        url::Url::parse(base_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid store URL '{base_url}': {e}")))?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send<T, B>(
        &self,
        kind: &'static str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http_client.request(method, &url);
        if let Some(b) = body {
            request = request.json(b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| StoreError::Unavailable(format!("invalid {kind} response: {e}")));
        }

        let message = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), kind, "Store request failed");
        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound {
                kind,
                id: path.rsplit('/').next().unwrap_or_default().to_string(),
            },
            s if s.is_client_error() => StoreError::Rejected(format!("{status}: {message}")),
            _ => StoreError::Unavailable(format!("{status}: {message}")),
        })
    }

    async fn list<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        collection: &str,
        project_id: Uuid,
    ) -> Result<Vec<T>, StoreError> {
        self.send::<Vec<T>, ()>(
            kind,
            Method::GET,
            &format!("/{collection}?projectId={project_id}"),
            None,
        )
        .await
    }
}

#[async_trait]
impl LocalCatalogStore for HttpCatalogStore {
    #[instrument(skip(self, category), fields(name = %category.name))]
    async fn create_category(&self, category: &LocalCategory) -> Result<LocalCategory, StoreError> {
        self.send("category", Method::POST, "/categories", Some(category))
            .await
    }

    #[instrument(skip(self, category))]
    async fn update_category(
        &self,
        id: Uuid,
        category: &LocalCategory,
    ) -> Result<LocalCategory, StoreError> {
        self.send("category", Method::PUT, &format!("/categories/{id}"), Some(category))
            .await
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn create_product(&self, product: &LocalProduct) -> Result<LocalProduct, StoreError> {
        self.send("product", Method::POST, "/products", Some(product))
            .await
    }

    #[instrument(skip(self, product))]
    async fn update_product(
        &self,
        id: Uuid,
        product: &LocalProduct,
    ) -> Result<LocalProduct, StoreError> {
        self.send("product", Method::PUT, &format!("/products/{id}"), Some(product))
            .await
    }

    #[instrument(skip(self, table), fields(name = %table.name))]
    async fn create_table(&self, table: &LocalTable) -> Result<LocalTable, StoreError> {
        self.send("table", Method::POST, "/tables", Some(table)).await
    }

    #[instrument(skip(self, table))]
    async fn update_table(&self, id: Uuid, table: &LocalTable) -> Result<LocalTable, StoreError> {
        self.send("table", Method::PUT, &format!("/tables/{id}"), Some(table))
            .await
    }

    #[instrument(skip(self))]
    async fn load_catalog(&self, project_id: Uuid) -> Result<LocalCatalog, StoreError> {
        let categories = self.list("category", "categories", project_id).await?;
        let products = self.list("product", "products", project_id).await?;
        let tables = self.list("table", "tables", project_id).await?;
        debug!(
            categories = categories.len(),
            products = products.len(),
            tables = tables.len(),
            "Loaded local catalog"
        );
        Ok(LocalCatalog {
            categories,
            products,
            tables,
        })
    }
}

//! Remote Catalog Synchronization Engine
//!
//! Mirrors a local restaurant/retail catalog (categories, products, tables)
//! against a point-of-sale cloud service.
//!
//! # Features
//!
//! - API key to bearer token exchange with a per-key, single-flight token cache
//! - Whole-collection retrieval over a page-limited list API, pages fetched concurrently
//! - Pure mapping of remote entities to local ones with sales-point price resolution
//! - Failure-isolated reconciliation (create / update / skip) with progress and cancellation
//! - Export of unlinked local entities to the remote catalog
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use catalog_sync::models::{MappingContext, RemoteEntity, RemoteProduct};
//! use catalog_sync::store::InMemoryCatalogStore;
//! use catalog_sync::{ListFilter, ReconciliationEngine, RemoteCatalogClient, RemoteCatalogConfig};
//! use tokio_util::sync::CancellationToken;
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RemoteCatalogConfig::builder()
//!     .base_url("https://api.example-pos.com")
//!     .build()?;
//! let client = RemoteCatalogClient::new(config.clone())?;
//!
//! let products: Vec<RemoteProduct> = client
//!     .fetch_all("api-key", &ListFilter::new().sales_point(5), 100)
//!     .await?;
//!
//! let store = Arc::new(InMemoryCatalogStore::new());
//! let engine = ReconciliationEngine::new(store, config.throttle);
//! let ctx = MappingContext::new(Uuid::new_v4(), Uuid::new_v4(), 5);
//! let selected = products.into_iter().map(RemoteEntity::from).collect();
//!
//! let summary = engine
//!     .reconcile_from_store(selected, &ctx, &CancellationToken::new())
//!     .await?;
//! println!("created {} updated {}", summary.created, summary.updated);
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
mod error;
mod export;
mod pagination;
mod query;
mod throttle;

pub mod mapping;
pub mod models;
pub mod reconcile;
pub mod store;

// Re-exports
pub use auth::{CredentialCache, CredentialToken, HttpTokenExchanger, TokenExchanger};
pub use client::RemoteCatalogClient;
pub use config::{
    ConfigError, RemoteCatalogConfig, RemoteCatalogConfigBuilder, RetryConfig,
    DEFAULT_API_VERSION, MAX_PAGE_SIZE,
};
pub use error::{MappingError, StoreError, SyncError, SyncResult};
pub use export::CatalogExporter;
pub use pagination::{fetch_all_pages, remaining_pages};
pub use query::{ListFilter, ListQuery, SortDirection};
pub use reconcile::{ReconciliationEngine, RunState, RunSummary};
pub use throttle::{MutationThrottle, ThrottleConfig};

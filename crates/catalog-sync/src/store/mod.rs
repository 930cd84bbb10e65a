//! Local Catalog Store seam.
//!
//! The reconciliation engine and the exporter only talk to the local catalog
//! through [`LocalCatalogStore`]. Two implementations ship with the crate: an
//! in-memory store for tests and dry runs, and an HTTP store talking to the
//! back-office API.

mod http;
mod memory;

pub use http::HttpCatalogStore;
pub use memory::InMemoryCatalogStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{LocalCatalog, LocalCategory, LocalProduct, LocalTable};

/// Persistence operations the engine needs from the local catalog.
///
/// `create_*` receives an entity whose `id` is `None` and returns it with the
/// assigned id. `update_*` replaces the entity stored under `id`.
#[async_trait]
pub trait LocalCatalogStore: Send + Sync {
    async fn create_category(&self, category: &LocalCategory) -> Result<LocalCategory, StoreError>;

    async fn update_category(
        &self,
        id: Uuid,
        category: &LocalCategory,
    ) -> Result<LocalCategory, StoreError>;

    async fn create_product(&self, product: &LocalProduct) -> Result<LocalProduct, StoreError>;

    async fn update_product(
        &self,
        id: Uuid,
        product: &LocalProduct,
    ) -> Result<LocalProduct, StoreError>;

    async fn create_table(&self, table: &LocalTable) -> Result<LocalTable, StoreError>;

    async fn update_table(&self, id: Uuid, table: &LocalTable) -> Result<LocalTable, StoreError>;

    /// Loads every category, product and table of a project.
    async fn load_catalog(&self, project_id: Uuid) -> Result<LocalCatalog, StoreError>;
}

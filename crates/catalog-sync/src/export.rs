//! Export of local entities to the Remote Catalog Service.
//!
//! Only entities without a `remote_id` are exported. Every remote entity
//! created here carries the local id as its `externalId`. Before creating,
//! the remote collection is searched for that id, so an entity whose local
//! link could not be stored in an earlier run is linked instead of created
//! again.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::client::RemoteCatalogClient;
use crate::mapping::{category_create_params, product_create_params};
use crate::models::{
    LocalCategory, LocalProduct, RemoteCategory, RemoteCollection, RemoteProduct,
};
use crate::query::ListFilter;
use crate::reconcile::{EntityRef, Outcome, RunSummary};
use crate::store::LocalCatalogStore;
use crate::{SyncError, SyncResult};

/// Pushes local categories and products to the remote catalog.
pub struct CatalogExporter {
    client: Arc<RemoteCatalogClient>,
    store: Arc<dyn LocalCatalogStore>,
}

impl std::fmt::Debug for CatalogExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogExporter")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl CatalogExporter {
    pub fn new(client: Arc<RemoteCatalogClient>, store: Arc<dyn LocalCatalogStore>) -> Self {
        Self { client, store }
    }

    /// Exports categories that are not linked yet.
    ///
    /// A category already present remotely under its local id is linked and
    /// counted as updated.
    #[instrument(skip_all, fields(count = categories.len()))]
    pub async fn export_categories(
        &self,
        api_key: &str,
        categories: &[LocalCategory],
        cancel: &CancellationToken,
    ) -> RunSummary {
        let mut summary = RunSummary::new(categories.len());
        let unlinked = categories.iter().any(|c| c.remote_id.is_none());

        let existing = if unlinked {
            match self
                .existing_remote::<RemoteCategory>(api_key, cancel, |c| c.external_id.as_ref())
                .await
            {
                Ok(existing) => existing,
                Err(e) => {
                    let entities = categories
                        .iter()
                        .map(|c| (c.remote_id.is_some(), EntityRef::from(c)));
                    abort_unlinked(&mut summary, entities, &e);
                    log_summary("categories", &summary);
                    return summary;
                }
            }
        } else {
            HashMap::new()
        };

        for category in categories {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if category.remote_id.is_some() {
                summary.record(Outcome::Skipped);
                continue;
            }
            let found = category.id.and_then(|id| existing.get(&id.to_string()));
            match self.export_category(api_key, category, found).await {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    warn!(name = %category.name, error = %e, "Failed to export category");
                    summary.record_failure(failed_ref(EntityRef::from(category), &e), &e);
                }
            }
        }

        log_summary("categories", &summary);
        summary
    }

    async fn export_category(
        &self,
        api_key: &str,
        category: &LocalCategory,
        existing: Option<&RemoteCategory>,
    ) -> SyncResult<Outcome> {
        let id = local_id(category.id, "category", &category.name)?;
        let params = category_create_params(category)?;
        let (remote, outcome) = match existing {
            Some(remote) => {
                info!(
                    remote_id = %remote.id,
                    name = %category.name,
                    "Linking existing remote category"
                );
                (remote.clone(), Outcome::Updated)
            }
            None => (
                self.client.create_category(api_key, &params).await?,
                Outcome::Created,
            ),
        };

        let remote_id = remote.id.clone();
        let linked = LocalCategory {
            remote_id: Some(remote_id.clone()),
            remote_sales_point_id: Some(params.id_sales_point),
            remote_snapshot: Some(remote),
            ..category.clone()
        };
        self.store
            .update_category(id, &linked)
            .await
            .map_err(|source| SyncError::Unlinked { remote_id, source })?;
        Ok(outcome)
    }

    /// Exports products that are not linked yet.
    ///
    /// `categories` resolves each product's local category to its remote id;
    /// a product whose category has not been exported fails with a mapping
    /// error.
    #[instrument(skip_all, fields(count = products.len()))]
    pub async fn export_products(
        &self,
        api_key: &str,
        products: &[LocalProduct],
        categories: &[LocalCategory],
        cancel: &CancellationToken,
    ) -> RunSummary {
        let remote_categories: HashMap<Uuid, &str> = categories
            .iter()
            .filter_map(|c| Some((c.id?, c.remote_id.as_deref()?)))
            .collect();
        let mut summary = RunSummary::new(products.len());
        let unlinked = products.iter().any(|p| p.remote_id.is_none());

        let existing = if unlinked {
            match self
                .existing_remote::<RemoteProduct>(api_key, cancel, |p| p.external_id.as_ref())
                .await
            {
                Ok(existing) => existing,
                Err(e) => {
                    let entities = products
                        .iter()
                        .map(|p| (p.remote_id.is_some(), EntityRef::from(p)));
                    abort_unlinked(&mut summary, entities, &e);
                    log_summary("products", &summary);
                    return summary;
                }
            }
        } else {
            HashMap::new()
        };

        for product in products {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if product.remote_id.is_some() {
                summary.record(Outcome::Skipped);
                continue;
            }
            let remote_category_id = product
                .category_id
                .and_then(|id| remote_categories.get(&id).copied());
            let found = product.id.and_then(|id| existing.get(&id.to_string()));
            match self
                .export_product(api_key, product, remote_category_id, found)
                .await
            {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    warn!(name = %product.name, error = %e, "Failed to export product");
                    summary.record_failure(failed_ref(EntityRef::from(product), &e), &e);
                }
            }
        }

        log_summary("products", &summary);
        summary
    }

    async fn export_product(
        &self,
        api_key: &str,
        product: &LocalProduct,
        remote_category_id: Option<&str>,
        existing: Option<&RemoteProduct>,
    ) -> SyncResult<Outcome> {
        let id = local_id(product.id, "product", &product.name)?;
        let params = product_create_params(product, remote_category_id)?;
        let (remote, outcome) = match existing {
            Some(remote) => {
                info!(
                    remote_id = %remote.id,
                    name = %product.name,
                    "Linking existing remote product"
                );
                (remote.clone(), Outcome::Updated)
            }
            None => (
                self.client.create_product(api_key, &params).await?,
                Outcome::Created,
            ),
        };

        let remote_id = remote.id.clone();
        let linked = LocalProduct {
            remote_id: Some(remote_id.clone()),
            remote_sales_point_id: Some(params.id_sales_point),
            remote_snapshot: Some(remote),
            ..product.clone()
        };
        self.store
            .update_product(id, &linked)
            .await
            .map_err(|source| SyncError::Unlinked { remote_id, source })?;
        Ok(outcome)
    }

    /// Remote entities of collection `C` keyed by external id.
    async fn existing_remote<C: RemoteCollection>(
        &self,
        api_key: &str,
        cancel: &CancellationToken,
        external_id: impl Fn(&C) -> Option<&String>,
    ) -> SyncResult<HashMap<String, C>> {
        let items: Vec<C> = self
            .client
            .fetch_all_with_cancel(
                api_key,
                &ListFilter::new(),
                self.client.config().page_size,
                cancel,
            )
            .await?;
        Ok(items
            .into_iter()
            .filter_map(|item| external_id(&item).cloned().map(|id| (id, item)))
            .collect())
    }
}

/// Records the outcome of a run whose remote lookup failed: linked entities
/// are skipped, unlinked ones fail with `error`.
fn abort_unlinked(
    summary: &mut RunSummary,
    entities: impl Iterator<Item = (bool, EntityRef)>,
    error: &SyncError,
) {
    if matches!(error, SyncError::Cancelled) {
        summary.cancelled = true;
        return;
    }
    warn!(error = %error, "Failed to look up existing remote entities");
    for (linked, entity) in entities {
        if linked {
            summary.record(Outcome::Skipped);
        } else {
            summary.record_failure(entity, error);
        }
    }
}

/// Carries the remote id of an entity that exists remotely but is not linked.
fn failed_ref(mut entity: EntityRef, error: &SyncError) -> EntityRef {
    if let SyncError::Unlinked { remote_id, .. } = error {
        entity.remote_id = Some(remote_id.clone());
    }
    entity
}

fn local_id(id: Option<Uuid>, kind: &'static str, name: &str) -> SyncResult<Uuid> {
    id.ok_or_else(|| {
        SyncError::Persistence(crate::error::StoreError::NotFound {
            kind,
            id: format!("unsaved {kind} '{name}'"),
        })
    })
}

fn log_summary(what: &str, summary: &RunSummary) {
    info!(
        what,
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed.len(),
        cancelled = summary.cancelled,
        "Export completed"
    );
}

//! Reconciliation engine.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::diff::{
    category_changed, merge_category, merge_product, merge_table, product_changed, table_changed,
};
use super::summary::{EntityRef, Outcome, RunState, RunSummary};
use crate::error::StoreError;
use crate::mapping::{map_category, map_product, map_table};
use crate::models::{
    EntityKind, LocalCatalog, LocalCategory, LocalProduct, LocalTable, MappingContext,
    RemoteCategory, RemoteEntity, RemoteProduct, RemoteTable,
};
use crate::store::LocalCatalogStore;
use crate::throttle::{MutationThrottle, ThrottleConfig};
use crate::{SyncError, SyncResult};

/// Local entities of one run, indexed by remote id.
#[derive(Debug, Default)]
struct LocalIndex {
    categories: HashMap<String, LocalCategory>,
    products: HashMap<String, LocalProduct>,
    tables: HashMap<String, LocalTable>,
}

impl LocalIndex {
    fn new(catalog: &LocalCatalog) -> Self {
        fn by_remote_id<T: Clone>(
            items: &[T],
            remote_id: impl Fn(&T) -> Option<&String>,
        ) -> HashMap<String, T> {
            items
                .iter()
                .filter_map(|item| remote_id(item).map(|id| (id.clone(), item.clone())))
                .collect()
        }

        Self {
            categories: by_remote_id(&catalog.categories, |c| c.remote_id.as_ref()),
            products: by_remote_id(&catalog.products, |p| p.remote_id.as_ref()),
            tables: by_remote_id(&catalog.tables, |t| t.remote_id.as_ref()),
        }
    }

    /// Local id of the category linked to `remote_category_id`.
    fn local_category_id(&self, remote_category_id: &str) -> Option<Uuid> {
        self.categories.get(remote_category_id).and_then(|c| c.id)
    }
}

/// Decides create, update or skip for selected remote entities and applies
/// the decision to the Local Catalog Store.
///
/// Items are processed one at a time. A failing item is recorded in the
/// [`RunSummary`] and never stops the run.
pub struct ReconciliationEngine {
    store: Arc<dyn LocalCatalogStore>,
    throttle: MutationThrottle,
    state: watch::Sender<RunState>,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("throttle", &self.throttle)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    /// Creates an engine writing to `store`, pacing writes with `throttle`.
    pub fn new(store: Arc<dyn LocalCatalogStore>, throttle: ThrottleConfig) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            store,
            throttle: MutationThrottle::new(throttle),
            state,
        }
    }

    /// Receiver for run progress.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    /// Loads the project's local catalog from the store, then reconciles.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Persistence` when the local catalog cannot be
    /// loaded. Per-item failures are reported in the summary instead.
    pub async fn reconcile_from_store(
        &self,
        selected: Vec<RemoteEntity>,
        ctx: &MappingContext,
        cancel: &CancellationToken,
    ) -> SyncResult<RunSummary> {
        let local = self.store.load_catalog(ctx.project_id).await?;
        Ok(self.reconcile(selected, &local, ctx, cancel).await)
    }

    /// Reconciles `selected` against `local`.
    ///
    /// Selected entities are processed categories first, then products, then
    /// tables, keeping the selection order within a kind. Cancellation is
    /// checked between items.
    #[instrument(skip_all, fields(project_id = %ctx.project_id, sales_point = ctx.target_sales_point_id))]
    pub async fn reconcile(
        &self,
        mut selected: Vec<RemoteEntity>,
        local: &LocalCatalog,
        ctx: &MappingContext,
        cancel: &CancellationToken,
    ) -> RunSummary {
        selected.sort_by_key(RemoteEntity::kind);

        let total = selected.len();
        let mut index = LocalIndex::new(local);
        let mut summary = RunSummary::new(total);

        info!(total, "Starting reconciliation run");
        self.state.send_replace(RunState::Running {
            processed: 0,
            total,
        });

        for remote in &selected {
            if cancel.is_cancelled() {
                warn!(
                    processed = summary.processed,
                    total, "Reconciliation run cancelled"
                );
                summary.cancelled = true;
                break;
            }

            match self.reconcile_one(remote, &mut index, ctx).await {
                Ok(outcome) => {
                    debug!(kind = %remote.kind(), remote_id = remote.id(), ?outcome, "Reconciled");
                    summary.record(outcome);
                }
                Err(e) => {
                    warn!(
                        kind = %remote.kind(),
                        remote_id = remote.id(),
                        error = %e,
                        "Failed to reconcile item"
                    );
                    summary.record_failure(EntityRef::from(remote), &e);
                }
            }

            self.state.send_replace(RunState::Running {
                processed: summary.processed,
                total,
            });
        }

        info!(
            total,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            cancelled = summary.cancelled,
            "Reconciliation run completed"
        );
        self.state.send_replace(RunState::Completed(summary.clone()));
        summary
    }

    async fn reconcile_one(
        &self,
        remote: &RemoteEntity,
        index: &mut LocalIndex,
        ctx: &MappingContext,
    ) -> SyncResult<Outcome> {
        match remote {
            RemoteEntity::Category(c) => self.reconcile_category(c, index, ctx).await,
            RemoteEntity::Product(p) => self.reconcile_product(p, index, ctx).await,
            RemoteEntity::Table(t) => self.reconcile_table(t, index, ctx).await,
        }
    }

    async fn reconcile_category(
        &self,
        remote: &RemoteCategory,
        index: &mut LocalIndex,
        ctx: &MappingContext,
    ) -> SyncResult<Outcome> {
        let (saved, outcome) = match index.categories.get(&remote.id) {
            None => {
                let local = map_category(remote, ctx);
                self.throttle.acquire().await;
                (self.store.create_category(&local).await?, Outcome::Created)
            }
            Some(existing) if !category_changed(existing, remote) => return Ok(Outcome::Skipped),
            Some(existing) => {
                let id = persisted_id(existing.id, EntityKind::Category, &remote.id)?;
                let merged = merge_category(existing, remote, ctx);
                self.throttle.acquire().await;
                (self.store.update_category(id, &merged).await?, Outcome::Updated)
            }
        };
        index.categories.insert(remote.id.clone(), saved);
        Ok(outcome)
    }

    async fn reconcile_product(
        &self,
        remote: &RemoteProduct,
        index: &mut LocalIndex,
        ctx: &MappingContext,
    ) -> SyncResult<Outcome> {
        let local_category_id = remote
            .id_category
            .as_deref()
            .and_then(|id| index.local_category_id(id));
        let ctx = ctx.with_category(local_category_id);

        let (saved, outcome) = match index.products.get(&remote.id) {
            None => {
                let local = map_product(remote, &ctx)?;
                self.throttle.acquire().await;
                (self.store.create_product(&local).await?, Outcome::Created)
            }
            Some(existing) if !product_changed(existing, remote, &ctx) => {
                return Ok(Outcome::Skipped)
            }
            Some(existing) => {
                let id = persisted_id(existing.id, EntityKind::Product, &remote.id)?;
                let merged = merge_product(existing, remote, &ctx)?;
                self.throttle.acquire().await;
                (self.store.update_product(id, &merged).await?, Outcome::Updated)
            }
        };
        index.products.insert(remote.id.clone(), saved);
        Ok(outcome)
    }

    async fn reconcile_table(
        &self,
        remote: &RemoteTable,
        index: &mut LocalIndex,
        ctx: &MappingContext,
    ) -> SyncResult<Outcome> {
        let (saved, outcome) = match index.tables.get(&remote.id) {
            None => {
                let local = map_table(remote, ctx);
                self.throttle.acquire().await;
                (self.store.create_table(&local).await?, Outcome::Created)
            }
            Some(existing) if !table_changed(existing, remote) => return Ok(Outcome::Skipped),
            Some(existing) => {
                let id = persisted_id(existing.id, EntityKind::Table, &remote.id)?;
                let merged = merge_table(existing, remote, ctx);
                self.throttle.acquire().await;
                (self.store.update_table(id, &merged).await?, Outcome::Updated)
            }
        };
        index.tables.insert(remote.id.clone(), saved);
        Ok(outcome)
    }
}

fn persisted_id(id: Option<Uuid>, kind: EntityKind, remote_id: &str) -> SyncResult<Uuid> {
    id.ok_or_else(|| {
        SyncError::Persistence(StoreError::NotFound {
            kind: kind.as_str(),
            id: format!("local entity for remote id {remote_id}"),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelFlags;
    use crate::store::InMemoryCatalogStore;

    fn category(id: &str, description: &str) -> RemoteEntity {
        RemoteEntity::Category(RemoteCategory {
            id: id.into(),
            description: description.into(),
            id_sales_point: Some(7),
            external_id: None,
            image_url: None,
            channels: ChannelFlags::default(),
        })
    }

    fn product(id: &str, category_id: &str) -> RemoteEntity {
        RemoteEntity::Product(
            serde_json::from_value(serde_json::json!({
                "id": id,
                "description": format!("Product {id}"),
                "idCategory": category_id,
                "idDepartment": "D1",
                "prices": [{"idSalesPoint": 7, "value": 9.5}]
            }))
            .unwrap(),
        )
    }

    fn engine(store: Arc<InMemoryCatalogStore>) -> ReconciliationEngine {
        ReconciliationEngine::new(store, ThrottleConfig::Disabled)
    }

    fn ctx() -> MappingContext {
        MappingContext::new(Uuid::new_v4(), Uuid::new_v4(), 7)
    }

    #[tokio::test]
    async fn test_product_links_category_created_in_same_run() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let engine = engine(store.clone());

        // Product listed first: the engine still creates the category before it.
        let summary = engine
            .reconcile(
                vec![product("P1", "C1"), category("C1", "Pizze")],
                &LocalCatalog::default(),
                &ctx(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(summary.created, 2);
        assert!(summary.failed.is_empty());
        let stored = store.snapshot();
        assert_eq!(stored.products[0].category_id, stored.categories[0].id);
    }

    #[tokio::test]
    async fn test_duplicate_selection_is_skipped() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let engine = engine(store.clone());

        let summary = engine
            .reconcile(
                vec![category("C1", "Pizze"), category("C1", "Pizze")],
                &LocalCatalog::default(),
                &ctx(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(store.create_count(), 1);
    }

    #[tokio::test]
    async fn test_unlinked_product_fails_without_aborting() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let engine = engine(store.clone());

        let summary = engine
            .reconcile(
                vec![product("P1", "UNKNOWN"), category("C2", "Bibite")],
                &LocalCatalog::default(),
                &ctx(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].kind, super::super::FailureKind::Mapping);
        assert_eq!(summary.failed_remote_ids(), vec!["P1".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_between_items() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let engine = engine(store.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = engine
            .reconcile(
                vec![category("C1", "A"), category("C2", "B")],
                &LocalCatalog::default(),
                &ctx(),
                &cancel,
            )
            .await;

        assert!(summary.cancelled);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.total, 2);
        assert_eq!(store.create_count(), 0);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let engine = engine(store);
        let rx = engine.subscribe();
        assert_eq!(*rx.borrow(), RunState::Idle);

        let summary = engine
            .reconcile(
                vec![category("C1", "A")],
                &LocalCatalog::default(),
                &ctx(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(engine.state(), RunState::Completed(summary.clone()));
        assert_eq!(rx.borrow().summary(), Some(&summary));
    }
}

//! Import selected remote entities into the local catalog

use std::collections::HashSet;
use std::sync::Arc;

use catalog_sync::models::{
    EntityKind, MappingContext, RemoteCategory, RemoteEntity, RemoteProduct, RemoteTable,
};
use catalog_sync::store::{InMemoryCatalogStore, LocalCatalogStore};
use catalog_sync::{ListFilter, ReconciliationEngine, RemoteCatalogClient, RunState, RunSummary};
use clap::{Args, ValueEnum};
use secrecy::ExposeSecret;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{cancel_on_ctrl_c, print_json, remote_client, LocalArgs, RemoteArgs};
use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Kind {
    Categories,
    Products,
    Tables,
}

impl From<Kind> for EntityKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Categories => EntityKind::Category,
            Kind::Products => EntityKind::Product,
            Kind::Tables => EntityKind::Table,
        }
    }
}

/// Reconcile remote entities into the local catalog
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Entity kinds to import (default: all)
    #[arg(long = "kind", value_enum, value_delimiter = ',')]
    pub kinds: Vec<Kind>,

    /// Local project receiving the entities
    #[arg(long)]
    pub project: Uuid,

    /// Partner owning the project
    #[arg(long)]
    pub partner: Uuid,

    /// Sales point whose catalog and prices are imported
    #[arg(long)]
    pub sales_point: i64,

    /// Only import these remote ids
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Reconcile against a copy of the local catalog without writing to it
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,

    #[command(flatten)]
    pub local: LocalArgs,
}

/// Execute the reconcile command
pub async fn execute(args: ReconcileArgs) -> CliResult<()> {
    let client = remote_client()?;
    let throttle = client.config().throttle;
    let cancel = cancel_on_ctrl_c();
    let secret = args.remote.secret();

    let kinds: HashSet<EntityKind> = if args.kinds.is_empty() {
        [EntityKind::Category, EntityKind::Product, EntityKind::Table].into()
    } else {
        args.kinds.iter().copied().map(EntityKind::from).collect()
    };

    let selected = select(
        &client,
        secret.expose_secret(),
        args.sales_point,
        &kinds,
        &args.ids,
        &cancel,
    )
    .await?;
    info!(count = selected.len(), "Selected remote entities");

    let http_store = Arc::new(args.local.store()?);
    let store: Arc<dyn LocalCatalogStore> = if args.dry_run {
        let catalog = http_store.load_catalog(args.project).await?;
        info!(items = catalog.len(), "Dry run against a copy of the local catalog");
        Arc::new(InMemoryCatalogStore::with_catalog(catalog))
    } else {
        http_store
    };

    let engine = ReconciliationEngine::new(store, throttle);
    let progress = tokio::spawn(log_progress(engine.subscribe()));

    let ctx = MappingContext::new(args.project, args.partner, args.sales_point);
    let summary = engine.reconcile_from_store(selected, &ctx, &cancel).await?;
    drop(engine);
    join_progress(progress).await;

    print_json(&summary)?;
    finish(&summary)
}

/// Fetches the requested kinds and keeps the ids asked for.
async fn select(
    client: &RemoteCatalogClient,
    api_key: &str,
    sales_point: i64,
    kinds: &HashSet<EntityKind>,
    ids: &[String],
    cancel: &CancellationToken,
) -> CliResult<Vec<RemoteEntity>> {
    let filter = ListFilter::new().sales_point(sales_point);
    let page_size = client.config().page_size;
    let mut selected = Vec::new();

    if kinds.contains(&EntityKind::Category) {
        let items: Vec<RemoteCategory> = client
            .fetch_all_with_cancel(api_key, &filter, page_size, cancel)
            .await?;
        selected.extend(items.into_iter().map(RemoteEntity::from));
    }
    if kinds.contains(&EntityKind::Product) {
        let items: Vec<RemoteProduct> = client
            .fetch_all_with_cancel(api_key, &filter, page_size, cancel)
            .await?;
        selected.extend(items.into_iter().map(RemoteEntity::from));
    }
    if kinds.contains(&EntityKind::Table) {
        let items: Vec<RemoteTable> = client
            .fetch_all_with_cancel(api_key, &filter, page_size, cancel)
            .await?;
        selected.extend(items.into_iter().map(RemoteEntity::from));
    }

    if ids.is_empty() {
        return Ok(selected);
    }
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    selected.retain(|e| wanted.contains(e.id()));
    if selected.is_empty() {
        return Err(CliError::Validation(format!(
            "none of the ids {ids:?} exist remotely"
        )));
    }
    Ok(selected)
}

/// Logs every tenth of the run until the engine is dropped.
async fn log_progress(mut rx: watch::Receiver<RunState>) {
    let mut last_decile = None;
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        match state {
            RunState::Running { processed, total } => {
                let decile = if total == 0 { 10 } else { processed * 10 / total };
                if last_decile != Some(decile) {
                    info!(processed, total, "Reconciliation progress");
                    last_decile = Some(decile);
                }
            }
            RunState::Completed(summary) => {
                debug!(processed = summary.processed, "Reconciliation finished");
            }
            RunState::Idle => {}
        }
    }
}

/// Waits for the progress logger. Returns false if it did not end cleanly.
async fn join_progress(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Progress logger failed");
            false
        }
    }
}

pub(crate) fn finish(summary: &RunSummary) -> CliResult<()> {
    if summary.cancelled {
        return Err(CliError::Interrupted);
    }
    if summary.has_failures() {
        return Err(CliError::ItemsFailed {
            failed: summary.failed.len(),
            total: summary.total,
        });
    }
    Ok(())
}

//! Push unlinked local entities to the remote catalog

use std::sync::Arc;

use catalog_sync::models::LocalCatalog;
use catalog_sync::store::LocalCatalogStore;
use catalog_sync::CatalogExporter;
use clap::{Args, ValueEnum};
use secrecy::ExposeSecret;
use tracing::info;
use uuid::Uuid;

use super::reconcile::finish;
use super::{cancel_on_ctrl_c, print_json, remote_client, LocalArgs, RemoteArgs};
use crate::error::CliResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    Categories,
    Products,
}

/// Export local entities that have no remote counterpart yet
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(long, value_enum)]
    pub kind: ExportKind,

    /// Local project to export
    #[arg(long)]
    pub project: Uuid,

    /// Sales point for entities that have none assigned
    #[arg(long)]
    pub sales_point: i64,

    #[command(flatten)]
    pub remote: RemoteArgs,

    #[command(flatten)]
    pub local: LocalArgs,
}

/// Execute the export command
pub async fn execute(args: ExportArgs) -> CliResult<()> {
    let client = Arc::new(remote_client()?);
    let store: Arc<dyn LocalCatalogStore> = Arc::new(args.local.store()?);
    let cancel = cancel_on_ctrl_c();
    let secret = args.remote.secret();
    let api_key = secret.expose_secret().as_str();

    let mut catalog = store.load_catalog(args.project).await?;
    assign_sales_point(&mut catalog, args.sales_point);

    let exporter = CatalogExporter::new(client, store);
    let summary = match args.kind {
        ExportKind::Categories => {
            exporter
                .export_categories(api_key, &catalog.categories, &cancel)
                .await
        }
        ExportKind::Products => {
            exporter
                .export_products(api_key, &catalog.products, &catalog.categories, &cancel)
                .await
        }
    };
    info!(
        created = summary.created,
        skipped = summary.skipped,
        failed = summary.failed.len(),
        "Export finished"
    );

    print_json(&summary)?;
    finish(&summary)
}

fn assign_sales_point(catalog: &mut LocalCatalog, sales_point: i64) {
    for category in &mut catalog.categories {
        category.remote_sales_point_id.get_or_insert(sales_point);
    }
    for product in &mut catalog.products {
        product.remote_sales_point_id.get_or_insert(sales_point);
    }
}

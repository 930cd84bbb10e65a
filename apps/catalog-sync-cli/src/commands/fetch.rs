//! Print a whole remote collection as JSON

use catalog_sync::models::{
    RemoteCategory, RemoteCollection, RemoteDepartment, RemoteProduct, RemoteSalesPoint,
    RemoteTable, RemoteTax,
};
use catalog_sync::{ListFilter, RemoteCatalogClient, SortDirection};
use clap::{Args, ValueEnum};
use secrecy::ExposeSecret;
use tracing::info;

use super::{cancel_on_ctrl_c, print_json, remote_client, RemoteArgs};
use crate::error::CliResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Collection {
    Categories,
    Products,
    Tables,
    Departments,
    Taxes,
    SalesPoints,
}

/// Fetch every item of a remote collection
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Collection to fetch
    #[arg(value_enum)]
    pub collection: Collection,

    /// Restrict to one sales point
    #[arg(long)]
    pub sales_point: Option<i64>,

    /// Sort by this field, ascending
    #[arg(long)]
    pub sort: Option<String>,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

/// Execute the fetch command
pub async fn execute(args: FetchArgs) -> CliResult<()> {
    let client = remote_client()?;
    let secret = args.remote.secret();
    let api_key = secret.expose_secret().as_str();

    let mut filter = ListFilter::new();
    if let Some(id) = args.sales_point {
        filter = filter.sales_point(id);
    }
    if let Some(field) = args.sort {
        filter = filter.sort(field, SortDirection::Asc);
    }

    match args.collection {
        Collection::Categories => fetch::<RemoteCategory>(&client, api_key, &filter).await,
        Collection::Products => fetch::<RemoteProduct>(&client, api_key, &filter).await,
        Collection::Tables => fetch::<RemoteTable>(&client, api_key, &filter).await,
        Collection::Departments => fetch::<RemoteDepartment>(&client, api_key, &filter).await,
        Collection::Taxes => fetch::<RemoteTax>(&client, api_key, &filter).await,
        Collection::SalesPoints => fetch::<RemoteSalesPoint>(&client, api_key, &filter).await,
    }
}

async fn fetch<C>(client: &RemoteCatalogClient, api_key: &str, filter: &ListFilter) -> CliResult<()>
where
    C: RemoteCollection + serde::Serialize,
{
    let cancel = cancel_on_ctrl_c();
    let items: Vec<C> = client
        .fetch_all_with_cancel(api_key, filter, client.config().page_size, &cancel)
        .await?;
    info!(path = C::PATH, count = items.len(), "Fetched collection");
    print_json(&items)
}

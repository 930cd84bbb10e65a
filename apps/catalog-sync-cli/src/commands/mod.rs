//! CLI command implementations

pub mod export;
pub mod fetch;
pub mod reconcile;

use std::sync::Arc;
use std::time::Duration;

use catalog_sync::store::HttpCatalogStore;
use catalog_sync::{RemoteCatalogClient, RemoteCatalogConfig};
use clap::Args;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::CliResult;

/// Connection settings shared by every command.
#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// API key of the point-of-sale account
    #[arg(
        long,
        env = "CATALOG_API_KEY",
        hide_env_values = true,
        value_parser = parse_api_key
    )]
    api_key: Arc<SecretString>,
}

impl RemoteArgs {
    pub fn secret(&self) -> &SecretString {
        &self.api_key
    }
}

fn parse_api_key(raw: &str) -> Result<Arc<SecretString>, String> {
    let key = raw.trim();
    if key.is_empty() {
        return Err("API key must not be empty".to_string());
    }
    Ok(Arc::new(SecretString::new(key.to_string())))
}

/// Local catalog store settings.
#[derive(Args, Debug)]
pub struct LocalArgs {
    /// Base URL of the local catalog store
    #[arg(long = "local-url", env = "LOCAL_CATALOG_URL")]
    pub local_url: String,

    /// Request timeout against the local store, in seconds
    #[arg(long, default_value_t = 30)]
    pub local_timeout_secs: u64,
}

impl LocalArgs {
    pub fn store(&self) -> CliResult<HttpCatalogStore> {
        Ok(HttpCatalogStore::new(
            &self.local_url,
            Duration::from_secs(self.local_timeout_secs),
        )?)
    }
}

/// Client built from `CATALOG_*` environment variables.
pub fn remote_client() -> CliResult<RemoteCatalogClient> {
    let config = RemoteCatalogConfig::from_env()?;
    Ok(RemoteCatalogClient::new(config)?)
}

/// Token cancelled on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current item");
            token.cancel();
        }
    });
    cancel
}

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Remote wire types and local catalog entities.

mod local;
mod remote;

pub use local::{
    LocalCatalog, LocalCategory, LocalEntity, LocalProduct, LocalTable, MappingContext,
};
pub use remote::{
    ChannelFlags, CreateParams, ProductBatchOutcome, ProductBatchRequest, ProductBatchResponse,
    RemoteCategory, RemoteCategoryCreate, RemoteCollection, RemoteDepartment, RemoteEntity,
    RemotePage, RemotePrice, RemoteProduct, RemoteProductCreate, RemoteSalesPoint, RemoteTable,
    RemoteTax, RemoteVariant, TokenGrant,
};

use serde::{Deserialize, Serialize};

/// The catalog entity kinds that can be synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Category,
    Product,
    Table,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "product",
            Self::Table => "table",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

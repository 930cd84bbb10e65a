//! Local catalog entities as stored by the Local Catalog Store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityKind, RemoteCategory, RemoteProduct, RemoteTable};

/// Local category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCategory {
    /// `None` until the store has persisted the entity.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub project_id: Uuid,
    pub partner_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub remote_sales_point_id: Option<i64>,
    /// Last remote payload this entity was synchronized from.
    #[serde(default)]
    pub remote_snapshot: Option<RemoteCategory>,
}

/// Local product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalProduct {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub project_id: Uuid,
    pub partner_id: Uuid,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(default)]
    pub calories: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub remote_variant_id: Option<String>,
    #[serde(default)]
    pub remote_department_id: Option<String>,
    #[serde(default)]
    pub remote_sales_point_id: Option<i64>,
    #[serde(default)]
    pub remote_snapshot: Option<RemoteProduct>,
}

/// Local restaurant table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTable {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub project_id: Uuid,
    pub partner_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub seats: Option<u32>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub remote_sales_point_id: Option<i64>,
    #[serde(default)]
    pub remote_snapshot: Option<RemoteTable>,
}

fn default_active() -> bool {
    true
}

/// A local entity of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalEntity {
    Category(LocalCategory),
    Product(LocalProduct),
    Table(LocalTable),
}

impl LocalEntity {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Category(_) => EntityKind::Category,
            Self::Product(_) => EntityKind::Product,
            Self::Table(_) => EntityKind::Table,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::Category(c) => c.id,
            Self::Product(p) => p.id,
            Self::Table(t) => t.id,
        }
    }

    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Self::Category(c) => c.remote_id.as_deref(),
            Self::Product(p) => p.remote_id.as_deref(),
            Self::Table(t) => t.remote_id.as_deref(),
        }
    }
}

/// Snapshot of the local catalog of one project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalCatalog {
    pub categories: Vec<LocalCategory>,
    pub products: Vec<LocalProduct>,
    pub tables: Vec<LocalTable>,
}

impl LocalCatalog {
    /// Total number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len() + self.products.len() + self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Context a remote entity is mapped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingContext {
    pub project_id: Uuid,
    pub partner_id: Uuid,
    /// Sales point whose price list is used.
    pub target_sales_point_id: i64,
    /// Local category a product belongs to, looked up by the caller.
    pub local_category_id: Option<Uuid>,
}

impl MappingContext {
    #[must_use]
    pub fn new(project_id: Uuid, partner_id: Uuid, target_sales_point_id: i64) -> Self {
        Self {
            project_id,
            partner_id,
            target_sales_point_id,
            local_category_id: None,
        }
    }

    /// Same context, with the given local category.
    #[must_use]
    pub fn with_category(&self, local_category_id: Option<Uuid>) -> Self {
        Self {
            local_category_id,
            ..self.clone()
        }
    }
}

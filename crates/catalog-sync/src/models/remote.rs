//! Wire types of the Remote Catalog Service.
//!
//! Each collection has its own explicit type; optional remote fields are
//! `Option`/defaulted here and all local defaulting happens in the mapper.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::EntityKind;

/// A collection endpoint of the Remote Catalog Service.
pub trait RemoteCollection: serde::de::DeserializeOwned + Send + 'static {
    /// Path of the list endpoint, relative to the base URL.
    const PATH: &'static str;
    /// Key of the item array inside the response envelope.
    const ENVELOPE_KEY: &'static str;
}

/// One page of a remote collection.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePage<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

/// Price of a product at one sales point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePrice {
    #[serde(default)]
    pub id_sales_point: Option<i64>,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

impl RemotePrice {
    #[must_use]
    pub fn new(id_sales_point: i64, value: Decimal) -> Self {
        Self {
            id_sales_point: Some(id_sales_point),
            value,
        }
    }
}

/// Sales channels an entity is published on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFlags {
    #[serde(default)]
    pub enable_for_risto: bool,
    #[serde(default)]
    pub enable_for_sale: bool,
    #[serde(default, rename = "enableForECommerce")]
    pub enable_for_ecommerce: bool,
    #[serde(default)]
    pub enable_for_mobile_commerce: bool,
    #[serde(default)]
    pub enable_for_self_order_menu: bool,
    #[serde(default)]
    pub enable_for_kiosk: bool,
}

impl ChannelFlags {
    /// Every channel enabled.
    #[must_use]
    pub fn all_enabled() -> Self {
        Self {
            enable_for_risto: true,
            enable_for_sale: true,
            enable_for_ecommerce: true,
            enable_for_mobile_commerce: true,
            enable_for_self_order_menu: true,
            enable_for_kiosk: true,
        }
    }
}

/// Remote category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCategory {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub id_sales_point: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub channels: ChannelFlags,
}

impl RemoteCollection for RemoteCategory {
    const PATH: &'static str = "/categories";
    const ENVELOPE_KEY: &'static str = "categories";
}

/// Variant of a multivariant product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVariant {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Remote product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProduct {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_extended: Option<String>,
    #[serde(default)]
    pub id_category: Option<String>,
    #[serde(default)]
    pub id_department: Option<String>,
    #[serde(default)]
    pub id_sales_point: Option<i64>,
    #[serde(default)]
    pub prices: Vec<RemotePrice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<RemoteVariant>,
    #[serde(default)]
    pub multivariant: bool,
    #[serde(default)]
    pub sold_by_weight: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(flatten)]
    pub channels: ChannelFlags,
}

impl RemoteCollection for RemoteProduct {
    const PATH: &'static str = "/products";
    const ENVELOPE_KEY: &'static str = "products";
}

/// Remote restaurant table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTable {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub id_room: Option<String>,
    #[serde(default)]
    pub seats: Option<u32>,
    #[serde(default)]
    pub id_sales_point: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl RemoteCollection for RemoteTable {
    const PATH: &'static str = "/risto/tables";
    const ENVELOPE_KEY: &'static str = "tables";
}

/// Remote department (fiscal grouping a product is sold under).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDepartment {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub id_tax: Option<String>,
    #[serde(default)]
    pub id_sales_point: Option<i64>,
}

impl RemoteCollection for RemoteDepartment {
    const PATH: &'static str = "/departments";
    const ENVELOPE_KEY: &'static str = "departments";
}

/// Remote tax rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTax {
    pub id: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
}

impl RemoteCollection for RemoteTax {
    const PATH: &'static str = "/taxes";
    const ENVELOPE_KEY: &'static str = "taxes";
}

/// Remote sales point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSalesPoint {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl RemoteCollection for RemoteSalesPoint {
    const PATH: &'static str = "/salespoint";
    const ENVELOPE_KEY: &'static str = "salesPoint";
}

/// A remote entity the user can select for import.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEntity {
    Category(RemoteCategory),
    Product(RemoteProduct),
    Table(RemoteTable),
}

impl RemoteEntity {
    /// Remote id of the entity.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Category(c) => &c.id,
            Self::Product(p) => &p.id,
            Self::Table(t) => &t.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Category(_) => EntityKind::Category,
            Self::Product(_) => EntityKind::Product,
            Self::Table(_) => EntityKind::Table,
        }
    }

    /// Human-readable label for logs and summaries.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Category(c) => &c.description,
            Self::Product(p) => &p.description,
            Self::Table(t) => &t.name,
        }
    }
}

impl From<RemoteCategory> for RemoteEntity {
    fn from(c: RemoteCategory) -> Self {
        Self::Category(c)
    }
}

impl From<RemoteProduct> for RemoteEntity {
    fn from(p: RemoteProduct) -> Self {
        Self::Product(p)
    }
}

impl From<RemoteTable> for RemoteEntity {
    fn from(t: RemoteTable) -> Self {
        Self::Table(t)
    }
}

/// Payload creating a category on the remote side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCategoryCreate {
    pub id_sales_point: i64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub channels: ChannelFlags,
}

/// Payload creating a product on the remote side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProductCreate {
    pub id_sales_point: i64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_extended: Option<String>,
    pub id_category: String,
    pub id_department: String,
    pub prices: Vec<RemotePrice>,
    pub multivariant: bool,
    pub sold_by_weight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(flatten)]
    pub channels: ChannelFlags,
}

/// Creation payloads produced from local entities.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateParams {
    Category(RemoteCategoryCreate),
    Product(RemoteProductCreate),
}

/// Body of `POST /products/batch`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductBatchRequest {
    pub create: Vec<RemoteProductCreate>,
    pub update: Vec<RemoteProduct>,
}

/// Per-operation results of a product batch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductBatchOutcome {
    #[serde(default)]
    pub create: Vec<RemoteProduct>,
    #[serde(default)]
    pub update: Vec<RemoteProduct>,
}

/// Response of `POST /products/batch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBatchResponse {
    pub batch_response: ProductBatchOutcome,
}

/// Response of `POST /apikey/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

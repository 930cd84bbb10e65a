//! Pure mapping between remote entities and the local data model.
//!
//! Nothing in here performs I/O or lookups: whatever linkage the mapping
//! needs (the local category of a product, the remote category of a local
//! product) is supplied by the caller.

use rust_decimal::Decimal;

use crate::error::MappingError;
use crate::models::{
    ChannelFlags, CreateParams, LocalCategory, LocalEntity, LocalProduct, LocalTable,
    MappingContext, RemoteCategory, RemoteCategoryCreate, RemoteEntity, RemotePrice,
    RemoteProduct, RemoteProductCreate, RemoteTable,
};

/// Picks the price of a product for `target_sales_point_id`.
///
/// An exact sales point match wins; otherwise the first entry of the list is
/// used; an empty list resolves to zero.
#[must_use]
pub fn resolve_price(prices: &[RemotePrice], target_sales_point_id: i64) -> Decimal {
    prices
        .iter()
        .find(|p| p.id_sales_point == Some(target_sales_point_id))
        .or_else(|| prices.first())
        .map_or(Decimal::ZERO, |p| p.value)
}

/// Maps a remote category to a new local category.
#[must_use]
pub fn map_category(remote: &RemoteCategory, ctx: &MappingContext) -> LocalCategory {
    LocalCategory {
        id: None,
        project_id: ctx.project_id,
        partner_id: ctx.partner_id,
        name: remote.description.clone(),
        description: None,
        image_url: remote.image_url.clone(),
        sort_order: 0,
        is_active: true,
        remote_id: Some(remote.id.clone()),
        remote_sales_point_id: Some(ctx.target_sales_point_id),
        remote_snapshot: Some(remote.clone()),
    }
}

/// Maps a remote product to a new local product.
///
/// # Errors
///
/// Fails when the context carries no local category for the product.
pub fn map_product(
    remote: &RemoteProduct,
    ctx: &MappingContext,
) -> Result<LocalProduct, MappingError> {
    let category_id = match (ctx.local_category_id, remote.id_category.as_ref()) {
        (Some(id), _) => id,
        (None, Some(remote_category_id)) => {
            return Err(MappingError::MissingCategoryLink {
                remote_category_id: remote_category_id.clone(),
            })
        }
        (None, None) => {
            return Err(MappingError::ProductWithoutCategory {
                remote_id: remote.id.clone(),
            })
        }
    };

    let remote_variant_id = if remote.multivariant {
        remote.variants.first().map(|v| v.id.clone())
    } else {
        None
    };

    Ok(LocalProduct {
        id: None,
        project_id: ctx.project_id,
        partner_id: ctx.partner_id,
        category_id: Some(category_id),
        name: remote.description.clone(),
        description: remote
            .description_extended
            .clone()
            .or_else(|| remote.description_label.clone()),
        price: resolve_price(&remote.prices, ctx.target_sales_point_id),
        allergens: Vec::new(),
        calories: 0,
        image_url: None,
        sort_order: 0,
        is_active: true,
        remote_id: Some(remote.id.clone()),
        remote_variant_id,
        remote_department_id: remote.id_department.clone(),
        remote_sales_point_id: Some(ctx.target_sales_point_id),
        remote_snapshot: Some(remote.clone()),
    })
}

/// Maps a remote table to a new local table.
#[must_use]
pub fn map_table(remote: &RemoteTable, ctx: &MappingContext) -> LocalTable {
    LocalTable {
        id: None,
        project_id: ctx.project_id,
        partner_id: ctx.partner_id,
        name: remote.name.clone(),
        seats: remote.seats,
        sort_order: 0,
        is_active: true,
        remote_id: Some(remote.id.clone()),
        remote_sales_point_id: Some(ctx.target_sales_point_id),
        remote_snapshot: Some(remote.clone()),
    }
}

/// Maps any remote entity to its local counterpart.
///
/// # Errors
///
/// Returns a `MappingError` when required linkage is missing.
pub fn map_remote_to_local(
    remote: &RemoteEntity,
    ctx: &MappingContext,
) -> Result<LocalEntity, MappingError> {
    Ok(match remote {
        RemoteEntity::Category(c) => LocalEntity::Category(map_category(c, ctx)),
        RemoteEntity::Product(p) => LocalEntity::Product(map_product(p, ctx)?),
        RemoteEntity::Table(t) => LocalEntity::Table(map_table(t, ctx)),
    })
}

/// Builds the remote creation payload for a local category.
///
/// # Errors
///
/// Fails when no remote sales point is assigned.
pub fn category_create_params(local: &LocalCategory) -> Result<RemoteCategoryCreate, MappingError> {
    let id_sales_point = local
        .remote_sales_point_id
        .ok_or_else(|| MappingError::MissingSalesPoint {
            name: local.name.clone(),
        })?;

    Ok(RemoteCategoryCreate {
        id_sales_point,
        description: local.name.clone(),
        external_id: local.id.map(|id| id.to_string()),
        image_url: local.image_url.clone(),
        channels: ChannelFlags::all_enabled(),
    })
}

/// Builds the remote creation payload for a local product.
///
/// `remote_category_id` is the remote id of the product's local category.
///
/// # Errors
///
/// Fails when the sales point, the department or the remote category is missing.
pub fn product_create_params(
    local: &LocalProduct,
    remote_category_id: Option<&str>,
) -> Result<RemoteProductCreate, MappingError> {
    let id_sales_point = local
        .remote_sales_point_id
        .ok_or_else(|| MappingError::MissingSalesPoint {
            name: local.name.clone(),
        })?;
    let id_department =
        local
            .remote_department_id
            .clone()
            .ok_or_else(|| MappingError::MissingDepartment {
                name: local.name.clone(),
            })?;
    let id_category = remote_category_id
        .map(str::to_string)
        .ok_or_else(|| MappingError::MissingRemoteCategory {
            name: local.name.clone(),
        })?;

    Ok(RemoteProductCreate {
        id_sales_point,
        description: local.name.clone(),
        description_extended: local.description.clone(),
        id_category,
        id_department,
        prices: vec![RemotePrice::new(id_sales_point, local.price)],
        multivariant: false,
        sold_by_weight: false,
        external_id: local.id.map(|id| id.to_string()),
        channels: ChannelFlags::all_enabled(),
    })
}

/// Builds the creation payload for a local entity, or `None` when required
/// linkage is missing. Tables are not created remotely.
#[must_use]
pub fn map_local_to_remote_create_params(
    local: &LocalEntity,
    remote_category_id: Option<&str>,
) -> Option<CreateParams> {
    match local {
        LocalEntity::Category(c) => category_create_params(c).ok().map(CreateParams::Category),
        LocalEntity::Product(p) => product_create_params(p, remote_category_id)
            .ok()
            .map(CreateParams::Product),
        LocalEntity::Table(_) => None,
    }
}

//! Change detection and merging of remote payloads into existing locals.
//!
//! A local entity is compared against the remote payload it was last
//! synchronized from (`remote_snapshot`). Merging overwrites only the
//! remote-sourced fields and keeps what was edited locally.

use crate::error::MappingError;
use crate::mapping::{map_category, map_product, map_table, resolve_price};
use crate::models::{
    LocalCategory, LocalProduct, LocalTable, MappingContext, RemoteCategory, RemoteProduct,
    RemoteTable,
};

/// Whether `remote` differs from what `local` was synchronized from.
#[must_use]
pub fn category_changed(local: &LocalCategory, remote: &RemoteCategory) -> bool {
    let Some(snapshot) = &local.remote_snapshot else {
        return true;
    };
    snapshot.description != remote.description
}

/// Whether `remote` differs from what `local` was synchronized from.
///
/// Prices are compared as resolved for the context's sales point, so a change
/// to another sales point's price list is not an update.
#[must_use]
pub fn product_changed(local: &LocalProduct, remote: &RemoteProduct, ctx: &MappingContext) -> bool {
    let Some(snapshot) = &local.remote_snapshot else {
        return true;
    };
    let sales_point = ctx.target_sales_point_id;

    snapshot.description != remote.description
        || snapshot.description_extended != remote.description_extended
        || snapshot.id_category != remote.id_category
        || snapshot.id_department != remote.id_department
        || resolve_price(&snapshot.prices, sales_point) != resolve_price(&remote.prices, sales_point)
        || local.remote_sales_point_id != Some(sales_point)
        || (ctx.local_category_id.is_some() && local.category_id != ctx.local_category_id)
}

/// Whether `remote` differs from what `local` was synchronized from.
#[must_use]
pub fn table_changed(local: &LocalTable, remote: &RemoteTable) -> bool {
    let Some(snapshot) = &local.remote_snapshot else {
        return true;
    };
    snapshot.name != remote.name || snapshot.seats != remote.seats
}

/// Applies `remote` to an existing local category.
#[must_use]
pub fn merge_category(
    local: &LocalCategory,
    remote: &RemoteCategory,
    ctx: &MappingContext,
) -> LocalCategory {
    let fresh = map_category(remote, ctx);
    LocalCategory {
        id: local.id,
        description: local.description.clone(),
        image_url: fresh.image_url.or_else(|| local.image_url.clone()),
        sort_order: local.sort_order,
        is_active: local.is_active,
        ..fresh
    }
}

/// Applies `remote` to an existing local product.
///
/// # Errors
///
/// Fails like [`map_product`] when the category linkage is missing.
pub fn merge_product(
    local: &LocalProduct,
    remote: &RemoteProduct,
    ctx: &MappingContext,
) -> Result<LocalProduct, MappingError> {
    let fresh = map_product(remote, ctx)?;
    Ok(LocalProduct {
        id: local.id,
        allergens: local.allergens.clone(),
        calories: local.calories,
        image_url: local.image_url.clone(),
        sort_order: local.sort_order,
        is_active: local.is_active,
        ..fresh
    })
}

/// Applies `remote` to an existing local table.
#[must_use]
pub fn merge_table(local: &LocalTable, remote: &RemoteTable, ctx: &MappingContext) -> LocalTable {
    let fresh = map_table(remote, ctx);
    LocalTable {
        id: local.id,
        seats: fresh.seats.or(local.seats),
        sort_order: local.sort_order,
        is_active: local.is_active,
        ..fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelFlags, RemotePrice};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn ctx() -> MappingContext {
        MappingContext::new(Uuid::new_v4(), Uuid::new_v4(), 7)
    }

    fn remote_category(description: &str) -> RemoteCategory {
        RemoteCategory {
            id: "R1".into(),
            description: description.into(),
            id_sales_point: Some(7),
            external_id: None,
            image_url: None,
            channels: ChannelFlags::default(),
        }
    }

    fn remote_product() -> RemoteProduct {
        serde_json::from_value(serde_json::json!({
            "id": "P1",
            "description": "Margherita",
            "idCategory": "C1",
            "idDepartment": "D1",
            "prices": [{"idSalesPoint": 5, "value": 10}, {"idSalesPoint": 7, "value": 12}]
        }))
        .unwrap()
    }

    #[test]
    fn test_category_description_change() {
        let ctx = ctx();
        let local = map_category(&remote_category("Pizza"), &ctx);

        assert!(!category_changed(&local, &remote_category("Pizza")));
        assert!(category_changed(&local, &remote_category("Pizza Margherita")));
    }

    #[test]
    fn test_missing_snapshot_counts_as_changed() {
        let mut local = map_category(&remote_category("Pizza"), &ctx());
        local.remote_snapshot = None;
        assert!(category_changed(&local, &remote_category("Pizza")));
    }

    #[test]
    fn test_product_price_change_only_at_target() {
        let ctx = ctx().with_category(Some(Uuid::new_v4()));
        let local = map_product(&remote_product(), &ctx).unwrap();

        let mut other_sales_point = remote_product();
        other_sales_point.prices[0] = RemotePrice::new(5, Decimal::from(99));
        assert!(!product_changed(&local, &other_sales_point, &ctx));

        let mut target = remote_product();
        target.prices[1] = RemotePrice::new(7, Decimal::from(13));
        assert!(product_changed(&local, &target, &ctx));
    }

    #[test]
    fn test_product_linkage_change() {
        let ctx = ctx().with_category(Some(Uuid::new_v4()));
        let local = map_product(&remote_product(), &ctx).unwrap();

        let mut moved = remote_product();
        moved.id_department = Some("D2".into());
        assert!(product_changed(&local, &moved, &ctx));

        let relinked = ctx.with_category(Some(Uuid::new_v4()));
        assert!(product_changed(&local, &remote_product(), &relinked));
    }

    #[test]
    fn test_merge_product_keeps_local_fields() {
        let ctx = ctx().with_category(Some(Uuid::new_v4()));
        let mut local = map_product(&remote_product(), &ctx).unwrap();
        local.id = Some(Uuid::new_v4());
        local.allergens = vec!["gluten".into()];
        local.calories = 800;
        local.sort_order = 3;
        local.is_active = false;

        let mut remote = remote_product();
        remote.description = "Margherita DOP".into();
        let merged = merge_product(&local, &remote, &ctx).unwrap();

        assert_eq!(merged.id, local.id);
        assert_eq!(merged.name, "Margherita DOP");
        assert_eq!(merged.allergens, vec!["gluten".to_string()]);
        assert_eq!(merged.calories, 800);
        assert_eq!(merged.sort_order, 3);
        assert!(!merged.is_active);
        assert_eq!(
            merged.remote_snapshot.map(|s| s.description),
            Some("Margherita DOP".to_string())
        );
    }

    #[test]
    fn test_merge_table_keeps_seats_when_remote_has_none() {
        let ctx = ctx();
        let remote = RemoteTable {
            id: "T1".into(),
            name: "Terrace".into(),
            id_room: None,
            seats: Some(4),
            id_sales_point: Some(7),
            external_id: None,
        };
        let local = map_table(&remote, &ctx);

        let renamed = RemoteTable {
            name: "Terrace 1".into(),
            seats: None,
            ..remote
        };
        assert!(table_changed(&local, &renamed));
        let merged = merge_table(&local, &renamed, &ctx);
        assert_eq!(merged.name, "Terrace 1");
        assert_eq!(merged.seats, Some(4));
    }
}

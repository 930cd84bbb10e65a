//! In-memory Local Catalog Store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::LocalCatalogStore;
use crate::error::StoreError;
use crate::models::{LocalCatalog, LocalCategory, LocalProduct, LocalTable};

/// In-memory implementation of `LocalCatalogStore`.
///
/// Used by tests and by CLI dry runs. Entities can be made to fail by name
/// with [`reject_name`](Self::reject_name).
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    catalog: RwLock<LocalCatalog>,
    rejected_names: RwLock<HashSet<String>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl InMemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `catalog`. Entities without an id get one.
    #[must_use]
    pub fn with_catalog(mut catalog: LocalCatalog) -> Self {
        for c in &mut catalog.categories {
            c.id.get_or_insert_with(Uuid::new_v4);
        }
        for p in &mut catalog.products {
            p.id.get_or_insert_with(Uuid::new_v4);
        }
        for t in &mut catalog.tables {
            t.id.get_or_insert_with(Uuid::new_v4);
        }
        Self {
            catalog: RwLock::new(catalog),
            ..Self::default()
        }
    }

    /// Makes every create or update of an entity named `name` fail.
    pub fn reject_name(&self, name: impl Into<String>) {
        self.rejected_names
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into());
    }

    /// Undoes [`reject_name`](Self::reject_name).
    pub fn allow_name(&self, name: &str) {
        self.rejected_names
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }

    /// Copy of everything stored.
    pub fn snapshot(&self) -> LocalCatalog {
        self.catalog.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of successful create calls.
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of successful update calls.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn check_name(&self, name: &str) -> Result<(), StoreError> {
        if self
            .rejected_names
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(name)
        {
            return Err(StoreError::Rejected(format!("'{name}' rejected by store")));
        }
        Ok(())
    }
}

/// Shared create/update logic over one entity vector.
trait Stored: Clone {
    const KIND: &'static str;
    fn id(&self) -> Option<Uuid>;
    fn set_id(&mut self, id: Uuid);
    fn name(&self) -> &str;
    fn project_id(&self) -> Uuid;
}

macro_rules! impl_stored {
    ($ty:ty, $kind:literal) => {
        impl Stored for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> Option<Uuid> {
                self.id
            }

            fn set_id(&mut self, id: Uuid) {
                self.id = Some(id);
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn project_id(&self) -> Uuid {
                self.project_id
            }
        }
    };
}

impl_stored!(LocalCategory, "category");
impl_stored!(LocalProduct, "product");
impl_stored!(LocalTable, "table");

fn insert<T: Stored>(items: &mut Vec<T>, entity: &T) -> T {
    let mut created = entity.clone();
    created.set_id(Uuid::new_v4());
    items.push(created.clone());
    created
}

fn replace<T: Stored>(items: &mut [T], id: Uuid, entity: &T) -> Result<T, StoreError> {
    let slot = items
        .iter_mut()
        .find(|item| item.id() == Some(id))
        .ok_or_else(|| StoreError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        })?;
    let mut updated = entity.clone();
    updated.set_id(id);
    *slot = updated.clone();
    Ok(updated)
}

fn of_project<T: Stored>(items: &[T], project_id: Uuid) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.project_id() == project_id)
        .cloned()
        .collect()
}

impl InMemoryCatalogStore {
    fn create<T: Stored>(
        &self,
        entity: &T,
        pick: impl FnOnce(&mut LocalCatalog) -> &mut Vec<T>,
    ) -> Result<T, StoreError> {
        self.check_name(entity.name())?;
        let mut catalog = self.catalog.write().unwrap_or_else(|e| e.into_inner());
        let created = insert(pick(&mut *catalog), entity);
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    fn update<T: Stored>(
        &self,
        id: Uuid,
        entity: &T,
        pick: impl FnOnce(&mut LocalCatalog) -> &mut Vec<T>,
    ) -> Result<T, StoreError> {
        self.check_name(entity.name())?;
        let mut catalog = self.catalog.write().unwrap_or_else(|e| e.into_inner());
        let updated = replace(pick(&mut *catalog), id, entity)?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }
}

#[async_trait]
impl LocalCatalogStore for InMemoryCatalogStore {
    async fn create_category(&self, category: &LocalCategory) -> Result<LocalCategory, StoreError> {
        self.create(category, |c| &mut c.categories)
    }

    async fn update_category(
        &self,
        id: Uuid,
        category: &LocalCategory,
    ) -> Result<LocalCategory, StoreError> {
        self.update(id, category, |c| &mut c.categories)
    }

    async fn create_product(&self, product: &LocalProduct) -> Result<LocalProduct, StoreError> {
        self.create(product, |c| &mut c.products)
    }

    async fn update_product(
        &self,
        id: Uuid,
        product: &LocalProduct,
    ) -> Result<LocalProduct, StoreError> {
        self.update(id, product, |c| &mut c.products)
    }

    async fn create_table(&self, table: &LocalTable) -> Result<LocalTable, StoreError> {
        self.create(table, |c| &mut c.tables)
    }

    async fn update_table(&self, id: Uuid, table: &LocalTable) -> Result<LocalTable, StoreError> {
        self.update(id, table, |c| &mut c.tables)
    }

    async fn load_catalog(&self, project_id: Uuid) -> Result<LocalCatalog, StoreError> {
        let catalog = self.catalog.read().unwrap_or_else(|e| e.into_inner());
        Ok(LocalCatalog {
            categories: of_project(&catalog.categories, project_id),
            products: of_project(&catalog.products, project_id),
            tables: of_project(&catalog.tables, project_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(project_id: Uuid, name: &str) -> LocalTable {
        LocalTable {
            id: None,
            project_id,
            partner_id: Uuid::nil(),
            name: name.to_string(),
            seats: Some(4),
            sort_order: 0,
            is_active: true,
            remote_id: None,
            remote_sales_point_id: None,
            remote_snapshot: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let store = InMemoryCatalogStore::new();
        let project_id = Uuid::new_v4();

        let created = store.create_table(&table(project_id, "T1")).await.unwrap();
        assert!(created.id.is_some());
        assert_eq!(store.create_count(), 1);

        let catalog = store.load_catalog(project_id).await.unwrap();
        assert_eq!(catalog.tables, vec![created]);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = InMemoryCatalogStore::new();
        let err = store
            .update_table(Uuid::new_v4(), &table(Uuid::new_v4(), "T1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "table", .. }));
        assert_eq!(store.update_count(), 0);
    }

    #[tokio::test]
    async fn test_update_replaces_entity() {
        let store = InMemoryCatalogStore::new();
        let project_id = Uuid::new_v4();
        let created = store.create_table(&table(project_id, "T1")).await.unwrap();
        let id = created.id.unwrap();

        let mut renamed = created.clone();
        renamed.name = "Terrace".into();
        let updated = store.update_table(id, &renamed).await.unwrap();
        assert_eq!(updated.id, Some(id));
        assert_eq!(store.snapshot().tables[0].name, "Terrace");
    }

    #[tokio::test]
    async fn test_load_filters_by_project() {
        let project_a = Uuid::new_v4();
        let project_b = Uuid::new_v4();
        let store = InMemoryCatalogStore::with_catalog(LocalCatalog {
            tables: vec![table(project_a, "A"), table(project_b, "B")],
            ..LocalCatalog::default()
        });

        let catalog = store.load_catalog(project_a).await.unwrap();
        assert_eq!(catalog.tables.len(), 1);
        assert_eq!(catalog.tables[0].name, "A");
        assert!(catalog.tables[0].id.is_some());
    }

    #[tokio::test]
    async fn test_rejected_name() {
        let store = InMemoryCatalogStore::new();
        store.reject_name("Broken");
        let err = store
            .create_table(&table(Uuid::new_v4(), "Broken"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(store.snapshot().is_empty());
    }
}

use crate::domain::catalog::{CatalogItem, CatalogItemId};

/// Read-only view of catalog item definitions.
pub trait CatalogReader: Send + Sync {
    fn get_catalog_item(&self, item_id: &CatalogItemId) -> Option<CatalogItem>;
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    pub fn find(&self, item_id: &CatalogItemId) -> Option<&CatalogItem> {
        self.items.iter().find(|item| &item.id == item_id)
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CatalogReader for Catalog {
    fn get_catalog_item(&self, item_id: &CatalogItemId) -> Option<CatalogItem> {
        self.find(item_id).cloned()
    }
}

impl<C> CatalogReader for &C
where
    C: CatalogReader,
{
    fn get_catalog_item(&self, item_id: &CatalogItemId) -> Option<CatalogItem> {
        (**self).get_catalog_item(item_id)
    }
}

impl<C> CatalogReader for std::sync::Arc<C>
where
    C: CatalogReader,
{
    fn get_catalog_item(&self, item_id: &CatalogItemId) -> Option<CatalogItem> {
        (**self).get_catalog_item(item_id)
    }
}

//! Offline-first collection backed by the local store.

use super::{mutate_product, MutationHandle, ProductCollection};
use crate::error::Result;
use crate::models::{NewProduct, Product, ProductId};
use crate::replication::SyncTrigger;
use crate::services::ProductStore;

/// Reads and writes go to the local store only. Each write is queued for
/// push and wakes the replicator when one is attached.
#[derive(Clone)]
pub struct OfflineCollection {
    store: ProductStore,
    trigger: Option<SyncTrigger>,
}

impl OfflineCollection {
    pub const fn new(store: ProductStore) -> Self {
        Self {
            store,
            trigger: None,
        }
    }

    /// Wake the given replicator after every local write.
    #[must_use]
    pub fn with_trigger(mut self, trigger: SyncTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub const fn store(&self) -> &ProductStore {
        &self.store
    }

    fn written(&self, id: ProductId) -> MutationHandle {
        if let Some(trigger) = &self.trigger {
            trigger.notify();
        }
        MutationHandle::settled(id)
    }
}

impl ProductCollection for OfflineCollection {
    async fn list(&self) -> Result<Vec<Product>> {
        self.store.list_products().await
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        self.store.get_product(id).await
    }

    async fn insert(&self, product: NewProduct) -> Result<MutationHandle> {
        let product = product.into_product()?;
        self.store.insert_product(&product).await?;
        tracing::debug!("Stored product {} locally", product.id);
        Ok(self.written(product.id))
    }

    async fn update<F>(&self, id: &ProductId, mutator: F) -> Result<MutationHandle>
    where
        F: FnOnce(&mut Product) + Send,
    {
        let updated = self
            .store
            .modify_product(id, |current| mutate_product(current, mutator))
            .await?;
        Ok(self.written(updated.id))
    }

    async fn delete(&self, id: &ProductId) -> Result<MutationHandle> {
        self.store.delete_product(id).await?;
        Ok(self.written(id.clone()))
    }
}

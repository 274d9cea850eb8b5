//! Remote-query collection: an in-memory cache over `/api/products`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::RwLock;

use super::{mutate_product, MutationHandle, ProductCollection};
use crate::error::{Error, Result};
use crate::models::{NewProduct, Product, ProductId};
use crate::remote::ProductsApi;

type Entries = BTreeMap<ProductId, Product>;
type Cache = Arc<RwLock<Entries>>;

/// Ids with a request still running, counted per id.
///
/// Only touched while the cache write lock is held.
#[derive(Debug, Default)]
struct InFlight(Mutex<HashMap<ProductId, usize>>);

impl InFlight {
    fn begin(&self, id: &ProductId) {
        let mut ids = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *ids.entry(id.clone()).or_default() += 1;
    }

    fn finish(&self, id: &ProductId) {
        let mut ids = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = ids.get_mut(id) {
            *count -= 1;
            if *count == 0 {
                ids.remove(id);
            }
        }
    }

    fn ids(&self) -> Vec<ProductId> {
        let ids = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        ids.keys().cloned().collect()
    }
}

/// Cache of the remote collection with optimistic writes.
///
/// Each mutation updates the cache first and spawns exactly one request;
/// inserts never fetch the collection. A failed request rejects the handle
/// and restores the previous entry, unless a later write already replaced
/// the optimistic value. A refresh keeps the cached state of ids whose
/// requests are still running. No conflict detection: the last request to
/// land wins.
pub struct QueryCollection<A: ProductsApi> {
    api: Arc<A>,
    cache: Cache,
    in_flight: Arc<InFlight>,
    loaded: AtomicBool,
}

impl<A: ProductsApi> QueryCollection<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            cache: Arc::new(RwLock::new(BTreeMap::new())),
            in_flight: Arc::new(InFlight::default()),
            loaded: AtomicBool::new(false),
        }
    }

    /// Replace the cache with the full remote collection.
    pub async fn refresh(&self) -> Result<usize> {
        let products = self.api.list().await?;
        let count = products.len();
        let mut fresh: Entries = products
            .into_iter()
            .map(|product| (product.id.clone(), product))
            .collect();

        let mut cache = self.cache.write().await;
        for id in self.in_flight.ids() {
            match cache.get(&id) {
                Some(product) => {
                    fresh.insert(id, product.clone());
                }
                None => {
                    fresh.remove(&id);
                }
            }
        }
        *cache = fresh;
        self.loaded.store(true, Ordering::SeqCst);
        tracing::debug!("Refreshed product cache with {count} entries");
        Ok(count)
    }

    async fn ensure_loaded(&self) -> Result<()> {
        if !self.loaded.load(Ordering::SeqCst) {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Fetch the collection only when `id` is missing from a cold cache.
    async fn ensure_cached(&self, id: &ProductId) -> Result<()> {
        if self.loaded.load(Ordering::SeqCst) || self.cache.read().await.contains_key(id) {
            return Ok(());
        }
        self.refresh().await.map(|_| ())
    }

    /// Run `request` in the background and resolve the handle with its result.
    ///
    /// The caller must have called `in_flight.begin(&id)` under the cache lock.
    fn spawn_request<F>(
        &self,
        id: ProductId,
        optimistic: Option<Product>,
        previous: Option<Product>,
        request: F,
    ) -> MutationHandle
    where
        F: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, handle) = MutationHandle::pending(id.clone());
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let result = request.await;
            {
                let mut entries = cache.write().await;
                if let Err(error) = &result {
                    tracing::warn!("Request for product {id} failed, rolling back: {error}");
                    rollback(&mut entries, &id, optimistic.as_ref(), previous);
                }
                in_flight.finish(&id);
            }
            // The caller may have dropped the handle.
            let _ = tx.send(result);
        });
        handle
    }
}

/// Restore `previous` when the entry still holds the optimistic value.
fn rollback(
    entries: &mut Entries,
    id: &ProductId,
    optimistic: Option<&Product>,
    previous: Option<Product>,
) {
    if entries.get(id) != optimistic {
        tracing::debug!("Skipping rollback for {id}: entry changed since the request");
        return;
    }
    match previous {
        Some(product) => {
            entries.insert(id.clone(), product);
        }
        None => {
            entries.remove(id);
        }
    }
}

impl<A: ProductsApi> ProductCollection for QueryCollection<A> {
    async fn list(&self) -> Result<Vec<Product>> {
        self.ensure_loaded().await?;
        Ok(self.cache.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        self.ensure_loaded().await?;
        Ok(self.cache.read().await.get(id).cloned())
    }

    /// Duplicates are caught locally only when already cached; otherwise the
    /// remote rejects them and the optimistic entry is rolled back.
    async fn insert(&self, product: NewProduct) -> Result<MutationHandle> {
        let product = product.into_product()?;
        let id = product.id.clone();
        {
            let mut cache = self.cache.write().await;
            if cache.contains_key(&id) {
                return Err(Error::InvalidInput(format!("product {id} already exists")));
            }
            cache.insert(id.clone(), product.clone());
            self.in_flight.begin(&id);
        }

        let api = Arc::clone(&self.api);
        let body = product.clone();
        Ok(self.spawn_request(id, Some(product), None, async move {
            api.create(&body).await.map(|_| ())
        }))
    }

    async fn update<F>(&self, id: &ProductId, mutator: F) -> Result<MutationHandle>
    where
        F: FnOnce(&mut Product) + Send,
    {
        self.ensure_cached(id).await?;
        let (previous, updated) = {
            let mut cache = self.cache.write().await;
            let current = cache
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let updated = mutate_product(&current, mutator)?;
            cache.insert(id.clone(), updated.clone());
            self.in_flight.begin(id);
            (current, updated)
        };

        let api = Arc::clone(&self.api);
        let request_id = id.clone();
        let fields = updated.fields();
        Ok(self.spawn_request(id.clone(), Some(updated), Some(previous), async move {
            api.update(&request_id, &fields).await.map(|_| ())
        }))
    }

    async fn delete(&self, id: &ProductId) -> Result<MutationHandle> {
        self.ensure_cached(id).await?;
        let previous = {
            let mut cache = self.cache.write().await;
            let previous = cache
                .remove(id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            self.in_flight.begin(id);
            previous
        };

        let api = Arc::clone(&self.api);
        let request_id = id.clone();
        Ok(self.spawn_request(id.clone(), None, Some(previous), async move {
            api.delete(&request_id).await
        }))
    }
}

//! Product collections exposed to the interfaces.
//!
//! Two strategies implement [`ProductCollection`]:
//! - [`QueryCollection`] keeps an in-memory cache of the remote collection and
//!   issues one HTTP request per mutation.
//! - [`OfflineCollection`] commits to the local store and leaves remote
//!   propagation to the replicator.
//!
//! [`Inventory`] picks one of them once, from a [`SyncMode`].

mod offline;
mod query;

use std::fmt;
use std::str::FromStr;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::models::{NewProduct, Product, ProductId};
use crate::remote::ProductsApi;

pub use offline::OfflineCollection;
pub use query::QueryCollection;

/// Which collection strategy backs the inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Remote-query cache
    Query,
    /// Offline-first local store with replication
    #[default]
    Offline,
}

impl SyncMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" => Ok(Self::Query),
            "offline" => Ok(Self::Offline),
            other => Err(Error::InvalidInput(format!(
                "unknown sync mode '{other}' (expected 'query' or 'offline')"
            ))),
        }
    }
}

/// Completion signal for a mutation that was already applied locally.
///
/// [`MutationHandle::persisted`] resolves once the remote side settled. For
/// the offline collection that is immediate: replication takes over from the
/// local commit.
#[derive(Debug)]
pub struct MutationHandle {
    id: ProductId,
    outcome: Outcome,
}

#[derive(Debug)]
enum Outcome {
    Settled,
    Pending(oneshot::Receiver<Result<()>>),
}

impl MutationHandle {
    /// A handle that is already resolved
    pub(crate) const fn settled(id: ProductId) -> Self {
        Self {
            id,
            outcome: Outcome::Settled,
        }
    }

    /// A handle paired with the sender that will resolve it
    pub(crate) fn pending(id: ProductId) -> (oneshot::Sender<Result<()>>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                id,
                outcome: Outcome::Pending(rx),
            },
        )
    }

    /// Id of the mutated product (the generated id for inserts)
    pub const fn id(&self) -> &ProductId {
        &self.id
    }

    /// Wait for the remote outcome of the mutation.
    pub async fn persisted(self) -> Result<()> {
        match self.outcome {
            Outcome::Settled => Ok(()),
            Outcome::Pending(rx) => rx.await.map_err(|_| {
                Error::Aborted(format!("request for product {} was dropped", self.id))
            })?,
        }
    }
}

/// Operations shared by both collection strategies.
///
/// Mutations fail immediately for validation errors and unknown ids, before
/// any network call. Otherwise they return once the local (or optimistic)
/// write is visible to readers.
#[allow(async_fn_in_trait)]
pub trait ProductCollection {
    /// All live products
    async fn list(&self) -> Result<Vec<Product>>;

    /// One live product by id
    async fn get(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Add a product, generating an id when none is given
    async fn insert(&self, product: NewProduct) -> Result<MutationHandle>;

    /// Apply `mutator` to a copy of the product and store the result.
    ///
    /// Changing the id inside the mutator is rejected.
    async fn update<F>(&self, id: &ProductId, mutator: F) -> Result<MutationHandle>
    where
        F: FnOnce(&mut Product) + Send;

    /// Remove a product
    async fn delete(&self, id: &ProductId) -> Result<MutationHandle>;
}

/// Collection selected by [`SyncMode`]
pub enum Inventory<A: ProductsApi> {
    Query(QueryCollection<A>),
    Offline(OfflineCollection),
}

impl<A: ProductsApi> Inventory<A> {
    pub const fn mode(&self) -> SyncMode {
        match self {
            Self::Query(_) => SyncMode::Query,
            Self::Offline(_) => SyncMode::Offline,
        }
    }
}

impl<A: ProductsApi> ProductCollection for Inventory<A> {
    async fn list(&self) -> Result<Vec<Product>> {
        match self {
            Self::Query(collection) => collection.list().await,
            Self::Offline(collection) => collection.list().await,
        }
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        match self {
            Self::Query(collection) => collection.get(id).await,
            Self::Offline(collection) => collection.get(id).await,
        }
    }

    async fn insert(&self, product: NewProduct) -> Result<MutationHandle> {
        match self {
            Self::Query(collection) => collection.insert(product).await,
            Self::Offline(collection) => collection.insert(product).await,
        }
    }

    async fn update<F>(&self, id: &ProductId, mutator: F) -> Result<MutationHandle>
    where
        F: FnOnce(&mut Product) + Send,
    {
        match self {
            Self::Query(collection) => collection.update(id, mutator).await,
            Self::Offline(collection) => collection.update(id, mutator).await,
        }
    }

    async fn delete(&self, id: &ProductId) -> Result<MutationHandle> {
        match self {
            Self::Query(collection) => collection.delete(id).await,
            Self::Offline(collection) => collection.delete(id).await,
        }
    }
}

/// Apply a mutator to a copy, rejecting id changes and invalid results.
pub(crate) fn mutate_product<F>(current: &Product, mutator: F) -> Result<Product>
where
    F: FnOnce(&mut Product),
{
    let mut updated = current.clone();
    mutator(&mut updated);
    if updated.id != current.id {
        return Err(Error::InvalidInput(format!(
            "product id is immutable (tried to change {} to {})",
            current.id, updated.id
        )));
    }
    updated.validate()?;
    Ok(updated)
}

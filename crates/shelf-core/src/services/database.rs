//! Shared local store service used by the offline collection and the replicator.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, LibSqlProductRepository, LibSqlReplicationRepository, PendingChange,
    ProductRepository, PullOutcome, ReplicationRepository,
};
use crate::models::{Checkpoint, ConflictRecord, Product, ProductId, SyncConflict};
use crate::{Error, Result};

/// Thread-safe service for local store operations.
///
/// All access goes through one connection behind an async mutex, so local
/// writes commit one at a time in call order.
#[derive(Clone)]
pub struct ProductStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl ProductStore {
    /// Open a store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::info!("Opened offline product store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem path of the store, if file-backed.
    pub fn path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// List live products.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let db = self.db.lock().await;
        LibSqlProductRepository::new(db.connection()).list().await
    }

    /// Fetch a live product by id.
    pub async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let db = self.db.lock().await;
        LibSqlProductRepository::new(db.connection()).get(id).await
    }

    /// Insert a product and queue it for push.
    pub async fn insert_product(&self, product: &Product) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlProductRepository::new(db.connection())
            .insert(product)
            .await
    }

    /// Read a live product, change it with `change`, and write the result
    /// back without releasing the connection in between.
    pub async fn modify_product<F>(&self, id: &ProductId, change: F) -> Result<Product>
    where
        F: FnOnce(&Product) -> Result<Product> + Send,
    {
        let db = self.db.lock().await;
        let products = LibSqlProductRepository::new(db.connection());
        let current = products
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let updated = change(&current)?;
        products.update(&updated).await?;
        Ok(updated)
    }

    /// Tombstone a product and queue the delete for push.
    pub async fn delete_product(&self, id: &ProductId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlProductRepository::new(db.connection())
            .delete(id)
            .await
    }

    /// Oldest pending changes first.
    pub async fn pending_changes(&self, limit: usize) -> Result<Vec<PendingChange>> {
        let db = self.db.lock().await;
        LibSqlReplicationRepository::new(db.connection())
            .pending_changes(limit)
            .await
    }

    /// Count of products with unacknowledged writes.
    pub async fn pending_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlReplicationRepository::new(db.connection())
            .pending_count()
            .await
    }

    /// Merge a pull batch.
    pub async fn apply_pulled(&self, documents: &[Product]) -> Result<PullOutcome> {
        let db = self.db.lock().await;
        LibSqlReplicationRepository::new(db.connection())
            .apply_pulled(documents)
            .await
    }

    /// Mark a pushed change as reconciled.
    pub async fn acknowledge(&self, change: &PendingChange) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlReplicationRepository::new(db.connection())
            .acknowledge(change)
            .await
    }

    /// Drop a tombstone that never reached the remote.
    pub async fn settle_local_tombstone(&self, change: &PendingChange) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlReplicationRepository::new(db.connection())
            .settle_local_tombstone(change)
            .await
    }

    /// Load a replication checkpoint.
    pub async fn load_checkpoint(&self, identifier: &str) -> Result<Checkpoint> {
        let db = self.db.lock().await;
        LibSqlReplicationRepository::new(db.connection())
            .load_checkpoint(identifier)
            .await
    }

    /// Save a replication checkpoint.
    pub async fn save_checkpoint(&self, identifier: &str, checkpoint: &Checkpoint) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlReplicationRepository::new(db.connection())
            .save_checkpoint(identifier, checkpoint)
            .await
    }

    /// Append conflicts to the local history.
    pub async fn record_conflicts(&self, conflicts: &[ConflictRecord]) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlReplicationRepository::new(db.connection())
            .record_conflicts(conflicts)
            .await
    }

    /// List recently recorded conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        LibSqlReplicationRepository::new(db.connection())
            .list_conflicts(limit)
            .await
    }
}

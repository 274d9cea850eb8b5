//! Replication bookkeeping: pending changes, master states, checkpoints and
//! the conflict history.

use crate::error::{Error, Result};
use crate::models::{
    ChangeRow, Checkpoint, ConflictRecord, MutationKind, Product, ReplicatedDocument,
    SyncConflict,
};
use super::now_millis;
use libsql::{params, Connection};

use super::repository::{parse_optional_product, parse_product};

/// A change row together with the revision it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    pub row: ChangeRow,
    pub revision: i64,
}

/// Counts from merging a pull batch into the local store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOutcome {
    /// Local rows written because remote content differed
    pub applied: usize,
    /// Documents already identical locally
    pub unchanged: usize,
    /// Documents whose local row has a pending write and was left alone
    pub skipped_pending: usize,
}

/// Trait for replication state storage (async)
#[allow(async_fn_in_trait)]
pub trait ReplicationRepository {
    /// Oldest pending changes first
    async fn pending_changes(&self, limit: usize) -> Result<Vec<PendingChange>>;

    /// Number of products with unacknowledged writes
    async fn pending_count(&self) -> Result<usize>;

    /// Merge pulled documents; pending local writes win until pushed
    async fn apply_pulled(&self, documents: &[Product]) -> Result<PullOutcome>;

    /// Mark a pushed change as reconciled. Returns false when a newer local
    /// write arrived meanwhile and the id stays pending.
    async fn acknowledge(&self, change: &PendingChange) -> Result<bool>;

    /// Drop a tombstone the remote never saw
    async fn settle_local_tombstone(&self, change: &PendingChange) -> Result<bool>;

    /// Load the checkpoint for a replication identifier
    async fn load_checkpoint(&self, identifier: &str) -> Result<Checkpoint>;

    /// Persist the checkpoint for a replication identifier
    async fn save_checkpoint(&self, identifier: &str, checkpoint: &Checkpoint) -> Result<()>;

    /// Append push failures to the conflict history
    async fn record_conflicts(&self, conflicts: &[ConflictRecord]) -> Result<()>;

    /// Most recent conflicts first
    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// libSQL implementation of `ReplicationRepository`
pub struct LibSqlReplicationRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlReplicationRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ReplicationRepository for LibSqlReplicationRepository<'_> {
    async fn pending_changes(&self, limit: usize) -> Result<Vec<PendingChange>> {
        let mut rows = self
            .conn
            .query(
                "SELECT p.id, p.name, p.category, p.price, p.stock, p.is_deleted,
                        m.id, m.name, m.category, m.price, m.stock,
                        pc.revision
                 FROM pending_changes pc
                 JOIN products p ON p.id = pc.product_id
                 LEFT JOIN product_masters m ON m.id = pc.product_id
                 ORDER BY pc.queued_at, pc.product_id
                 LIMIT ?",
                params![sql_limit(limit)],
            )
            .await?;

        let mut changes = Vec::new();
        while let Some(row) = rows.next().await? {
            let product = parse_product(&row, 0)?;
            let deleted = row.get::<i64>(5)? != 0;
            let master = parse_optional_product(&row, 6)?;
            let revision = row.get::<i64>(11)?;

            changes.push(PendingChange {
                row: ChangeRow {
                    new_document_state: ReplicatedDocument { product, deleted },
                    assumed_master_state: master.map(ReplicatedDocument::live),
                },
                revision,
            });
        }
        Ok(changes)
    }

    async fn pending_count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM pending_changes", ())
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn apply_pulled(&self, documents: &[Product]) -> Result<PullOutcome> {
        let now = now_millis();
        let mut outcome = PullOutcome::default();
        let tx = self.conn.transaction().await?;

        for product in documents {
            tx.execute(
                "INSERT INTO product_masters (id, name, category, price, stock, synced_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    category = excluded.category,
                    price = excluded.price,
                    stock = excluded.stock,
                    synced_at = excluded.synced_at",
                params![
                    product.id.as_str(),
                    product.name.as_str(),
                    product.category.as_str(),
                    product.price,
                    product.stock,
                    now
                ],
            )
            .await?;

            let is_pending = {
                let mut rows = tx
                    .query(
                        "SELECT 1 FROM pending_changes WHERE product_id = ?",
                        params![product.id.as_str()],
                    )
                    .await?;
                rows.next().await?.is_some()
            };
            if is_pending {
                outcome.skipped_pending += 1;
                continue;
            }

            let is_unchanged = {
                let mut rows = tx
                    .query(
                        "SELECT id, name, category, price, stock, is_deleted FROM products WHERE id = ?",
                        params![product.id.as_str()],
                    )
                    .await?;
                match rows.next().await? {
                    Some(row) => row.get::<i64>(5)? == 0 && &parse_product(&row, 0)? == product,
                    None => false,
                }
            };
            if is_unchanged {
                outcome.unchanged += 1;
                continue;
            }

            tx.execute(
                "INSERT INTO products (id, name, category, price, stock, is_deleted, updated_at)
                 VALUES (?, ?, ?, ?, ?, 0, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    category = excluded.category,
                    price = excluded.price,
                    stock = excluded.stock,
                    is_deleted = 0,
                    updated_at = excluded.updated_at",
                params![
                    product.id.as_str(),
                    product.name.as_str(),
                    product.category.as_str(),
                    product.price,
                    product.stock,
                    now
                ],
            )
            .await?;
            outcome.applied += 1;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn acknowledge(&self, change: &PendingChange) -> Result<bool> {
        let document = &change.row.new_document_state;
        let id = document.id().as_str();
        let tx = self.conn.transaction().await?;

        if document.deleted {
            tx.execute("DELETE FROM product_masters WHERE id = ?", params![id])
                .await?;
        } else {
            let product = &document.product;
            tx.execute(
                "INSERT INTO product_masters (id, name, category, price, stock, synced_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    category = excluded.category,
                    price = excluded.price,
                    stock = excluded.stock,
                    synced_at = excluded.synced_at",
                params![
                    id,
                    product.name.as_str(),
                    product.category.as_str(),
                    product.price,
                    product.stock,
                    now_millis()
                ],
            )
            .await?;
        }

        let removed = tx
            .execute(
                "DELETE FROM pending_changes WHERE product_id = ? AND revision = ?",
                params![id, change.revision],
            )
            .await?;

        if document.deleted && removed > 0 {
            tx.execute(
                "DELETE FROM products WHERE id = ? AND is_deleted = 1",
                params![id],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn settle_local_tombstone(&self, change: &PendingChange) -> Result<bool> {
        let id = change.row.id().as_str();
        let tx = self.conn.transaction().await?;

        let removed = tx
            .execute(
                "DELETE FROM pending_changes WHERE product_id = ? AND revision = ?",
                params![id, change.revision],
            )
            .await?;
        if removed > 0 {
            tx.execute(
                "DELETE FROM products WHERE id = ? AND is_deleted = 1",
                params![id],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn load_checkpoint(&self, identifier: &str) -> Result<Checkpoint> {
        let mut rows = self
            .conn
            .query(
                "SELECT checkpoint FROM replication_checkpoints WHERE identifier = ?",
                params![identifier],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let raw: String = row.get(0)?;
                Ok(serde_json::from_str(&raw)?)
            }
            None => Ok(Checkpoint::default()),
        }
    }

    async fn save_checkpoint(&self, identifier: &str, checkpoint: &Checkpoint) -> Result<()> {
        let raw = serde_json::to_string(checkpoint)?;
        self.conn
            .execute(
                "INSERT INTO replication_checkpoints (identifier, checkpoint, updated_at)
                 VALUES (?, ?, ?)
                 ON CONFLICT(identifier) DO UPDATE SET
                    checkpoint = excluded.checkpoint,
                    updated_at = excluded.updated_at",
                params![identifier, raw, now_millis()],
            )
            .await?;
        Ok(())
    }

    async fn record_conflicts(&self, conflicts: &[ConflictRecord]) -> Result<()> {
        if conflicts.is_empty() {
            return Ok(());
        }

        let now = now_millis();
        let tx = self.conn.transaction().await?;
        for conflict in conflicts {
            tx.execute(
                "INSERT INTO sync_conflicts (product_id, kind, reason, recorded_at)
                 VALUES (?, ?, ?, ?)",
                params![
                    conflict.id().as_str(),
                    conflict.kind().as_str(),
                    conflict.reason.as_str(),
                    now
                ],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, product_id, kind, reason, recorded_at
                 FROM sync_conflicts
                 ORDER BY recorded_at DESC, id DESC
                 LIMIT ?",
                params![sql_limit(limit)],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            let kind: String = row.get(2)?;
            conflicts.push(SyncConflict {
                id: row.get(0)?,
                product_id: row.get(1)?,
                kind: parse_kind(&kind)?,
                reason: row.get(3)?,
                recorded_at: row.get(4)?,
            });
        }
        Ok(conflicts)
    }
}

fn parse_kind(raw: &str) -> Result<MutationKind> {
    match raw {
        "create" => Ok(MutationKind::Create),
        "update" => Ok(MutationKind::Update),
        "delete" => Ok(MutationKind::Delete),
        other => Err(Error::Database(format!("unknown mutation kind '{other}'"))),
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

//! Local product repository implementation
//!
//! Every write also queues the product id in `pending_changes`, so the
//! replicator can push it later.

use crate::error::{Error, Result};
use crate::models::{Product, ProductId};
use super::now_millis;
use libsql::{params, Connection, Row, Value};

/// Trait for local product storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ProductRepository {
    /// List live products
    async fn list(&self) -> Result<Vec<Product>>;

    /// Get a live product by ID
    async fn get(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Insert a new product and queue it for push
    async fn insert(&self, product: &Product) -> Result<()>;

    /// Replace a product's fields and queue it for push
    async fn update(&self, product: &Product) -> Result<()>;

    /// Tombstone a product and queue the delete for push
    async fn delete(&self, id: &ProductId) -> Result<()>;
}

/// libSQL implementation of `ProductRepository`
pub struct LibSqlProductRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlProductRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Look up a row including tombstones, returning `(product, is_deleted)`.
    async fn get_any(&self, id: &ProductId) -> Result<Option<(Product, bool)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, category, price, stock, is_deleted FROM products WHERE id = ?",
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let product = parse_product(&row, 0)?;
                let deleted = row.get::<i64>(5)? != 0;
                Ok(Some((product, deleted)))
            }
            None => Ok(None),
        }
    }
}

impl ProductRepository for LibSqlProductRepository<'_> {
    async fn list(&self) -> Result<Vec<Product>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, category, price, stock
                 FROM products
                 WHERE is_deleted = 0
                 ORDER BY name COLLATE NOCASE, id",
                (),
            )
            .await?;

        let mut products = Vec::new();
        while let Some(row) = rows.next().await? {
            products.push(parse_product(&row, 0)?);
        }
        Ok(products)
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self
            .get_any(id)
            .await?
            .and_then(|(product, deleted)| (!deleted).then_some(product)))
    }

    async fn insert(&self, product: &Product) -> Result<()> {
        product.validate()?;

        if let Some((_, false)) = self.get_any(&product.id).await? {
            return Err(Error::InvalidInput(format!(
                "product {} already exists",
                product.id
            )));
        }

        let now = now_millis();
        let tx = self.conn.transaction().await?;
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
        queue_pending(&tx, &product.id, now).await?;
        tx.commit().await?;

        tracing::debug!("Inserted product {} locally", product.id);
        Ok(())
    }

    async fn update(&self, product: &Product) -> Result<()> {
        product.validate()?;

        let now = now_millis();
        let tx = self.conn.transaction().await?;
        let rows = tx
            .execute(
                "UPDATE products
                 SET name = ?, category = ?, price = ?, stock = ?, updated_at = ?
                 WHERE id = ? AND is_deleted = 0",
                params![
                    product.name.as_str(),
                    product.category.as_str(),
                    product.price,
                    product.stock,
                    now,
                    product.id.as_str()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(product.id.to_string()));
        }

        queue_pending(&tx, &product.id, now).await?;
        tx.commit().await?;

        tracing::debug!("Updated product {} locally", product.id);
        Ok(())
    }

    async fn delete(&self, id: &ProductId) -> Result<()> {
        let now = now_millis();
        let tx = self.conn.transaction().await?;
        let rows = tx
            .execute(
                "UPDATE products SET is_deleted = 1, updated_at = ? WHERE id = ? AND is_deleted = 0",
                params![now, id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        queue_pending(&tx, id, now).await?;
        tx.commit().await?;

        tracing::debug!("Tombstoned product {id} locally");
        Ok(())
    }
}

/// Mark a product as having an unacknowledged local write.
///
/// Each write bumps the revision so an in-flight push cannot acknowledge a
/// newer write it never saw.
async fn queue_pending(conn: &Connection, id: &ProductId, now: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO pending_changes (product_id, revision, queued_at)
         VALUES (?, 1, ?)
         ON CONFLICT(product_id) DO UPDATE SET
            revision = pending_changes.revision + 1,
            queued_at = excluded.queued_at",
        params![id.as_str(), now],
    )
    .await?;
    Ok(())
}

/// Parse five product columns starting at `offset`
pub(crate) fn parse_product(row: &Row, offset: i32) -> Result<Product> {
    let id: String = row.get(offset)?;
    Ok(Product {
        id: id.parse()?,
        name: row.get(offset + 1)?,
        category: row.get(offset + 2)?,
        price: value_to_f64(row.get_value(offset + 3)?)?,
        stock: row.get(offset + 4)?,
    })
}

/// Parse five nullable product columns (from a LEFT JOIN) starting at `offset`
pub(crate) fn parse_optional_product(row: &Row, offset: i32) -> Result<Option<Product>> {
    match row.get_value(offset)? {
        Value::Null => Ok(None),
        _ => parse_product(row, offset).map(Some),
    }
}

/// `SQLite` may hand back whole-number REALs as integers
fn value_to_f64(value: Value) -> Result<f64> {
    match value {
        Value::Real(real) => Ok(real),
        #[allow(clippy::cast_precision_loss)]
        Value::Integer(int) => Ok(int as f64),
        other => Err(Error::Database(format!(
            "expected numeric price column, got {other:?}"
        ))),
    }
}

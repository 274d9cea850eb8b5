//! In-memory product catalog behind the HTTP routes.

use std::collections::BTreeMap;

use shelf_core::models::ProductFields;
use shelf_core::{NewProduct, Product, ProductId};
use tokio::sync::RwLock;

use crate::error::AppError;

const SEED: [(&str, &str, f64, i64); 6] = [
    ("1", "Bakso sapi", 80_000.0, 8),
    ("2", "Mie Ayam", 17_000.0, 10),
    ("3", "Mie goreng", 50_000.0, 15),
    ("4", "Nasi goreng", 25_000.0, 25),
    ("5", "Sate ayam", 30_000.0, 11),
    ("6", "Lontong sate", 18_000.0, 10),
];

#[derive(Default)]
pub struct ProductCatalog {
    products: RwLock<BTreeMap<ProductId, Product>>,
}

impl ProductCatalog {
    /// Catalog holding the demo products
    pub fn seeded() -> Self {
        let products = SEED
            .iter()
            .filter_map(|(id, name, price, stock)| {
                NewProduct::new(*name, "makanan", *price, *stock)
                    .with_id(id.parse().ok()?)
                    .into_product()
                    .ok()
            })
            .map(|product| (product.id.clone(), product))
            .collect();
        Self {
            products: RwLock::new(products),
        }
    }

    pub async fn list(&self) -> Vec<Product> {
        self.products.read().await.values().cloned().collect()
    }

    pub async fn create(&self, draft: NewProduct) -> Result<Product, AppError> {
        let product = draft.into_product()?;
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(AppError::Conflict(product.id.to_string()));
        }
        products.insert(product.id.clone(), product.clone());
        tracing::info!("Created product {}", product.id);
        Ok(product)
    }

    pub async fn update(&self, id: &ProductId, fields: ProductFields) -> Result<Product, AppError> {
        let mut products = self.products.write().await;
        let current = products
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        let mut updated = current.clone();
        updated.apply_fields(fields);
        updated.validate()?;
        *current = updated.clone();
        tracing::info!("Updated product {id}");
        Ok(updated)
    }

    pub async fn delete(&self, id: &ProductId) -> Result<(), AppError> {
        self.products
            .write()
            .await
            .remove(id)
            .map(|_| tracing::info!("Deleted product {id}"))
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn seeded_catalog_has_demo_products() {
        let catalog = ProductCatalog::seeded();
        let names: Vec<String> = catalog.list().await.into_iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec![
                "Bakso sapi",
                "Mie Ayam",
                "Mie goreng",
                "Nasi goreng",
                "Sate ayam",
                "Lontong sate"
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_update_keeps_previous_state() {
        let catalog = ProductCatalog::seeded();
        let id: ProductId = "1".parse().unwrap();
        let err = catalog
            .update(
                &id,
                ProductFields {
                    name: "Bakso sapi".to_string(),
                    category: "makanan".to_string(),
                    price: 80_000.0,
                    stock: -3,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(catalog.list().await[0].stock, 8);
    }
}

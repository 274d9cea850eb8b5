//! Product model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// An opaque product identifier.
///
/// Generated ids are UUID v7 strings, but any non-empty string assigned by a
/// remote is accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Create a new unique product ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Borrow the string form of this ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProductId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("product id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// A product in the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Stable identifier, immutable after creation
    pub id: ProductId,
    /// Display name
    pub name: String,
    /// Free-form category
    pub category: String,
    /// Unit price, non-negative
    pub price: f64,
    /// Units on hand, non-negative
    pub stock: i64,
}

impl Product {
    /// Check the schema constraints enforced on every write.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(Error::InvalidInput("product id cannot be empty".into()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(Error::InvalidInput(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        if self.stock < 0 {
            return Err(Error::InvalidInput(format!(
                "stock must be a non-negative integer, got {}",
                self.stock
            )));
        }
        Ok(())
    }

    /// The mutable fields, as sent in an update request body.
    #[must_use]
    pub fn fields(&self) -> ProductFields {
        ProductFields {
            name: self.name.clone(),
            category: self.category.clone(),
            price: self.price,
            stock: self.stock,
        }
    }

    /// Overwrite the mutable fields, keeping the id.
    pub fn apply_fields(&mut self, fields: ProductFields) {
        self.name = fields.name;
        self.category = fields.category;
        self.price = fields.price;
        self.stock = fields.stock;
    }
}

/// Mutable product fields (everything except `id`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFields {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub stock: i64,
}

/// A product that may not have been assigned an id yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    #[serde(default)]
    pub id: Option<ProductId>,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub stock: i64,
}

impl NewProduct {
    /// Create a product draft without an id
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: f64, stock: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            category: category.into(),
            price,
            stock,
        }
    }

    /// Use a caller-chosen id instead of a generated one
    #[must_use]
    pub fn with_id(mut self, id: ProductId) -> Self {
        self.id = Some(id);
        self
    }

    /// Assign an id (if missing) and validate.
    pub fn into_product(self) -> Result<Product> {
        let product = Product {
            id: self.id.unwrap_or_default(),
            name: self.name,
            category: self.category,
            price: self.price,
            stock: self.stock,
        };
        product.validate()?;
        Ok(product)
    }
}

/// Normalize raw remote documents to the product schema.
///
/// Remote-only metadata is dropped by typed deserialization. Documents that do
/// not match the schema are skipped rather than failing the whole batch.
pub fn normalize_documents(values: Vec<serde_json::Value>) -> Vec<Product> {
    values
        .into_iter()
        .filter_map(|value| {
            let parsed = serde_json::from_value::<Product>(value)
                .map_err(Error::from)
                .and_then(|product| product.validate().map(|()| product));
            match parsed {
                Ok(product) => Some(product),
                Err(error) => {
                    tracing::warn!("Skipping remote product that failed validation: {error}");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_product_id_unique() {
        assert_ne!(ProductId::new(), ProductId::new());
    }

    #[test]
    fn test_product_id_parse_rejects_blank() {
        assert!("   ".parse::<ProductId>().is_err());
        assert_eq!("abc".parse::<ProductId>().unwrap().as_str(), "abc");
    }

    #[test]
    fn test_new_product_assigns_id() {
        let product = NewProduct::new("Tea", "drink", 5000.0, 3)
            .into_product()
            .unwrap();
        assert!(!product.id.as_str().is_empty());
        assert_eq!(product.name, "Tea");
    }

    #[test]
    fn test_new_product_keeps_given_id() {
        let id: ProductId = "1".parse().unwrap();
        let product = NewProduct::new("Bakso sapi", "makanan", 80000.0, 8)
            .with_id(id.clone())
            .into_product()
            .unwrap();
        assert_eq!(product.id, id);
    }

    #[test]
    fn test_validation_rejects_negative_values() {
        assert!(NewProduct::new("Tea", "drink", -1.0, 3)
            .into_product()
            .is_err());
        assert!(NewProduct::new("Tea", "drink", 1.0, -3)
            .into_product()
            .is_err());
        assert!(NewProduct::new("Tea", "drink", f64::NAN, 3)
            .into_product()
            .is_err());
    }

    #[test]
    fn test_fields_roundtrip_keeps_id() {
        let mut product = NewProduct::new("Tea", "drink", 5000.0, 3)
            .into_product()
            .unwrap();
        let id = product.id.clone();
        let mut fields = product.fields();
        fields.stock = 10;
        product.apply_fields(fields);
        assert_eq!(product.id, id);
        assert_eq!(product.stock, 10);
    }

    #[test]
    fn test_normalize_documents_strips_remote_metadata() {
        let docs = vec![
            json!({
                "id": "1",
                "name": "Mie Ayam",
                "category": "makanan",
                "price": 17000,
                "stock": 10,
                "createdAt": "2024-01-01T00:00:00Z",
                "_rev": "3-abc"
            }),
            json!({ "id": "2", "name": "broken" }),
            json!({ "id": "3", "name": "neg", "category": "x", "price": 1, "stock": -1 }),
        ];

        let products = normalize_documents(docs);
        assert_eq!(products.len(), 1);
        assert_eq!(
            serde_json::to_value(&products[0]).unwrap(),
            json!({
                "id": "1",
                "name": "Mie Ayam",
                "category": "makanan",
                "price": 17000.0,
                "stock": 10
            })
        );
    }
}

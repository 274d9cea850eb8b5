//! In-memory `ProductsApi` used by protocol tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{MutationKind, NewProduct, Product, ProductFields, ProductId};
use crate::remote::ProductsApi;

/// Request recorded by [`MockProductsApi`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub kind: MutationKind,
    pub id: ProductId,
    pub body: Option<ProductFields>,
}

#[derive(Default)]
pub struct MockProductsApi {
    products: Mutex<BTreeMap<ProductId, Product>>,
    failing_ids: Mutex<HashSet<ProductId>>,
    fail_list: AtomicBool,
    unreachable: AtomicBool,
    list_calls: AtomicUsize,
    health_calls: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockProductsApi {
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let api = Self::default();
        {
            let mut map = api.products.lock().unwrap();
            for product in products {
                map.insert(product.id.clone(), product);
            }
        }
        api
    }

    /// Answer writes for `id` with a 500.
    pub fn fail_id(&self, id: &ProductId) {
        self.failing_ids.lock().unwrap().insert(id.clone());
    }

    pub fn heal_id(&self, id: &ProductId) {
        self.failing_ids.lock().unwrap().remove(id);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Fail every call as if the host were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn get(&self, id: &ProductId) -> Option<Product> {
        self.products.lock().unwrap().get(id).cloned()
    }

    pub fn put_remote(&self, product: Product) {
        self.products
            .lock()
            .unwrap()
            .insert(product.id.clone(), product);
    }

    pub fn remove_remote(&self, id: &ProductId) {
        self.products.lock().unwrap().remove(id);
    }

    /// Called with the products lock held so request order matches apply order.
    fn record(&self, kind: MutationKind, id: &ProductId, body: Option<ProductFields>) -> Result<()> {
        self.requests.lock().unwrap().push(RecordedRequest {
            kind,
            id: id.clone(),
            body,
        });
        if self.failing_ids.lock().unwrap().contains(id) {
            return Err(Error::Remote {
                status: 500,
                message: "internal failure (500)".to_string(),
            });
        }
        Ok(())
    }
}

impl ProductsApi for MockProductsApi {
    async fn list(&self) -> Result<Vec<Product>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Remote {
                status: 503,
                message: "HTTP 503".to_string(),
            });
        }
        Ok(self.products.lock().unwrap().values().cloned().collect())
    }

    async fn create(&self, product: &Product) -> Result<Product> {
        self.check_reachable()?;
        let mut products = self.products.lock().unwrap();
        self.record(MutationKind::Create, &product.id, Some(product.fields()))?;
        if products.contains_key(&product.id) {
            return Err(Error::Remote {
                status: 409,
                message: format!("Product already exists: {} (409)", product.id),
            });
        }
        products.insert(product.id.clone(), product.clone());
        Ok(product.clone())
    }

    async fn update(&self, id: &ProductId, fields: &ProductFields) -> Result<Product> {
        self.check_reachable()?;
        let mut products = self.products.lock().unwrap();
        self.record(MutationKind::Update, id, Some(fields.clone()))?;
        let Some(product) = products.get_mut(id) else {
            return Err(Error::Remote {
                status: 404,
                message: format!("Product not found: {id} (404)"),
            });
        };
        product.apply_fields(fields.clone());
        Ok(product.clone())
    }

    async fn delete(&self, id: &ProductId) -> Result<()> {
        self.check_reachable()?;
        let mut products = self.products.lock().unwrap();
        self.record(MutationKind::Delete, id, None)?;
        match products.remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::Remote {
                status: 404,
                message: format!("Product not found: {id} (404)"),
            }),
        }
    }

    async fn health(&self) -> Result<()> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()
    }
}

pub fn product(id: &str, name: &str, stock: i64) -> Product {
    NewProduct::new(name, "makanan", 15000.0, stock)
        .with_id(id.parse().unwrap())
        .into_product()
        .unwrap()
}

//! Client for the remote `/api/products` collection.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{normalize_documents, Product, ProductFields, ProductId};

const PRODUCTS_PATH: &str = "/api/products";
const HEALTH_PATH: &str = "/healthz";
const ERROR_BODY_LIMIT: usize = 180;

/// Operations on the remote product collection.
///
/// Implemented over HTTP by [`HttpProductsApi`]; tests substitute an
/// in-memory implementation.
pub trait ProductsApi: Send + Sync + 'static {
    /// GET the full collection, normalized to the product schema
    fn list(&self) -> impl Future<Output = Result<Vec<Product>>> + Send;

    /// POST a new product (id included)
    fn create(&self, product: &Product) -> impl Future<Output = Result<Product>> + Send;

    /// PUT the mutable fields of an existing product
    fn update(
        &self,
        id: &ProductId,
        fields: &ProductFields,
    ) -> impl Future<Output = Result<Product>> + Send;

    /// DELETE a product
    fn delete(&self, id: &ProductId) -> impl Future<Output = Result<()>> + Send;

    /// Check that the remote host answers at all.
    ///
    /// Any HTTP response counts as reachable; only transport failures are
    /// reported as [`Error::Unreachable`].
    fn health(&self) -> impl Future<Output = Result<()>> + Send;
}

impl<T: ProductsApi> ProductsApi for Arc<T> {
    fn list(&self) -> impl Future<Output = Result<Vec<Product>>> + Send {
        (**self).list()
    }

    fn create(&self, product: &Product) -> impl Future<Output = Result<Product>> + Send {
        (**self).create(product)
    }

    fn update(
        &self,
        id: &ProductId,
        fields: &ProductFields,
    ) -> impl Future<Output = Result<Product>> + Send {
        (**self).update(id, fields)
    }

    fn delete(&self, id: &ProductId) -> impl Future<Output = Result<()>> + Send {
        (**self).delete(id)
    }

    fn health(&self) -> impl Future<Output = Result<()>> + Send {
        (**self).health()
    }
}

/// reqwest-backed client for `{base_url}/api/products`
#[derive(Clone)]
pub struct HttpProductsApi {
    collection_url: String,
    health_url: String,
    client: reqwest::Client,
}

impl HttpProductsApi {
    /// Build a client for the given base URL (e.g. `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = parse_base_url(&base_url.into())?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            collection_url: format!("{base_url}{PRODUCTS_PATH}"),
            health_url: format!("{base_url}{HEALTH_PATH}"),
            client,
        })
    }

    /// The collection endpoint this client talks to
    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    fn item_url(&self, id: &ProductId) -> String {
        format!("{}/{}", self.collection_url, urlencoding::encode(id.as_str()))
    }
}

impl ProductsApi for HttpProductsApi {
    async fn list(&self) -> Result<Vec<Product>> {
        tracing::debug!("GET {}", self.collection_url);
        let response = self
            .client
            .get(&self.collection_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;
        let documents = response.json::<Vec<serde_json::Value>>().await?;
        Ok(normalize_documents(documents))
    }

    async fn create(&self, product: &Product) -> Result<Product> {
        tracing::debug!("POST {} id={}", self.collection_url, product.id);
        let response = self
            .client
            .post(&self.collection_url)
            .json(product)
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;
        read_product_or(response, product.clone()).await
    }

    async fn update(&self, id: &ProductId, fields: &ProductFields) -> Result<Product> {
        let url = self.item_url(id);
        tracing::debug!("PUT {url}");
        let response = self
            .client
            .put(&url)
            .json(fields)
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;
        let fallback = Product {
            id: id.clone(),
            name: fields.name.clone(),
            category: fields.category.clone(),
            price: fields.price,
            stock: fields.stock,
        };
        read_product_or(response, fallback).await
    }

    async fn delete(&self, id: &ProductId) -> Result<()> {
        let url = self.item_url(id);
        tracing::debug!("DELETE {url}");
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        tracing::debug!("GET {}", self.health_url);
        self.client
            .get(&self.health_url)
            .send()
            .await
            .map_err(transport_error)?;
        Ok(())
    }
}

fn transport_error(error: reqwest::Error) -> Error {
    if error.is_connect() || error.is_timeout() {
        Error::Unreachable(error.to_string())
    } else {
        Error::Http(error)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Remote {
        status: status.as_u16(),
        message: parse_api_error(status, &body),
    })
}

/// Some backends answer writes with an empty body; fall back to what was sent.
async fn read_product_or(response: reqwest::Response, fallback: Product) -> Result<Product> {
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(fallback);
    }
    let product = serde_json::from_str::<Product>(&body)?;
    Ok(product)
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed: String = body.trim().chars().take(ERROR_BODY_LIMIT).collect();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

/// Validate an absolute `http`/`https` base URL and drop trailing slashes.
pub fn parse_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    match reqwest::Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(trimmed.trim_end_matches('/').to_string())
        }
        _ => Err(Error::InvalidInput(format!(
            "API base URL must be an http:// or https:// URL, got {trimmed:?}"
        ))),
    }
}

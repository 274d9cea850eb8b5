use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use shelf_core::collection::{OfflineCollection, QueryCollection};
use shelf_core::config::ClientConfig;
use shelf_core::remote::HttpProductsApi;
use shelf_core::replication::{Connectivity, ConnectivityMonitor, Replicator};
use shelf_core::services::ProductStore;
use shelf_core::{Inventory, Product, ProductId, SyncConflict, SyncMode};

use crate::error::CliError;

/// Resolved settings for one CLI invocation
#[derive(Debug, Clone)]
pub struct Session {
    pub mode: SyncMode,
    pub config: ClientConfig,
    pub db_path: PathBuf,
}

impl Session {
    pub fn resolve(
        mode: SyncMode,
        cli_db_path: Option<PathBuf>,
        cli_api_url: Option<String>,
    ) -> Result<Self, CliError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(api_url) = cli_api_url {
            config = config.with_api_base_url(api_url)?;
        }
        let db_path = resolve_db_path(cli_db_path, config.db_path.clone());
        Ok(Self {
            mode,
            config,
            db_path,
        })
    }

    pub fn api(&self) -> Result<Arc<HttpProductsApi>, CliError> {
        let api = HttpProductsApi::new(self.config.api_base_url.clone(), self.config.http_timeout)?;
        Ok(Arc::new(api))
    }

    pub async fn open_store(&self) -> Result<ProductStore, CliError> {
        Ok(ProductStore::open_path(&self.db_path).await?)
    }

    pub async fn open_inventory(&self) -> Result<Inventory<HttpProductsApi>, CliError> {
        Ok(match self.mode {
            SyncMode::Query => Inventory::Query(QueryCollection::new(self.api()?)),
            SyncMode::Offline => Inventory::Offline(OfflineCollection::new(self.open_store().await?)),
        })
    }

    pub fn replicator(
        &self,
        store: ProductStore,
        connectivity: Connectivity,
    ) -> Result<Replicator<HttpProductsApi>, CliError> {
        Ok(Replicator::new(
            store,
            self.api()?,
            connectivity,
            self.config.replication(),
        ))
    }

    /// Check the API host's health once.
    pub async fn check_online(&self) -> Result<bool, CliError> {
        let monitor =
            ConnectivityMonitor::new(self.api()?, Connectivity::online(), self.config.http_timeout);
        Ok(monitor.check().await)
    }

    pub fn require_offline(&self, command: &'static str) -> Result<(), CliError> {
        if self.mode == SyncMode::Offline {
            Ok(())
        } else {
            Err(CliError::OfflineOnly(command))
        }
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>, env_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or(env_db_path)
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shelf")
        .join("shelf.db")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn parse_product_id(raw: &str) -> Result<ProductId, CliError> {
    raw.parse().map_err(|_| CliError::EmptyProductId)
}

/// Field changes requested by `shelf edit`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
}

impl ProductPatch {
    pub fn new(
        name: Option<String>,
        category: Option<String>,
        price: Option<f64>,
        stock: Option<i64>,
    ) -> Self {
        Self {
            name: non_blank(name),
            category: non_blank(category),
            price,
            stock,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.category.is_none() && self.price.is_none() && self.stock.is_none()
    }

    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub product_id: String,
    pub kind: String,
    pub reason: String,
    pub recorded_at: i64,
    pub recorded_at_iso: String,
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        product_id: conflict.product_id.clone(),
        kind: conflict.kind.to_string(),
        reason: conflict.reason.clone(),
        recorded_at: conflict.recorded_at,
        recorded_at_iso: format_sync_timestamp(conflict.recorded_at),
    }
}

pub fn format_product_lines(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .map(|product| {
            format!(
                "{}  {:<24}  {:<12}  {:>12.2}  stock={}",
                product.id.as_str(),
                product.name,
                product.category,
                product.price,
                product.stock
            )
        })
        .collect()
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<6}  product={}  {}",
                format_sync_timestamp(conflict.recorded_at),
                conflict.kind.as_str(),
                conflict.product_id,
                conflict.reason
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}

pub const fn connectivity_label(online: bool) -> &'static str {
    if online {
        "online"
    } else {
        "offline"
    }
}

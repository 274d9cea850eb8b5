//! Database layer for Shelf

mod connection;
mod migrations;
mod replication_repository;
mod repository;

pub use connection::Database;
pub use replication_repository::{
    LibSqlReplicationRepository, PendingChange, PullOutcome, ReplicationRepository,
};
pub use repository::{LibSqlProductRepository, ProductRepository};

/// Wall-clock time as Unix milliseconds, the unit of every stored timestamp.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

//! Data models for Shelf

mod product;
mod replication;
mod sync_conflict;

pub use product::{normalize_documents, NewProduct, Product, ProductFields, ProductId};
pub use replication::{
    ChangeRow, Checkpoint, ConflictRecord, MutationKind, PullBatch, ReplicatedDocument,
};
pub use sync_conflict::SyncConflict;

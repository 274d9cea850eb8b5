//! Pull and push handlers for the replication loop.

use std::sync::Mutex;

use futures::future::join_all;

use crate::error::Result;
use crate::models::{ChangeRow, Checkpoint, ConflictRecord, MutationKind, PullBatch};
use crate::remote::ProductsApi;

/// Fetch the full remote collection.
///
/// The remote has no change feed, so the checkpoint is returned unchanged.
pub async fn pull<A: ProductsApi>(api: &A, checkpoint: Checkpoint) -> Result<PullBatch> {
    let documents = api.list().await?;
    tracing::debug!("Pulled {} products", documents.len());
    Ok(PullBatch {
        documents,
        checkpoint,
    })
}

/// Send every row to the remote and collect the ones that failed.
///
/// All rows are attempted concurrently on the calling task. A failure never
/// stops the other rows and is not retried here.
pub async fn push<A: ProductsApi>(api: &A, rows: &[ChangeRow]) -> Vec<ConflictRecord> {
    let log = ConflictLog::default();
    join_all(rows.iter().map(|row| {
        let log = &log;
        async move {
            if let Err(error) = push_row(api, row).await {
                tracing::warn!(
                    "Push of {} for product {} failed: {error}",
                    row.kind(),
                    row.id()
                );
                log.append(ConflictRecord::from_row(row, error.to_string()));
            }
        }
    }))
    .await;
    log.into_records()
}

async fn push_row<A: ProductsApi>(api: &A, row: &ChangeRow) -> Result<()> {
    let product = &row.new_document_state.product;
    match row.kind() {
        MutationKind::Create => api.create(product).await.map(|_| ()),
        MutationKind::Update => api.update(&product.id, &product.fields()).await.map(|_| ()),
        MutationKind::Delete => api.delete(&product.id).await,
    }
}

/// Append-only list of push failures, safe to share between concurrent pushes.
#[derive(Debug, Default)]
pub struct ConflictLog {
    records: Mutex<Vec<ConflictRecord>>,
}

impl ConflictLog {
    pub fn append(&self, record: ConflictRecord) {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_records(self) -> Vec<ConflictRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

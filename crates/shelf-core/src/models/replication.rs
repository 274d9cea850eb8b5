//! Replication records exchanged between the local store and the push/pull handlers

use serde::{Deserialize, Serialize};
use std::fmt;

use super::product::{Product, ProductId};

/// A product state as seen by replication, with its tombstone flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedDocument {
    #[serde(flatten)]
    pub product: Product,
    /// Set when the document was deleted locally
    #[serde(rename = "_deleted", default)]
    pub deleted: bool,
}

impl ReplicatedDocument {
    /// A live (non-deleted) document
    pub const fn live(product: Product) -> Self {
        Self {
            product,
            deleted: false,
        }
    }

    /// A tombstone for a deleted document
    pub const fn tombstone(product: Product) -> Self {
        Self {
            product,
            deleted: true,
        }
    }

    pub const fn id(&self) -> &ProductId {
        &self.product.id
    }
}

/// The remote operation a pending change maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    /// Classify a change by its new state and the assumed remote state.
    ///
    /// A tombstone is always a delete. Otherwise a known master state makes it
    /// an update, and no master state makes it a create.
    pub const fn classify(
        new_state: &ReplicatedDocument,
        assumed_master: Option<&ReplicatedDocument>,
    ) -> Self {
        if new_state.deleted {
            Self::Delete
        } else if assumed_master.is_some() {
            Self::Update
        } else {
            Self::Create
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending local mutation to reconcile with the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRow {
    /// Post-mutation state (tombstone when deleted)
    pub new_document_state: ReplicatedDocument,
    /// What the replica believed the remote held at last sync
    #[serde(default)]
    pub assumed_master_state: Option<ReplicatedDocument>,
}

impl ChangeRow {
    pub const fn kind(&self) -> MutationKind {
        MutationKind::classify(
            &self.new_document_state,
            self.assumed_master_state.as_ref(),
        )
    }

    pub const fn id(&self) -> &ProductId {
        self.new_document_state.id()
    }
}

/// A push failure, handed back to the engine for a later retry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub assumed_master_state: Option<ReplicatedDocument>,
    pub new_document_state: ReplicatedDocument,
    /// Why the push failed
    pub reason: String,
}

impl ConflictRecord {
    /// Build a conflict from the row that failed to push
    pub fn from_row(row: &ChangeRow, reason: impl Into<String>) -> Self {
        Self {
            assumed_master_state: row.assumed_master_state.clone(),
            new_document_state: row.new_document_state.clone(),
            reason: reason.into(),
        }
    }

    pub const fn id(&self) -> &ProductId {
        self.new_document_state.id()
    }

    pub const fn kind(&self) -> MutationKind {
        MutationKind::classify(
            &self.new_document_state,
            self.assumed_master_state.as_ref(),
        )
    }
}

/// Opaque cursor marking the last successful pull position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(pub Option<serde_json::Value>);

impl Checkpoint {
    pub const fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// Result of one pull: documents to merge plus the next checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct PullBatch {
    pub documents: Vec<Product>,
    pub checkpoint: Checkpoint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProduct;
    use pretty_assertions::assert_eq;

    fn product(stock: i64) -> Product {
        NewProduct::new("Tea", "drink", 5000.0, stock)
            .with_id("tea".parse().unwrap())
            .into_product()
            .unwrap()
    }

    #[test]
    fn no_master_state_is_create() {
        let row = ChangeRow {
            new_document_state: ReplicatedDocument::live(product(3)),
            assumed_master_state: None,
        };
        assert_eq!(row.kind(), MutationKind::Create);
    }

    #[test]
    fn master_state_without_tombstone_is_update() {
        let row = ChangeRow {
            new_document_state: ReplicatedDocument::live(product(4)),
            assumed_master_state: Some(ReplicatedDocument::live(product(3))),
        };
        assert_eq!(row.kind(), MutationKind::Update);
    }

    #[test]
    fn tombstone_is_delete_regardless_of_master_state() {
        let with_master = ChangeRow {
            new_document_state: ReplicatedDocument::tombstone(product(4)),
            assumed_master_state: Some(ReplicatedDocument::live(product(3))),
        };
        let without_master = ChangeRow {
            new_document_state: ReplicatedDocument::tombstone(product(4)),
            assumed_master_state: None,
        };
        assert_eq!(with_master.kind(), MutationKind::Delete);
        assert_eq!(without_master.kind(), MutationKind::Delete);
    }

    #[test]
    fn change_row_uses_wire_field_names() {
        let row = ChangeRow {
            new_document_state: ReplicatedDocument::tombstone(product(1)),
            assumed_master_state: None,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["newDocumentState"]["_deleted"], true);
        assert_eq!(value["newDocumentState"]["id"], "tea");
        assert!(value["assumedMasterState"].is_null());
    }

    #[test]
    fn conflict_keeps_both_states() {
        let row = ChangeRow {
            new_document_state: ReplicatedDocument::live(product(4)),
            assumed_master_state: Some(ReplicatedDocument::live(product(3))),
        };
        let conflict = ConflictRecord::from_row(&row, "HTTP 500");
        assert_eq!(conflict.kind(), MutationKind::Update);
        assert_eq!(conflict.new_document_state, row.new_document_state);
        assert_eq!(conflict.assumed_master_state, row.assumed_master_state);
    }

    #[test]
    fn conflict_kind_matches_its_row() {
        let rows = [
            ChangeRow {
                new_document_state: ReplicatedDocument::live(product(3)),
                assumed_master_state: None,
            },
            ChangeRow {
                new_document_state: ReplicatedDocument::live(product(4)),
                assumed_master_state: Some(ReplicatedDocument::live(product(3))),
            },
            ChangeRow {
                new_document_state: ReplicatedDocument::tombstone(product(4)),
                assumed_master_state: None,
            },
        ];
        let kinds: Vec<MutationKind> = rows
            .iter()
            .map(|row| ConflictRecord::from_row(row, "HTTP 500").kind())
            .collect();
        assert_eq!(
            kinds,
            vec![MutationKind::Create, MutationKind::Update, MutationKind::Delete]
        );
        for row in &rows {
            assert_eq!(ConflictRecord::from_row(row, "x").kind(), row.kind());
        }
    }
}

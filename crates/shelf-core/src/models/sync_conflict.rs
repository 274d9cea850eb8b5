//! Sync conflict history model

use serde::{Deserialize, Serialize};

use super::replication::MutationKind;

/// A push failure recorded in the local conflict history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Product involved in the conflict
    pub product_id: String,
    /// Operation that failed
    pub kind: MutationKind,
    /// Failure reason reported by the push handler
    pub reason: String,
    /// When the conflict was recorded (unix ms)
    pub recorded_at: i64,
}

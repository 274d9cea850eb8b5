//! Replication status, events and counters.

use serde::Serialize;

use crate::models::{ChangeRow, ConflictRecord, Product};

/// Where the replication loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationPhase {
    #[default]
    Idle,
    Pulling,
    ReconcilingLocal,
    Pushing,
}

impl ReplicationPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pulling => "pulling",
            Self::ReconcilingLocal => "reconciling_local",
            Self::Pushing => "pushing",
        }
    }
}

/// Snapshot published on the status channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplicationStatus {
    pub phase: ReplicationPhase,
    /// A cycle is running
    pub active: bool,
    /// Last cycle failure; cleared by the next successful cycle
    pub error: Option<String>,
    /// Unix millis of the last successful cycle
    pub last_synced_at: Option<i64>,
}

/// Notifications emitted while replicating
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationEvent {
    Active(bool),
    Error(String),
    /// Documents received by a pull
    Received(Vec<Product>),
    /// Rows handed to a push
    Sent(Vec<ChangeRow>),
}

/// Running totals since the replicator was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplicationStats {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub documents_received: u64,
    pub rows_sent: u64,
    pub conflicts: u64,
}

/// Outcome of one successful cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Documents returned by the pull
    pub pulled: usize,
    /// Local rows changed by the pull
    pub applied: usize,
    /// Remote rows not applied because a local write is pending
    pub skipped_pending: usize,
    /// Rows sent to the remote
    pub pushed: usize,
    /// Pending entries cleared after a successful push
    pub acknowledged: usize,
    /// Tombstones for rows the remote never saw, cleared without a request
    pub settled_locally: usize,
    pub conflicts: Vec<ConflictRecord>,
}

impl CycleReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

impl ReplicationStats {
    pub(crate) fn record_success(&mut self, report: &CycleReport) {
        self.cycles_completed += 1;
        self.documents_received += report.pulled as u64;
        self.rows_sent += report.pushed as u64;
        self.conflicts += report.conflicts.len() as u64;
    }

    pub(crate) fn record_failure(&mut self) {
        self.cycles_failed += 1;
    }
}

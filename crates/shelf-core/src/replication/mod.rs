//! Replication between the local store and the remote collection.
//!
//! A cycle pulls the full remote collection, merges it into the store without
//! touching rows that still have pending local writes, then pushes every
//! pending change. Failed pushes come back as conflicts and stay pending for
//! the next cycle.

mod connectivity;
mod engine;
mod handlers;
mod monitor;
mod state;

pub use connectivity::Connectivity;
pub use engine::{ReplicationConfig, Replicator, SyncTrigger, DEFAULT_IDENTIFIER};
pub use handlers::{pull, push, ConflictLog};
pub use monitor::ConnectivityMonitor;
pub use state::{CycleReport, ReplicationEvent, ReplicationPhase, ReplicationStats, ReplicationStatus};

//! The replication loop.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;

use super::connectivity::Connectivity;
use super::handlers;
use super::state::{
    CycleReport, ReplicationEvent, ReplicationPhase, ReplicationStats, ReplicationStatus,
};
use crate::config::{DEFAULT_PUSH_BATCH_SIZE, DEFAULT_RETRY_SECS};
use crate::db::{now_millis, PendingChange};
use crate::error::Result;
use crate::models::{ChangeRow, MutationKind, ProductId};
use crate::remote::ProductsApi;
use crate::services::ProductStore;

/// Checkpoint key for the products collection
pub const DEFAULT_IDENTIFIER: &str = "products-replication";

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationConfig {
    /// Key under which the checkpoint is stored
    pub identifier: String,
    /// Delay before the next cycle after a failure or conflicts
    pub retry_time: Duration,
    /// Re-run cycles on this interval when set
    pub poll_interval: Option<Duration>,
    pub push_batch_size: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            identifier: DEFAULT_IDENTIFIER.to_string(),
            retry_time: Duration::from_secs(DEFAULT_RETRY_SECS),
            poll_interval: None,
            push_batch_size: DEFAULT_PUSH_BATCH_SIZE,
        }
    }
}

/// Wakes the replication loop for an immediate cycle.
///
/// A wake-up sent while a cycle is running is kept and starts another cycle
/// right after it.
#[derive(Debug, Clone, Default)]
pub struct SyncTrigger {
    notify: Arc<Notify>,
}

impl SyncTrigger {
    pub fn notify(&self) {
        self.notify.notify_one();
    }

    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Two-way replication between a [`ProductStore`] and a [`ProductsApi`].
///
/// Run single cycles with [`Replicator::run_cycle`] or keep it going in the
/// background with [`Replicator::start`].
pub struct Replicator<A: ProductsApi> {
    store: ProductStore,
    api: Arc<A>,
    connectivity: Connectivity,
    config: ReplicationConfig,
    trigger: SyncTrigger,
    status: watch::Sender<ReplicationStatus>,
    events: broadcast::Sender<ReplicationEvent>,
    stats: Mutex<ReplicationStats>,
    cycle_lock: tokio::sync::Mutex<()>,
}

impl<A: ProductsApi> Replicator<A> {
    pub fn new(
        store: ProductStore,
        api: Arc<A>,
        connectivity: Connectivity,
        config: ReplicationConfig,
    ) -> Self {
        let (status, _) = watch::channel(ReplicationStatus::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            api,
            connectivity,
            config,
            trigger: SyncTrigger::default(),
            status,
            events,
            stats: Mutex::new(ReplicationStats::default()),
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Handle for waking the loop, e.g. after local writes
    pub fn trigger(&self) -> SyncTrigger {
        self.trigger.clone()
    }

    /// Request an immediate cycle from the background loop.
    pub fn resync(&self) {
        self.trigger.notify();
    }

    pub fn status(&self) -> watch::Receiver<ReplicationStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> ReplicationStatus {
        self.status.borrow().clone()
    }

    pub fn events(&self) -> broadcast::Receiver<ReplicationEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> ReplicationStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub const fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub const fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Spawn the background loop.
    ///
    /// The first cycle starts right away. Later cycles run on a trigger, on
    /// regained connectivity, after `retry_time` when the previous cycle
    /// failed or left conflicts, and on the poll interval when configured.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let replicator = Arc::clone(self);
        tokio::spawn(async move { replicator.run_loop().await })
    }

    async fn run_loop(&self) {
        let mut online = self.connectivity.subscribe();
        tracing::info!("Replication loop started ({})", self.config.identifier);
        loop {
            let delay = match self.run_cycle().await {
                Err(_) => Some(self.config.retry_time),
                Ok(report) if report.has_conflicts() => Some(self.config.retry_time),
                Ok(_) => self.config.poll_interval,
            };
            self.wait_for_next_cycle(&mut online, delay).await;
        }
    }

    async fn wait_for_next_cycle(&self, online: &mut watch::Receiver<bool>, delay: Option<Duration>) {
        let sleep = async {
            match delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(sleep);
        let mut watching = true;

        loop {
            tokio::select! {
                () = &mut sleep => return,
                () = self.trigger.notified() => return,
                changed = online.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    if *online.borrow_and_update() {
                        tracing::info!("Back online, re-syncing");
                        return;
                    }
                }
            }
        }
    }

    /// Run one pull then push cycle.
    ///
    /// Cycles never overlap. A failure is stored in the status and emitted
    /// as an event before being returned; a success clears the stored error.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _guard = self.cycle_lock.lock().await;
        self.status.send_modify(|status| {
            status.active = true;
            status.phase = ReplicationPhase::Pulling;
        });
        self.emit(ReplicationEvent::Active(true));

        let result = self.cycle().await;
        self.finish_cycle(&result);
        result
    }

    fn finish_cycle(&self, result: &Result<CycleReport>) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(report) => {
                stats.record_success(report);
                tracing::info!(
                    "Replication cycle done: pulled={} applied={} pushed={} acknowledged={} conflicts={}",
                    report.pulled,
                    report.applied,
                    report.pushed,
                    report.acknowledged,
                    report.conflicts.len()
                );
                self.status.send_modify(|status| {
                    status.error = None;
                    status.last_synced_at = Some(now_millis());
                });
            }
            Err(error) => {
                stats.record_failure();
                tracing::error!("Replication cycle failed: {error}");
                if error.is_unreachable() {
                    self.connectivity.set_online(false);
                }
                let message = error.to_string();
                self.status
                    .send_modify(|status| status.error = Some(message.clone()));
                self.emit(ReplicationEvent::Error(message));
            }
        }
        drop(stats);

        self.status.send_modify(|status| {
            status.active = false;
            status.phase = ReplicationPhase::Idle;
        });
        self.emit(ReplicationEvent::Active(false));
    }

    async fn cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let identifier = self.config.identifier.as_str();

        self.set_phase(ReplicationPhase::Pulling);
        let checkpoint = self.store.load_checkpoint(identifier).await?;
        let batch = handlers::pull(self.api.as_ref(), checkpoint).await?;

        self.set_phase(ReplicationPhase::ReconcilingLocal);
        let outcome = self.store.apply_pulled(&batch.documents).await?;
        self.store.save_checkpoint(identifier, &batch.checkpoint).await?;
        report.pulled = batch.documents.len();
        report.applied = outcome.applied;
        report.skipped_pending = outcome.skipped_pending;
        if !batch.documents.is_empty() {
            self.emit(ReplicationEvent::Received(batch.documents));
        }

        let pending = self.store.pending_changes(usize::MAX).await?;
        let mut to_push = Vec::with_capacity(pending.len());
        for change in pending {
            if is_local_only_tombstone(&change.row) {
                if self.store.settle_local_tombstone(&change).await? {
                    report.settled_locally += 1;
                }
            } else {
                to_push.push(change);
            }
        }

        for chunk in to_push.chunks(self.config.push_batch_size.max(1)) {
            self.push_batch(chunk, &mut report).await?;
        }

        Ok(report)
    }

    async fn push_batch(&self, batch: &[PendingChange], report: &mut CycleReport) -> Result<()> {
        self.set_phase(ReplicationPhase::Pushing);
        let rows: Vec<ChangeRow> = batch.iter().map(|change| change.row.clone()).collect();
        self.emit(ReplicationEvent::Sent(rows.clone()));
        let conflicts = handlers::push(self.api.as_ref(), &rows).await;
        report.pushed += rows.len();

        self.set_phase(ReplicationPhase::ReconcilingLocal);
        let conflicted: HashSet<&ProductId> = conflicts.iter().map(|record| record.id()).collect();
        for change in batch {
            if conflicted.contains(change.row.id()) {
                continue;
            }
            if self.store.acknowledge(change).await? {
                report.acknowledged += 1;
            }
        }

        if !conflicts.is_empty() {
            self.store.record_conflicts(&conflicts).await?;
        }
        report.conflicts.extend(conflicts);
        Ok(())
    }

    fn set_phase(&self, phase: ReplicationPhase) {
        self.status.send_if_modified(|status| {
            if status.phase == phase {
                false
            } else {
                status.phase = phase;
                true
            }
        });
    }

    fn emit(&self, event: ReplicationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// A delete for a row the remote never held needs no request.
fn is_local_only_tombstone(row: &ChangeRow) -> bool {
    row.kind() == MutationKind::Delete && row.assumed_master_state.is_none()
}

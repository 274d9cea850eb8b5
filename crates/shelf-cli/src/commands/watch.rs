use std::sync::Arc;
use std::time::Duration;

use shelf_core::replication::{Connectivity, ConnectivityMonitor, ReplicationEvent};
use tokio::sync::broadcast::error::RecvError;

use crate::commands::common::{connectivity_label, Session};
use crate::error::CliError;

const DEFAULT_WATCH_POLL: Duration = Duration::from_secs(30);
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run_watch(session: &Session) -> Result<(), CliError> {
    session.require_offline("watch")?;

    let mut session = session.clone();
    if session.config.poll_interval.is_none() {
        session.config.poll_interval = Some(DEFAULT_WATCH_POLL);
    }

    let store = session.open_store().await?;
    let connectivity = Connectivity::online();
    let replicator = Arc::new(session.replicator(store, connectivity.clone())?);
    let mut events = replicator.events();
    let mut online = connectivity.subscribe();
    let task = replicator.start();
    let monitor =
        ConnectivityMonitor::new(session.api()?, connectivity, HEALTH_CHECK_INTERVAL).start();
    println!(
        "Replicating with {} (Ctrl-C to stop)",
        session.config.api_base_url
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = format_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {skipped} replication events");
                }
                Err(RecvError::Closed) => break,
            },
            changed = online.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_online = *online.borrow_and_update();
                println!("{}", format_connectivity(now_online));
            }
        }
    }

    monitor.abort();
    task.abort();
    let stats = replicator.stats();
    println!(
        "Stopped after {} cycles ({} failed)",
        stats.cycles_completed, stats.cycles_failed
    );
    Ok(())
}

pub fn format_connectivity(online: bool) -> String {
    format!("Network {}", connectivity_label(online))
}

pub fn format_event(event: &ReplicationEvent) -> Option<String> {
    match event {
        ReplicationEvent::Active(true) => None,
        ReplicationEvent::Active(false) => Some("Cycle finished".to_string()),
        ReplicationEvent::Error(message) => Some(format!("Sync failed: {message}")),
        ReplicationEvent::Received(documents) => {
            Some(format!("Received {} products", documents.len()))
        }
        ReplicationEvent::Sent(rows) => Some(format!("Sent {} changes", rows.len())),
    }
}

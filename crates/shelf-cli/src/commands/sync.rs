use shelf_core::collection::QueryCollection;
use shelf_core::replication::{Connectivity, CycleReport};
use shelf_core::SyncMode;

use crate::commands::common::{format_sync_conflict_lines, Session};
use crate::error::CliError;

pub async fn run_sync(session: &Session) -> Result<(), CliError> {
    match session.mode {
        SyncMode::Query => {
            let collection = QueryCollection::new(session.api()?);
            let count = collection.refresh().await?;
            println!("Fetched {count} products from {}", session.config.api_base_url);
        }
        SyncMode::Offline => {
            let store = session.open_store().await?;
            let replicator = session.replicator(store.clone(), Connectivity::online())?;
            let report = replicator.run_cycle().await?;
            for line in format_cycle_report(&report) {
                println!("{line}");
            }
            if report.has_conflicts() {
                let conflicts = store.list_conflicts(report.conflicts.len()).await?;
                for line in format_sync_conflict_lines(&conflicts) {
                    println!("  {line}");
                }
            }
        }
    }
    Ok(())
}

pub fn format_cycle_report(report: &CycleReport) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Pulled {} products ({} updated locally, {} kept for pending writes)",
            report.pulled, report.applied, report.skipped_pending
        ),
        format!(
            "Pushed {} changes ({} acknowledged)",
            report.pushed, report.acknowledged
        ),
    ];
    if report.settled_locally > 0 {
        lines.push(format!(
            "Dropped {} deletes the server never saw",
            report.settled_locally
        ));
    }
    if report.has_conflicts() {
        lines.push(format!(
            "{} changes were rejected and will be retried",
            report.conflicts.len()
        ));
    } else {
        lines.push("Sync completed".to_string());
    }
    lines
}

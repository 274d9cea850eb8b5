use serde::Serialize;
use shelf_core::SyncMode;

use crate::commands::common::{connectivity_label, display_path, Session};
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub mode: String,
    pub api_base_url: String,
    /// Whether the API host answered a health check
    pub online: bool,
    pub db_path: String,
    /// Only known for the offline collection
    pub pending_changes: Option<usize>,
    pub recorded_conflicts: Option<usize>,
    pub retry_secs: u64,
    pub poll_secs: Option<u64>,
}

pub async fn collect_status(session: &Session) -> Result<StatusReport, CliError> {
    let (pending_changes, recorded_conflicts) = if session.mode == SyncMode::Offline {
        let store = session.open_store().await?;
        let pending = store.pending_count().await?;
        let conflicts = store.list_conflicts(usize::MAX).await?.len();
        (Some(pending), Some(conflicts))
    } else {
        (None, None)
    };

    let online = session.check_online().await?;

    Ok(StatusReport {
        mode: session.mode.to_string(),
        api_base_url: session.config.api_base_url.clone(),
        online,
        db_path: display_path(&session.db_path),
        pending_changes,
        recorded_conflicts,
        retry_secs: session.config.retry_time.as_secs(),
        poll_secs: session.config.poll_interval.map(|interval| interval.as_secs()),
    })
}

pub fn format_status_lines(status: &StatusReport) -> Vec<String> {
    let mut lines = vec![
        format!("Mode:      {}", status.mode),
        format!("API:       {}", status.api_base_url),
        format!("Network:   {}", connectivity_label(status.online)),
    ];
    if let Some(pending) = status.pending_changes {
        lines.push(format!("Database:  {}", status.db_path));
        lines.push(format!("Pending:   {pending}"));
    }
    if let Some(conflicts) = status.recorded_conflicts {
        lines.push(format!("Conflicts: {conflicts}"));
    }
    lines.push(match status.poll_secs {
        Some(poll) => format!("Retry:     {}s (poll every {poll}s)", status.retry_secs),
        None => format!("Retry:     {}s", status.retry_secs),
    });
    lines
}

pub async fn run_status(session: &Session, as_json: bool) -> Result<(), CliError> {
    let status = collect_status(session).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for line in format_status_lines(&status) {
            println!("{line}");
        }
    }
    Ok(())
}

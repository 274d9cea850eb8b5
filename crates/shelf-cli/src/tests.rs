use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pretty_assertions::assert_eq;
use shelf_core::config::ClientConfig;
use shelf_core::models::{ChangeRow, ConflictRecord, MutationKind, ReplicatedDocument};
use shelf_core::replication::{CycleReport, ReplicationEvent};
use shelf_core::{Error, NewProduct, Product, SyncConflict, SyncMode};
use tempfile::tempdir;

use crate::cli::{Cli, Commands, ModeArg};
use crate::commands::add::{build_new_product, run_add, AddArgs};
use crate::commands::common::{
    format_product_lines, format_sync_conflict_lines, format_sync_timestamp, resolve_db_path,
    sync_conflict_to_item, ProductPatch, Session,
};
use crate::commands::conflicts::run_conflicts;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::status::{collect_status, format_status_lines};
use crate::commands::sync::{format_cycle_report, run_sync};
use crate::commands::watch::{format_connectivity, format_event};
use crate::error::CliError;

/// Nothing listens on port 1, so health checks fail fast.
const UNREACHABLE_API: &str = "http://127.0.0.1:1";

fn offline_session(db_path: PathBuf) -> Session {
    Session {
        mode: SyncMode::Offline,
        config: ClientConfig::default()
            .with_api_base_url(UNREACHABLE_API)
            .unwrap(),
        db_path,
    }
}

fn tea() -> Product {
    NewProduct::new("Tea", "drink", 5000.0, 3)
        .with_id("tea".parse().unwrap())
        .into_product()
        .unwrap()
}

fn add_args(name: &str, id: Option<&str>) -> AddArgs {
    AddArgs {
        name: name.to_string(),
        category: "drink".to_string(),
        price: 5000.0,
        stock: 3,
        id: id.map(str::to_string),
    }
}

#[test]
fn mode_defaults_to_offline() {
    let cli = Cli::try_parse_from(["shelf", "list"]).unwrap();
    assert_eq!(cli.mode, ModeArg::Offline);
    assert_eq!(SyncMode::from(cli.mode), SyncMode::Offline);
    assert!(matches!(cli.command, Commands::List { json: false }));
}

#[test]
fn mode_flag_is_global() {
    let cli = Cli::try_parse_from(["shelf", "ls", "--json", "--mode", "query"]).unwrap();
    assert_eq!(SyncMode::from(cli.mode), SyncMode::Query);
    assert!(matches!(cli.command, Commands::List { json: true }));
}

#[test]
fn add_requires_all_fields() {
    assert!(Cli::try_parse_from(["shelf", "add", "--name", "Tea"]).is_err());
    let cli = Cli::try_parse_from([
        "shelf", "add", "--name", "Tea", "--category", "drink", "--price", "5000", "--stock", "3",
    ])
    .unwrap();
    assert!(matches!(cli.command, Commands::Add { id: None, .. }));
}

#[test]
fn resolve_db_path_prefers_flag_then_env() {
    let flag = PathBuf::from("/tmp/flag.db");
    let env = PathBuf::from("/tmp/env.db");
    assert_eq!(
        resolve_db_path(Some(flag.clone()), Some(env.clone())),
        flag
    );
    assert_eq!(resolve_db_path(None, Some(env.clone())), env);
    assert!(resolve_db_path(None, None).ends_with("shelf/shelf.db"));
}

#[test]
fn format_sync_timestamp_renders_utc() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
    assert_eq!(
        format_sync_timestamp(1_700_000_000_000),
        "2023-11-14 22:13:20 UTC"
    );
}

#[test]
fn product_lines_show_price_and_stock() {
    let lines = format_product_lines(&[tea()]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("tea  Tea"));
    assert!(lines[0].contains("5000.00"));
    assert!(lines[0].ends_with("stock=3"));
}

#[test]
fn conflict_lines_and_items_match() {
    let conflict = SyncConflict {
        id: 7,
        product_id: "tea".to_string(),
        kind: MutationKind::Update,
        reason: "Remote error (500): boom".to_string(),
        recorded_at: 0,
    };
    let lines = format_sync_conflict_lines(std::slice::from_ref(&conflict));
    assert_eq!(
        lines,
        vec!["1970-01-01 00:00:00 UTC  update  product=tea  Remote error (500): boom".to_string()]
    );

    let item = sync_conflict_to_item(&conflict);
    assert_eq!(item.kind, "update");
    assert_eq!(item.recorded_at_iso, "1970-01-01 00:00:00 UTC");
}

#[test]
fn product_patch_trims_and_applies() {
    let patch = ProductPatch::new(Some("  Iced tea ".to_string()), Some("   ".to_string()), None, Some(9));
    assert!(!patch.is_empty());
    assert_eq!(patch.category, None);

    let mut product = tea();
    patch.apply(&mut product);
    assert_eq!(product.name, "Iced tea");
    assert_eq!(product.category, "drink");
    assert_eq!(product.stock, 9);

    assert!(ProductPatch::new(None, Some(" ".to_string()), None, None).is_empty());
}

#[test]
fn build_new_product_rejects_blank_id() {
    let err = build_new_product(add_args("Tea", Some("  "))).unwrap_err();
    assert!(matches!(err, CliError::EmptyProductId));

    let draft = build_new_product(add_args(" Tea ", Some("tea"))).unwrap();
    assert_eq!(draft.name, "Tea");
    assert_eq!(draft.id.unwrap().as_str(), "tea");
}

#[test]
fn cycle_report_lines_mention_conflicts() {
    let clean = CycleReport {
        pulled: 6,
        applied: 2,
        pushed: 1,
        acknowledged: 1,
        ..CycleReport::default()
    };
    let lines = format_cycle_report(&clean);
    assert_eq!(lines[0], "Pulled 6 products (2 updated locally, 0 kept for pending writes)");
    assert_eq!(lines.last().unwrap(), "Sync completed");

    let row = ChangeRow {
        new_document_state: ReplicatedDocument::live(tea()),
        assumed_master_state: None,
    };
    let with_conflict = CycleReport {
        pushed: 1,
        conflicts: vec![ConflictRecord::from_row(&row, "boom")],
        ..CycleReport::default()
    };
    let lines = format_cycle_report(&with_conflict);
    assert_eq!(
        lines.last().unwrap(),
        "1 changes were rejected and will be retried"
    );
}

#[test]
fn watch_skips_cycle_start_events() {
    assert_eq!(format_event(&ReplicationEvent::Active(true)), None);
    assert_eq!(
        format_event(&ReplicationEvent::Received(vec![tea()])),
        Some("Received 1 products".to_string())
    );
    assert_eq!(
        format_event(&ReplicationEvent::Error("offline".to_string())),
        Some("Sync failed: offline".to_string())
    );
}

#[test]
fn watch_reports_connectivity_changes() {
    assert_eq!(format_connectivity(false), "Network offline");
    assert_eq!(format_connectivity(true), "Network online");
}

#[tokio::test(flavor = "multi_thread")]
async fn status_reports_reachable_api_as_online() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Answer every connection with an empty 200.
    let server = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                use tokio::io::{AsyncReadExt, AsyncWriteExt};
                let mut buf = [0_u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
            });
        }
    });

    let tmp = tempdir().unwrap();
    let mut session = offline_session(tmp.path().join("shelf.db"));
    session.mode = SyncMode::Query;
    session.config = ClientConfig::default()
        .with_api_base_url(format!("http://{addr}"))
        .unwrap();

    let status = collect_status(&session).await.unwrap();
    assert!(status.online);
    assert!(format_status_lines(&status).contains(&"Network:   online".to_string()));

    server.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_commands_queue_pending_changes() {
    let tmp = tempdir().unwrap();
    let session = offline_session(tmp.path().join("shelf.db"));

    run_add(&session, add_args("Tea", Some("tea"))).await.unwrap();
    run_edit(
        &session,
        "tea",
        ProductPatch::new(None, None, Some(6000.0), None),
    )
    .await
    .unwrap();

    let store = session.open_store().await.unwrap();
    let stored = store.get_product(&"tea".parse().unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.price, 6000.0);
    assert_eq!(store.pending_count().await.unwrap(), 1);

    run_delete(&session, "tea").await.unwrap();
    assert!(store.list_products().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_without_fields_is_rejected() {
    let tmp = tempdir().unwrap();
    let session = offline_session(tmp.path().join("shelf.db"));

    let err = run_edit(&session, "tea", ProductPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::NothingToEdit));
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_unknown_product_reports_not_found() {
    let tmp = tempdir().unwrap();
    let session = offline_session(tmp.path().join("shelf.db"));

    let err = run_edit(&session, "ghost", ProductPatch::new(None, None, None, Some(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Core(Error::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn status_counts_pending_and_conflicts() {
    let tmp = tempdir().unwrap();
    let session = offline_session(tmp.path().join("shelf.db"));
    run_add(&session, add_args("Tea", Some("tea"))).await.unwrap();

    let store = session.open_store().await.unwrap();
    let pending = store.pending_changes(10).await.unwrap();
    store
        .record_conflicts(&[ConflictRecord::from_row(&pending[0].row, "Remote error (500)")])
        .await
        .unwrap();

    let status = collect_status(&session).await.unwrap();
    assert_eq!(status.mode, "offline");
    assert!(!status.online);
    assert_eq!(status.pending_changes, Some(1));
    assert_eq!(status.recorded_conflicts, Some(1));

    let lines = format_status_lines(&status);
    assert!(lines.contains(&"Network:   offline".to_string()));
    assert!(lines.contains(&"Pending:   1".to_string()));
    assert!(lines.contains(&"Conflicts: 1".to_string()));

    run_conflicts(&session, 5, true).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn query_mode_status_skips_local_store() {
    let tmp = tempdir().unwrap();
    let mut session = offline_session(tmp.path().join("missing").join("shelf.db"));
    session.mode = SyncMode::Query;
    session.config.poll_interval = Some(Duration::from_secs(60));

    let status = collect_status(&session).await.unwrap();
    assert_eq!(status.pending_changes, None);
    assert_eq!(status.poll_secs, Some(60));
    assert!(!session.db_path.exists());

    let err = run_conflicts(&session, 5, false).await.unwrap_err();
    assert!(matches!(err, CliError::OfflineOnly("conflicts")));
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_against_unreachable_api_keeps_changes() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let tmp = tempdir().unwrap();
    let mut session = offline_session(tmp.path().join("shelf.db"));
    session.config = ClientConfig::default()
        .with_api_base_url(format!("http://{addr}"))
        .unwrap();
    run_add(&session, add_args("Tea", None)).await.unwrap();

    let err = run_sync(&session).await.unwrap_err();
    assert!(matches!(err, CliError::Core(Error::Unreachable(_))));

    let store = session.open_store().await.unwrap();
    assert_eq!(store.pending_count().await.unwrap(), 1);
}

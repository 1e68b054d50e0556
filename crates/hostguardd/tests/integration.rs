//! Integration tests for hostguardd
//!
//! These tests drive the command handler end to end against a real JSON
//! store and hosts file in a temporary directory.

use hostguard_api::{Command, ErrorCode, EventPayload, ResponsePayload, ResponseResult};
use hostguard_config::{SessionLimits, DEFAULT_REDIRECT_IP};
use hostguard_core::{BlockEngine, SessionScheduler};
use hostguard_hosts::{managed_section_count, FileHostTable, MockHostTable};
use hostguard_store::{JsonStore, MemoryStore, StateDocument, Store};
use hostguard_util::ClientId;
use hostguardd::CommandHandler;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const BASE_HOSTS: &str = "127.0.0.1 localhost\n::1 localhost\n";

fn file_handler(dir: &Path) -> CommandHandler {
    let store: Arc<dyn Store> = Arc::new(JsonStore::open(dir.join("data")).unwrap());
    let engine = BlockEngine::load(
        store,
        hostguard_config::builtin_default_blocks(),
        SessionLimits {
            max_duration: None,
            emergency_lockout: Duration::ZERO,
        },
    )
    .unwrap();
    let hosts = Arc::new(FileHostTable::new(dir.join("hosts"), DEFAULT_REDIRECT_IP));
    CommandHandler::new(Arc::new(SessionScheduler::new(engine, hosts)))
}

fn error_code(result: ResponseResult) -> ErrorCode {
    match result {
        ResponseResult::Err(e) => e.code,
        ResponseResult::Ok(payload) => panic!("expected error, got {:?}", payload),
    }
}

async fn send(handler: &CommandHandler, command: Command) -> ResponseResult {
    handler.handle(&ClientId::new(), 1, command).await.response.result
}

/// Run the pass the reconcile worker would run after a command
async fn enforce(handler: &CommandHandler) {
    let report = handler.scheduler().reconcile().await;
    assert!(report.ok, "reconcile failed: {:?}", report.error);
}

#[tokio::test]
async fn test_session_lifecycle_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let hosts_path = dir.path().join("hosts");
    std::fs::write(&hosts_path, BASE_HOSTS).unwrap();

    let handler = file_handler(dir.path());

    // Policy is editable while idle
    let result = send(
        &handler,
        Command::AddCustomDomain {
            domain: "https://www.reddit.com/".into(),
            paths: vec![],
        },
    )
    .await;
    assert!(matches!(result, ResponseResult::Ok(ResponsePayload::PolicyUpdated(_))));

    let result = send(
        &handler,
        Command::StartSession {
            duration: Duration::from_secs(2 * 3600),
        },
    )
    .await;
    let (started_at, ends_at) = match handler.scheduler().engine().await.current_session() {
        Some(session) => (session.started_at, session.ends_at),
        None => panic!("session should be active"),
    };
    assert!(matches!(result, ResponseResult::Ok(ResponsePayload::SessionStarted { .. })));
    assert_eq!(ends_at - started_at, chrono::Duration::hours(2));

    enforce(&handler).await;
    let content = std::fs::read_to_string(&hosts_path).unwrap();
    assert!(content.starts_with(BASE_HOSTS));
    assert_eq!(managed_section_count(&content), 1);
    assert!(content.contains("127.0.0.1 reddit.com\n"));
    assert!(content.contains("127.0.0.1 www.youtube.com\n"));
    assert!(content.contains("127.0.0.1 youtube.com/shorts\n"));

    // Policy is locked while active
    let result = send(
        &handler,
        Command::AddCustomDomain {
            domain: "news.ycombinator.com".into(),
            paths: vec![],
        },
    )
    .await;
    assert_eq!(error_code(result), ErrorCode::SessionActive);

    let result = send(
        &handler,
        Command::StartSession {
            duration: Duration::from_secs(60),
        },
    )
    .await;
    assert_eq!(error_code(result), ErrorCode::SessionActive);

    // History and state are persisted
    let store = JsonStore::open(dir.path().join("data")).unwrap();
    let doc = store.load_state().unwrap().unwrap();
    assert!(doc.active);
    assert_eq!(doc.duration, 7200);
    assert_eq!(store.load_history().unwrap().len(), 1);
}

#[tokio::test]
async fn test_emergency_override_once() {
    let dir = tempfile::tempdir().unwrap();
    let handler = file_handler(dir.path());

    send(
        &handler,
        Command::StartSession {
            duration: Duration::from_secs(7 * 24 * 3600),
        },
    )
    .await;

    let first = handler
        .handle(&ClientId::new(), 2, Command::EmergencyShorten)
        .await;
    let shortened = match first.response.result {
        ResponseResult::Ok(ResponsePayload::EmergencyApplied { ends_at }) => ends_at,
        other => panic!("expected emergency applied, got {:?}", other),
    };
    assert!(first
        .events
        .iter()
        .any(|e| matches!(e.payload, EventPayload::EmergencyUsed { .. })));
    assert!(shortened <= hostguard_util::now() + chrono::Duration::minutes(30));

    let result = send(&handler, Command::EmergencyShorten).await;
    assert_eq!(error_code(result), ErrorCode::AlreadyUsed);

    let engine = handler.scheduler().engine().await;
    assert_eq!(engine.current_session().map(|s| s.ends_at), Some(shortened));
}

#[tokio::test]
async fn test_restart_after_expiry_clears_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let hosts_path = dir.path().join("hosts");

    // A previous run left an active session whose end has passed
    {
        let handler = file_handler(dir.path());
        send(
            &handler,
            Command::StartSession {
                duration: Duration::from_secs(3600),
            },
        )
        .await;
        enforce(&handler).await;
        assert_eq!(
            managed_section_count(&std::fs::read_to_string(&hosts_path).unwrap()),
            1
        );
    }

    let store = JsonStore::open(dir.path().join("data")).unwrap();
    let mut doc = store.load_state().unwrap().unwrap();
    doc.end_time = hostguard_util::now() - chrono::Duration::seconds(1);
    store.save_state(&doc).unwrap();

    let handler = file_handler(dir.path());
    let outcome = handler.scheduler().resume().await;

    assert_eq!(outcome.events.len(), 1);
    assert!(outcome.report.ok);
    assert_eq!(
        managed_section_count(&std::fs::read_to_string(&hosts_path).unwrap()),
        0
    );

    let result = send(&handler, Command::GetStatus).await;
    match result {
        ResponseResult::Ok(ResponsePayload::Status(status)) => assert!(!status.is_active()),
        other => panic!("expected status, got {:?}", other),
    }
}

#[tokio::test]
async fn test_corrupt_state_starts_idle() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("state.json"), "{ not json").unwrap();

    let handler = file_handler(dir.path());
    handler.scheduler().resume().await;

    assert!(!handler.scheduler().engine().await.has_active_session());
    assert!(data.join("state.json.corrupt").exists());
}

#[tokio::test]
async fn test_allow_list_excludes_domain_from_session() {
    let mut doc = StateDocument::default();
    doc.allowed_sites = vec![hostguard_util::Domain::parse("facebook.com").unwrap()];
    let engine = BlockEngine::load(
        Arc::new(MemoryStore::with_state(doc)),
        hostguard_config::builtin_default_blocks(),
        SessionLimits::default(),
    )
    .unwrap();
    let hosts = Arc::new(MockHostTable::new());
    let handler = CommandHandler::new(Arc::new(SessionScheduler::new(engine, hosts.clone())));

    send(
        &handler,
        Command::StartSession {
            duration: Duration::from_secs(600),
        },
    )
    .await;
    enforce(&handler).await;

    let content = hosts.content();
    assert!(content.contains("youtube.com"));
    assert!(!content.contains("facebook.com"));
}

#[tokio::test]
async fn test_reconcile_worker_keeps_external_edits() {
    let dir = tempfile::tempdir().unwrap();
    let hosts_path = dir.path().join("hosts");
    std::fs::write(&hosts_path, BASE_HOSTS).unwrap();

    let handler = file_handler(dir.path());
    let (tx, mut reports) = tokio::sync::mpsc::unbounded_channel();
    let worker = handler.scheduler().spawn_reconciler(tx);

    send(
        &handler,
        Command::StartSession {
            duration: Duration::from_secs(3600),
        },
    )
    .await;
    assert!(reports.recv().await.is_some_and(|r| r.ok));

    // Someone appends an entry below the managed section
    let mut content = std::fs::read_to_string(&hosts_path).unwrap();
    content.push_str("10.0.0.9 box.lan\n");
    std::fs::write(&hosts_path, content).unwrap();

    handler.scheduler().request_reconcile();
    assert!(reports.recv().await.is_some_and(|r| r.ok));

    let content = std::fs::read_to_string(&hosts_path).unwrap();
    assert!(content.starts_with(&format!("{BASE_HOSTS}10.0.0.9 box.lan\n")));
    assert_eq!(managed_section_count(&content), 1);

    worker.abort();
}

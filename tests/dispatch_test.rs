mod common;

use attendsync::error::AppError;
use attendsync::models::{AttendanceStatus, NewScanEvent, ScanKind};
use attendsync::services::{DispatchOutcome, ScanDispatcher};

use common::{InProcessApi, date, device_queue, seed_basic, server_db, time};

fn scan(student: &str, kind: ScanKind, h: u32, m: u32) -> NewScanEvent {
    NewScanEvent {
        student_id: student.to_string(),
        date: date(2025, 9, 1),
        kind,
        observed_time: time(h, m, 0),
        display_name: None,
    }
}

#[tokio::test]
async fn online_scan_commits_directly() {
    let db = server_db().await;
    seed_basic(&db).await;
    let api = InProcessApi::new(db.clone());
    let queue = device_queue().await;
    let dispatcher = ScanDispatcher::new(
        api.clone(),
        queue.clone(),
        "T-1".to_string(),
        "DEV-1".to_string(),
    );

    let outcome = dispatcher
        .dispatch(scan("S-1", ScanKind::TimeIn, 7, 10))
        .await
        .unwrap();

    match outcome {
        DispatchOutcome::Synced(resp) => {
            assert_eq!(resp.status, AttendanceStatus::Late);
            assert!(!resp.already_recorded);
        }
        other => panic!("expected Synced, got {:?}", other),
    }
    assert!(queue.list_unsynced().await.unwrap().is_empty());
}

#[tokio::test]
async fn transport_failure_buffers_offline() {
    let db = server_db().await;
    seed_basic(&db).await;
    let api = InProcessApi::new(db.clone());
    let queue = device_queue().await;
    let dispatcher = ScanDispatcher::new(
        api.clone(),
        queue.clone(),
        "T-1".to_string(),
        "DEV-1".to_string(),
    );

    api.set_offline(true);
    let outcome = dispatcher
        .dispatch(scan("S-1", ScanKind::TimeIn, 7, 10))
        .await
        .unwrap();

    let event = match outcome {
        DispatchOutcome::Buffered(event) => event,
        other => panic!("expected Buffered, got {:?}", other),
    };
    assert_eq!(event.kind, ScanKind::TimeIn);
    assert_eq!(event.device_id, "DEV-1");
    assert!(!event.synced);
    assert_eq!(queue.list_unsynced().await.unwrap().len(), 1);

    // A double-tap while still offline hits the local dedup, not a new row.
    let again = dispatcher
        .dispatch(scan("S-1", ScanKind::TimeIn, 7, 11))
        .await
        .unwrap();
    match again {
        DispatchOutcome::Buffered(e) => assert_eq!(e.id, event.id),
        other => panic!("expected Buffered, got {:?}", other),
    }
    assert_eq!(queue.list_unsynced().await.unwrap().len(), 1);
}

#[tokio::test]
async fn business_rejection_never_falls_back_to_the_queue() {
    let db = server_db().await;
    seed_basic(&db).await;
    let api = InProcessApi::new(db.clone());
    let queue = device_queue().await;
    let dispatcher = ScanDispatcher::new(
        api.clone(),
        queue.clone(),
        "T-1".to_string(),
        "DEV-1".to_string(),
    );

    // S-2 is outside T-1's section: an immediate, user-visible rejection.
    let result = dispatcher.dispatch(scan("S-2", ScanKind::TimeIn, 7, 10)).await;
    assert!(matches!(result, Err(AppError::AuthorizationMismatch(_))));
    assert!(queue.list_unsynced().await.unwrap().is_empty());

    // Sequencing violation is likewise surfaced, never buffered.
    let result = dispatcher.dispatch(scan("S-1", ScanKind::TimeOut, 16, 0)).await;
    assert!(matches!(result, Err(AppError::NoTimeInYet)));
    assert!(queue.list_unsynced().await.unwrap().is_empty());
}

#[tokio::test]
async fn raw_payload_path_parses_and_caches_the_name() {
    let db = server_db().await;
    seed_basic(&db).await;
    let api = InProcessApi::new(db.clone());
    let queue = device_queue().await;
    let dispatcher = ScanDispatcher::new(
        api.clone(),
        queue.clone(),
        "T-1".to_string(),
        "DEV-1".to_string(),
    );

    // Malformed payloads never reach the network or the queue.
    let result = dispatcher
        .dispatch_raw("", ScanKind::TimeIn, date(2025, 9, 1), time(7, 10, 0))
        .await;
    assert!(matches!(result, Err(AppError::MalformedPayload(_))));

    // Legacy pipe format, buffered offline: the display name lands in the
    // local cache alongside the event.
    api.set_offline(true);
    let outcome = dispatcher
        .dispatch_raw(
            "S-1|Maria Cruz|7|Sampaguita",
            ScanKind::TimeIn,
            date(2025, 9, 1),
            time(7, 10, 0),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, DispatchOutcome::Buffered(_)));
    assert_eq!(
        queue.cached_name("S-1").await.unwrap().as_deref(),
        Some("Maria Cruz")
    );
}

#[tokio::test]
async fn buffered_outcome_reads_as_success_to_the_operator() {
    let db = server_db().await;
    seed_basic(&db).await;
    let api = InProcessApi::new(db.clone());
    let queue = device_queue().await;
    let dispatcher = ScanDispatcher::new(
        api.clone(),
        queue.clone(),
        "T-1".to_string(),
        "DEV-1".to_string(),
    );

    api.set_offline(true);
    let outcome = dispatcher
        .dispatch(scan("S-1", ScanKind::TimeIn, 7, 10))
        .await
        .unwrap();
    assert!(outcome.message().contains("will sync"));
}

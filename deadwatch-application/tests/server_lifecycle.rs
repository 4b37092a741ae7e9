mod support;

use chrono::Utc;
use deadwatch_application::commands::{add_server, bind_channel, remove_server, reset_server_ingestion};
use deadwatch_application::dtos::BindChannelRequest;
use deadwatch_application::pipeline::{start_pipeline, TaskOutcome};
use deadwatch_application::queries::{get_player_stats, list_servers, list_undelivered_kill_count};
use deadwatch_application::AppError;
use deadwatch_domain::{IngestMode, ServerConnection, ServerId, SourceKind, TenantId, TrackedServer};
use tokio_util::sync::CancellationToken;

use support::*;

#[tokio::test]
async fn survivor_tier_allows_a_single_server() {
    let h = harness(&[], vec![]);
    let tenant = TenantId::from("solo");
    add_server(&h.state, &tenant, add_request("Alpha", "alpha")).await.unwrap();

    let err = add_server(&h.state, &tenant, add_request("Beta", "beta"))
        .await
        .unwrap_err();
    match err {
        AppError::Capacity(message) => assert!(message.contains("1 tracked server")),
        other => panic!("expected a capacity error, got {other:?}"),
    }
    assert_eq!(list_servers(&h.state, &tenant).await.unwrap().len(), 1);

    // Another tenant has its own allowance.
    add_server(&h.state, &TenantId::from("other"), add_request("Beta", "beta"))
        .await
        .unwrap();
}

#[tokio::test]
async fn reset_requires_batch_capable_tier() {
    let h = harness(&[], vec![]);
    let tenant = TenantId::from("solo");
    let added = add_server(&h.state, &tenant, add_request("Alpha", "alpha")).await.unwrap();

    let err = reset_server_ingestion(&h.state, &tenant, &added.server_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Capacity(_)));
}

#[tokio::test]
async fn reset_replays_history_without_double_counting() {
    let h = harness(&[("guild", "overseer")], vec![]);
    let tenant = TenantId::from("guild");
    let mut kills = kill_line(0, ALICE, BOB, "M4A1", 120);
    kills.push_str(&kill_line(5, BOB, CHARLIE, "AKM", 35));
    h.logs.write("alpha", SourceKind::LogTail, "kills.csv", &kills);

    let added = add_server(&h.state, &tenant, add_request("Alpha", "alpha")).await.unwrap();
    wait_for_batch(&h.state, &tenant, &added.server_id).await;
    let before = h
        .state
        .parser_states
        .get_or_create_parser_state(&tenant, &added.server_id, SourceKind::LogTail)
        .await
        .unwrap();

    let started = reset_server_ingestion(&h.state, &tenant, &added.server_id).await.unwrap();
    assert_eq!(started.ingest_mode, IngestMode::BatchImporting);
    let TaskOutcome::Completed(summary) = wait_for_batch(&h.state, &tenant, &added.server_id).await else {
        panic!("replay did not complete");
    };
    assert_eq!(summary.report.kills_recorded, 0);
    assert_eq!(summary.report.duplicates, 2);

    let after = h
        .state
        .parser_states
        .get_or_create_parser_state(&tenant, &added.server_id, SourceKind::LogTail)
        .await
        .unwrap();
    assert_eq!(after.generation, before.generation + 1);
    assert!(after.auto_tailing_enabled);
    assert_eq!(after.cursor.offset, kills.len() as u64);

    let alice = get_player_stats(&h.state, &tenant, &added.server_id, "Alice").await.unwrap();
    assert_eq!(alice.kills, 1);
    let stored = load_server(&h.state, &tenant, &added.server_id).await;
    assert_eq!(stored.stats.total_kills, 2);
}

#[tokio::test]
async fn ingestion_modes_never_overlap() {
    let h = harness(&[("guild", "warlord")], vec![]);
    let tenant = TenantId::from("guild");
    h.logs.write("alpha", SourceKind::LogTail, "kills.csv", &kill_line(0, ALICE, BOB, "M4A1", 120));

    let added = add_server(&h.state, &tenant, add_request("Alpha", "alpha")).await.unwrap();
    wait_for_batch(&h.state, &tenant, &added.server_id).await;
    reset_server_ingestion(&h.state, &tenant, &added.server_id).await.unwrap();
    wait_for_batch(&h.state, &tenant, &added.server_id).await;

    let log = h
        .state
        .supervisor
        .transitions_for(&tenant, &added.server_id)
        .await;
    let mut mode = IngestMode::Idle;
    for transition in &log {
        assert_eq!(transition.from, mode, "transition out of a mode the server was not in");
        mode = transition.to;
    }
    let pairs: Vec<_> = log.iter().map(|t| (t.from, t.to)).collect();
    assert_eq!(
        pairs,
        vec![
            (IngestMode::Idle, IngestMode::BatchImporting),
            (IngestMode::BatchImporting, IngestMode::AutoTailing),
            (IngestMode::AutoTailing, IngestMode::BatchImporting),
            (IngestMode::BatchImporting, IngestMode::AutoTailing),
        ]
    );
}

#[tokio::test]
async fn remove_server_cascades() {
    let h = harness(&[("guild", "warlord")], vec![]);
    let tenant = TenantId::from("guild");
    h.logs.write("alpha", SourceKind::LogTail, "kills.csv", &kill_line(0, ALICE, BOB, "M4A1", 120));
    let added = add_server(&h.state, &tenant, add_request("Alpha", "alpha")).await.unwrap();
    wait_for_batch(&h.state, &tenant, &added.server_id).await;
    bind_channel(
        &h.state,
        &tenant,
        BindChannelRequest {
            server_id: Some(added.server_id.to_string()),
            channel_id: "feed-alpha".to_string(),
            enabled: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(list_undelivered_kill_count(&h.state, &tenant).await.unwrap().undelivered, 1);

    let removed = remove_server(&h.state, &tenant, &added.server_id).await.unwrap();
    assert_eq!(removed.display_name, "Alpha");

    assert!(h
        .state
        .servers
        .get_server(&tenant, &added.server_id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(list_undelivered_kill_count(&h.state, &tenant).await.unwrap().undelivered, 0);
    assert!(h.state.channels.list_channels(&tenant).await.unwrap().is_empty());
    assert!(h
        .state
        .kills
        .list_kills(&tenant, &added.server_id)
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        get_player_stats(&h.state, &tenant, &added.server_id, "Alice").await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(
        h.state.supervisor.mode(&tenant, &added.server_id).await,
        IngestMode::Idle
    );
    assert!(matches!(
        remove_server(&h.state, &tenant, &added.server_id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn servers_are_invisible_to_other_tenants() {
    let h = harness(&[], vec![]);
    let owner = TenantId::from("guild");
    let stranger = TenantId::from("guild2");
    let added = add_server(&h.state, &owner, add_request("Alpha", "alpha")).await.unwrap();

    assert!(list_servers(&h.state, &stranger).await.unwrap().is_empty());
    assert!(matches!(
        remove_server(&h.state, &stranger, &added.server_id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        get_player_stats(&h.state, &stranger, &added.server_id, "Alice").await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(list_servers(&h.state, &owner).await.unwrap().len(), 1);
}

#[tokio::test]
async fn add_server_rejects_invalid_requests() {
    let h = harness(&[], vec![]);
    let tenant = TenantId::from("solo");
    let mut request = add_request("Alpha", "../escape");
    assert!(matches!(
        add_server(&h.state, &tenant, request.clone()).await,
        Err(AppError::BadRequest(_))
    ));
    request.log_path = Some("alpha".to_string());
    request.host = " ".to_string();
    assert!(matches!(
        add_server(&h.state, &tenant, request).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(list_servers(&h.state, &tenant).await.unwrap().is_empty());
}

#[tokio::test]
async fn startup_resumes_interrupted_imports() {
    let h = harness(&[("guild", "warlord")], vec![StatusScript::Fail]);
    let tenant = TenantId::from("guild");
    h.logs.write("alpha", SourceKind::LogTail, "kills.csv", &kill_line(0, ALICE, BOB, "M4A1", 120));

    // Registered but never handed to the tailer, as after a crash mid-import.
    let server = TrackedServer::new(
        tenant.clone(),
        ServerId::from("alpha"),
        "Alpha",
        ServerConnection {
            host: "127.0.0.1".to_string(),
            port: 2302,
            log_path: Some("alpha".to_string()),
            ..ServerConnection::default()
        },
        Utc::now(),
    );
    assert!(h.state.servers.insert_server(&server, 3).await.unwrap());

    let pipeline = start_pipeline(h.state.clone(), CancellationToken::new()).await;
    let outcome = wait_for_batch(&h.state, &tenant, &server.server_id).await;
    assert!(matches!(outcome, TaskOutcome::Completed(_)));
    pipeline.shutdown().await;

    let parser = h
        .state
        .parser_states
        .get_or_create_parser_state(&tenant, &server.server_id, SourceKind::LogTail)
        .await
        .unwrap();
    assert!(parser.auto_tailing_enabled);
    assert_eq!(h.state.kills.list_kills(&tenant, &server.server_id).await.unwrap().len(), 1);
}

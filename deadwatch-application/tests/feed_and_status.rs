mod support;

use deadwatch_application::commands::{add_server, bind_channel};
use deadwatch_application::dtos::BindChannelRequest;
use deadwatch_application::pipeline::{dispatch_tenant, poll_server, run_dispatch_cycle, run_status_cycle, run_tail_cycle};
use deadwatch_application::queries::list_undelivered_kill_count;
use deadwatch_domain::{ServerId, SourceKind, TenantId};

use support::*;

fn binding(server_id: Option<&ServerId>, channel: &str) -> BindChannelRequest {
    BindChannelRequest {
        server_id: server_id.map(ToString::to_string),
        channel_id: channel.to_string(),
        enabled: true,
    }
}

/// Adds a live-tailed server and ingests the given kill lines into it.
async fn server_with_kills(h: &Harness, tenant: &TenantId, name: &str, dir: &str, lines: &[String]) -> ServerId {
    let added = add_server(&h.state, tenant, add_request(name, dir)).await.unwrap();
    h.logs.write(dir, SourceKind::LogTail, "kills.csv", &lines.concat());
    let server = load_server(&h.state, tenant, &added.server_id).await;
    run_tail_cycle(&h.state, &server).await.unwrap();
    added.server_id
}

#[tokio::test]
async fn catch_all_binding_receives_rendered_feed_once() {
    let h = harness(&[], vec![]);
    let tenant = TenantId::from("guild");
    server_with_kills(
        &h,
        &tenant,
        "Alpha",
        "alpha",
        &[
            kill_line(0, ALICE, BOB, "M4A1", 120),
            kill_line(5, BOB, CHARLIE, "AKM", 35),
        ],
    )
    .await;

    // Without a destination the kills stay queued.
    let summary = run_dispatch_cycle(&h.state).await.unwrap();
    assert_eq!(summary.messages_sent, 0);
    assert_eq!(list_undelivered_kill_count(&h.state, &tenant).await.unwrap().undelivered, 2);

    bind_channel(&h.state, &tenant, binding(None, "feed-main")).await.unwrap();
    let summary = run_dispatch_cycle(&h.state).await.unwrap();
    assert_eq!(summary.messages_sent, 1);
    assert_eq!(summary.kills_dispatched, 2);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "feed-main");
    assert_eq!(
        sent[0].1,
        "**Alpha**\nAlice killed Bob with M4A1 (120m)\nBob killed Charlie with AKM (35m)"
    );
    assert_eq!(list_undelivered_kill_count(&h.state, &tenant).await.unwrap().undelivered, 0);

    let summary = run_dispatch_cycle(&h.state).await.unwrap();
    assert_eq!(summary.messages_sent, 0);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn server_binding_wins_over_catch_all() {
    let h = harness(&[("guild", "warlord")], vec![]);
    let tenant = TenantId::from("guild");
    // Warlord servers start with an import; give them nothing to import.
    let alpha = add_server(&h.state, &tenant, add_request("Alpha", "alpha")).await.unwrap();
    let beta = add_server(&h.state, &tenant, add_request("Beta", "beta")).await.unwrap();
    wait_for_batch(&h.state, &tenant, &alpha.server_id).await;
    wait_for_batch(&h.state, &tenant, &beta.server_id).await;

    h.logs.write("alpha", SourceKind::LogTail, "kills.csv", &kill_line(0, ALICE, BOB, "M4A1", 120));
    h.logs.write("beta", SourceKind::LogTail, "kills.csv", &kill_line(1, CHARLIE, BOB, "SKS", 60));
    for server_id in [&alpha.server_id, &beta.server_id] {
        let server = load_server(&h.state, &tenant, server_id).await;
        run_tail_cycle(&h.state, &server).await.unwrap();
    }

    bind_channel(&h.state, &tenant, binding(None, "feed-all")).await.unwrap();
    bind_channel(&h.state, &tenant, binding(Some(&alpha.server_id), "feed-alpha"))
        .await
        .unwrap();

    let summary = dispatch_tenant(&h.state, &tenant).await.unwrap();
    assert_eq!(summary.messages_sent, 2);

    let sent = h.notifier.sent();
    let alpha_feed = sent.iter().find(|(channel, _)| channel == "feed-alpha").unwrap();
    assert!(alpha_feed.1.starts_with("**Alpha**"));
    assert!(!alpha_feed.1.contains("Beta"));
    let catch_all = sent.iter().find(|(channel, _)| channel == "feed-all").unwrap();
    assert!(catch_all.1.starts_with("**Beta**"));
    assert!(catch_all.1.contains("Charlie killed Bob with SKS (60m)"));
}

#[tokio::test]
async fn unbound_backlog_does_not_starve_bound_server() {
    let h = harness(&[("guild", "warlord")], vec![]);
    let tenant = TenantId::from("guild");
    let alpha = add_server(&h.state, &tenant, add_request("Alpha", "alpha")).await.unwrap();
    let beta = add_server(&h.state, &tenant, add_request("Beta", "beta")).await.unwrap();
    wait_for_batch(&h.state, &tenant, &alpha.server_id).await;
    wait_for_batch(&h.state, &tenant, &beta.server_id).await;

    // More unroutable kills than fit in one dispatch batch, all older.
    let backlog: String = (0..20).map(|minute| kill_line(minute, ALICE, BOB, "M4A1", 120)).collect();
    h.logs.write("alpha", SourceKind::LogTail, "kills.csv", &backlog);
    h.logs.write("beta", SourceKind::LogTail, "kills.csv", &kill_line(30, CHARLIE, BOB, "SKS", 60));
    for server_id in [&alpha.server_id, &beta.server_id] {
        let server = load_server(&h.state, &tenant, server_id).await;
        run_tail_cycle(&h.state, &server).await.unwrap();
    }
    bind_channel(&h.state, &tenant, binding(Some(&beta.server_id), "beta-feed"))
        .await
        .unwrap();

    let summary = dispatch_tenant(&h.state, &tenant).await.unwrap();
    assert_eq!(summary.messages_sent, 1);
    assert_eq!(summary.kills_dispatched, 1);
    let sent = h.notifier.sent();
    assert_eq!(sent[0].0, "beta-feed");
    assert_eq!(sent[0].1, "**Beta**\nCharlie killed Bob with SKS (60m)");

    // Alpha's kills are delayed, not dropped.
    assert_eq!(list_undelivered_kill_count(&h.state, &tenant).await.unwrap().undelivered, 20);
}

#[tokio::test]
async fn failed_delivery_keeps_kills_queued() {
    let h = harness(&[], vec![]);
    let tenant = TenantId::from("guild");
    server_with_kills(&h, &tenant, "Alpha", "alpha", &[kill_line(0, ALICE, BOB, "M4A1", 120)]).await;
    bind_channel(&h.state, &tenant, binding(None, "feed-main")).await.unwrap();

    h.notifier.set_failing(true);
    let summary = dispatch_tenant(&h.state, &tenant).await.unwrap();
    assert_eq!(summary.failures, 1);
    assert_eq!(list_undelivered_kill_count(&h.state, &tenant).await.unwrap().undelivered, 1);

    h.notifier.set_failing(false);
    let summary = dispatch_tenant(&h.state, &tenant).await.unwrap();
    assert_eq!(summary.kills_dispatched, 1);
    assert_eq!(list_undelivered_kill_count(&h.state, &tenant).await.unwrap().undelivered, 0);
}

#[tokio::test]
async fn dispatch_never_crosses_tenants() {
    let h = harness(&[], vec![]);
    let first = TenantId::from("guild");
    let second = TenantId::from("guild2");
    server_with_kills(&h, &first, "Alpha", "alpha", &[kill_line(0, ALICE, BOB, "M4A1", 120)]).await;
    server_with_kills(&h, &second, "Omega", "omega", &[kill_line(0, CHARLIE, BOB, "SKS", 60)]).await;
    bind_channel(&h.state, &first, binding(None, "feed-guild")).await.unwrap();

    let summary = run_dispatch_cycle(&h.state).await.unwrap();
    assert_eq!(summary.messages_sent, 1);
    let sent = h.notifier.sent();
    assert_eq!(sent[0].0, "feed-guild");
    assert!(!sent[0].1.contains("Omega"));

    assert_eq!(list_undelivered_kill_count(&h.state, &first).await.unwrap().undelivered, 0);
    assert_eq!(list_undelivered_kill_count(&h.state, &second).await.unwrap().undelivered, 1);
}

#[tokio::test]
async fn unanswered_queries_mark_server_offline() {
    let h = harness(&[], vec![StatusScript::Hang]);
    let tenant = TenantId::from("guild");
    let added = add_server(&h.state, &tenant, add_request("Alpha", "alpha")).await.unwrap();
    let server = load_server(&h.state, &tenant, &added.server_id).await;

    let online = poll_server(&h.state, &server).await.unwrap();
    assert!(!online);
    assert_eq!(h.status.calls(), 2);

    let stored = load_server(&h.state, &tenant, &added.server_id).await;
    assert!(!stored.status.online);
    assert!(stored.status.last_check.is_some());
}

#[tokio::test]
async fn status_cycle_tracks_peaks_and_restarts() {
    let h = harness(
        &[],
        vec![
            ScriptedStatusQuery::online(12),
            StatusScript::Fail,
            StatusScript::Fail,
            ScriptedStatusQuery::online(7),
        ],
    );
    let tenant = TenantId::from("guild");
    let added = add_server(&h.state, &tenant, add_request("Alpha", "alpha")).await.unwrap();

    let summary = run_status_cycle(&h.state).await.unwrap();
    assert_eq!(summary.online, 1);
    let stored = load_server(&h.state, &tenant, &added.server_id).await;
    assert_eq!(stored.status.players_online, 12);
    assert_eq!(stored.stats.peak_players, 12);
    assert_eq!(stored.status.restart_count, 0);

    let summary = run_status_cycle(&h.state).await.unwrap();
    assert_eq!(summary.offline, 1);

    run_status_cycle(&h.state).await.unwrap();
    let stored = load_server(&h.state, &tenant, &added.server_id).await;
    assert!(stored.status.online);
    assert_eq!(stored.status.players_online, 7);
    assert_eq!(stored.stats.peak_players, 12);
    assert_eq!(stored.status.restart_count, 1);
}

#[tokio::test]
async fn headshot_kill_renders_weapon_marker_and_distance() {
    let h = harness(&[], vec![]);
    let tenant = TenantId::from("guild");
    server_with_kills(
        &h,
        &tenant,
        "Alpha",
        "alpha",
        &["2024.03.01-12.00.00;Alice;76561198000000001;Bob;76561198000000002;Rifle;150;headshot;chernarus\n".to_string()],
    )
    .await;
    bind_channel(&h.state, &tenant, binding(None, "feed-main")).await.unwrap();
    dispatch_tenant(&h.state, &tenant).await.unwrap();

    let sent = h.notifier.sent();
    let line = sent[0].1.lines().nth(1).unwrap();
    assert_eq!(line, "Alice killed Bob with Rifle [HEADSHOT] (150m)");
}

// Status snapshot transitions

use chrono::{DateTime, Utc};

use crate::entities::{StatusReport, StatusTransition, TrackedServer};

/// Folds a poll result into the server record. `None` means the query
/// failed or timed out, which marks the server offline.
pub fn apply_status_report(
    server: &mut TrackedServer,
    report: Option<&StatusReport>,
    now: DateTime<Utc>,
) -> StatusTransition {
    let status = &mut server.status;
    let was_online = status.online;
    let mut transition = StatusTransition::default();

    if was_online {
        if let Some(previous) = status.last_check {
            let elapsed = (now - previous).num_seconds();
            if elapsed > 0 {
                status.uptime_seconds += elapsed as u64;
            }
        }
    }

    match report.filter(|report| report.online) {
        Some(report) => {
            // First ever check is not a restart.
            if !was_online && status.last_check.is_some() {
                status.restart_count += 1;
                transition.came_online = true;
            }
            status.online = true;
            status.name = report.name.clone().or(status.name.take());
            status.map = report.map.clone();
            status.players_online = report.players_online;
            status.players_max = report.players_max;
            status.version = report.version.clone().or(status.version.take());

            if report.players_online > server.stats.peak_players {
                server.stats.peak_players = report.players_online;
                server.stats.peak_at = Some(now);
                transition.new_peak = true;
            }
        }
        None => {
            status.online = false;
            status.players_online = 0;
            transition.went_offline = was_online;
        }
    }

    server.status.last_check = Some(now);
    transition
}

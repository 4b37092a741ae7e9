// Applying kills and connections to player aggregates

use crate::entities::{ConnectionEvent, KillEvent, PlayerStatAggregate};

/// Applies one kill to the aggregates involved. For a suicide the killer
/// and victim are the same player, so `victim` must be `None`.
pub fn apply_kill(
    killer: &mut PlayerStatAggregate,
    victim: Option<&mut PlayerStatAggregate>,
    kill: &KillEvent,
) {
    if kill.suicide {
        killer.suicides += 1;
        killer.deaths += 1;
        killer.current_streak = 0;
        touch(killer, &kill.killer_name, kill);
        return;
    }

    killer.kills += 1;
    killer.current_streak += 1;
    killer.best_streak = killer.best_streak.max(killer.current_streak);
    if kill.headshot {
        killer.headshots += 1;
    }
    if kill.team_kill {
        killer.team_kills += 1;
    }
    if let Some(distance) = kill.distance {
        if distance > killer.longest_kill_distance {
            killer.longest_kill_distance = distance;
        }
    }
    if let Some(weapon) = weapon_key(kill) {
        let entry = killer.weapons.entry(weapon).or_default();
        entry.kills += 1;
        if kill.headshot {
            entry.headshots += 1;
        }
        if let Some(distance) = kill.distance {
            if distance > entry.longest_kill {
                entry.longest_kill = distance;
            }
        }
    }
    if let Some(map) = map_key(kill) {
        killer.maps.entry(map).or_default().kills += 1;
    }
    touch(killer, &kill.killer_name, kill);

    if let Some(victim) = victim {
        victim.deaths += 1;
        victim.current_streak = 0;
        if let Some(weapon) = weapon_key(kill) {
            victim.weapons.entry(weapon).or_default().deaths += 1;
        }
        if let Some(map) = map_key(kill) {
            victim.maps.entry(map).or_default().deaths += 1;
        }
        touch(victim, &kill.victim_name, kill);
    }
}

/// Tracks sessions from connect/disconnect pairs and accrues playtime.
pub fn apply_connection(player: &mut PlayerStatAggregate, event: &ConnectionEvent) {
    if event.connected {
        player.session_started_at = Some(event.timestamp);
    } else if let Some(started) = player.session_started_at.take() {
        let seconds = (event.timestamp - started).num_seconds();
        if seconds > 0 {
            player.playtime_seconds += seconds as u64;
        }
    }
    if !event.player_name.trim().is_empty() {
        player.display_name = event.player_name.trim().to_string();
    }
    if event.timestamp > player.last_seen {
        player.last_seen = event.timestamp;
    }
}

fn touch(player: &mut PlayerStatAggregate, name: &str, kill: &KillEvent) {
    if !name.trim().is_empty() {
        player.display_name = name.trim().to_string();
    }
    if kill.timestamp > player.last_seen {
        player.last_seen = kill.timestamp;
    }
}

fn weapon_key(kill: &KillEvent) -> Option<String> {
    kill.weapon
        .as_deref()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
}

fn map_key(kill: &KillEvent) -> Option<String> {
    kill.map
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ParsedKill;
    use crate::value_objects::{PlayerId, ServerId, TenantId};
    use chrono::{Duration, TimeZone, Utc};

    fn player(id: &str) -> PlayerStatAggregate {
        PlayerStatAggregate::new(
            TenantId::from("t1"),
            ServerId::from("s1"),
            PlayerId::from(id),
            id,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn kill_event(killer: &str, victim: &str, headshot: bool) -> KillEvent {
        let parsed = ParsedKill {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap(),
            killer_name: killer.to_string(),
            killer_id: Some(killer.to_string()),
            victim_name: victim.to_string(),
            victim_id: Some(victim.to_string()),
            weapon: Some("Rifle".to_string()),
            distance: Some(120.0),
            headshot,
            team_kill: false,
            map: Some("Lakeside".to_string()),
            suicide: killer == victim,
            menu_suicide: false,
            fall_death: false,
        };
        KillEvent::from_parsed(
            TenantId::from("t1"),
            ServerId::from("s1"),
            PlayerId::from(killer),
            PlayerId::from(victim),
            &parsed,
            Utc::now(),
        )
    }

    #[test]
    fn kill_updates_killer_and_victim() {
        let mut alice = player("alice");
        let mut bob = player("bob");
        apply_kill(&mut alice, Some(&mut bob), &kill_event("alice", "bob", true));
        apply_kill(&mut alice, Some(&mut bob), &kill_event("alice", "bob", false));

        assert_eq!(alice.kills, 2);
        assert_eq!(alice.deaths, 0);
        assert_eq!(alice.headshots, 1);
        assert_eq!(alice.best_streak, 2);
        assert_eq!(alice.longest_kill_distance, 120.0);
        assert_eq!(alice.weapons["Rifle"].kills, 2);
        assert_eq!(alice.maps["Lakeside"].kills, 2);

        assert_eq!(bob.deaths, 2);
        assert_eq!(bob.kills, 0);
        assert_eq!(bob.weapons["Rifle"].deaths, 2);
        assert_eq!(bob.maps["Lakeside"].deaths, 2);
    }

    #[test]
    fn death_resets_streak_but_keeps_best() {
        let mut alice = player("alice");
        let mut bob = player("bob");
        apply_kill(&mut alice, Some(&mut bob), &kill_event("alice", "bob", false));
        apply_kill(&mut alice, Some(&mut bob), &kill_event("alice", "bob", false));
        apply_kill(&mut bob, Some(&mut alice), &kill_event("bob", "alice", false));
        assert_eq!(alice.current_streak, 0);
        assert_eq!(alice.best_streak, 2);
        assert_eq!(bob.current_streak, 1);
    }

    #[test]
    fn suicide_counts_only_suicide_and_death() {
        let mut carl = player("carl");
        apply_kill(&mut carl, None, &kill_event("carl", "carl", false));
        assert_eq!(carl.suicides, 1);
        assert_eq!(carl.deaths, 1);
        assert_eq!(carl.kills, 0);
        assert!(carl.weapons.is_empty());
    }

    #[test]
    fn connection_pairs_accrue_playtime() {
        let mut alice = player("alice");
        let start = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let connect = ConnectionEvent {
            timestamp: start,
            player_name: "Alice".to_string(),
            player_id: Some("alice".to_string()),
            connected: true,
        };
        let disconnect = ConnectionEvent {
            timestamp: start + Duration::minutes(45),
            connected: false,
            ..connect.clone()
        };
        apply_connection(&mut alice, &connect);
        apply_connection(&mut alice, &disconnect);
        assert_eq!(alice.playtime_seconds, 45 * 60);
        assert!(alice.session_started_at.is_none());
        assert_eq!(alice.display_name, "Alice");

        // A disconnect without a session adds nothing.
        apply_connection(&mut alice, &disconnect);
        assert_eq!(alice.playtime_seconds, 45 * 60);
    }
}

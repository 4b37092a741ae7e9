// Line normalizer shared by the live tailer and the batch importer

use regex::Regex;

use crate::entities::{
    AlertKind,
    ConnectionEvent,
    GameEvent,
    MissionAlert,
    ParsedKill,
    ServerLifecycle,
    StatusLine,
};
use crate::utils::parse_log_timestamp;
use crate::value_objects::SourceKind;

const KILL_FIELDS_MIN: usize = 7;

pub struct LineNormalizer {
    event_prefix: Regex,
    server_started: Regex,
    server_stopping: Regex,
    connection: Regex,
    mission: Regex,
    helicopter: Regex,
    airdrop: Regex,
    trader: Regex,
}

impl LineNormalizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            event_prefix: Regex::new(
                r"^\[?(\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2})(?:[:.]\d+)?\]?\s*[:\-]?\s*(.*)$",
            )?,
            server_started: Regex::new(r"(?i)^server\s+started\b")?,
            server_stopping: Regex::new(r"(?i)^server\s+(?:stopping|shutting\s+down|stopped)\b")?,
            connection: Regex::new(
                r"(?i)^player\s+(connected|disconnected):\s*(.+?)\s*(?:\(([^()]*)\))?\s*$",
            )?,
            mission: Regex::new(r"(?i)^mission\s+(.+?):\s*(started|finished|completed)\b")?,
            helicopter: Regex::new(r"(?i)^helicopter\s+crash\b.*?\bat\s+(.+?)\s*$")?,
            airdrop: Regex::new(r"(?i)^airdrop\b.*?\bat\s+(.+?)\s*$")?,
            trader: Regex::new(r"(?i)^trader\s+(.+?):\s*(appeared|disappeared)\b")?,
        })
    }

    pub fn normalize(&self, kind: SourceKind, line: &str) -> GameEvent {
        let line = line.trim_start_matches('\u{feff}').trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return GameEvent::unrecognized("blank line");
        }
        match kind {
            SourceKind::LogTail => parse_kill_line(line),
            SourceKind::Status => self.parse_event_line(line),
        }
    }

    fn parse_event_line(&self, line: &str) -> GameEvent {
        let Some(caps) = self.event_prefix.captures(line.trim()) else {
            return GameEvent::unrecognized("missing timestamp");
        };
        let Some(timestamp) = caps.get(1).and_then(|m| parse_log_timestamp(m.as_str())) else {
            return GameEvent::unrecognized("invalid timestamp");
        };
        let body = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

        if self.server_started.is_match(body) {
            return GameEvent::StatusLine(StatusLine {
                timestamp,
                lifecycle: ServerLifecycle::Started,
            });
        }
        if self.server_stopping.is_match(body) {
            return GameEvent::StatusLine(StatusLine {
                timestamp,
                lifecycle: ServerLifecycle::Stopping,
            });
        }
        if let Some(caps) = self.connection.captures(body) {
            let connected = caps[1].eq_ignore_ascii_case("connected");
            let player_name = caps[2].trim().to_string();
            let player_id = caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .filter(|id| !id.is_empty());
            return GameEvent::Connection(ConnectionEvent {
                timestamp,
                player_name,
                player_id,
                connected,
            });
        }
        if let Some(caps) = self.mission.captures(body) {
            return alert(timestamp, AlertKind::Mission, Some(&caps[1]), Some(&caps[2]), None);
        }
        if let Some(caps) = self.helicopter.captures(body) {
            return alert(timestamp, AlertKind::HelicopterCrash, None, None, Some(&caps[1]));
        }
        if let Some(caps) = self.airdrop.captures(body) {
            return alert(timestamp, AlertKind::Airdrop, None, None, Some(&caps[1]));
        }
        if let Some(caps) = self.trader.captures(body) {
            return alert(timestamp, AlertKind::Trader, Some(&caps[1]), Some(&caps[2]), None);
        }
        GameEvent::unrecognized("unknown event line")
    }
}

fn alert(
    timestamp: chrono::DateTime<chrono::Utc>,
    kind: AlertKind,
    name: Option<&str>,
    state: Option<&str>,
    location: Option<&str>,
) -> GameEvent {
    GameEvent::MissionAlert(MissionAlert {
        timestamp,
        kind,
        name: name.map(|s| s.trim().to_string()),
        state: state.map(|s| s.trim().to_lowercase()),
        location: location.map(|s| s.trim().to_string()),
    })
}

fn optional(field: Option<&&str>) -> Option<String> {
    field
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_kill_line(line: &str) -> GameEvent {
    let delimiter = if line.contains(';') { ';' } else { ',' };
    let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
    if fields.len() < KILL_FIELDS_MIN {
        return GameEvent::unrecognized(format!(
            "expected at least {KILL_FIELDS_MIN} fields, found {}",
            fields.len()
        ));
    }
    let Some(timestamp) = parse_log_timestamp(fields[0]) else {
        return GameEvent::unrecognized("invalid timestamp");
    };

    let distance = match fields[6] {
        "" => None,
        raw => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
            _ => return GameEvent::unrecognized("invalid distance"),
        },
    };

    let mut headshot = false;
    let mut team_kill = false;
    if let Some(flags) = fields.get(7) {
        for token in flags.split(|c: char| c.is_whitespace() || c == '|') {
            match token.to_ascii_lowercase().as_str() {
                "headshot" | "hs" => headshot = true,
                "teamkill" | "tk" => team_kill = true,
                _ => {}
            }
        }
    }

    let killer_name = fields[1].to_string();
    let killer_id = optional(fields.get(2));
    let victim_name = fields[3].to_string();
    let victim_id = optional(fields.get(4));
    let weapon = optional(fields.get(5));
    let map = optional(fields.get(8));

    let weapon_lower = weapon.as_deref().map(str::to_ascii_lowercase).unwrap_or_default();
    let menu_suicide = matches!(weapon_lower.as_str(), "suicide_by_relocation" | "menu");
    let fall_death = matches!(weapon_lower.as_str(), "falling" | "fall damage" | "fall_damage");
    let same_player = match (&killer_id, &victim_id) {
        (Some(killer), Some(victim)) => killer == victim,
        (None, None) => !killer_name.is_empty() && killer_name.eq_ignore_ascii_case(&victim_name),
        _ => false,
    };

    GameEvent::Kill(ParsedKill {
        timestamp,
        killer_name,
        killer_id,
        victim_name,
        victim_id,
        weapon,
        distance,
        headshot,
        team_kill,
        map,
        suicide: same_player,
        menu_suicide,
        fall_death,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> LineNormalizer {
        LineNormalizer::new().unwrap()
    }

    fn kill(line: &str) -> ParsedKill {
        match normalizer().normalize(SourceKind::LogTail, line) {
            GameEvent::Kill(kill) => kill,
            other => panic!("expected kill, got {other:?}"),
        }
    }

    #[test]
    fn parses_semicolon_kill_line() {
        let k = kill("2024.03.05-14.07.09;Alice;111;Bob;222;Rifle;150.4;headshot;Lakeside\r\n");
        assert_eq!(k.killer_name, "Alice");
        assert_eq!(k.killer_id.as_deref(), Some("111"));
        assert_eq!(k.victim_id.as_deref(), Some("222"));
        assert_eq!(k.weapon.as_deref(), Some("Rifle"));
        assert_eq!(k.distance, Some(150.4));
        assert!(k.headshot);
        assert!(!k.team_kill);
        assert_eq!(k.map.as_deref(), Some("Lakeside"));
        assert!(!k.suicide);
    }

    #[test]
    fn parses_comma_kill_line_with_blank_optionals() {
        let k = kill("2024.03.05-14.07.09,Alice,111,Bob,222,,");
        assert!(k.weapon.is_none());
        assert!(k.distance.is_none());
        assert!(k.map.is_none());
    }

    #[test]
    fn classifies_suicides() {
        assert!(kill("2024.03.05-14.07.09;Carl;333;Carl;333;Pistol;0").suicide);
        let menu = kill("2024.03.05-14.07.09;Carl;333;Carl;333;suicide_by_relocation;");
        assert!(menu.suicide && menu.menu_suicide);
        let fall = kill("2024.03.05-14.07.09;Carl;;Carl;;falling;");
        assert!(fall.suicide && fall.fall_death);
    }

    #[test]
    fn weapon_classified_deaths_between_players_are_not_suicides() {
        let fall = kill("2024.03.05-14.07.09;Alice;111;Bob;222;falling;0");
        assert!(fall.fall_death);
        assert!(!fall.suicide);
        let menu = kill("2024.03.05-14.07.09;Alice;111;Bob;222;menu;");
        assert!(menu.menu_suicide);
        assert!(!menu.suicide);
    }

    #[test]
    fn team_kill_flag_tokens() {
        let k = kill("2024.03.05-14.07.09;A;1;B;2;Knife;2;tk|hs");
        assert!(k.team_kill && k.headshot);
    }

    #[test]
    fn malformed_kill_lines_are_unrecognized() {
        let n = normalizer();
        for line in [
            "timestamp;killer;killer_id;victim;victim_id;weapon;distance",
            "2024.03.05-14.07.09;A;1;B",
            "2024.03.05-14.07.09;A;1;B;2;Rifle;far",
            "",
        ] {
            assert!(
                matches!(n.normalize(SourceKind::LogTail, line), GameEvent::Unrecognized { .. }),
                "line should be rejected: {line}"
            );
        }
    }

    #[test]
    fn parses_event_lines() {
        let n = normalizer();
        match n.normalize(SourceKind::Status, "2024.03.05-14.07.09 Player connected: Alice (7656)") {
            GameEvent::Connection(c) => {
                assert!(c.connected);
                assert_eq!(c.player_name, "Alice");
                assert_eq!(c.player_id.as_deref(), Some("7656"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match n.normalize(SourceKind::Status, "[2024.03.05-14.07.09] Mission Bunker Raid: started") {
            GameEvent::MissionAlert(a) => {
                assert_eq!(a.kind, AlertKind::Mission);
                assert_eq!(a.name.as_deref(), Some("Bunker Raid"));
                assert_eq!(a.state.as_deref(), Some("started"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match n.normalize(SourceKind::Status, "2024.03.05-14.07.09 Airdrop incoming at 1200, 3400") {
            GameEvent::MissionAlert(a) => assert_eq!(a.location.as_deref(), Some("1200, 3400")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            n.normalize(SourceKind::Status, "2024.03.05-14.07.09 Server started"),
            GameEvent::StatusLine(StatusLine { lifecycle: ServerLifecycle::Started, .. })
        ));
        assert!(matches!(
            n.normalize(SourceKind::Status, "2024.03.05-14.07.09 Weather changed"),
            GameEvent::Unrecognized { .. }
        ));
        assert!(matches!(
            n.normalize(SourceKind::Status, "no timestamp here"),
            GameEvent::Unrecognized { .. }
        ));
    }
}

// Key construction for the redb tables

use deadwatch_domain::{KillEvent, ServerId, SourceKind, TenantId};

const SEPARATOR: char = '/';

fn escape(part: &str) -> String {
    part.replace('%', "%25").replace(SEPARATOR, "%2F")
}

pub(crate) fn key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| escape(part))
        .collect::<Vec<_>>()
        .join("/")
}

/// Key prefix matching every row below `parts`.
pub(crate) fn prefix(parts: &[&str]) -> String {
    let mut prefix = key(parts);
    prefix.push(SEPARATOR);
    prefix
}

pub(crate) fn server(tenant_id: &TenantId, server_id: &ServerId) -> String {
    key(&[tenant_id.as_str(), server_id.as_str()])
}

pub(crate) fn parser_state(tenant_id: &TenantId, server_id: &ServerId, kind: SourceKind) -> String {
    key(&[tenant_id.as_str(), server_id.as_str(), kind.as_str()])
}

pub(crate) fn player(tenant_id: &TenantId, server_id: &ServerId, player_id: &str) -> String {
    key(&[tenant_id.as_str(), server_id.as_str(), player_id])
}

pub(crate) fn kill(kill: &KillEvent) -> String {
    key(&[kill.tenant_id.as_str(), kill.server_id.as_str(), &kill.id])
}

pub(crate) fn kill_id(tenant_id: &TenantId, kill_id: &str) -> String {
    key(&[tenant_id.as_str(), kill_id])
}

pub(crate) fn pending_kill(kill: &KillEvent) -> String {
    key(&[kill.tenant_id.as_str(), &kill.order_key()])
}

pub(crate) fn dedup(tenant_id: &TenantId, dedup_key: &str) -> String {
    key(&[tenant_id.as_str(), dedup_key])
}

/// The catch-all binding uses an empty server component.
pub(crate) fn channel(tenant_id: &TenantId, server_id: Option<&ServerId>) -> String {
    key(&[tenant_id.as_str(), server_id.map(ServerId::as_str).unwrap_or_default()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_inside_ids_are_escaped() {
        let key = server(&TenantId::from("guild/1"), &ServerId::from("a%b"));
        assert_eq!(key, "guild%2F1/a%25b");
        assert!(!key.starts_with(&prefix(&["guild"])));
    }

    #[test]
    fn catch_all_channel_key_differs_from_server_binding() {
        let tenant = TenantId::from("t");
        assert_eq!(channel(&tenant, None), "t/");
        assert_eq!(channel(&tenant, Some(&ServerId::from("s"))), "t/s");
    }
}

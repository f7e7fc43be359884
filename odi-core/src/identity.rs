use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of actor roles. The observed data carries role strings with
/// inconsistent casing ("Agent", "AGENT", "agent "), so parsing happens in
/// exactly one place: here, at the data-access boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Public,
    Agent,
    Owner,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "public" | "traveller" | "rider" => Some(Role::Public),
            "agent" => Some(Role::Agent),
            "owner" | "boat_owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Public => "PUBLIC",
            Role::Agent => "AGENT",
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
        }
    }
}

/// Authenticated caller, as asserted by the (out-of-scope) auth layer in
/// front of the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_casing() {
        assert_eq!(Role::parse("agent"), Some(Role::Agent));
        assert_eq!(Role::parse("AGENT"), Some(Role::Agent));
        assert_eq!(Role::parse(" Agent "), Some(Role::Agent));
        assert_eq!(Role::parse("Owner"), Some(Role::Owner));
        assert_eq!(Role::parse("boat_owner"), Some(Role::Owner));
        assert_eq!(Role::parse("traveller"), Some(Role::Public));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(Role::parse("captain"), None);
        assert_eq!(Role::parse(""), None);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a consultation the local actor is on.
///
/// The wire names are the ones the consultation service uses (`farmer`,
/// `specialist`); `requester`/`responder` are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "farmer", alias = "requester")]
    Requester,
    #[serde(rename = "specialist", alias = "responder")]
    Responder,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requester => "farmer",
            Role::Responder => "specialist",
        }
    }

    pub fn counterpart(&self) -> Role {
        match self {
            Role::Requester => Role::Responder,
            Role::Responder => Role::Requester,
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_lowercase().as_str() {
            "farmer" | "requester" => Some(Role::Requester),
            "specialist" | "responder" => Some(Role::Responder),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The local actor, handed to the controller at construction and never
/// re-read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            role,
        }
    }

    pub fn is_requester(&self) -> bool {
        self.role == Role::Requester
    }

    pub fn is_responder(&self) -> bool {
        self.role == Role::Responder
    }
}

/// Identity of the other party in a session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counterpart {
    pub user_id: String,
    pub name: String,
}

impl Counterpart {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Requester).unwrap(), "\"farmer\"");
        assert_eq!(
            serde_json::to_string(&Role::Responder).unwrap(),
            "\"specialist\""
        );

        let role: Role = serde_json::from_str("\"responder\"").unwrap();
        assert_eq!(role, Role::Responder);
        let role: Role = serde_json::from_str("\"farmer\"").unwrap();
        assert_eq!(role, Role::Requester);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("Farmer"), Some(Role::Requester));
        assert_eq!(Role::parse(" specialist "), Some(Role::Responder));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::Requester.counterpart(), Role::Responder);
    }

    #[test]
    fn test_identity_helpers() {
        let me = Identity::new("u1", "Ravi", Role::Requester);
        assert!(me.is_requester());
        assert!(!me.is_responder());
    }
}

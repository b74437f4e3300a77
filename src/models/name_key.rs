use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity a name can be looked up by
///
/// Ordering is variant first, then value. It only exists so queues iterate
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameKey {
    /// Opaque agent identifier
    AgentId(Uuid),
    /// Unique login handle, e.g. "bobsmith123"
    Username(String),
}

impl NameKey {
    /// Query parameter name understood by the lookup service
    pub fn param(&self) -> &'static str {
        match self {
            NameKey::AgentId(_) => "ids",
            NameKey::Username(_) => "username",
        }
    }

    /// `param=value` fragment, value percent-encoded
    pub fn query_pair(&self) -> String {
        format!("{}={}", self.param(), urlencoding::encode(&self.as_string()))
    }

    pub fn as_string(&self) -> String {
        match self {
            NameKey::AgentId(id) => id.to_string(),
            NameKey::Username(name) => name.clone(),
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            NameKey::AgentId(id) => Some(*id),
            NameKey::Username(_) => None,
        }
    }

    /// Interpret free-form input: UUIDs become agent ids, anything else a handle
    pub fn parse_any(input: &str) -> Self {
        let trimmed = input.trim();
        match Uuid::parse_str(trimmed) {
            Ok(id) => NameKey::AgentId(id),
            Err(_) => NameKey::Username(trimmed.to_string()),
        }
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameKey::AgentId(id) => write!(f, "{id}"),
            NameKey::Username(name) => f.write_str(name),
        }
    }
}

impl From<Uuid> for NameKey {
    fn from(id: Uuid) -> Self {
        NameKey::AgentId(id)
    }
}

impl From<&str> for NameKey {
    fn from(name: &str) -> Self {
        NameKey::Username(name.to_string())
    }
}

impl From<String> for NameKey {
    fn from(name: String) -> Self {
        NameKey::Username(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_requires_same_kind() {
        let id = Uuid::new_v4();
        assert_eq!(NameKey::from(id), NameKey::AgentId(id));
        assert_ne!(
            NameKey::AgentId(id),
            NameKey::Username(id.to_string())
        );
    }

    #[test]
    fn test_ordering_is_kind_then_value() {
        let id = Uuid::nil();
        let mut keys = vec![
            NameKey::from("zed"),
            NameKey::from("alice"),
            NameKey::AgentId(id),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                NameKey::AgentId(id),
                NameKey::from("alice"),
                NameKey::from("zed"),
            ]
        );
    }

    #[test]
    fn test_query_pair_encodes_value() {
        let id = Uuid::parse_str("3941037e-78ab-45f0-b421-bd6e77c1804d").unwrap();
        assert_eq!(
            NameKey::AgentId(id).query_pair(),
            "ids=3941037e-78ab-45f0-b421-bd6e77c1804d"
        );
        assert_eq!(
            NameKey::from("bob smith&co").query_pair(),
            "username=bob%20smith%26co"
        );
    }

    #[test]
    fn test_parse_any() {
        let key = NameKey::parse_any(" 0012809d-7d2d-4c24-9609-af1230a37715 ");
        assert!(matches!(key, NameKey::AgentId(_)));
        assert_eq!(
            NameKey::parse_any("mickbot390.llqabot"),
            NameKey::from("mickbot390.llqabot")
        );
    }
}

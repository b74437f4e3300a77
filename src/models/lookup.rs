//! Payloads of the batch lookup service
//!
//! ```json
//! {
//!   "agents": [
//!     {
//!       "id": "3941037e-78ab-45f0-b421-bd6e77c1804d",
//!       "username": "sardonyx.linden",
//!       "display_name": "Bjork Gudmundsdottir",
//!       "legacy_first_name": "Sardonyx",
//!       "legacy_last_name": "Linden",
//!       "is_display_name_default": true
//!     }
//!   ],
//!   "bad_ids": ["0019aaba-24af-4f0a-aa72-6457953cf7f0"]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{NameKey, NameRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub agents: Vec<AgentPayload>,
    /// Ids the service could not resolve
    #[serde(default)]
    pub bad_ids: Vec<Uuid>,
    /// Handles the service could not resolve
    #[serde(default)]
    pub bad_usernames: Vec<String>,
}

impl LookupResponse {
    /// Every key the service explicitly reported as unresolvable
    pub fn unresolved_keys(&self) -> impl Iterator<Item = NameKey> + '_ {
        self.bad_ids
            .iter()
            .copied()
            .map(NameKey::AgentId)
            .chain(self.bad_usernames.iter().cloned().map(NameKey::Username))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPayload {
    pub id: Uuid,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub legacy_first_name: String,
    #[serde(default)]
    pub legacy_last_name: String,
    #[serde(default)]
    pub is_display_name_default: bool,
}

impl AgentPayload {
    /// Convert into a cacheable record with the response-wide expiry
    pub fn into_record(self, expires: DateTime<Utc>) -> NameRecord {
        let legacy_name = format!("{} {}", self.legacy_first_name, self.legacy_last_name)
            .trim()
            .to_string();
        // some agents never set an explicit display name
        let display_name = if self.display_name.is_empty() {
            self.username.clone()
        } else {
            self.display_name
        };

        NameRecord {
            agent_id: self.id,
            username: self.username,
            display_name,
            legacy_name,
            is_display_name_default: self.is_display_name_default,
            is_temporary: false,
            expires,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "agents": [
            {
                "display_name_next_update": "2010-04-16T21:34:02+00:00",
                "display_name": "MickBot390 LLQABot",
                "username": "mickbot390.llqabot",
                "id": "0012809d-7d2d-4c24-9609-af1230a37715",
                "is_display_name_default": false
            },
            {
                "display_name": "",
                "username": "sardonyx.linden",
                "legacy_first_name": "Sardonyx",
                "legacy_last_name": "Linden",
                "id": "3941037e-78ab-45f0-b421-bd6e77c1804d",
                "is_display_name_default": true
            }
        ],
        "bad_ids": ["0019aaba-24af-4f0a-aa72-6457953cf7f0"]
    }"#;

    #[test]
    fn test_parse_sample_response() {
        let response: LookupResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(response.agents.len(), 2);
        assert_eq!(response.bad_ids.len(), 1);
        assert!(response.bad_usernames.is_empty());
        assert_eq!(response.unresolved_keys().count(), 1);
    }

    #[test]
    fn test_empty_display_name_falls_back_to_username() {
        let response: LookupResponse = serde_json::from_str(SAMPLE).unwrap();
        let expires = Utc::now();
        let record = response.agents[1].clone().into_record(expires);
        assert_eq!(record.display_name, "sardonyx.linden");
        assert_eq!(record.legacy_name, "Sardonyx Linden");
        assert_eq!(record.expires, expires);
        assert!(!record.is_temporary);
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let response: LookupResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response, LookupResponse::default());
    }
}

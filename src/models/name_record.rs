use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resolved identity information for one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    #[serde(rename = "id")]
    pub agent_id: Uuid,
    /// Unique handle, empty for legacy-sourced records
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    /// "First Last" name from the legacy name system
    #[serde(default)]
    pub legacy_name: String,
    #[serde(default)]
    pub is_display_name_default: bool,
    /// Built from the legacy fallback; never persisted
    #[serde(skip)]
    pub is_temporary: bool,
    pub expires: DateTime<Utc>,
}

impl NameRecord {
    /// Temporary record synthesized from a legacy full name.
    ///
    /// Never expires but is not cached or exported either, so it lives only
    /// as long as the caller holds it.
    pub fn from_legacy(agent_id: Uuid, full_name: &str) -> Self {
        Self {
            agent_id,
            username: String::new(),
            display_name: full_name.to_string(),
            legacy_name: full_name.to_string(),
            is_display_name_default: true,
            is_temporary: true,
            expires: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }

    /// "Display Name (username)", or just the display name when they match
    pub fn complete_name(&self) -> String {
        if self.username.is_empty() || self.display_name.eq_ignore_ascii_case(&self.username) {
            self.display_name.clone()
        } else {
            format!("{} ({})", self.display_name, self.username)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn sample(expires: DateTime<Utc>) -> NameRecord {
        NameRecord {
            agent_id: Uuid::new_v4(),
            username: "sardonyx.linden".to_string(),
            display_name: "Bjork Gudmundsdottir".to_string(),
            legacy_name: "Sardonyx Linden".to_string(),
            is_display_name_default: false,
            is_temporary: false,
            expires,
        }
    }

    #[test]
    fn test_legacy_record_shape() {
        let id = Uuid::new_v4();
        let record = NameRecord::from_legacy(id, "Sardonyx Linden");
        assert_eq!(record.agent_id, id);
        assert!(record.username.is_empty());
        assert_eq!(record.display_name, "Sardonyx Linden");
        assert!(record.is_temporary);
        assert!(record.is_display_name_default);
        assert!(!record.is_expired(Utc::now()));
    }

    #[test]
    fn test_expiry_check() {
        let now = Utc::now();
        let record = sample(now - TimeDelta::seconds(1));
        assert!(record.is_expired(now));
        assert!(!sample(now).is_expired(now));
    }

    #[test]
    fn test_complete_name() {
        let record = sample(Utc::now());
        assert_eq!(
            record.complete_name(),
            "Bjork Gudmundsdottir (sardonyx.linden)"
        );
        let legacy = NameRecord::from_legacy(Uuid::new_v4(), "Sardonyx Linden");
        assert_eq!(legacy.complete_name(), "Sardonyx Linden");
    }

    #[test]
    fn test_temporary_flag_not_serialized() {
        let mut record = sample(Utc::now());
        record.is_temporary = true;
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("is_temporary").is_none());
        assert!(json.get("id").is_some());

        let back: NameRecord = serde_json::from_value(json).unwrap();
        assert!(!back.is_temporary);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mirrored identity record, one row per external provider account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Surrogate id generated by the store.
    pub id: i64,
    /// Account id issued by the identity provider; unique, immutable.
    pub external_id: String,
    /// Email supplied by the provider at creation.
    pub email: String,
    /// Display name, mutable via profile update.
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_user() -> User {
        User {
            id: 7,
            external_id: "kc-1".to_string(),
            email: "a@x.com".to_string(),
            display_name: Some("A".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_user_serializes_timestamps_as_rfc3339() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(json.contains("2024-01-01T00:00:00Z"));
        assert!(json.contains("kc-1"));
    }

    #[test]
    fn test_user_round_trip() {
        let user = sample_user();
        let json = serde_json::to_string(&user).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_user_without_display_name() {
        let mut user = sample_user();
        user.display_name = None;
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains(r#""display_name":null"#));
    }
}

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;
use uuid::Uuid;

/// Visibility level attached to a note. `Archived` notes stay readable but are
/// pushed out of the default views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PrivacyLevel {
    Private,
    Protected,
    Archived,
}

impl Default for PrivacyLevel {
    fn default() -> Self {
        PrivacyLevel::Private
    }
}

/// Row status used for soft deletion. Deleted rows stay in the remote table
/// with `status = deleted` and are filtered out of active queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NoteStatus {
    Active,
    Deleted,
}

impl Default for NoteStatus {
    fn default() -> Self {
        NoteStatus::Active
    }
}

/// A note row as stored by the remote service. Timestamps are owned by the
/// remote; the client never fabricates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub privacy_level: PrivacyLevel,
    /// Cosmetic flag only; no cipher is applied client-side.
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub status: NoteStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields the client supplies when creating a note. The remote fills in the
/// id and timestamps; new rows always start active.
#[derive(Debug, Clone, Serialize)]
pub struct NewNote {
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub category_id: Option<Uuid>,
    pub privacy_level: PrivacyLevel,
    pub is_encrypted: bool,
}

/// Full editable-field patch applied on save. A save is a single atomic upsert,
/// so every editable field is always written.
#[derive(Debug, Clone, Serialize)]
pub struct NotePatch {
    pub title: String,
    pub content: String,
    pub category_id: Option<Uuid>,
    pub privacy_level: PrivacyLevel,
    pub is_encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub icon: String,
}

/// Category plus the number of active notes filed under it.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryWithCount {
    pub category: Category,
    pub note_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCategory {
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Dashboard counters derived from one active-notes query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteStats {
    pub total: usize,
    pub encrypted: usize,
    pub categorized: usize,
    pub private: usize,
}

/// Authenticated session returned by the remote auth endpoint and persisted
/// between CLI invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub access_token: String,
}

/// Per-user preferences row (`user_profiles` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub default_privacy: PrivacyLevel,
    #[serde(default)]
    pub auto_lock_minutes: u32,
    #[serde(default = "default_notifications")]
    pub notifications_enabled: bool,
}

fn default_notifications() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_privacy: Option<PrivacyLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_lock_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn privacy_level_round_trips_through_strings() {
        assert_eq!(PrivacyLevel::Protected.to_string(), "protected");
        assert_eq!(
            PrivacyLevel::from_str("archived").unwrap(),
            PrivacyLevel::Archived
        );
        assert!(PrivacyLevel::from_str("public").is_err());
    }

    #[test]
    fn note_deserializes_with_defaults() {
        let raw = serde_json::json!({
            "id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "title": "T",
            "content": "C",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        });
        let note: Note = serde_json::from_value(raw).unwrap();
        assert_eq!(note.status, NoteStatus::Active);
        assert_eq!(note.privacy_level, PrivacyLevel::Private);
        assert!(!note.is_encrypted);
        assert!(note.category_id.is_none());
    }
}

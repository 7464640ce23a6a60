//! Core data models for notewell.
//!
//! These types are shared across all notewell crates and represent the
//! domain entities held by views and persisted by the backend data service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::defaults;

// =============================================================================
// NOTE TYPES
// =============================================================================

/// A note as stored by the backend data service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    /// Opaque owner identity from the auth provider (or the fallback user).
    pub user_id: String,
    pub title: String,
    /// Rich-text markup. Rendering is out of scope; this layer treats it as
    /// an opaque string.
    pub content: String,
    pub starred: bool,
    /// Referenced, never owned. A dangling reference renders as "unfiled".
    pub folder_id: Option<Uuid>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// A note enriched with its resolved tag objects, as held in a view snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteWithTags {
    #[serde(flatten)]
    pub note: Note,
    /// Sorted by case-insensitive name, same as the snapshot tag list.
    pub tags: Vec<Tag>,
}

impl NoteWithTags {
    /// A note with no resolved tags (the fallback dataset does not model the
    /// note-tag join, so its notes always load this way).
    pub fn untagged(note: Note) -> Self {
        Self { note, tags: Vec::new() }
    }

    pub fn tag_ids(&self) -> BTreeSet<Uuid> {
        self.tags.iter().map(|t| t.id).collect()
    }
}

// =============================================================================
// FOLDER AND TAG TYPES
// =============================================================================

/// A folder grouping notes. Deletion is out of scope for this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    /// Hex swatch token, e.g. `"#6366f1"`.
    pub color: String,
}

/// A tag. Name is unique per owner; the backend enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub color: String,
}

/// Associative (note, tag) pair for the normalized many-to-many schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTagLink {
    pub note_id: Uuid,
    pub tag_id: Uuid,
}

// =============================================================================
// HISTORY TYPES
// =============================================================================

/// An immutable, append-only record of a note's prior saved state.
///
/// `version_number` is strictly increasing per note, starting at 1 with the
/// first commit of an already-persisted note. History entries are never
/// mutated or deleted by this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryVersion {
    pub id: Uuid,
    pub note_id: Uuid,
    pub title: String,
    pub content: String,
    pub tag_ids: Vec<Uuid>,
    pub folder_id: Option<Uuid>,
    pub version_number: i32,
    pub created_at_utc: DateTime<Utc>,
}

// =============================================================================
// FLASHCARD TYPES
// =============================================================================

/// Flashcard difficulty levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// A study flashcard generated from a note. Not versioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub user_id: String,
    pub note_id: Uuid,
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    pub created_at_utc: DateTime<Utc>,
}

// =============================================================================
// SESSION AND PREFERENCES
// =============================================================================

/// An authenticated (or fallback) user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserIdentity {
    /// The persisted fallback-mode identity record.
    pub fn fallback() -> Self {
        Self {
            id: defaults::FALLBACK_USER_ID.to_string(),
            email: defaults::FALLBACK_USER_EMAIL.to_string(),
            name: Some("Demo User".to_string()),
        }
    }
}

/// User preferences persisted in the local key/value store.
///
/// Changes are broadcast live to every draft controller in the session via
/// the preferences watch channel; no reload required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub autosave_enabled: bool,
    pub autosave_interval_ms: u64,
    pub confirm_delete: bool,
    pub show_preview: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            autosave_enabled: true,
            autosave_interval_ms: defaults::AUTOSAVE_INTERVAL_MS,
            confirm_delete: true,
            show_preview: true,
        }
    }
}

impl Preferences {
    /// Clamp the autosave interval into its supported range.
    pub fn normalized(mut self) -> Self {
        self.autosave_interval_ms = self
            .autosave_interval_ms
            .clamp(defaults::AUTOSAVE_INTERVAL_MIN_MS, defaults::AUTOSAVE_INTERVAL_MAX_MS);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Difficulty::Easy).unwrap(), r#""easy""#);
        let d: Difficulty = serde_json::from_str(r#""hard""#).unwrap();
        assert_eq!(d, Difficulty::Hard);
    }

    #[test]
    fn test_preferences_defaults() {
        let p = Preferences::default();
        assert!(p.autosave_enabled);
        assert_eq!(p.autosave_interval_ms, 1000);
        assert!(p.confirm_delete);
        assert!(p.show_preview);
    }

    #[test]
    fn test_preferences_missing_fields_deserialize_to_defaults() {
        let p: Preferences = serde_json::from_str(r#"{"autosave_enabled":false}"#).unwrap();
        assert!(!p.autosave_enabled);
        assert_eq!(p.autosave_interval_ms, 1000);
    }

    #[test]
    fn test_preferences_normalized_clamps_interval() {
        let p = Preferences {
            autosave_interval_ms: 50,
            ..Default::default()
        };
        assert_eq!(p.normalized().autosave_interval_ms, 500);

        let p = Preferences {
            autosave_interval_ms: 60_000,
            ..Default::default()
        };
        assert_eq!(p.normalized().autosave_interval_ms, 10_000);
    }

    #[test]
    fn test_note_with_tags_flattens_note_fields() {
        let note = Note {
            id: Uuid::nil(),
            user_id: "u1".into(),
            title: "Title".into(),
            content: String::new(),
            starred: false,
            folder_id: None,
            created_at_utc: Utc::now(),
            updated_at_utc: Utc::now(),
        };
        let json = serde_json::to_value(NoteWithTags::untagged(note)).unwrap();
        assert_eq!(json["title"], "Title");
        assert!(json["tags"].as_array().unwrap().is_empty());
    }
}

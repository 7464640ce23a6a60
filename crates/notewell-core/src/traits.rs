//! Backend data service contract.
//!
//! The managed database behind notewell is an external collaborator; this
//! trait pins down the shape the client consumes — per-table CRUD plus a
//! push feed of row changes — without saying anything about the wire
//! protocol. Concrete implementations live in `notewell-data`: the REST
//! client, the in-memory server double, and the local fallback vault.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;
use crate::events::ChangeEvent;
use crate::models::*;

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Request for inserting a note.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub folder_id: Option<Uuid>,
    /// Tag links written alongside the note.
    pub tag_ids: Vec<Uuid>,
}

/// Field updates for an existing note. The service refreshes
/// `updated_at_utc` on every accepted update.
#[derive(Debug, Clone, Default)]
pub struct NoteChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub starred: Option<bool>,
    /// `Some(None)` clears the folder reference.
    pub folder_id: Option<Option<Uuid>>,
}

/// Request for creating a folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    pub name: String,
    pub color: String,
}

/// Request for creating a tag.
#[derive(Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub color: String,
}

/// The field snapshot appended as a history version on commit. The service
/// assigns `version_number` and the timestamp.
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    pub title: String,
    pub content: String,
    pub tag_ids: Vec<Uuid>,
    pub folder_id: Option<Uuid>,
}

/// Request for inserting one flashcard of a generated batch.
#[derive(Debug, Clone)]
pub struct NewFlashcard {
    pub note_id: Uuid,
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
}

// =============================================================================
// DATA SERVICE
// =============================================================================

/// Per-table CRUD and change-feed contract of the backend data service.
///
/// All reads are scoped to the owner the service was constructed for.
/// Mutations that target an absent row return [`crate::Error::NotFound`]
/// (or the typed note variant) rather than succeeding silently, except
/// where documented.
#[async_trait]
pub trait DataService: Send + Sync {
    // --- notes ---

    /// List notes ordered by `updated_at_utc` descending.
    async fn list_notes(&self) -> Result<Vec<Note>>;

    async fn get_note(&self, id: Uuid) -> Result<Note>;

    async fn insert_note(&self, req: NewNote) -> Result<Note>;

    async fn update_note(&self, id: Uuid, changes: NoteChanges) -> Result<Note>;

    /// Flip the starred flag. Sugar over `update_note` that one-shot actions
    /// use; does not touch `updated_at_utc` ordering semantics differently.
    async fn set_starred(&self, id: Uuid, starred: bool) -> Result<Note>;

    /// Hard delete. Irreversible; also drops the note's tag links,
    /// history, and flashcards. Deleting an absent row is a no-op (the
    /// backend's filter-based delete semantics).
    async fn delete_note(&self, id: Uuid) -> Result<()>;

    // --- folders ---

    /// List folders ordered by case-insensitive name.
    async fn list_folders(&self) -> Result<Vec<Folder>>;

    async fn insert_folder(&self, req: NewFolder) -> Result<Folder>;

    // --- tags ---

    /// List tags ordered by case-insensitive name.
    async fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Insert a tag. A duplicate name (case-insensitive, per owner) is a
    /// recoverable [`crate::Error::InvalidInput`].
    async fn insert_tag(&self, req: NewTag) -> Result<Tag>;

    /// All (note, tag) pairs for the owner.
    async fn list_note_tags(&self) -> Result<Vec<NoteTagLink>>;

    /// Replace the tag set of one note.
    async fn set_note_tags(&self, note_id: Uuid, tag_ids: &[Uuid]) -> Result<()>;

    // --- history ---

    /// Whether this service persists history versions. The fallback dataset
    /// does not; committers skip the history side effect when this is false.
    fn supports_history(&self) -> bool {
        true
    }

    /// History versions for a note, newest (highest version_number) first.
    async fn list_history(&self, note_id: Uuid) -> Result<Vec<HistoryVersion>>;

    /// Append one immutable history version; the service assigns
    /// `version_number = previous max + 1` (1 for the first entry).
    async fn append_history(&self, note_id: Uuid, snapshot: HistorySnapshot)
        -> Result<HistoryVersion>;

    // --- flashcards ---

    /// Whether this service persists flashcards (false for the fallback
    /// dataset; studying requires an authenticated session).
    fn supports_flashcards(&self) -> bool {
        true
    }

    async fn list_flashcards(&self) -> Result<Vec<Flashcard>>;

    /// Insert a generated batch; returns the stored cards in batch order.
    async fn insert_flashcards(&self, batch: Vec<NewFlashcard>) -> Result<Vec<Flashcard>>;

    async fn delete_flashcard(&self, id: Uuid) -> Result<()>;

    /// Wipe every flashcard generated from one note.
    async fn delete_flashcards_for_note(&self, note_id: Uuid) -> Result<()>;

    // --- change feed ---

    /// Subscribe to the service's row-change feed. Reconnection policy for a
    /// dropped transport belongs to the transport collaborator, not here.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}

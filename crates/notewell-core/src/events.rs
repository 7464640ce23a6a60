//! Change-feed event types, the broadcast feed bus, and the user-facing
//! notice channel.
//!
//! The backend data service pushes one [`ChangeEvent`] per row mutation.
//! Downstream consumers (sidebar, dashboard, editor) subscribe independently
//! through their own receivers; each converges on its own copy of the
//! snapshot. Slow receivers that fall behind get a `Lagged` error and miss
//! events — freshness matters more than completeness for a live view, and a
//! lagged view reloads from scratch.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Flashcard, Folder, Note, NoteTagLink, Tag};

// ============================================================================
// Change events
// ============================================================================

/// Tables the change feed is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Notes,
    Folders,
    Tags,
    NoteTags,
    Flashcards,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Notes => write!(f, "notes"),
            Self::Folders => write!(f, "folders"),
            Self::Tags => write!(f, "tags"),
            Self::NoteTags => write!(f, "note_tags"),
            Self::Flashcards => write!(f, "flashcards"),
        }
    }
}

/// Row mutation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A typed row payload carried by a change event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum Row {
    Note(Note),
    Folder(Folder),
    Tag(Tag),
    NoteTag(NoteTagLink),
    Flashcard(Flashcard),
}

impl Row {
    pub fn table(&self) -> TableKind {
        match self {
            Row::Note(_) => TableKind::Notes,
            Row::Folder(_) => TableKind::Folders,
            Row::Tag(_) => TableKind::Tags,
            Row::NoteTag(_) => TableKind::NoteTags,
            Row::Flashcard(_) => TableKind::Flashcards,
        }
    }

    /// Primary id of the row. Junction rows are identified by their note id;
    /// subscribers reload the whole aggregate for those anyway.
    pub fn id(&self) -> Uuid {
        match self {
            Row::Note(n) => n.id,
            Row::Folder(f) => f.id,
            Row::Tag(t) => t.id,
            Row::NoteTag(l) => l.note_id,
            Row::Flashcard(c) => c.id,
        }
    }
}

/// One insert/update/delete pushed by the backend.
///
/// `new` carries the post-image (insert, update); `old` carries the
/// pre-image (update, delete). At least one side is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Row>,
}

impl ChangeEvent {
    pub fn inserted(row: Row) -> Self {
        Self { op: ChangeOp::Insert, new: Some(row), old: None }
    }

    pub fn updated(old: Row, new: Row) -> Self {
        Self { op: ChangeOp::Update, new: Some(new), old: Some(old) }
    }

    pub fn deleted(row: Row) -> Self {
        Self { op: ChangeOp::Delete, new: None, old: Some(row) }
    }

    pub fn table(&self) -> TableKind {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .map(Row::table)
            .expect("change event carries no row")
    }

    pub fn entity_id(&self) -> Uuid {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .map(Row::id)
            .expect("change event carries no row")
    }
}

// ============================================================================
// Change feed bus
// ============================================================================

/// Broadcast-based bus distributing change events to any number of
/// independently-subscribing consumers.
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a new feed with the given buffer capacity.
    ///
    /// Recommended: [`crate::defaults::FEED_CAPACITY`] for production,
    /// [`crate::defaults::FEED_CAPACITY_TEST`] for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently if nobody listens.
    pub fn emit(&self, event: ChangeEvent) {
        tracing::debug!(
            table = %event.table(),
            op = ?event.op,
            entity_id = %event.entity_id(),
            subscriber_count = self.tx.receiver_count(),
            "change feed emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to the feed. Each subscriber gets its own independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ============================================================================
// User-facing notices
// ============================================================================

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A toast-equivalent message reported upward instead of an error thrown
/// across component boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Notice {
    pub fn info(title: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, title: title.into(), detail: None }
    }

    pub fn error(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            detail: Some(detail.into()),
        }
    }
}

/// Broadcast channel for notices. Components report; the shell renders.
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn notify(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Note;
    use chrono::Utc;

    fn note(id: Uuid) -> Note {
        Note {
            id,
            user_id: "u1".into(),
            title: "t".into(),
            content: String::new(),
            starred: false,
            folder_id: None,
            created_at_utc: Utc::now(),
            updated_at_utc: Utc::now(),
        }
    }

    #[test]
    fn test_change_event_table_and_id() {
        let id = Uuid::nil();
        let ev = ChangeEvent::inserted(Row::Note(note(id)));
        assert_eq!(ev.table(), TableKind::Notes);
        assert_eq!(ev.entity_id(), id);

        let ev = ChangeEvent::deleted(Row::Note(note(id)));
        assert_eq!(ev.op, ChangeOp::Delete);
        assert!(ev.new.is_none());
        assert_eq!(ev.entity_id(), id);
    }

    #[test]
    fn test_change_event_serialization_skips_absent_sides() {
        let ev = ChangeEvent::inserted(Row::Note(note(Uuid::nil())));
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains(r#""op":"insert""#));
        assert!(!json.contains(r#""old""#));
    }

    #[tokio::test]
    async fn test_feed_emit_subscribe() {
        let feed = ChangeFeed::new(32);
        let mut rx = feed.subscribe();

        feed.emit(ChangeEvent::inserted(Row::Note(note(Uuid::nil()))));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.op, ChangeOp::Insert);
        assert_eq!(ev.table(), TableKind::Notes);
    }

    #[tokio::test]
    async fn test_feed_multiple_subscribers_each_receive() {
        let feed = ChangeFeed::new(32);
        let mut rx1 = feed.subscribe();
        let mut rx2 = feed.subscribe();

        feed.emit(ChangeEvent::inserted(Row::Note(note(Uuid::nil()))));

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[test]
    fn test_feed_no_subscribers_ok() {
        let feed = ChangeFeed::new(32);
        // Must not panic with nobody listening
        feed.emit(ChangeEvent::inserted(Row::Note(note(Uuid::nil()))));
    }

    #[tokio::test]
    async fn test_notifier_delivers_notices() {
        let notifier = Notifier::new(8);
        let mut rx = notifier.subscribe();

        notifier.notify(Notice::error("Save failed", "network unreachable"));

        let n = rx.recv().await.unwrap();
        assert_eq!(n.level, NoticeLevel::Error);
        assert_eq!(n.title, "Save failed");
        assert_eq!(n.detail.as_deref(), Some("network unreachable"));
    }
}

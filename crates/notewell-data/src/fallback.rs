//! Fallback (demo) dataset and its data service.
//!
//! When no session identity exists the app can run entirely against a
//! locally persisted dataset: a seeded set of folders and notes in the
//! key/value store, plus a persisted demo identity record. Tags, history,
//! and flashcards are not modeled by the fallback dataset — tag reads
//! degrade to the empty set, history/flashcard support is reported off.
//!
//! Every operation read-modify-writes the whole collection under one lock,
//! so concurrent writers resolve last-writer-wins at the granularity of one
//! serialized save. Known limitation, inherited from the original storage
//! layout.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use notewell_core::{
    defaults, ChangeEvent, ChangeFeed, DataService, Error, Flashcard, Folder, HistorySnapshot,
    HistoryVersion, NewFlashcard, NewFolder, NewNote, NewTag, Note, NoteChanges, NoteTagLink,
    Result, Row, Tag, UserIdentity,
};

use crate::kv::{keys, KvStore};

fn seed_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid seed timestamp")
        .with_timezone(&Utc)
}

/// The seeded folder set.
pub fn seed_folders() -> Vec<Folder> {
    let user = defaults::FALLBACK_USER_ID.to_string();
    vec![
        Folder {
            id: Uuid::from_u128(0xf001),
            user_id: user.clone(),
            name: "Work Projects".into(),
            color: "#3b82f6".into(),
        },
        Folder {
            id: Uuid::from_u128(0xf002),
            user_id: user.clone(),
            name: "Personal".into(),
            color: "#10b981".into(),
        },
        Folder {
            id: Uuid::from_u128(0xf003),
            user_id: user,
            name: "Ideas".into(),
            color: "#f59e0b".into(),
        },
    ]
}

/// The seeded starter notes shown on first fallback launch.
pub fn seed_notes() -> Vec<Note> {
    let user = defaults::FALLBACK_USER_ID.to_string();
    vec![
        Note {
            id: Uuid::from_u128(0xa001),
            user_id: user.clone(),
            title: "AI-Powered Note Taking Features".into(),
            content: "<h2>Smart Features Overview</h2>\
                <p>This demo showcases the AI capabilities of the app:</p>\
                <ul>\
                <li><strong>AI Text Enhancement:</strong> Improve writing quality and clarity</li>\
                <li><strong>Smart Summarization:</strong> Generate concise summaries of long notes</li>\
                <li><strong>Content Expansion:</strong> Elaborate on ideas with AI assistance</li>\
                <li><strong>Tone Adjustment:</strong> Modify the tone to match your audience</li>\
                </ul>\
                <p>Try editing this content and use the AI features in the toolbar!</p>"
                .into(),
            starred: true,
            folder_id: Some(Uuid::from_u128(0xf001)),
            created_at_utc: seed_ts("2024-01-15T10:00:00Z"),
            updated_at_utc: seed_ts("2024-01-15T14:30:00Z"),
        },
        Note {
            id: Uuid::from_u128(0xa002),
            user_id: user.clone(),
            title: "Meeting Notes - Product Roadmap".into(),
            content: "<h2>Q1 Product Roadmap Meeting</h2>\
                <h3>Key Decisions</h3>\
                <ul>\
                <li>Implement real-time collaboration features</li>\
                <li>Enhance mobile app performance</li>\
                <li>Add advanced search capabilities</li>\
                </ul>\
                <h3>Action Items</h3>\
                <ul>\
                <li>Sarah: Research collaboration tools integration</li>\
                <li>Mike: Mobile performance optimization plan</li>\
                </ul>"
                .into(),
            starred: false,
            folder_id: Some(Uuid::from_u128(0xf001)),
            created_at_utc: seed_ts("2024-01-15T09:00:00Z"),
            updated_at_utc: seed_ts("2024-01-15T11:45:00Z"),
        },
        Note {
            id: Uuid::from_u128(0xa003),
            user_id: user,
            title: "Creative Writing Ideas".into(),
            content: "<h2>Story Concepts</h2>\
                <h3>\"The Digital Librarian\"</h3>\
                <p>A story about an AI that becomes sentient while organizing \
                humanity's knowledge.</p>\
                <h3>\"The Note Keeper\"</h3>\
                <p>Every thought someone writes down comes to life in a parallel \
                dimension. A writer discovers their notes are creating an entire \
                universe.</p>"
                .into(),
            starred: true,
            folder_id: Some(Uuid::from_u128(0xf002)),
            created_at_utc: seed_ts("2024-01-14T20:15:00Z"),
            updated_at_utc: seed_ts("2024-01-15T08:20:00Z"),
        },
    ]
}

// =============================================================================
// DATASET LIFECYCLE
// =============================================================================

/// Whether the fallback-mode flag is set.
pub fn is_enabled(kv: &KvStore) -> bool {
    matches!(kv.get_raw(keys::DEMO_MODE), Ok(Some(v)) if v == "true")
}

/// Seed the fallback dataset, flag, identity record, and start marker.
/// Existing datasets are left alone so re-entering fallback mode keeps the
/// user's local edits.
pub fn initialize(kv: &KvStore) -> Result<()> {
    kv.set_raw(keys::DEMO_MODE, "true")?;
    if !kv.contains(keys::DEMO_NOTES) {
        kv.set(keys::DEMO_NOTES, &seed_notes())?;
    }
    if !kv.contains(keys::DEMO_FOLDERS) {
        kv.set(keys::DEMO_FOLDERS, &seed_folders())?;
    }
    kv.set(keys::DEMO_USER, &UserIdentity::fallback())?;
    kv.set(keys::DEMO_STARTED_AT, &Utc::now())?;
    info!("fallback dataset initialized");
    Ok(())
}

/// Remove the fallback dataset, flag, identity record, and start marker.
pub fn clear(kv: &KvStore) -> Result<()> {
    kv.remove(keys::DEMO_MODE)?;
    kv.remove(keys::DEMO_NOTES)?;
    kv.remove(keys::DEMO_FOLDERS)?;
    kv.remove(keys::DEMO_USER)?;
    kv.remove(keys::DEMO_STARTED_AT)?;
    Ok(())
}

/// When the fallback dataset was last (re)seeded, if fallback is active.
pub fn started_at(kv: &KvStore) -> Option<DateTime<Utc>> {
    kv.get(keys::DEMO_STARTED_AT).ok().flatten()
}

/// The persisted fallback identity record, if any.
pub fn user(kv: &KvStore) -> Option<UserIdentity> {
    kv.get(keys::DEMO_USER).ok().flatten()
}

// =============================================================================
// FALLBACK DATA SERVICE
// =============================================================================

/// [`DataService`] over the persisted fallback dataset.
pub struct FallbackService {
    kv: Arc<KvStore>,
    feed: ChangeFeed,
    // Serializes every read-modify-write of the whole collection.
    rmw: Mutex<()>,
}

impl FallbackService {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self {
            kv,
            feed: ChangeFeed::new(defaults::FEED_CAPACITY_TEST),
            rmw: Mutex::new(()),
        }
    }

    fn load_notes(&self) -> Result<Vec<Note>> {
        Ok(self.kv.get(keys::DEMO_NOTES)?.unwrap_or_default())
    }

    fn save_notes(&self, notes: &[Note]) -> Result<()> {
        self.kv.set(keys::DEMO_NOTES, &notes)
    }

    fn load_folders(&self) -> Result<Vec<Folder>> {
        Ok(self.kv.get(keys::DEMO_FOLDERS)?.unwrap_or_default())
    }
}

#[async_trait]
impl DataService for FallbackService {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        let mut notes = self.load_notes()?;
        notes.sort_by(|a, b| b.updated_at_utc.cmp(&a.updated_at_utc));
        Ok(notes)
    }

    async fn get_note(&self, id: Uuid) -> Result<Note> {
        self.load_notes()?
            .into_iter()
            .find(|n| n.id == id)
            .ok_or(Error::NoteNotFound(id))
    }

    async fn insert_note(&self, req: NewNote) -> Result<Note> {
        let _guard = self.rmw.lock().await;
        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4(),
            user_id: defaults::FALLBACK_USER_ID.into(),
            title: req.title,
            content: req.content,
            starred: false,
            folder_id: req.folder_id,
            created_at_utc: now,
            updated_at_utc: now,
        };
        let mut notes = self.load_notes()?;
        notes.insert(0, note.clone());
        self.save_notes(&notes)?;
        self.feed.emit(ChangeEvent::inserted(Row::Note(note.clone())));
        Ok(note)
    }

    async fn update_note(&self, id: Uuid, changes: NoteChanges) -> Result<Note> {
        let _guard = self.rmw.lock().await;
        let mut notes = self.load_notes()?;
        let note = notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(Error::NoteNotFound(id))?;
        let old = note.clone();
        if let Some(title) = changes.title {
            note.title = title;
        }
        if let Some(content) = changes.content {
            note.content = content;
        }
        if let Some(starred) = changes.starred {
            note.starred = starred;
        }
        if let Some(folder_id) = changes.folder_id {
            note.folder_id = folder_id;
        }
        note.updated_at_utc = Utc::now().max(note.updated_at_utc);
        let new = note.clone();
        self.save_notes(&notes)?;
        self.feed
            .emit(ChangeEvent::updated(Row::Note(old), Row::Note(new.clone())));
        Ok(new)
    }

    async fn set_starred(&self, id: Uuid, starred: bool) -> Result<Note> {
        let _guard = self.rmw.lock().await;
        let mut notes = self.load_notes()?;
        let note = notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(Error::NoteNotFound(id))?;
        let old = note.clone();
        note.starred = starred;
        let new = note.clone();
        self.save_notes(&notes)?;
        self.feed
            .emit(ChangeEvent::updated(Row::Note(old), Row::Note(new.clone())));
        Ok(new)
    }

    async fn delete_note(&self, id: Uuid) -> Result<()> {
        let _guard = self.rmw.lock().await;
        let mut notes = self.load_notes()?;
        let removed = notes.iter().position(|n| n.id == id).map(|i| notes.remove(i));
        if let Some(note) = removed {
            self.save_notes(&notes)?;
            self.feed.emit(ChangeEvent::deleted(Row::Note(note)));
        }
        Ok(())
    }

    async fn list_folders(&self) -> Result<Vec<Folder>> {
        let mut folders = self.load_folders()?;
        folders.sort_by_key(|f| f.name.to_lowercase());
        Ok(folders)
    }

    async fn insert_folder(&self, req: NewFolder) -> Result<Folder> {
        let _guard = self.rmw.lock().await;
        let folder = Folder {
            id: Uuid::new_v4(),
            user_id: defaults::FALLBACK_USER_ID.into(),
            name: req.name,
            color: req.color,
        };
        let mut folders = self.load_folders()?;
        folders.push(folder.clone());
        self.kv.set(keys::DEMO_FOLDERS, &folders)?;
        self.feed.emit(ChangeEvent::inserted(Row::Folder(folder.clone())));
        Ok(folder)
    }

    // The fallback dataset does not model the tag join; reads degrade to
    // empty, tag-set writes are accepted no-ops.

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        Ok(Vec::new())
    }

    async fn insert_tag(&self, _req: NewTag) -> Result<Tag> {
        Err(Error::Unauthorized(
            "tags require an authenticated session".into(),
        ))
    }

    async fn list_note_tags(&self) -> Result<Vec<NoteTagLink>> {
        Ok(Vec::new())
    }

    async fn set_note_tags(&self, _note_id: Uuid, _tag_ids: &[Uuid]) -> Result<()> {
        Ok(())
    }

    fn supports_history(&self) -> bool {
        false
    }

    async fn list_history(&self, _note_id: Uuid) -> Result<Vec<HistoryVersion>> {
        Ok(Vec::new())
    }

    async fn append_history(
        &self,
        _note_id: Uuid,
        _snapshot: HistorySnapshot,
    ) -> Result<HistoryVersion> {
        Err(Error::Unauthorized(
            "history requires an authenticated session".into(),
        ))
    }

    fn supports_flashcards(&self) -> bool {
        false
    }

    async fn list_flashcards(&self) -> Result<Vec<Flashcard>> {
        Ok(Vec::new())
    }

    async fn insert_flashcards(&self, _batch: Vec<NewFlashcard>) -> Result<Vec<Flashcard>> {
        Err(Error::Unauthorized(
            "flashcards require an authenticated session".into(),
        ))
    }

    async fn delete_flashcard(&self, _id: Uuid) -> Result<()> {
        Ok(())
    }

    async fn delete_flashcards_for_note(&self, _note_id: Uuid) -> Result<()> {
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> (Arc<KvStore>, FallbackService) {
        let kv = Arc::new(KvStore::open(dir.path()).unwrap());
        initialize(&kv).unwrap();
        let svc = FallbackService::new(kv.clone());
        (kv, svc)
    }

    #[tokio::test]
    async fn test_initialize_seeds_once() {
        let dir = TempDir::new().unwrap();
        let (kv, svc) = open(&dir);

        assert!(is_enabled(&kv));
        assert_eq!(svc.list_notes().await.unwrap().len(), 3);
        assert_eq!(svc.list_folders().await.unwrap().len(), 3);
        assert_eq!(user(&kv).unwrap().id, defaults::FALLBACK_USER_ID);

        // Second initialize keeps local edits
        svc.delete_note(seed_notes()[0].id).await.unwrap();
        initialize(&kv).unwrap();
        assert_eq!(svc.list_notes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_notes_sorted_by_updated_desc() {
        let dir = TempDir::new().unwrap();
        let (_kv, svc) = open(&dir);

        let notes = svc.list_notes().await.unwrap();
        assert!(notes.windows(2).all(|w| w[0].updated_at_utc >= w[1].updated_at_utc));
    }

    #[tokio::test]
    async fn test_update_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let (_kv, svc) = open(&dir);
            let note = svc
                .insert_note(NewNote { title: "Local".into(), ..Default::default() })
                .await
                .unwrap();
            svc.update_note(
                note.id,
                NoteChanges { content: Some("edited".into()), ..Default::default() },
            )
            .await
            .unwrap();
            note.id
        };

        let kv = Arc::new(KvStore::open(dir.path()).unwrap());
        let svc = FallbackService::new(kv);
        assert_eq!(svc.get_note(id).await.unwrap().content, "edited");
    }

    #[tokio::test]
    async fn test_tag_reads_degrade_to_empty() {
        let dir = TempDir::new().unwrap();
        let (_kv, svc) = open(&dir);

        assert!(svc.list_tags().await.unwrap().is_empty());
        assert!(svc.list_note_tags().await.unwrap().is_empty());
        // Accepted no-op
        let note_id = seed_notes()[0].id;
        svc.set_note_tags(note_id, &[Uuid::new_v4()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_history_and_flashcards_unsupported() {
        let dir = TempDir::new().unwrap();
        let (_kv, svc) = open(&dir);

        assert!(!svc.supports_history());
        assert!(!svc.supports_flashcards());
        assert!(svc.list_history(seed_notes()[0].id).await.unwrap().is_empty());
        assert!(matches!(
            svc.insert_flashcards(vec![]).await,
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let dir = TempDir::new().unwrap();
        let (kv, _svc) = open(&dir);

        clear(&kv).unwrap();
        assert!(!is_enabled(&kv));
        assert!(user(&kv).is_none());
        assert!(started_at(&kv).is_none());
    }
}

//! In-memory backend data service.
//!
//! A complete in-process implementation of [`DataService`] with a live
//! change feed: every accepted mutation is echoed onto the feed exactly the
//! way the managed backend's realtime channel would echo it. Used as the
//! server double in tests and as an embedded backend for offline tooling.
//!
//! Failure injection (`fail_reads` / `fail_writes`) lets tests exercise the
//! transient-error paths without a network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use notewell_core::{
    defaults, ChangeEvent, ChangeFeed, DataService, Error, Flashcard, Folder, HistorySnapshot,
    HistoryVersion, NewFlashcard, NewFolder, NewNote, NewTag, Note, NoteChanges, NoteTagLink,
    Result, Row, Tag,
};

#[derive(Default)]
struct State {
    notes: Vec<Note>,
    folders: Vec<Folder>,
    tags: Vec<Tag>,
    links: Vec<NoteTagLink>,
    history: Vec<HistoryVersion>,
    flashcards: Vec<Flashcard>,
}

/// In-memory [`DataService`] with feed echo.
pub struct MemoryService {
    user_id: String,
    state: Mutex<State>,
    feed: ChangeFeed,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryService {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: Mutex::new(State::default()),
            feed: ChangeFeed::new(defaults::FEED_CAPACITY_TEST),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent read fail with a transient backend error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with a transient backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Backend("injected read failure".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Backend("injected write failure".into()));
        }
        Ok(())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory service state poisoned")
    }
}

#[async_trait]
impl DataService for MemoryService {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        self.check_read()?;
        let state = self.state();
        let mut notes = state.notes.clone();
        notes.sort_by(|a, b| b.updated_at_utc.cmp(&a.updated_at_utc));
        Ok(notes)
    }

    async fn get_note(&self, id: Uuid) -> Result<Note> {
        self.check_read()?;
        self.state()
            .notes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or(Error::NoteNotFound(id))
    }

    async fn insert_note(&self, req: NewNote) -> Result<Note> {
        self.check_write()?;
        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4(),
            user_id: self.user_id.clone(),
            title: req.title,
            content: req.content,
            starred: false,
            folder_id: req.folder_id,
            created_at_utc: now,
            updated_at_utc: now,
        };
        let links: Vec<NoteTagLink> = req
            .tag_ids
            .iter()
            .map(|&tag_id| NoteTagLink { note_id: note.id, tag_id })
            .collect();
        {
            let mut state = self.state();
            state.notes.push(note.clone());
            state.links.extend(links.iter().copied());
        }
        self.feed.emit(ChangeEvent::inserted(Row::Note(note.clone())));
        for link in links {
            self.feed.emit(ChangeEvent::inserted(Row::NoteTag(link)));
        }
        Ok(note)
    }

    async fn update_note(&self, id: Uuid, changes: NoteChanges) -> Result<Note> {
        self.check_write()?;
        let (old, new) = {
            let mut state = self.state();
            let note = state
                .notes
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
            // updated_at_utc is monotonically non-decreasing
            note.updated_at_utc = Utc::now().max(note.updated_at_utc);
            (old, note.clone())
        };
        self.feed
            .emit(ChangeEvent::updated(Row::Note(old), Row::Note(new.clone())));
        Ok(new)
    }

    async fn set_starred(&self, id: Uuid, starred: bool) -> Result<Note> {
        self.check_write()?;
        let (old, new) = {
            let mut state = self.state();
            let note = state
                .notes
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or(Error::NoteNotFound(id))?;
            let old = note.clone();
            note.starred = starred;
            (old, note.clone())
        };
        self.feed
            .emit(ChangeEvent::updated(Row::Note(old), Row::Note(new.clone())));
        Ok(new)
    }

    async fn delete_note(&self, id: Uuid) -> Result<()> {
        self.check_write()?;
        let (removed, links) = {
            let mut state = self.state();
            let removed = state.notes.iter().position(|n| n.id == id).map(|i| state.notes.remove(i));
            let links: Vec<NoteTagLink> =
                state.links.iter().filter(|l| l.note_id == id).copied().collect();
            state.links.retain(|l| l.note_id != id);
            state.history.retain(|h| h.note_id != id);
            state.flashcards.retain(|c| c.note_id != id);
            (removed, links)
        };
        // Deleting an absent note is a no-op, matching the backend's
        // filter-based delete.
        if let Some(note) = removed {
            for link in links {
                self.feed.emit(ChangeEvent::deleted(Row::NoteTag(link)));
            }
            self.feed.emit(ChangeEvent::deleted(Row::Note(note)));
        }
        Ok(())
    }

    async fn list_folders(&self) -> Result<Vec<Folder>> {
        self.check_read()?;
        let state = self.state();
        let mut folders = state.folders.clone();
        folders.sort_by_key(|f| f.name.to_lowercase());
        Ok(folders)
    }

    async fn insert_folder(&self, req: NewFolder) -> Result<Folder> {
        self.check_write()?;
        let folder = Folder {
            id: Uuid::new_v4(),
            user_id: self.user_id.clone(),
            name: req.name,
            color: req.color,
        };
        self.state().folders.push(folder.clone());
        self.feed.emit(ChangeEvent::inserted(Row::Folder(folder.clone())));
        Ok(folder)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.check_read()?;
        let state = self.state();
        let mut tags = state.tags.clone();
        tags.sort_by_key(|t| t.name.to_lowercase());
        Ok(tags)
    }

    async fn insert_tag(&self, req: NewTag) -> Result<Tag> {
        self.check_write()?;
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput("tag name cannot be empty".into()));
        }
        let tag = {
            let mut state = self.state();
            if state.tags.iter().any(|t| t.name.eq_ignore_ascii_case(&name)) {
                return Err(Error::InvalidInput(format!("tag \"{name}\" already exists")));
            }
            let tag = Tag {
                id: Uuid::new_v4(),
                user_id: self.user_id.clone(),
                name,
                color: req.color,
            };
            state.tags.push(tag.clone());
            tag
        };
        self.feed.emit(ChangeEvent::inserted(Row::Tag(tag.clone())));
        Ok(tag)
    }

    async fn list_note_tags(&self) -> Result<Vec<NoteTagLink>> {
        self.check_read()?;
        Ok(self.state().links.clone())
    }

    async fn set_note_tags(&self, note_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        self.check_write()?;
        let (added, removed) = {
            let mut state = self.state();
            if !state.notes.iter().any(|n| n.id == note_id) {
                return Err(Error::NoteNotFound(note_id));
            }
            let current: Vec<Uuid> = state
                .links
                .iter()
                .filter(|l| l.note_id == note_id)
                .map(|l| l.tag_id)
                .collect();
            let removed: Vec<NoteTagLink> = current
                .iter()
                .filter(|tag_id| !tag_ids.contains(tag_id))
                .map(|&tag_id| NoteTagLink { note_id, tag_id })
                .collect();
            let added: Vec<NoteTagLink> = tag_ids
                .iter()
                .filter(|tag_id| !current.contains(tag_id))
                .map(|&tag_id| NoteTagLink { note_id, tag_id })
                .collect();
            state
                .links
                .retain(|l| l.note_id != note_id || tag_ids.contains(&l.tag_id));
            state.links.extend(added.iter().copied());
            (added, removed)
        };
        for link in removed {
            self.feed.emit(ChangeEvent::deleted(Row::NoteTag(link)));
        }
        for link in added {
            self.feed.emit(ChangeEvent::inserted(Row::NoteTag(link)));
        }
        Ok(())
    }

    async fn list_history(&self, note_id: Uuid) -> Result<Vec<HistoryVersion>> {
        self.check_read()?;
        let state = self.state();
        let mut versions: Vec<HistoryVersion> = state
            .history
            .iter()
            .filter(|h| h.note_id == note_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    async fn append_history(
        &self,
        note_id: Uuid,
        snapshot: HistorySnapshot,
    ) -> Result<HistoryVersion> {
        self.check_write()?;
        let mut state = self.state();
        if !state.notes.iter().any(|n| n.id == note_id) {
            return Err(Error::NoteNotFound(note_id));
        }
        let next = state
            .history
            .iter()
            .filter(|h| h.note_id == note_id)
            .map(|h| h.version_number)
            .max()
            .unwrap_or(0)
            + 1;
        let version = HistoryVersion {
            id: Uuid::new_v4(),
            note_id,
            title: snapshot.title,
            content: snapshot.content,
            tag_ids: snapshot.tag_ids,
            folder_id: snapshot.folder_id,
            version_number: next,
            created_at_utc: Utc::now(),
        };
        state.history.push(version.clone());
        Ok(version)
    }

    async fn list_flashcards(&self) -> Result<Vec<Flashcard>> {
        self.check_read()?;
        let state = self.state();
        let mut cards = state.flashcards.clone();
        cards.sort_by(|a, b| b.created_at_utc.cmp(&a.created_at_utc));
        Ok(cards)
    }

    async fn insert_flashcards(&self, batch: Vec<NewFlashcard>) -> Result<Vec<Flashcard>> {
        self.check_write()?;
        let now = Utc::now();
        let cards: Vec<Flashcard> = batch
            .into_iter()
            .map(|req| Flashcard {
                id: Uuid::new_v4(),
                user_id: self.user_id.clone(),
                note_id: req.note_id,
                question: req.question,
                answer: req.answer,
                difficulty: req.difficulty,
                created_at_utc: now,
            })
            .collect();
        self.state().flashcards.extend(cards.iter().cloned());
        for card in &cards {
            self.feed.emit(ChangeEvent::inserted(Row::Flashcard(card.clone())));
        }
        Ok(cards)
    }

    async fn delete_flashcard(&self, id: Uuid) -> Result<()> {
        self.check_write()?;
        let removed = {
            let mut state = self.state();
            state
                .flashcards
                .iter()
                .position(|c| c.id == id)
                .map(|i| state.flashcards.remove(i))
        };
        if let Some(card) = removed {
            self.feed.emit(ChangeEvent::deleted(Row::Flashcard(card)));
        }
        Ok(())
    }

    async fn delete_flashcards_for_note(&self, note_id: Uuid) -> Result<()> {
        self.check_write()?;
        let removed: Vec<Flashcard> = {
            let mut state = self.state();
            let removed = state
                .flashcards
                .iter()
                .filter(|c| c.note_id == note_id)
                .cloned()
                .collect();
            state.flashcards.retain(|c| c.note_id != note_id);
            removed
        };
        for card in removed {
            self.feed.emit(ChangeEvent::deleted(Row::Flashcard(card)));
        }
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}

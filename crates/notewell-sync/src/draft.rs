//! Draft/autosave controller.
//!
//! Manages the single-document edit lifecycle: load, draft, debounced (or
//! explicit) commit, history snapshot. One controller instance owns one
//! document and at most one cancelable autosave timer; at most one commit
//! is in flight at a time.
//!
//! State machine: `Loading → Clean ⇄ Dirty → Saving → Clean`, with the
//! document in a `New` sub-state (no backend id) until its first successful
//! insert. A timer that fires while a commit is in flight does not overlap
//! a second write; the controller re-arms once the commit resolves. A
//! failed commit preserves the draft verbatim and retries the full commit
//! on the next tick or explicit save.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use notewell_core::{
    defaults, DataService, HistorySnapshot, HistoryVersion, NewNote, Note, NoteChanges,
    NoteWithTags, Notice, Notifier, Preferences, Result,
};

// ============================================================================
// Draft fields
// ============================================================================

/// The editable field set of one document, compared structurally for
/// dirtiness.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftFields {
    pub title: String,
    pub content: String,
    pub tags: BTreeSet<Uuid>,
    pub folder_id: Option<Uuid>,
}

impl DraftFields {
    /// Fields of an already-persisted document.
    pub fn of(doc: &NoteWithTags) -> Self {
        Self {
            title: doc.note.title.clone(),
            content: doc.note.content.clone(),
            tags: doc.tag_ids(),
            folder_id: doc.note.folder_id,
        }
    }

    /// Synthetic defaults for a document that has no backend id yet.
    pub fn new_document() -> Self {
        Self {
            title: defaults::UNTITLED.to_string(),
            ..Default::default()
        }
    }

    /// Whether this draft carries nothing worth persisting: no content, no
    /// tags, no folder, and a title that is blank or still the synthetic
    /// default.
    fn is_empty(&self) -> bool {
        let title = self.title.trim();
        (title.is_empty() || title == defaults::UNTITLED)
            && self.content.trim().is_empty()
            && self.tags.is_empty()
            && self.folder_id.is_none()
    }

    /// Title as persisted: never empty, blank coerces to the default.
    fn coerced_title(&self) -> String {
        let title = self.title.trim();
        if title.is_empty() {
            defaults::UNTITLED.to_string()
        } else {
            title.to_string()
        }
    }
}

// ============================================================================
// Controller state
// ============================================================================

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    /// Initial fetch in progress.
    Loading,
    /// Draft equals the last-known-saved baseline.
    Clean,
    /// Draft differs from the baseline; a commit is (or will be) due.
    Dirty,
    /// A commit is in flight.
    Saving,
}

/// What initiated a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Autosave,
    Explicit,
}

/// Outcome of a commit attempt that did not error.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Committed(Note),
    /// Nothing differed from the baseline.
    SkippedClean,
    /// A brand-new document with nothing worth persisting; guarded so an
    /// untouched editor never writes.
    SkippedEmpty,
    /// A commit was already in flight; the timer re-arms after it resolves.
    SuppressedInFlight,
    /// Autosave trigger with autosave disabled in preferences.
    AutosaveDisabled,
}

/// The controller's typed last-error, kept until the next successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveError {
    pub message: String,
    /// Whether a retry of the same commit may succeed.
    pub transient: bool,
}

// One armed debounce timer. Dropping it aborts the task unless it already
// fired, so an in-flight commit is never cancelled mid-write.
struct AutosaveTimer {
    handle: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

impl Drop for AutosaveTimer {
    fn drop(&mut self) {
        if !self.fired.load(Ordering::SeqCst) {
            self.handle.abort();
        }
    }
}

struct Shared {
    note_id: Option<Uuid>,
    baseline: DraftFields,
    draft: DraftFields,
    state: DraftState,
    last_error: Option<SaveError>,
    rearm_after_save: bool,
    created_at_utc: Option<DateTime<Utc>>,
    updated_at_utc: Option<DateTime<Utc>>,
    timer: Option<AutosaveTimer>,
}

// ============================================================================
// Controller
// ============================================================================

/// Controller for one document's edit lifecycle.
///
/// Cheap to clone; clones share the same document state. When the last
/// clone outside an in-flight commit is dropped, any armed (unfired) timer
/// is cancelled, while a commit already past its timer completes in the
/// background.
pub struct DraftController {
    shared: Arc<Mutex<Shared>>,
    service: Arc<dyn DataService>,
    notifier: Arc<Notifier>,
    prefs: watch::Receiver<Preferences>,
}

impl std::fmt::Debug for DraftController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftController").finish_non_exhaustive()
    }
}

impl Clone for DraftController {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            service: self.service.clone(),
            notifier: self.notifier.clone(),
            prefs: self.prefs.clone(),
        }
    }
}

impl DraftController {
    /// Controller for a document with no backend id yet.
    pub fn for_new(
        service: Arc<dyn DataService>,
        notifier: Arc<Notifier>,
        prefs: watch::Receiver<Preferences>,
    ) -> Self {
        let fields = DraftFields::new_document();
        Self::with_shared(
            service,
            notifier,
            prefs,
            Shared {
                note_id: None,
                baseline: fields.clone(),
                draft: fields,
                state: DraftState::Clean,
                last_error: None,
                rearm_after_save: false,
                created_at_utc: None,
                updated_at_utc: None,
                timer: None,
            },
        )
    }

    /// Controller seeded from a document already held in a snapshot.
    pub fn for_existing(
        doc: &NoteWithTags,
        service: Arc<dyn DataService>,
        notifier: Arc<Notifier>,
        prefs: watch::Receiver<Preferences>,
    ) -> Self {
        let fields = DraftFields::of(doc);
        Self::with_shared(
            service,
            notifier,
            prefs,
            Shared {
                note_id: Some(doc.note.id),
                baseline: fields.clone(),
                draft: fields,
                state: DraftState::Clean,
                last_error: None,
                rearm_after_save: false,
                created_at_utc: Some(doc.note.created_at_utc),
                updated_at_utc: Some(doc.note.updated_at_utc),
                timer: None,
            },
        )
    }

    /// Fetch a document by id and open a controller on it.
    ///
    /// A missing id surfaces as [`notewell_core::Error::NoteNotFound`]; the
    /// view redirects to a safe default instead of rendering a broken
    /// editor.
    pub async fn open_existing(
        service: Arc<dyn DataService>,
        notifier: Arc<Notifier>,
        prefs: watch::Receiver<Preferences>,
        id: Uuid,
    ) -> Result<Self> {
        let ctrl = Self::with_shared(
            service.clone(),
            notifier,
            prefs,
            Shared {
                note_id: Some(id),
                baseline: DraftFields::default(),
                draft: DraftFields::default(),
                state: DraftState::Loading,
                last_error: None,
                rearm_after_save: false,
                created_at_utc: None,
                updated_at_utc: None,
                timer: None,
            },
        );
        let (note, tags, links) = tokio::try_join!(
            service.get_note(id),
            service.list_tags(),
            service.list_note_tags(),
        )?;
        let resolved = tags
            .into_iter()
            .filter(|t| links.iter().any(|l| l.note_id == id && l.tag_id == t.id))
            .collect();
        let doc = NoteWithTags { note, tags: resolved };
        {
            let mut shared = ctrl.lock();
            shared.created_at_utc = Some(doc.note.created_at_utc);
            shared.updated_at_utc = Some(doc.note.updated_at_utc);
            shared.baseline = DraftFields::of(&doc);
            shared.draft = shared.baseline.clone();
            shared.state = DraftState::Clean;
        }
        Ok(ctrl)
    }

    fn with_shared(
        service: Arc<dyn DataService>,
        notifier: Arc<Notifier>,
        prefs: watch::Receiver<Preferences>,
        shared: Shared,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(shared)),
            service,
            notifier,
            prefs,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().expect("draft state poisoned")
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    pub fn state(&self) -> DraftState {
        self.lock().state
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().state == DraftState::Dirty
    }

    /// Backend id, once assigned. `None` while the document is new.
    pub fn note_id(&self) -> Option<Uuid> {
        self.lock().note_id
    }

    pub fn is_new(&self) -> bool {
        self.lock().note_id.is_none()
    }

    pub fn draft(&self) -> DraftFields {
        self.lock().draft.clone()
    }

    pub fn last_error(&self) -> Option<SaveError> {
        self.lock().last_error.clone()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.lock().updated_at_utc
    }

    // -------------------------------------------------------------------
    // Edits
    // -------------------------------------------------------------------

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.edit(move |d| d.title = title);
    }

    pub fn set_content(&self, content: impl Into<String>) {
        let content = content.into();
        self.edit(move |d| d.content = content);
    }

    pub fn set_tags(&self, tags: BTreeSet<Uuid>) {
        self.edit(move |d| d.tags = tags);
    }

    pub fn set_folder(&self, folder_id: Option<Uuid>) {
        self.edit(move |d| d.folder_id = folder_id);
    }

    /// Replace the draft with a history version's snapshot.
    ///
    /// Restoring only dirties the draft; it never commits on its own and
    /// never arms the autosave timer. An explicit save persists the
    /// restoration and appends a fresh version on top of history.
    pub fn restore(&self, version: &HistoryVersion) {
        let mut shared = self.lock();
        if shared.state == DraftState::Loading {
            return;
        }
        shared.draft = DraftFields {
            title: version.title.clone(),
            content: version.content.clone(),
            tags: version.tag_ids.iter().copied().collect(),
            folder_id: version.folder_id,
        };
        if shared.state != DraftState::Saving {
            shared.state = if shared.draft == shared.baseline {
                DraftState::Clean
            } else {
                DraftState::Dirty
            };
        }
        info!(version = version.version_number, "history version restored into draft");
    }

    fn edit(&self, apply: impl FnOnce(&mut DraftFields)) {
        let prefs = self.prefs.borrow().clone();
        let arm = {
            let mut shared = self.lock();
            if shared.state == DraftState::Loading {
                debug!("edit ignored while loading");
                return;
            }
            apply(&mut shared.draft);
            if shared.state == DraftState::Saving {
                // Don't overlap the in-flight write; pick the edit up once
                // the save resolves.
                shared.rearm_after_save = true;
                None
            } else if shared.draft == shared.baseline {
                shared.state = DraftState::Clean;
                None
            } else {
                shared.state = DraftState::Dirty;
                prefs
                    .autosave_enabled
                    .then(|| Self::interval(&shared, &prefs))
            }
        };
        if let Some(interval) = arm {
            self.arm_timer(interval);
        }
    }

    fn interval(shared: &Shared, prefs: &Preferences) -> Duration {
        let ms = if shared.note_id.is_none() {
            prefs
                .autosave_interval_ms
                .max(defaults::NEW_NOTE_AUTOSAVE_INTERVAL_MS)
        } else {
            prefs.autosave_interval_ms
        };
        Duration::from_millis(ms)
    }

    // -------------------------------------------------------------------
    // Timer
    // -------------------------------------------------------------------

    fn arm_timer(&self, interval: Duration) {
        // The task keeps only a weak handle: an armed timer must not keep an
        // unmounted editor's state alive, and dropping the state cancels it.
        let weak: Weak<Mutex<Shared>> = Arc::downgrade(&self.shared);
        let service = self.service.clone();
        let notifier = self.notifier.clone();
        let prefs = self.prefs.clone();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_flag = fired.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            fired_flag.store(true, Ordering::SeqCst);
            if let Some(shared) = weak.upgrade() {
                let ctrl = DraftController {
                    shared,
                    service,
                    notifier,
                    prefs,
                };
                let _ = ctrl.commit(SaveTrigger::Autosave).await;
            }
        });
        // Replacing the previous timer aborts it if it has not fired.
        self.lock().timer = Some(AutosaveTimer { handle, fired });
    }

    // -------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------

    /// Explicit save action.
    pub async fn save(&self) -> Result<CommitOutcome> {
        self.commit(SaveTrigger::Explicit).await
    }

    /// Commit the draft if it is due.
    ///
    /// On failure the baseline and draft are left untouched, the error is
    /// recorded and reported through the notifier, and — with autosave on —
    /// the timer re-arms so the full commit retries.
    pub async fn commit(&self, trigger: SaveTrigger) -> Result<CommitOutcome> {
        let prefs = self.prefs.borrow().clone();
        let (note_id, sent, observed) = {
            let mut shared = self.lock();
            match shared.state {
                DraftState::Loading => return Ok(CommitOutcome::SkippedClean),
                DraftState::Saving => {
                    shared.rearm_after_save = true;
                    return Ok(CommitOutcome::SuppressedInFlight);
                }
                DraftState::Clean | DraftState::Dirty => {}
            }
            if trigger == SaveTrigger::Autosave && !prefs.autosave_enabled {
                return Ok(CommitOutcome::AutosaveDisabled);
            }
            if shared.draft == shared.baseline {
                shared.state = DraftState::Clean;
                return Ok(CommitOutcome::SkippedClean);
            }
            if shared.note_id.is_none() && shared.draft.is_empty() {
                debug!("empty new document, commit skipped");
                return Ok(CommitOutcome::SkippedEmpty);
            }
            shared.state = DraftState::Saving;
            let mut sent = shared.draft.clone();
            sent.title = shared.draft.coerced_title();
            (shared.note_id, sent, shared.draft.clone())
        };

        let result = self.write(note_id, &sent).await;

        match result {
            Ok(note) => {
                let rearm = {
                    let mut shared = self.lock();
                    shared.note_id = Some(note.id);
                    shared.created_at_utc = Some(note.created_at_utc);
                    shared.updated_at_utc = Some(note.updated_at_utc);
                    shared.baseline = DraftFields {
                        title: note.title.clone(),
                        content: note.content.clone(),
                        tags: sent.tags.clone(),
                        folder_id: note.folder_id,
                    };
                    shared.last_error = None;
                    shared.rearm_after_save = false;
                    if shared.draft == observed {
                        // No edits raced the save; the draft adopts the
                        // committed values (including title coercion).
                        shared.draft = shared.baseline.clone();
                        shared.state = DraftState::Clean;
                    } else {
                        shared.state = DraftState::Dirty;
                    }
                    shared.state == DraftState::Dirty
                };
                debug!(note_id = %note.id, ?trigger, "draft committed");
                if trigger == SaveTrigger::Explicit {
                    self.notifier.notify(Notice::info("Note saved"));
                }
                if rearm && prefs.autosave_enabled {
                    let interval = Self::interval(&self.lock(), &prefs);
                    self.arm_timer(interval);
                }
                Ok(CommitOutcome::Committed(note))
            }
            Err(e) => {
                {
                    let mut shared = self.lock();
                    shared.state = DraftState::Dirty;
                    shared.last_error = Some(SaveError {
                        message: e.to_string(),
                        transient: e.is_transient(),
                    });
                    shared.rearm_after_save = false;
                }
                self.notifier
                    .notify(Notice::error("Save failed", e.to_string()));
                if prefs.autosave_enabled {
                    let interval = Self::interval(&self.lock(), &prefs);
                    self.arm_timer(interval);
                }
                Err(e)
            }
        }
    }

    async fn write(&self, note_id: Option<Uuid>, sent: &DraftFields) -> Result<Note> {
        let tag_ids: Vec<Uuid> = sent.tags.iter().copied().collect();
        match note_id {
            None => {
                // First commit of a new document: insert, no history entry.
                self.service
                    .insert_note(NewNote {
                        title: sent.title.clone(),
                        content: sent.content.clone(),
                        folder_id: sent.folder_id,
                        tag_ids,
                    })
                    .await
            }
            Some(id) => {
                let note = self
                    .service
                    .update_note(
                        id,
                        NoteChanges {
                            title: Some(sent.title.clone()),
                            content: Some(sent.content.clone()),
                            starred: None,
                            folder_id: Some(sent.folder_id),
                        },
                    )
                    .await?;
                self.service.set_note_tags(id, &tag_ids).await?;
                if self.service.supports_history() {
                    self.service
                        .append_history(
                            id,
                            HistorySnapshot {
                                title: sent.title.clone(),
                                content: sent.content.clone(),
                                tag_ids: sent.tags.iter().copied().collect(),
                                folder_id: sent.folder_id,
                            },
                        )
                        .await?;
                }
                Ok(note)
            }
        }
    }
}

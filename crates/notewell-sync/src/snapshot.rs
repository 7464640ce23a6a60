//! Local snapshot store.
//!
//! The in-memory collection of notes, folders, and tags a view works
//! against. Each view owns its own store — there is deliberately no shared
//! global copy; independent views converge through the change feed instead
//! of through shared state.
//!
//! Every mutation keeps the ordering invariants (notes by update time
//! descending, folders and tags by case-insensitive name) and is idempotent
//! against replays: inserting a present id, or updating/deleting an absent
//! one, is a no-op rather than an error.

use std::collections::BTreeSet;

use tracing::{debug, warn};
use uuid::Uuid;

use notewell_core::{
    ChangeEvent, ChangeOp, DataService, Folder, Note, NoteWithTags, Result, Row, Tag, TableKind,
};

/// A point-in-time collection of the data a view renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Sorted by `updated_at_utc` descending.
    pub notes: Vec<NoteWithTags>,
    /// Sorted by case-insensitive name.
    pub folders: Vec<Folder>,
    /// Sorted by case-insensitive name.
    pub tags: Vec<Tag>,
}

/// What applying a feed event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The event was merged into the snapshot.
    Merged,
    /// The event was recognized as already applied (an optimistic local
    /// write raced its own echo) and discarded.
    Deduplicated,
    /// Tag or junction change: the caller should re-run a full load rather
    /// than patch denormalized tag lists incrementally.
    NeedsReload,
    /// The event does not affect this snapshot.
    Ignored,
}

/// One view's authoritative in-memory state.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshot: Snapshot,
    loaded: bool,
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Whether at least one load has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replace the snapshot from the backend.
    ///
    /// Issues the four reads in parallel and assembles the enriched view.
    /// If any read fails the prior snapshot is kept untouched (empty if
    /// nothing was ever loaded) and the error is returned; the store is
    /// never left partially updated.
    pub async fn load(&mut self, service: &dyn DataService) -> Result<()> {
        let (notes, folders, tags, links) = tokio::try_join!(
            service.list_notes(),
            service.list_folders(),
            service.list_tags(),
            service.list_note_tags(),
        )?;
        debug!(
            result_count = notes.len(),
            folders = folders.len(),
            tags = tags.len(),
            "snapshot loaded"
        );
        self.snapshot = Self::assemble(notes, folders, tags, links);
        self.loaded = true;
        Ok(())
    }

    fn assemble(
        notes: Vec<Note>,
        mut folders: Vec<Folder>,
        mut tags: Vec<Tag>,
        links: Vec<notewell_core::NoteTagLink>,
    ) -> Snapshot {
        folders.sort_by_key(|f| name_key(&f.name));
        tags.sort_by_key(|t| name_key(&t.name));
        let mut enriched: Vec<NoteWithTags> = notes
            .into_iter()
            .map(|note| {
                let note_tags: Vec<Tag> = tags
                    .iter()
                    .filter(|t| {
                        links
                            .iter()
                            .any(|l| l.note_id == note.id && l.tag_id == t.id)
                    })
                    .cloned()
                    .collect();
                NoteWithTags { note, tags: note_tags }
            })
            .collect();
        enriched.sort_by(|a, b| b.note.updated_at_utc.cmp(&a.note.updated_at_utc));
        Snapshot {
            notes: enriched,
            folders,
            tags,
        }
    }

    fn resort_notes(&mut self) {
        self.snapshot
            .notes
            .sort_by(|a, b| b.note.updated_at_utc.cmp(&a.note.updated_at_utc));
    }

    // -------------------------------------------------------------------
    // Optimistic local mutations
    // -------------------------------------------------------------------

    /// Insert a note locally. No-op if the id is already present.
    pub fn insert_note_local(&mut self, doc: NoteWithTags) {
        if self.snapshot.notes.iter().any(|n| n.note.id == doc.note.id) {
            return;
        }
        self.snapshot.notes.push(doc);
        self.resort_notes();
    }

    /// Replace a note locally. No-op if the id is absent.
    pub fn update_note_local(&mut self, doc: NoteWithTags) {
        if let Some(existing) = self
            .snapshot
            .notes
            .iter_mut()
            .find(|n| n.note.id == doc.note.id)
        {
            *existing = doc;
            self.resort_notes();
        }
    }

    /// Remove a note locally. No-op if the id is absent.
    pub fn remove_note_local(&mut self, id: Uuid) {
        self.snapshot.notes.retain(|n| n.note.id != id);
    }

    /// Flip the starred flag locally (optimistic; before any acknowledgment).
    pub fn set_starred_local(&mut self, id: Uuid, starred: bool) {
        if let Some(doc) = self.snapshot.notes.iter_mut().find(|n| n.note.id == id) {
            doc.note.starred = starred;
        }
    }

    pub fn insert_folder_local(&mut self, folder: Folder) {
        if self.snapshot.folders.iter().any(|f| f.id == folder.id) {
            return;
        }
        self.snapshot.folders.push(folder);
        self.snapshot.folders.sort_by_key(|f| name_key(&f.name));
    }

    pub fn insert_tag_local(&mut self, tag: Tag) {
        if self.snapshot.tags.iter().any(|t| t.id == tag.id) {
            return;
        }
        self.snapshot.tags.push(tag);
        self.snapshot.tags.sort_by_key(|t| name_key(&t.name));
    }

    // -------------------------------------------------------------------
    // Feed application
    // -------------------------------------------------------------------

    /// Merge one change-feed event.
    ///
    /// Insert: first writer wins locally — an id already present (from an
    /// optimistic write) discards the echo. Update: replace in place, or
    /// insert if absent (self-healing against missed events). Delete:
    /// remove, no-op when already gone. Tag and junction events report
    /// [`Applied::NeedsReload`] instead of patching denormalized tag lists.
    pub fn apply_change(&mut self, event: &ChangeEvent) -> Applied {
        match event.table() {
            TableKind::Tags | TableKind::NoteTags => Applied::NeedsReload,
            TableKind::Flashcards => Applied::Ignored,
            TableKind::Notes => self.apply_note_change(event),
            TableKind::Folders => self.apply_folder_change(event),
        }
    }

    fn apply_note_change(&mut self, event: &ChangeEvent) -> Applied {
        match event.op {
            ChangeOp::Insert => {
                let Some(Row::Note(note)) = event.new.clone() else {
                    warn!("note insert event without post-image");
                    return Applied::Ignored;
                };
                if self.snapshot.notes.iter().any(|n| n.note.id == note.id) {
                    return Applied::Deduplicated;
                }
                self.snapshot.notes.push(NoteWithTags::untagged(note));
                self.resort_notes();
                Applied::Merged
            }
            ChangeOp::Update => {
                let Some(Row::Note(note)) = event.new.clone() else {
                    warn!("note update event without post-image");
                    return Applied::Ignored;
                };
                if let Some(existing) = self
                    .snapshot
                    .notes
                    .iter_mut()
                    .find(|n| n.note.id == note.id)
                {
                    // Resolved tags ride along; the feed's note row does not
                    // carry them.
                    existing.note = note;
                } else {
                    self.snapshot.notes.push(NoteWithTags::untagged(note));
                }
                self.resort_notes();
                Applied::Merged
            }
            ChangeOp::Delete => {
                let id = event.entity_id();
                let before = self.snapshot.notes.len();
                self.snapshot.notes.retain(|n| n.note.id != id);
                if self.snapshot.notes.len() == before {
                    Applied::Deduplicated
                } else {
                    Applied::Merged
                }
            }
        }
    }

    fn apply_folder_change(&mut self, event: &ChangeEvent) -> Applied {
        match event.op {
            ChangeOp::Insert => {
                let Some(Row::Folder(folder)) = event.new.clone() else {
                    return Applied::Ignored;
                };
                if self.snapshot.folders.iter().any(|f| f.id == folder.id) {
                    return Applied::Deduplicated;
                }
                self.insert_folder_local(folder);
                Applied::Merged
            }
            ChangeOp::Update => {
                let Some(Row::Folder(folder)) = event.new.clone() else {
                    return Applied::Ignored;
                };
                if let Some(existing) =
                    self.snapshot.folders.iter_mut().find(|f| f.id == folder.id)
                {
                    *existing = folder;
                } else {
                    self.snapshot.folders.push(folder);
                }
                self.snapshot.folders.sort_by_key(|f| name_key(&f.name));
                Applied::Merged
            }
            ChangeOp::Delete => {
                let id = event.entity_id();
                let before = self.snapshot.folders.len();
                self.snapshot.folders.retain(|f| f.id != id);
                if self.snapshot.folders.len() == before {
                    Applied::Deduplicated
                } else {
                    Applied::Merged
                }
            }
        }
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Case-insensitive title/content substring filter.
    pub fn search(&self, query: &str) -> Vec<&NoteWithTags> {
        let needle = query.to_lowercase();
        if needle.trim().is_empty() {
            return Vec::new();
        }
        self.snapshot
            .notes
            .iter()
            .filter(|n| {
                n.note.title.to_lowercase().contains(&needle)
                    || n.note.content.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Starred notes, in snapshot order.
    pub fn starred(&self) -> Vec<&NoteWithTags> {
        self.snapshot
            .notes
            .iter()
            .filter(|n| n.note.starred)
            .collect()
    }

    /// One note with its resolved tag ids, if present.
    pub fn note(&self, id: Uuid) -> Option<&NoteWithTags> {
        self.snapshot.notes.iter().find(|n| n.note.id == id)
    }

    /// Tag ids of one note, for seeding a draft.
    pub fn tag_ids_for(&self, id: Uuid) -> BTreeSet<Uuid> {
        self.note(id).map(|n| n.tag_ids()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use notewell_core::NoteTagLink;

    fn note(id: u128, title: &str, minutes_ago: i64) -> Note {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        Note {
            id: Uuid::from_u128(id),
            user_id: "u1".into(),
            title: title.into(),
            content: String::new(),
            starred: false,
            folder_id: None,
            created_at_utc: at,
            updated_at_utc: at,
        }
    }

    fn tag(id: u128, name: &str) -> Tag {
        Tag {
            id: Uuid::from_u128(id),
            user_id: "u1".into(),
            name: name.into(),
            color: "#fff".into(),
        }
    }

    fn folder(id: u128, name: &str) -> Folder {
        Folder {
            id: Uuid::from_u128(id),
            user_id: "u1".into(),
            name: name.into(),
            color: "#fff".into(),
        }
    }

    fn store_with(notes: Vec<Note>) -> SnapshotStore {
        let mut store = SnapshotStore::new();
        store.snapshot = SnapshotStore::assemble(notes, vec![], vec![], vec![]);
        store
    }

    #[test]
    fn test_assemble_enriches_and_sorts() {
        let notes = vec![note(1, "old", 60), note(2, "new", 1)];
        let tags = vec![tag(10, "beta"), tag(11, "Alpha")];
        let links = vec![NoteTagLink {
            note_id: Uuid::from_u128(1),
            tag_id: Uuid::from_u128(11),
        }];
        let snap = SnapshotStore::assemble(notes, vec![], tags, links);

        assert_eq!(snap.notes[0].note.title, "new");
        assert_eq!(snap.notes[1].tags.len(), 1);
        assert_eq!(snap.notes[1].tags[0].name, "Alpha");
        // case-insensitive order
        assert_eq!(snap.tags[0].name, "Alpha");
        assert_eq!(snap.tags[1].name, "beta");
    }

    #[test]
    fn test_optimistic_insert_then_echo_dedups() {
        let mut store = store_with(vec![]);
        let n = note(1, "mine", 0);

        store.insert_note_local(NoteWithTags::untagged(n.clone()));
        let applied = store.apply_change(&ChangeEvent::inserted(Row::Note(n)));

        assert_eq!(applied, Applied::Deduplicated);
        assert_eq!(store.snapshot().notes.len(), 1);
    }

    #[test]
    fn test_insert_local_is_idempotent() {
        let mut store = store_with(vec![]);
        let n = NoteWithTags::untagged(note(1, "once", 0));
        store.insert_note_local(n.clone());
        store.insert_note_local(n);
        assert_eq!(store.snapshot().notes.len(), 1);
    }

    #[test]
    fn test_update_of_absent_note_self_heals_as_insert() {
        let mut store = store_with(vec![]);
        let n = note(1, "healed", 0);

        let applied = store.apply_change(&ChangeEvent::updated(
            Row::Note(n.clone()),
            Row::Note(n),
        ));

        assert_eq!(applied, Applied::Merged);
        assert_eq!(store.snapshot().notes.len(), 1);
    }

    #[test]
    fn test_delete_twice_is_same_as_once() {
        let n = note(1, "doomed", 0);
        let mut store = store_with(vec![n.clone()]);

        let ev = ChangeEvent::deleted(Row::Note(n));
        assert_eq!(store.apply_change(&ev), Applied::Merged);
        let after_first = store.snapshot().clone();
        assert_eq!(store.apply_change(&ev), Applied::Deduplicated);
        assert_eq!(store.snapshot(), &after_first);
    }

    #[test]
    fn test_tag_and_junction_events_request_reload() {
        let mut store = store_with(vec![]);

        let t = tag(1, "x");
        assert_eq!(
            store.apply_change(&ChangeEvent::inserted(Row::Tag(t))),
            Applied::NeedsReload
        );
        let link = NoteTagLink {
            note_id: Uuid::from_u128(1),
            tag_id: Uuid::from_u128(2),
        };
        assert_eq!(
            store.apply_change(&ChangeEvent::inserted(Row::NoteTag(link))),
            Applied::NeedsReload
        );
    }

    #[test]
    fn test_folder_events_apply_incrementally() {
        let mut store = store_with(vec![]);

        let f = folder(1, "Work");
        assert_eq!(
            store.apply_change(&ChangeEvent::inserted(Row::Folder(f.clone()))),
            Applied::Merged
        );
        // Echo after a local optimistic insert is discarded
        assert_eq!(
            store.apply_change(&ChangeEvent::inserted(Row::Folder(f.clone()))),
            Applied::Deduplicated
        );

        let mut renamed = f.clone();
        renamed.name = "Archive".into();
        store.apply_change(&ChangeEvent::updated(Row::Folder(f.clone()), Row::Folder(renamed)));
        assert_eq!(store.snapshot().folders[0].name, "Archive");

        store.apply_change(&ChangeEvent::deleted(Row::Folder(f)));
        assert!(store.snapshot().folders.is_empty());
    }

    #[test]
    fn test_feed_update_preserves_resolved_tags() {
        let n = note(1, "tagged", 0);
        let t = tag(10, "keep");
        let links = vec![NoteTagLink { note_id: n.id, tag_id: t.id }];
        let mut store = SnapshotStore::new();
        store.snapshot = SnapshotStore::assemble(vec![n.clone()], vec![], vec![t], links);

        let mut edited = n.clone();
        edited.content = "new content".into();
        store.apply_change(&ChangeEvent::updated(Row::Note(n), Row::Note(edited)));

        let doc = store.note(Uuid::from_u128(1)).unwrap();
        assert_eq!(doc.note.content, "new content");
        assert_eq!(doc.tags.len(), 1);
    }

    #[test]
    fn test_search_matches_title_and_content_case_insensitive() {
        let mut a = note(1, "Grocery List", 0);
        a.content = "<p>Buy milk</p>".into();
        let b = note(2, "Travel", 5);
        let store = store_with(vec![a, b]);

        assert_eq!(store.search("grocery").len(), 1);
        assert_eq!(store.search("MILK").len(), 1);
        assert_eq!(store.search("").len(), 0);
        assert_eq!(store.search("nothing").len(), 0);
    }

    #[test]
    fn test_starred_filter_reflects_local_toggle() {
        let n = note(1, "fav", 0);
        let mut store = store_with(vec![n]);
        assert!(store.starred().is_empty());

        store.set_starred_local(Uuid::from_u128(1), true);
        assert_eq!(store.starred().len(), 1);

        // Replaying the same local toggle changes nothing
        store.set_starred_local(Uuid::from_u128(1), true);
        assert_eq!(store.starred().len(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_prior_snapshot() {
        use notewell_core::{DataService, NewNote};
        use notewell_data::MemoryService;

        let svc = MemoryService::new("u1");
        svc.insert_note(NewNote { title: "kept".into(), ..Default::default() })
            .await
            .unwrap();

        let mut store = SnapshotStore::new();
        store.load(&svc).await.unwrap();
        assert_eq!(store.snapshot().notes.len(), 1);

        svc.fail_reads(true);
        assert!(store.load(&svc).await.is_err());
        // prior snapshot intact, not partially cleared
        assert_eq!(store.snapshot().notes.len(), 1);
        assert!(store.is_loaded());
    }
}

//! One-shot user actions over the snapshot store.
//!
//! Star toggles, deletes, and creates apply to the local snapshot
//! optimistically — before any network acknowledgment — so the UI reflects
//! intent immediately. On a backend failure the local change is rolled back
//! to the last-known-good state and the error is reported through the
//! notice channel; nothing is silently lost. The eventual feed echo of a
//! successful action is recognized and discarded by the snapshot merge
//! rules, so there is no duplication or flicker.

use tracing::debug;
use uuid::Uuid;

use notewell_core::{
    defaults, DataService, Error, Folder, NewFolder, NewNote, NewTag, Note, NoteWithTags, Notice,
    Notifier, Result, Tag,
};

use crate::snapshot::SnapshotStore;

/// Create a note with the default title and empty content, persisted
/// immediately and prepended to the snapshot.
pub async fn create_note(
    store: &mut SnapshotStore,
    service: &dyn DataService,
    notifier: &Notifier,
) -> Result<Note> {
    let note = service
        .insert_note(NewNote {
            title: defaults::UNTITLED.to_string(),
            ..Default::default()
        })
        .await
        .inspect_err(|e| {
            notifier.notify(Notice::error("Error creating note", e.to_string()));
        })?;
    store.insert_note_local(NoteWithTags::untagged(note.clone()));
    notifier.notify(Notice::info("Note created"));
    Ok(note)
}

/// Toggle a note's star, optimistically. Returns the new starred value.
pub async fn toggle_star(
    store: &mut SnapshotStore,
    service: &dyn DataService,
    notifier: &Notifier,
    id: Uuid,
) -> Result<bool> {
    let current = store
        .note(id)
        .map(|doc| doc.note.starred)
        .ok_or(Error::NoteNotFound(id))?;
    let target = !current;

    store.set_starred_local(id, target);
    match service.set_starred(id, target).await {
        Ok(note) => {
            // Adopt the authoritative post-write row; resolved tags ride
            // along unchanged.
            let tags = store.note(id).map(|doc| doc.tags.clone()).unwrap_or_default();
            store.update_note_local(NoteWithTags { note, tags });
            debug!(note_id = %id, starred = target, "star toggled");
            Ok(target)
        }
        Err(e) => {
            store.set_starred_local(id, current);
            notifier.notify(Notice::error("Error updating note", e.to_string()));
            Err(e)
        }
    }
}

/// Delete a note, optimistically removing it from the snapshot.
pub async fn delete_note(
    store: &mut SnapshotStore,
    service: &dyn DataService,
    notifier: &Notifier,
    id: Uuid,
) -> Result<()> {
    let prior = store.note(id).cloned();
    store.remove_note_local(id);
    match service.delete_note(id).await {
        Ok(()) => {
            notifier.notify(Notice::info("Note deleted"));
            Ok(())
        }
        Err(e) => {
            if let Some(doc) = prior {
                store.insert_note_local(doc);
            }
            notifier.notify(Notice::error("Delete failed", e.to_string()));
            Err(e)
        }
    }
}

/// Create a folder and add it to the snapshot.
pub async fn create_folder(
    store: &mut SnapshotStore,
    service: &dyn DataService,
    notifier: &Notifier,
    name: &str,
    color: &str,
) -> Result<Folder> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("folder name cannot be empty".into()));
    }
    let folder = service
        .insert_folder(NewFolder {
            name: name.to_string(),
            color: color.to_string(),
        })
        .await
        .inspect_err(|e| {
            notifier.notify(Notice::error("Error creating folder", e.to_string()));
        })?;
    store.insert_folder_local(folder.clone());
    notifier.notify(Notice::info(format!("Created folder \"{}\"", folder.name)));
    Ok(folder)
}

/// Create a tag and add it to the snapshot.
///
/// A duplicate name is a recoverable validation error: it is reported and
/// the snapshot is left unchanged.
pub async fn create_tag(
    store: &mut SnapshotStore,
    service: &dyn DataService,
    notifier: &Notifier,
    name: &str,
) -> Result<Tag> {
    let tag = service
        .insert_tag(NewTag {
            name: name.trim().to_string(),
            color: defaults::DEFAULT_SWATCH.to_string(),
        })
        .await
        .inspect_err(|e| {
            notifier.notify(Notice::error("Error creating tag", e.to_string()));
        })?;
    store.insert_tag_local(tag.clone());
    Ok(tag)
}

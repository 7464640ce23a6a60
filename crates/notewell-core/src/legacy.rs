//! Adapter for the legacy denormalized tag shape.
//!
//! Earlier schema revisions stored tags as a string array directly on each
//! note. The normalized many-to-many model is canonical; this module maps
//! the old shape onto it. In the degenerate array shape a tag's name *is*
//! its identity, so ids are derived deterministically from the name: the
//! same name always adapts to the same tag id, and re-running the adapter
//! over the same data is idempotent.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::defaults;
use crate::models::{NoteTagLink, Tag};

/// Derive the stable id for a legacy tag name.
///
/// First 16 bytes of `sha256(trimmed name)` reinterpreted as a UUID.
pub fn tag_id_for_name(name: &str) -> Uuid {
    let digest = Sha256::digest(name.trim().as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Adapt a legacy tag-name array to normalized tags.
///
/// Names are trimmed; empties are dropped; duplicates (exact, post-trim)
/// collapse to one tag. Order of first appearance is preserved.
pub fn tags_from_names<I, S>(user_id: &str, names: I) -> Vec<Tag>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut tags = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() || !seen.insert(name.to_string()) {
            continue;
        }
        tags.push(Tag {
            id: tag_id_for_name(name),
            user_id: user_id.to_string(),
            name: name.to_string(),
            color: defaults::DEFAULT_SWATCH.to_string(),
        });
    }
    tags
}

/// Junction rows linking a note to adapted tags.
pub fn links_for(note_id: Uuid, tags: &[Tag]) -> Vec<NoteTagLink> {
    tags.iter()
        .map(|t| NoteTagLink { note_id, tag_id: t.id })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_id_is_deterministic() {
        assert_eq!(tag_id_for_name("travel"), tag_id_for_name("travel"));
        assert_eq!(tag_id_for_name(" travel "), tag_id_for_name("travel"));
        assert_ne!(tag_id_for_name("travel"), tag_id_for_name("Travel"));
    }

    #[test]
    fn test_tags_from_names_dedups_and_drops_empties() {
        let tags = tags_from_names("u1", ["ai", "", "  ", "demo", "ai"]);
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["ai", "demo"]);
    }

    #[test]
    fn test_adapter_is_idempotent() {
        let first = tags_from_names("u1", ["meeting", "roadmap"]);
        let second = tags_from_names("u1", ["meeting", "roadmap"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_links_for_pairs_every_tag() {
        let note_id = Uuid::nil();
        let tags = tags_from_names("u1", ["a", "b"]);
        let links = links_for(note_id, &tags);
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.note_id == note_id));
        assert_eq!(links[0].tag_id, tags[0].id);
    }
}

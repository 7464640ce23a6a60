//! Change feed reconciliation.
//!
//! Keeps a view's [`SnapshotStore`] eventually consistent with the backend
//! by consuming its per-table change feed. Several views may subscribe to
//! the same table at once; each applies events to its own store with the
//! shared merge rules in [`SnapshotStore::apply_change`], so every copy
//! converges on the same final state without coordinating with the others.
//!
//! A subscription is a resource: it unsubscribes when dropped. A dropped or
//! lagged feed is *not* retried here — reconnection policy belongs to the
//! transport collaborator — but [`FeedSubscription::is_live`] lets a view
//! show a staleness indicator.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use notewell_core::{ChangeEvent, DataService, Result, TableKind};

use crate::snapshot::{Applied, SnapshotStore};

/// One view's subscription to one table of the change feed.
///
/// Dropping the subscription detaches it from the feed; pair every
/// subscribe with a drop on view teardown.
pub struct FeedSubscription {
    table: TableKind,
    rx: broadcast::Receiver<ChangeEvent>,
    live: bool,
}

impl FeedSubscription {
    /// Subscribe to `table` on the service's change feed.
    pub fn subscribe(service: &dyn DataService, table: TableKind) -> Self {
        debug!(table = %table, "feed subscribe");
        Self {
            table,
            rx: service.changes(),
            live: true,
        }
    }

    pub fn table(&self) -> TableKind {
        self.table
    }

    /// Whether the subscription is still delivering a complete stream.
    /// False once the feed closed or this receiver lagged and lost events.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Next event for this table, or `None` once the feed is closed.
    ///
    /// Lag is not fatal: the subscription keeps delivering what remains but
    /// is marked stale, since events were lost.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.table() == self.table => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!(table = %self.table, missed, "feed subscription lagged");
                    self.live = false;
                }
                Err(RecvError::Closed) => {
                    self.live = false;
                    return None;
                }
            }
        }
    }

    /// Receive and merge the next event into `store`.
    ///
    /// This is the one reconciliation path every view uses; the merge rules
    /// live in [`SnapshotStore::apply_change`] so independent subscribers
    /// cannot drift. A [`Applied::NeedsReload`] outcome re-runs the full
    /// load against `service` before returning.
    ///
    /// Returns `Ok(None)` once the feed is closed.
    pub async fn apply_next(
        &mut self,
        store: &mut SnapshotStore,
        service: &dyn DataService,
    ) -> Result<Option<Applied>> {
        let Some(event) = self.next().await else {
            return Ok(None);
        };
        let applied = store.apply_change(&event);
        if applied == Applied::NeedsReload {
            store.load(service).await?;
        }
        Ok(Some(applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notewell_core::{DataService, NewNote, NewTag, NoteChanges};
    use notewell_data::MemoryService;

    #[tokio::test]
    async fn test_subscription_filters_by_table() {
        let svc = MemoryService::new("u1");
        let mut notes_sub = FeedSubscription::subscribe(&svc, TableKind::Notes);
        let mut folders_sub = FeedSubscription::subscribe(&svc, TableKind::Folders);

        svc.insert_note(NewNote::default()).await.unwrap();
        svc.insert_folder(notewell_core::NewFolder {
            name: "Work".into(),
            color: "#fff".into(),
        })
        .await
        .unwrap();

        let ev = notes_sub.next().await.unwrap();
        assert_eq!(ev.table(), TableKind::Notes);
        let ev = folders_sub.next().await.unwrap();
        assert_eq!(ev.table(), TableKind::Folders);
    }

    #[tokio::test]
    async fn test_independent_subscribers_converge() {
        let svc = MemoryService::new("u1");

        // Two views, each with its own store and its own subscription.
        let mut store_a = SnapshotStore::new();
        let mut store_b = SnapshotStore::new();
        store_a.load(&svc).await.unwrap();
        store_b.load(&svc).await.unwrap();
        let mut sub_a = FeedSubscription::subscribe(&svc, TableKind::Notes);
        let mut sub_b = FeedSubscription::subscribe(&svc, TableKind::Notes);

        let note = svc
            .insert_note(NewNote { title: "shared".into(), ..Default::default() })
            .await
            .unwrap();
        svc.update_note(
            note.id,
            NoteChanges { content: Some("v2".into()), ..Default::default() },
        )
        .await
        .unwrap();

        for _ in 0..2 {
            sub_a.apply_next(&mut store_a, &svc).await.unwrap();
        }
        for _ in 0..2 {
            sub_b.apply_next(&mut store_b, &svc).await.unwrap();
        }

        assert_eq!(store_a.snapshot(), store_b.snapshot());
        assert_eq!(store_a.snapshot().notes[0].note.content, "v2");
    }

    #[tokio::test]
    async fn test_tag_event_triggers_full_reload() {
        let svc = MemoryService::new("u1");
        let mut store = SnapshotStore::new();
        store.load(&svc).await.unwrap();
        let mut sub = FeedSubscription::subscribe(&svc, TableKind::Tags);

        svc.insert_tag(NewTag { name: "fresh".into(), color: "#fff".into() })
            .await
            .unwrap();

        let applied = sub.apply_next(&mut store, &svc).await.unwrap();
        assert_eq!(applied, Some(Applied::NeedsReload));
        // The reload picked the new tag up even though tag events are never
        // merged incrementally.
        assert_eq!(store.snapshot().tags.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_feed_marks_subscription_dead() {
        let svc = MemoryService::new("u1");
        let mut sub = FeedSubscription::subscribe(&svc, TableKind::Notes);
        assert!(sub.is_live());

        drop(svc);

        assert!(sub.next().await.is_none());
        assert!(!sub.is_live());
    }

    #[tokio::test]
    async fn test_unsubscribe_on_drop_releases_feed_consumer() {
        let svc = MemoryService::new("u1");
        let sub = FeedSubscription::subscribe(&svc, TableKind::Notes);
        let sub2 = FeedSubscription::subscribe(&svc, TableKind::Folders);

        drop(sub);
        drop(sub2);

        // All consumers released; an emit finds nobody listening.
        svc.insert_note(NewNote::default()).await.unwrap();
    }
}

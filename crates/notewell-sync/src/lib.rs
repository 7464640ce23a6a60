//! # notewell-sync
//!
//! The client-side data core of notewell: every view's in-memory snapshot,
//! the change-feed reconciliation that keeps snapshots eventually consistent
//! with the backend, the draft/autosave controller for the editor, and the
//! optimistic one-shot actions.
//!
//! Dependency order, leaves first: the mode selector (`notewell-data`)
//! gates which backend these components talk to; [`snapshot`] holds the
//! data; [`reconcile`] keeps it current; [`draft`] manages the single
//! document being edited.

pub mod actions;
pub mod draft;
pub mod reconcile;
pub mod snapshot;

pub use draft::{
    CommitOutcome, DraftController, DraftFields, DraftState, SaveError, SaveTrigger,
};
pub use reconcile::FeedSubscription;
pub use snapshot::{Applied, Snapshot, SnapshotStore};

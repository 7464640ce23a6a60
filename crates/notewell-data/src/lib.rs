//! # notewell-data
//!
//! Persisted local state and backend data service implementations:
//!
//! - [`kv`] — file-backed key/value store (browser-local storage stand-in)
//! - [`prefs`] — user preferences with live watch-channel fan-out
//! - [`fallback`] — the seeded demo dataset and its data service
//! - [`memory`] — in-memory server double with change-feed echo
//! - [`remote`] — REST client for the managed backend
//! - [`session`] — mode selection and the mode-gated data router

pub mod fallback;
pub mod kv;
pub mod memory;
pub mod prefs;
pub mod remote;
pub mod session;

pub use fallback::FallbackService;
pub use kv::KvStore;
pub use memory::MemoryService;
pub use prefs::PreferencesHub;
pub use remote::{RemoteConfig, RestService};
pub use session::{Session, SessionMode, Workspace};

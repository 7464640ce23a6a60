//! # notewell-core
//!
//! Core types, traits, and abstractions for the notewell note-taking
//! application.
//!
//! This crate provides the domain models, the backend data service
//! contract, the change-feed event types, and the error type that the
//! other notewell crates depend on.

pub mod defaults;
pub mod error;
pub mod events;
pub mod legacy;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{
    ChangeEvent, ChangeFeed, ChangeOp, Notice, NoticeLevel, Notifier, Row, TableKind,
};
pub use models::*;
pub use traits::*;

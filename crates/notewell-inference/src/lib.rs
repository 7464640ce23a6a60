//! # notewell-inference
//!
//! Client for the AI text service: the editor's assist actions
//! (improve/summarize/expand/tone/generate) and flashcard generation,
//! against an OpenAI-compatible chat-completions gateway.
//!
//! Every failure here is recoverable by design — an AI error never blocks
//! the editor or ends the session; callers surface it inline next to the
//! triggering action.

pub mod assist;
pub mod client;
pub mod flashcards;
pub mod format;

pub use assist::{assist, AssistAction};
pub use client::{TextServiceClient, TextServiceConfig};
pub use flashcards::{generate_flashcards, GeneratedFlashcard};

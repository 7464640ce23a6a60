//! Centralized default constants for the notewell system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// AUTOSAVE
// =============================================================================

/// Debounce interval for autosaving an existing note (milliseconds).
pub const AUTOSAVE_INTERVAL_MS: u64 = 1000;

/// Debounce interval for the first save of a brand-new note (milliseconds).
/// Longer than the update interval so a note isn't persisted off a single
/// keystroke.
pub const NEW_NOTE_AUTOSAVE_INTERVAL_MS: u64 = 2000;

/// Smallest configurable autosave interval (milliseconds).
pub const AUTOSAVE_INTERVAL_MIN_MS: u64 = 500;

/// Largest configurable autosave interval (milliseconds).
pub const AUTOSAVE_INTERVAL_MAX_MS: u64 = 10_000;

// =============================================================================
// NOTES
// =============================================================================

/// Title substituted for empty or whitespace-only titles at commit time.
pub const UNTITLED: &str = "Untitled";

// =============================================================================
// CHANGE FEED
// =============================================================================

/// Broadcast buffer capacity for the change feed in production.
pub const FEED_CAPACITY: usize = 256;

/// Broadcast buffer capacity recommended for tests.
pub const FEED_CAPACITY_TEST: usize = 32;

// =============================================================================
// FALLBACK (DEMO) MODE
// =============================================================================

/// Owner id recorded on all fallback-mode entities.
pub const FALLBACK_USER_ID: &str = "demo-user";

/// Email on the persisted fallback identity record.
pub const FALLBACK_USER_EMAIL: &str = "demo@notewell.app";

/// Age after which a persisted fallback dataset is reset to its seed on
/// startup (seconds).
pub const FALLBACK_RESET_TTL_SECS: i64 = 24 * 60 * 60;

// =============================================================================
// FOLDERS
// =============================================================================

/// Swatch palette offered when creating a folder. First entry is the default.
pub const FOLDER_COLORS: [&str; 7] = [
    "#6366f1", // blue
    "#10b981", // green
    "#ef4444", // red
    "#f59e0b", // yellow
    "#8b5cf6", // purple
    "#ec4899", // pink
    "#6b7280", // gray
];

/// Color assigned to tags and folders when none is chosen.
pub const DEFAULT_SWATCH: &str = FOLDER_COLORS[0];

// =============================================================================
// AI TEXT SERVICE
// =============================================================================

/// Default chat-completions model slug.
pub const AI_MODEL: &str = "google/gemini-2.5-flash";

/// Sampling temperature for assist and flashcard calls.
pub const AI_TEMPERATURE: f32 = 0.7;

/// Response token cap for assist and flashcard calls.
pub const AI_MAX_TOKENS: u32 = 2000;

/// Nucleus sampling parameter.
pub const AI_TOP_P: f32 = 0.9;

/// Frequency and presence penalty (both use the same value).
pub const AI_PENALTY: f32 = 0.1;

/// Number of flashcards requested per generation call.
pub const FLASHCARD_COUNT: usize = 5;

/// Timeout for AI text service requests (seconds).
pub const AI_TIMEOUT_SECS: u64 = 120;

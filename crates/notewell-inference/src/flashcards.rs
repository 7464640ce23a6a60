//! Flashcard generation from note content.
//!
//! One generation call produces one batch of question/answer pairs at a
//! chosen difficulty. The model is instructed to return a bare JSON array;
//! because it frequently wraps the array in markdown fences or prose, the
//! array is extracted by pattern before parsing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use notewell_core::{defaults, Difficulty, Error, Result};

use crate::client::TextServiceClient;

/// One generated question/answer pair, before it is persisted as a
/// [`notewell_core::Flashcard`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFlashcard {
    pub question: String,
    pub answer: String,
}

fn system_prompt(difficulty: Difficulty) -> String {
    let count = defaults::FLASHCARD_COUNT;
    match difficulty {
        Difficulty::Easy => format!(
            "You are an expert educator. Generate {count} simple flashcard questions from the \
             given content. Focus on basic facts, definitions, and key concepts. Each question \
             should test fundamental understanding."
        ),
        Difficulty::Medium => format!(
            "You are an expert educator. Generate {count} intermediate flashcard questions \
             from the given content. Focus on connections between concepts, applications, and \
             explanations. Require some analysis and understanding."
        ),
        Difficulty::Hard => format!(
            "You are an expert educator. Generate {count} challenging flashcard questions from \
             the given content. Focus on critical thinking, synthesis, evaluation, and complex \
             applications. Require deep understanding and analysis."
        ),
    }
}

fn user_prompt(content: &str) -> String {
    format!(
        "Generate flashcard questions from this content. Return ONLY a valid JSON array with \
         this exact format:\n\
         [\n  {{\n    \"question\": \"Question text here?\",\n    \"answer\": \"Answer text \
         here\"\n  }}\n]\n\n\
         Content to analyze:\n{content}"
    )
}

// Pull the JSON array out of the response, tolerating fences and prose
// around it.
fn extract_cards(text: &str) -> Result<Vec<GeneratedFlashcard>> {
    let array = Regex::new(r"(?s)\[.*\]")
        .unwrap()
        .find(text)
        .map(|m| m.as_str())
        .unwrap_or(text);
    serde_json::from_str(array).map_err(|e| {
        warn!(error = %e, "flashcard response was not a parseable JSON array");
        Error::Inference("failed to parse generated flashcards".into())
    })
}

/// Generate one batch of flashcards from note content.
pub async fn generate_flashcards(
    client: &TextServiceClient,
    content: &str,
    difficulty: Difficulty,
) -> Result<Vec<GeneratedFlashcard>> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::InvalidInput("content is required".into()));
    }
    info!(difficulty = %difficulty, prompt_len = content.len(), "generating flashcards");
    let raw = client
        .complete(&system_prompt(difficulty), &user_prompt(content))
        .await?;
    let cards = extract_cards(&raw)?;
    info!(result_count = cards.len(), "flashcards generated");
    Ok(cards)
}

//! The editor's assist actions.
//!
//! Five actions mirror the editor toolbar. Four rewrite the current note
//! content (improve, summarize, expand, tone); the fifth generates fresh
//! content from a free-form prompt. Each pairs a per-action system prompt
//! with the user input and upgrades plain-text responses to the HTML the
//! editor stores.
//!
//! Empty input is rejected locally before anything is sent.

use serde::{Deserialize, Serialize};
use tracing::info;

use notewell_core::{Error, Result};

use crate::client::TextServiceClient;
use crate::format;

/// Assist actions the AI text service supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistAction {
    Improve,
    Summarize,
    Expand,
    Tone,
    Generate,
}

impl std::fmt::Display for AssistAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Improve => write!(f, "improve"),
            Self::Summarize => write!(f, "summarize"),
            Self::Expand => write!(f, "expand"),
            Self::Tone => write!(f, "tone"),
            Self::Generate => write!(f, "generate"),
        }
    }
}

impl AssistAction {
    fn system_prompt(self) -> &'static str {
        match self {
            Self::Improve => {
                "You are an expert writing assistant. Improve the given text by making it \
                 clearer, more engaging, and better structured while maintaining the original \
                 meaning and tone. Format your response with proper paragraphs, lists, and \
                 structure. Use HTML formatting where appropriate (p, ul, ol, li, strong, em \
                 tags)."
            }
            Self::Summarize => {
                "You are an expert summarizer. Create concise, informative summaries that \
                 capture the key points and essential information. Format your response with \
                 clear paragraphs and bullet points using HTML formatting (p, ul, li tags)."
            }
            Self::Expand => {
                "You are a creative writing assistant. Expand the given text with relevant \
                 details, examples, and elaboration while maintaining consistency with the \
                 original content. Format your response with proper paragraphs, lists, and \
                 structure using HTML formatting."
            }
            Self::Tone => {
                "You are a writing style expert. Adjust the tone of the given text to be more \
                 professional, friendly, or appropriate for the intended audience. Format your \
                 response with proper paragraphs and structure using HTML formatting."
            }
            Self::Generate => {
                "You are a creative writing assistant. Generate high-quality, engaging content \
                 based on the user's prompt. Be informative, well-structured, and helpful. \
                 Format your response with proper paragraphs, headings, lists, and structure \
                 using HTML formatting (h3, p, ul, ol, li, strong, em tags)."
            }
        }
    }

    // The non-empty user message for this action, or a validation error.
    fn user_prompt(self, content: Option<&str>, prompt: Option<&str>) -> Result<String> {
        let require = |input: Option<&str>, what: &str| {
            input
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidInput(format!("{what} is required")))
        };
        match self {
            Self::Generate => require(prompt, "prompt"),
            Self::Improve => Ok(format!(
                "Please improve this text with proper formatting:\n\n{}",
                require(content, "content")?
            )),
            Self::Summarize => Ok(format!(
                "Please summarize this text with proper formatting:\n\n{}",
                require(content, "content")?
            )),
            Self::Expand => Ok(format!(
                "Please expand on this text with more details, examples, and proper \
                 formatting:\n\n{}",
                require(content, "content")?
            )),
            Self::Tone => Ok(format!(
                "Please adjust the tone of this text to be more professional and engaging, \
                 with proper formatting:\n\n{}",
                require(content, "content")?
            )),
        }
    }
}

/// Run one assist action, returning rich-text HTML for the editor.
pub async fn assist(
    client: &TextServiceClient,
    action: AssistAction,
    content: Option<&str>,
    prompt: Option<&str>,
) -> Result<String> {
    let user = action.user_prompt(content, prompt)?;
    info!(action = %action, prompt_len = user.len(), "assist requested");
    let raw = client.complete(action.system_prompt(), &user).await?;
    Ok(format::ensure_html(&raw))
}

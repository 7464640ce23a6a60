//! Plain-text to rich-text upgrade for model responses.
//!
//! The editor stores rich-text HTML. Models mostly comply with the "use HTML
//! formatting" instruction, but a plain-text response still comes back often
//! enough that it gets upgraded here: paragraphs split on blank lines,
//! numbered and bulleted runs folded into list markup. A response that
//! already carries block tags passes through untouched.

use regex::Regex;

fn numbered_item() -> Regex {
    Regex::new(r"^\d+[.)]\s").unwrap()
}

fn bulleted_item() -> Regex {
    Regex::new(r"^[*\-•]\s").unwrap()
}

/// Upgrade a model response to HTML unless it already is HTML.
pub fn ensure_html(text: &str) -> String {
    if text.contains("<p>") || text.contains("<ul>") || text.contains("<ol>") {
        return text.to_string();
    }
    let numbered = numbered_item();
    let bulleted = bulleted_item();
    text.split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            if numbered.is_match(block) {
                list(block, &numbered, "ol")
            } else if bulleted.is_match(block)
                || block.contains("\n* ")
                || block.contains("\n- ")
            {
                list(block, &bulleted, "ul")
            } else {
                format!("<p>{block}</p>")
            }
        })
        .collect()
}

// Fold a block of item lines into <ol>/<ul> markup. A line that matches the
// item prefix starts a new item; continuation lines join the current one.
fn list(block: &str, item: &Regex, tag: &str) -> String {
    let mut items: Vec<String> = Vec::new();
    for line in block.lines() {
        let trimmed = line.trim();
        if item.is_match(trimmed) {
            items.push(item.replace(trimmed, "").trim().to_string());
        } else if let Some(last) = items.last_mut() {
            last.push(' ');
            last.push_str(trimmed);
        } else {
            items.push(trimmed.to_string());
        }
    }
    let body: String = items
        .into_iter()
        .map(|item| format!("<li>{item}</li>"))
        .collect();
    format!("<{tag}>{body}</{tag}>")
}

// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory query construction.
//!
//! Raw user messages make poor retrieval queries at the extremes: "yes, do
//! that" carries no signal, and a 2000-character brain dump drowns it. The
//! query is kept inside a configured character band by padding short messages
//! with salient terms from the prior assistant turn and truncating long ones
//! at a sentence boundary.

/// Common words excluded when harvesting salient terms from assistant text.
const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "because", "been", "before", "being",
    "between", "could", "doing", "during", "every", "from", "have", "having",
    "here", "into", "just", "like", "make", "more", "most", "other", "over",
    "should", "some", "such", "than", "that", "their", "them", "then", "there",
    "these", "they", "this", "through", "under", "very", "want", "were", "what",
    "when", "where", "which", "while", "will", "with", "would", "your",
];

/// Builds the retrieval query for a turn.
///
/// The result is within `[min_chars, max_chars]` characters whenever the
/// inputs allow it. A short message with no prior assistant turn stays short.
pub fn build_memory_query(
    user_message: &str,
    prior_assistant: Option<&str>,
    min_chars: usize,
    max_chars: usize,
) -> String {
    let trimmed = user_message.trim();
    let len = trimmed.chars().count();

    if len > max_chars {
        return truncate_at_sentence(trimmed, max_chars);
    }

    if len < min_chars {
        if let Some(assistant) = prior_assistant {
            return pad_with_salient_terms(trimmed, assistant, min_chars, max_chars);
        }
    }

    trimmed.to_string()
}

/// Truncates text to at most `max_chars` characters, preferring the last
/// sentence boundary past the halfway point.
fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    let truncated: String = text.chars().take(max_chars).collect();

    let boundary = truncated
        .char_indices()
        .filter(|(_, c)| matches!(c, '.' | '!' | '?'))
        .map(|(i, c)| i + c.len_utf8())
        .next_back();

    match boundary {
        // A boundary in the first half would discard too much of the message.
        Some(end) if end * 2 >= truncated.len() => truncated[..end].trim_end().to_string(),
        _ => truncated.trim_end().to_string(),
    }
}

/// Appends salient terms from the prior assistant turn until the query
/// reaches `min_chars` (never exceeding `max_chars`).
fn pad_with_salient_terms(
    message: &str,
    assistant: &str,
    min_chars: usize,
    max_chars: usize,
) -> String {
    let mut query = message.to_string();
    let message_lower = message.to_lowercase();

    let mut seen: Vec<String> = Vec::new();
    for word in assistant.split_whitespace() {
        let term: String = word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '#' || *c == '@')
            .collect();
        let lower = term.to_lowercase();

        if term.chars().count() < 4
            || STOPWORDS.contains(&lower.as_str())
            || message_lower.contains(&lower)
            || seen.contains(&lower)
        {
            continue;
        }

        let candidate_len = query.chars().count() + 1 + term.chars().count();
        if candidate_len > max_chars {
            break;
        }
        query.push(' ');
        query.push_str(&term);
        seen.push(lower);

        if query.chars().count() >= min_chars {
            break;
        }
    }

    query
}

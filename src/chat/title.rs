//! Session title derivation

/// Title given to new sessions
pub const DEFAULT_TITLE: &str = "New Chat";

/// Fallback title for imported sessions
pub const IMPORTED_TITLE: &str = "Imported Chat";

const TITLE_WORDS: usize = 4;
const MAX_TITLE_CHARS: usize = 36;
const ELLIPSIS: &str = "...";

/// Derive a short session title from free text
///
/// Keeps the first four whitespace-separated words, marks dropped words
/// with `...`, and caps the result at 36 characters. Blank input yields
/// `fallback`.
///
/// # Examples
///
/// ```
/// use polychat::chat::title::{derive_title, DEFAULT_TITLE};
///
/// assert_eq!(derive_title("hello world foo bar baz", DEFAULT_TITLE), "hello world foo bar...");
/// assert_eq!(derive_title("", DEFAULT_TITLE), "New Chat");
/// ```
pub fn derive_title(input: &str, fallback: &str) -> String {
    let words: Vec<&str> = input.split_whitespace().collect();
    if words.is_empty() {
        return fallback.to_string();
    }

    let mut title = words[..words.len().min(TITLE_WORDS)].join(" ");
    if words.len() > TITLE_WORDS {
        title.push_str(ELLIPSIS);
    }

    if title.chars().count() > MAX_TITLE_CHARS {
        let keep = MAX_TITLE_CHARS - ELLIPSIS.len();
        title = title.chars().take(keep).collect::<String>() + ELLIPSIS;
    }

    title
}

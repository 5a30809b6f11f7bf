//! Message utilities for chat front-ends.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest message part a chat platform accepts.
pub const MESSAGE_LIMIT: usize = 1999;

static USER_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@!?\d+>").unwrap());
static BROADCAST: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(here|everyone|channel)\b").unwrap());

/// Remove `<@123>` user mentions.
pub fn remove_id(text: &str) -> String {
    USER_ID.replace_all(text, "").into_owned()
}

/// Remove `@here`, `@everyone` and `@channel` broadcasts.
pub fn filter_mentions(text: &str) -> String {
    BROADCAST.replace_all(text, "").into_owned()
}

/// Split `message` into parts of at most [`MESSAGE_LIMIT`] characters.
pub fn split_message(message: &str) -> Vec<String> {
    let chars: Vec<char> = message.chars().collect();
    chars
        .chunks(MESSAGE_LIMIT)
        .map(|part| part.iter().collect())
        .collect()
}

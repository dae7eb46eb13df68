//! Text accumulation for spoken and written responses
//!
//! `Say` joins fragments with single spaces and trims the result, which is the
//! same rule the flush uses to collapse a turn's write and speak buffers.

use crate::convo::Paging;
use serde_json::{Map, Value};
use std::fmt;

/// Whitespace-joining string builder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Say {
    text: String,
}

impl Say {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot builder seeded with `append`
    #[must_use]
    pub fn with(value: impl fmt::Display) -> Self {
        Self::new().append(value)
    }

    /// One-shot builder seeded with `sentence`
    #[must_use]
    pub fn with_sentence(value: impl fmt::Display) -> Self {
        Self::new().sentence(value)
    }

    #[must_use]
    pub fn append(mut self, value: impl fmt::Display) -> Self {
        self.text.push_str(&value.to_string());
        self
    }

    #[must_use]
    pub fn newline(self) -> Self {
        self.append('\n')
    }

    #[must_use]
    pub fn paragraph(self) -> Self {
        self.newline().newline()
    }

    /// Append a single space followed by `value`
    #[must_use]
    pub fn sentence(self, value: impl fmt::Display) -> Self {
        self.append(' ').append(value)
    }

    /// Terminate `text` with a period unless it already ends in `.`, `!` or `?`
    #[must_use]
    pub fn ensure_sentence(text: &str) -> String {
        let trimmed = text.trim_end();
        if trimmed.ends_with(['.', '!', '?']) {
            trimmed.to_string()
        } else {
            format!("{trimmed}.")
        }
    }

    /// Describe a page of list items, e.g. `"a, b and 3 others."`
    ///
    /// The count covers the items after the page, so the final page reads as a
    /// plain sentence.
    #[must_use]
    pub fn list_page_response<T>(
        page: &[T],
        paging: Paging,
        list: &[T],
        map: impl Fn(&T) -> String,
    ) -> String {
        let shown = page.iter().map(map).collect::<Vec<_>>().join(", ");
        let start = usize::try_from(paging.start).unwrap_or(0);
        let remaining = list.len().saturating_sub(start + page.len());
        match remaining {
            0 => Self::ensure_sentence(&shown),
            1 => format!("{shown} and 1 other."),
            n => format!("{shown} and {n} others."),
        }
    }

    /// Build the keyed item map used by platform list and carousel payloads
    #[must_use]
    pub fn list_items<T>(
        list: &[T],
        map: impl Fn(&T) -> Value,
        key: impl Fn(&T, usize) -> String,
    ) -> Map<String, Value> {
        list.iter()
            .enumerate()
            .map(|(i, item)| (key(item, i), map(item)))
            .collect()
    }
}

impl fmt::Display for Say {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text.trim())
    }
}

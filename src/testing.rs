//! Assertions over recorded flush requests
//!
//! Intended for application test suites that run intents headless and
//! inspect `Completion::requests`.

use crate::payload::{PayloadKind, Request};
use crate::platform::Action;
use regex::Regex;

/// Whether every kind in `kinds` appears at least once. False for no kinds.
#[must_use]
pub fn contains_response_type(requests: &[Request], kinds: &[PayloadKind]) -> bool {
    !kinds.is_empty()
        && kinds
            .iter()
            .all(|kind| requests.iter().any(|r| r.payload_type() == Some(kind.as_str())))
}

/// Whether the turn was flushed with `close`
#[must_use]
pub fn is_conversation_close(requests: &[Request]) -> bool {
    requests
        .first()
        .is_some_and(|request| request.action == Action::Close)
}

/// Whether any simple response speaks text matching `pattern`, or any
/// non-empty text when `pattern` is `None`
///
/// # Errors
///
/// Returns the regex error when `pattern` does not compile.
pub fn contains_spoken_text(
    requests: &[Request],
    pattern: Option<&str>,
) -> Result<bool, regex::Error> {
    simple_response_field_matches(requests, "speech", pattern)
}

/// Like `contains_spoken_text`, over the written text
///
/// # Errors
///
/// Returns the regex error when `pattern` does not compile.
pub fn contains_written_text(
    requests: &[Request],
    pattern: Option<&str>,
) -> Result<bool, regex::Error> {
    simple_response_field_matches(requests, "text", pattern)
}

fn simple_response_field_matches(
    requests: &[Request],
    field: &str,
    pattern: Option<&str>,
) -> Result<bool, regex::Error> {
    let regex = pattern.map(Regex::new).transpose()?;
    Ok(requests
        .iter()
        .filter(|r| r.payload_type() == Some(PayloadKind::SimpleResponse.as_str()))
        .filter_map(|r| r.data()?.get(field)?.as_str())
        .any(|text| match &regex {
            Some(regex) => regex.is_match(text),
            None => !text.is_empty(),
        }))
}

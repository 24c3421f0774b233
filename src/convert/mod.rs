//! Vendor response normalization.
//!
//! Each vendor module deserializes that vendor's wire format into private
//! structs and maps it onto the canonical shapes in [`crate::types`]. The
//! functions are pure: no I/O, no logging, no clock. A missing optional
//! field becomes `None`/empty rather than an error. Only a payload with no
//! usable core data (no route, no position) is a [`DataError`].
//!
//! [`DataError`]: crate::WaypostError::DataError

pub mod backend;
pub mod geoapify;
pub mod nominatim;
pub mod osrm;
pub mod tomtom;

use serde_json::Value;

/// Longest raw snippet returned when no structured message is found.
const SNIPPET_LEN: usize = 200;

/// Pull a human-readable message out of a provider error body.
///
/// Tries the JSON fields vendors use (`errorText`, `detailedError.message`,
/// `error.description`, `message`, `error`), then the XML tags
/// `<errorText>`, `<description>` and `<message>`, then falls back to the
/// first 200 characters of the raw body.
pub fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Ok(json) = serde_json::from_str::<Value>(trimmed)
        && let Some(message) = json_message(&json)
    {
        return message;
    }

    for tag in ["errorText", "description", "message"] {
        if let Some(message) = xml_tag(trimmed, tag) {
            return message;
        }
    }

    trimmed.chars().take(SNIPPET_LEN).collect()
}

fn json_message(json: &Value) -> Option<String> {
    let candidates = [
        json.get("errorText"),
        json.pointer("/detailedError/message"),
        json.pointer("/error/description"),
        json.get("message"),
        json.get("error"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()).map(str::to_owned))
}

fn xml_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let len = body[start..].find(&close)?;
    let inner = body[start..start + len].trim();
    (!inner.is_empty()).then(|| inner.to_owned())
}

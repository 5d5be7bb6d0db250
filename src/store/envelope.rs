//! Tolerant unwrapping of fetched blobs
//!
//! Gateways and pinning services hand content back in different wrappers
//! (`{"pinataContent": ...}`, `{"data": {"encryptedData": ...}}`, `[...]`,
//! or the bare ciphertext). Unwrapping runs an ordered list of matchers over
//! a tagged view of the current node until one yields a string.

use serde_json::{Map, Value};

use crate::crypto::canonicalize_json;
use crate::domain::Ciphertext;

/// Wrapper keys, in the order they are checked
pub const WRAPPER_KEYS: &[&str] = &[
    "pinnedContent",
    "pinataContent",
    "encryptedData",
    "ciphertext",
    "content",
    "data",
];

/// Maximum number of descents before giving up
pub const MAX_UNWRAP_DEPTH: usize = 16;

/// Errors extracting a ciphertext from fetched content
#[derive(Debug, thiserror::Error)]
pub enum UnwrapError {
    #[error("fetched content is empty")]
    Empty,

    #[error("fetched content holds a {0} where a string was expected")]
    NoScalar(&'static str),

    #[error("fetched content is nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("fetched content could not be re-serialized: {0}")]
    Reserialize(String),
}

/// Tagged view of a JSON node
#[derive(Debug, Clone, Copy)]
pub enum Shape<'a> {
    Scalar(&'a str),
    Mapping(&'a Map<String, Value>),
    Sequence(&'a [Value]),
    Other(&'a Value),
}

impl<'a> Shape<'a> {
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::String(s) => Shape::Scalar(s),
            Value::Object(map) => Shape::Mapping(map),
            Value::Array(items) => Shape::Sequence(items),
            other => Shape::Other(other),
        }
    }
}

/// Outcome of a matcher that applies
#[derive(Debug)]
enum Step<'a> {
    Found(&'a str),
    Descend(&'a Value),
}

type Matcher = for<'a> fn(Shape<'a>) -> Option<Step<'a>>;

/// Matchers, tried in order on every round
const MATCHERS: &[(&str, Matcher)] = &[
    ("scalar", match_scalar),
    ("wrapper_key", match_wrapper_key),
    ("single_entry", match_single_entry),
    ("single_container", match_single_container),
    ("single_element", match_single_element),
];

fn match_scalar(shape: Shape<'_>) -> Option<Step<'_>> {
    match shape {
        Shape::Scalar(s) => Some(Step::Found(s)),
        _ => None,
    }
}

fn match_wrapper_key(shape: Shape<'_>) -> Option<Step<'_>> {
    let Shape::Mapping(map) = shape else {
        return None;
    };
    WRAPPER_KEYS
        .iter()
        .find_map(|key| map.get(*key))
        .map(Step::Descend)
}

fn match_single_entry(shape: Shape<'_>) -> Option<Step<'_>> {
    let Shape::Mapping(map) = shape else {
        return None;
    };
    if map.len() != 1 {
        return None;
    }
    map.values().next().and_then(Value::as_str).map(Step::Found)
}

fn match_single_container(shape: Shape<'_>) -> Option<Step<'_>> {
    let Shape::Mapping(map) = shape else {
        return None;
    };
    if map.len() != 1 {
        return None;
    }
    map.values()
        .next()
        .filter(|v| v.is_object() || v.is_array())
        .map(Step::Descend)
}

fn match_single_element(shape: Shape<'_>) -> Option<Step<'_>> {
    match shape {
        Shape::Sequence([only]) => Some(Step::Descend(only)),
        _ => None,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Last resort when no matcher applies: the canonical JSON of the node.
fn fallback(shape: Shape<'_>, node: &Value) -> Result<String, UnwrapError> {
    match shape {
        Shape::Scalar(s) => Ok(s.to_string()),
        Shape::Mapping(_) | Shape::Sequence(_) => {
            canonicalize_json(node).map_err(|e| UnwrapError::Reserialize(e.to_string()))
        }
        Shape::Other(v) => Err(UnwrapError::NoScalar(kind_name(v))),
    }
}

/// Extract the ciphertext string from a parsed JSON document.
pub fn unwrap_value(value: &Value) -> Result<String, UnwrapError> {
    let mut current = value;
    for _ in 0..=MAX_UNWRAP_DEPTH {
        let shape = Shape::of(current);
        let step = MATCHERS.iter().find_map(|(name, matcher)| {
            let step = matcher(shape)?;
            tracing::trace!(matcher = *name, "unwrap matcher applied");
            Some(step)
        });
        match step {
            Some(Step::Found(s)) => return Ok(s.to_string()),
            Some(Step::Descend(next)) => current = next,
            None => return fallback(shape, current),
        }
    }
    Err(UnwrapError::TooDeep(MAX_UNWRAP_DEPTH))
}

/// Normalize a fetched body into a ciphertext.
///
/// Non-JSON bodies are taken as the raw ciphertext. Invalid UTF-8 is decoded
/// lossily so a corrupted blob still reaches the digest check.
pub fn normalize_fetched(bytes: &[u8]) -> Result<Ciphertext, UnwrapError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() {
        return Err(UnwrapError::Empty);
    }

    let unwrapped = match serde_json::from_str::<Value>(text) {
        Ok(value) => unwrap_value(&value)?,
        Err(_) => text.to_string(),
    };

    let unwrapped = unwrapped.trim();
    if unwrapped.is_empty() {
        return Err(UnwrapError::Empty);
    }
    Ok(Ciphertext::new(unwrapped))
}

//! Realtime Database event stream decoding.
//!
//! The database streams `text/event-stream` with these events:
//!
//! ```text
//! event: put         data: {"path": "/a/b", "data": <json>}   replace at path
//! event: patch       data: {"path": "/a",   "data": {...}}    merge children at path
//! event: keep-alive  data: null
//! event: cancel      data: "<reason>"                          rules revoked access
//! event: auth_revoked data: "<reason>"                         credential expired
//! ```
//!
//! [`apply`] folds `put`/`patch` into a local JSON tree that always equals the
//! server's value at the subscribed location.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::FirebaseError;

/// A raw server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// A decoded database stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Put { path: String, data: Value },
    Patch { path: String, data: Value },
    KeepAlive,
    Cancel(String),
    AuthRevoked,
}

#[derive(Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

/// Append a network chunk to the text buffer.
///
/// A multi-byte character split across chunks is held in `pending` until
/// its remaining bytes arrive.
///
/// # Errors
///
/// Returns [`FirebaseError::Parse`] on bytes that can never be valid UTF-8.
pub fn push_chunk(pending: &mut Vec<u8>, buffer: &mut String, chunk: &[u8]) -> Result<(), FirebaseError> {
    pending.extend_from_slice(chunk);
    let valid = match std::str::from_utf8(pending) {
        Ok(text) => text.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(e) => return Err(FirebaseError::Parse(format!("Invalid UTF-8: {e}"))),
    };

    let rest = pending.split_off(valid);
    let complete = std::mem::replace(pending, rest);
    let text = String::from_utf8(complete)
        .map_err(|e| FirebaseError::Parse(format!("Invalid UTF-8: {e}")))?;
    buffer.push_str(&text);
    Ok(())
}

/// Remove one complete event block from the buffer.
///
/// Returns `None` until a blank line terminates the block.
pub fn extract_event(buffer: &mut String) -> Option<String> {
    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }
    buffer.find("\n\n").map(|idx| {
        let block = buffer[..idx].to_string();
        buffer.replace_range(..idx + 2, "");
        block
    })
}

/// Parse an event block into its name and data.
///
/// Multiple `data:` lines are joined with newlines. Blocks without an event
/// name are ignored.
#[must_use]
pub fn parse_event(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    event.map(|event| SseEvent {
        event,
        data: data.join("\n"),
    })
}

/// Interpret an event.
///
/// Unknown event names are ignored (`Ok(None)`).
///
/// # Errors
///
/// Returns [`FirebaseError::Parse`] when a `put`/`patch` payload is not the
/// expected `{"path", "data"}` object.
pub fn decode(event: &SseEvent) -> Result<Option<StreamMessage>, FirebaseError> {
    let message = match event.event.as_str() {
        "put" | "patch" => {
            let PathData { path, data } = serde_json::from_str(&event.data)
                .map_err(|e| FirebaseError::Parse(format!("Invalid {} payload: {e}", event.event)))?;
            if event.event == "put" {
                StreamMessage::Put { path, data }
            } else {
                StreamMessage::Patch { path, data }
            }
        }
        "keep-alive" => StreamMessage::KeepAlive,
        "cancel" => StreamMessage::Cancel(reason(&event.data)),
        "auth_revoked" => StreamMessage::AuthRevoked,
        _ => return Ok(None),
    };
    Ok(Some(message))
}

/// Cancel reasons arrive as a JSON string or bare text.
fn reason(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(reason)) => reason,
        Ok(Value::Null) | Err(_) if data.trim().is_empty() || data.trim() == "null" => {
            "Permission denied".to_string()
        }
        _ => data.trim().to_string(),
    }
}

/// Apply a `put` or `patch` to the local tree.
///
/// Returns `false` for messages that do not change data.
pub fn apply(tree: &mut Value, message: StreamMessage) -> bool {
    match message {
        StreamMessage::Put { path, data } => {
            set_at(tree, &segments(&path), data);
            true
        }
        StreamMessage::Patch { path, data } => {
            let base = segments(&path);
            if let Value::Object(children) = data {
                for (key, value) in children {
                    let mut target = base.clone();
                    target.extend(segments(&key));
                    set_at(tree, &target, value);
                }
            }
            true
        }
        StreamMessage::KeepAlive | StreamMessage::Cancel(_) | StreamMessage::AuthRevoked => false,
    }
}

fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}

/// Write `data` at `path`. A `null` deletes; emptied parents disappear.
fn set_at(node: &mut Value, path: &[String], data: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = data;
        return;
    };

    if let Value::Array(items) = node {
        let converted: Map<String, Value> = items
            .drain(..)
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(index, item)| (index.to_string(), item))
            .collect();
        *node = Value::Object(converted);
    }

    if !node.is_object() {
        if data.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    let Value::Object(children) = node else {
        return;
    };

    let child_emptied = {
        let child = children.entry(head.clone()).or_insert(Value::Null);
        set_at(child, rest, data);
        child.is_null()
    };
    if child_emptied {
        children.remove(head);
    }

    let emptied = children.is_empty();
    if emptied {
        *node = Value::Null;
    }
}

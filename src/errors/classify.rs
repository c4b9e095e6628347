//! Provider error normalisation.
//!
//! Wallets and nodes disagree on error shapes: viem puts a `shortMessage`
//! on the error and nests the original under `cause`, ethers uses `reason`
//! and `error`, raw JSON-RPC has `{code, message, data}`. The classifier
//! accepts any JSON value and always produces a non-empty message.

use serde_json::Value;

pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Nested objects searched for messages.
const NESTED_KEYS: [&str; 4] = ["cause", "error", "data", "info"];

/// Fields that carry a short, human readable message.
const SHORT_KEYS: [&str; 2] = ["shortMessage", "reason"];

/// Recursion bound for nested `cause` chains.
const MAX_DEPTH: usize = 8;

/// Revert-reason markers, most specific first.
const REASON_MARKERS: [&str; 4] = [
    "execution reverted with reason:",
    "reverted with the following reason:",
    "execution reverted:",
    "reason:",
];

/// Taxonomy bucket of a raw provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserRejected,
    InsufficientFunds,
    Reverted,
    Other,
}

impl ErrorKind {
    pub fn detect(raw: &Value) -> ErrorKind {
        if codes(raw, 0).iter().any(|c| is_rejection_code(c)) {
            return ErrorKind::UserRejected;
        }

        let text = full_text(raw).to_ascii_lowercase();
        if text.contains("user rejected")
            || text.contains("user denied")
            || text.contains("rejected the request")
        {
            ErrorKind::UserRejected
        } else if text.contains("insufficient funds") {
            ErrorKind::InsufficientFunds
        } else if text.contains("revert") {
            ErrorKind::Reverted
        } else {
            ErrorKind::Other
        }
    }
}

/// Reduce an arbitrary provider error to a single user-facing message.
pub fn classify(raw: &Value) -> String {
    let short = short_message(raw, 0);

    match short {
        Some(msg) if !is_generic_revert(&msg) => return msg,
        Some(msg) => {
            if let Some(reason) = extract_reason(&full_text(raw)) {
                return reason;
            }
            if let Some(line) = raw_message(raw, 0).and_then(|m| first_line(&m)) {
                if !is_generic_revert(&line) {
                    return line;
                }
            }
            return msg;
        }
        None => {}
    }

    if let Some(line) = raw_message(raw, 0).and_then(|m| first_line(&m)) {
        if is_generic_revert(&line) {
            if let Some(reason) = extract_reason(&full_text(raw)) {
                return reason;
            }
        }
        return line;
    }

    UNKNOWN_ERROR.to_string()
}

fn short_message(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }
    let obj = value.as_object()?;

    for key in SHORT_KEYS {
        if let Some(msg) = obj.get(key).and_then(Value::as_str).and_then(first_line) {
            return Some(msg);
        }
    }

    NESTED_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|nested| short_message(nested, depth + 1))
}

fn raw_message(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(obj) => {
            if let Some(msg) = obj.get("message").and_then(Value::as_str) {
                if !msg.trim().is_empty() {
                    return Some(msg.to_string());
                }
            }
            NESTED_KEYS
                .iter()
                .filter_map(|key| obj.get(*key))
                .find_map(|nested| raw_message(nested, depth + 1))
        }
        Value::Array(items) => items.iter().find_map(|v| raw_message(v, depth + 1)),
        Value::Null => None,
    }
}

/// All string leaves of the error, joined by newlines.
fn full_text(value: &Value) -> String {
    let mut parts = Vec::new();
    collect_strings(value, 0, &mut parts);
    parts.join("\n")
}

fn collect_strings(value: &Value, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Object(obj) => {
            for v in obj.values() {
                collect_strings(v, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_strings(v, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn codes(value: &Value, depth: usize) -> Vec<Value> {
    let mut found = Vec::new();
    if depth > MAX_DEPTH {
        return found;
    }
    if let Some(obj) = value.as_object() {
        if let Some(code) = obj.get("code") {
            found.push(code.clone());
        }
        for key in NESTED_KEYS {
            if let Some(nested) = obj.get(key) {
                found.extend(codes(nested, depth + 1));
            }
        }
    }
    found
}

fn is_rejection_code(code: &Value) -> bool {
    match code {
        Value::Number(n) => n.as_i64() == Some(4001),
        Value::String(s) => s == "ACTION_REJECTED" || s == "4001",
        _ => false,
    }
}

fn is_generic_revert(msg: &str) -> bool {
    msg.to_ascii_lowercase().contains("revert")
}

fn first_line(msg: &str) -> Option<String> {
    msg.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Pull a revert reason out of free text.
fn extract_reason(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();

    if let Some(idx) = lower.find("reason=\"") {
        let rest = &text[idx + "reason=\"".len()..];
        if let Some(end) = rest.find('"') {
            let reason = rest[..end].trim();
            if !reason.is_empty() {
                return Some(reason.to_string());
            }
        }
    }

    for marker in REASON_MARKERS {
        let mut search_from = 0;
        while let Some(pos) = lower[search_from..].find(marker) {
            let start = search_from + pos + marker.len();
            let candidate = first_line(&text[start..])
                .map(|r| r.trim_matches(|c| c == '"' || c == '\'').trim().to_string())
                .filter(|r| !r.is_empty());
            if candidate.is_some() {
                return candidate;
            }
            search_from = start;
        }
    }

    None
}

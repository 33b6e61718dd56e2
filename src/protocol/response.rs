//! Response parsing
//!
//! Tolerant key lookup over raw reply bytes. The server's replies are JSON in
//! practice, but nothing guarantees field order, completeness, or escaping,
//! so each field is found by scanning for its quoted name.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

/// Field names used by the protocol
pub mod fields {
    pub const CURRENT_INDEX: &str = "current_index";
    pub const TOTAL: &str = "total";
    pub const INDEX: &str = "index";
    pub const FILENAME: &str = "filename";
}

/// Raw text reply to a command, exactly as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseText {
    bytes: Bytes,
}

impl ResponseText {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Text up to the first NUL, with invalid UTF-8 replaced
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(until_nul(&self.bytes))
    }

    pub fn int_field(&self, name: &str) -> Option<i64> {
        find_int_field(&self.bytes, name)
    }

    pub fn string_field(&self, name: &str, max_len: usize) -> Option<String> {
        find_string_field(&self.bytes, name, max_len)
    }
}

impl fmt::Display for ResponseText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// How to decode a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    /// Quoted string, truncated to `max_len` bytes
    Str { max_len: usize },
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Str(String),
}

/// Fields found in a reply
///
/// Fields that are missing or malformed are simply absent; callers decide
/// whether absence matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseFields {
    values: BTreeMap<String, FieldValue>,
}

impl ResponseFields {
    /// Look up every requested field in `text`
    pub fn scan(text: &[u8], specs: &[(&str, FieldKind)]) -> Self {
        let mut values = BTreeMap::new();

        for &(name, kind) in specs {
            let value = match kind {
                FieldKind::Int => find_int_field(text, name).map(FieldValue::Int),
                FieldKind::Str { max_len } => {
                    find_string_field(text, name, max_len).map(FieldValue::Str)
                }
            };
            if let Some(value) = value {
                values.insert(name.to_string(), value);
            }
        }

        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Integer field, absent if missing or not an integer
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(FieldValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// String field, absent if missing or not a string
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(FieldValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// =============================================================================
// Field lookup
// =============================================================================

/// Find an integer field: `"name"`, separators, then an optional `-` and digits
///
/// Returns `None` if the marker is missing, no digits follow the separators,
/// or the value overflows `i64`.
pub fn find_int_field(text: &[u8], name: &str) -> Option<i64> {
    let text = until_nul(text);
    let start = value_offset(text, name)?;

    let mut end = start;
    if text.get(end) == Some(&b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < text.len() && text[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }

    std::str::from_utf8(&text[start..end]).ok()?.parse().ok()
}

/// Find a string field: `"name"`, separators, then a double-quoted value
///
/// The value is cut at the next `"`; no escapes are recognised. Values longer
/// than `max_len` bytes are truncated on a character boundary. An
/// unterminated value is absent.
pub fn find_string_field(text: &[u8], name: &str, max_len: usize) -> Option<String> {
    let text = until_nul(text);
    let start = value_offset(text, name)?;

    if text.get(start) != Some(&b'"') {
        return None;
    }
    let rest = &text[start + 1..];
    let close = rest.iter().position(|&b| b == b'"')?;

    let value = String::from_utf8_lossy(&rest[..close]);
    Some(truncate_on_boundary(&value, max_len).to_string())
}

/// Offset of the first byte after `"name"` and any `:`/whitespace separators
fn value_offset(text: &[u8], name: &str) -> Option<usize> {
    let mut marker = Vec::with_capacity(name.len() + 2);
    marker.push(b'"');
    marker.extend_from_slice(name.as_bytes());
    marker.push(b'"');

    let found = find_subslice(text, &marker)?;
    let mut offset = found + marker.len();
    while offset < text.len() && (text[offset] == b':' || text[offset].is_ascii_whitespace()) {
        offset += 1;
    }
    Some(offset)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Replies are treated as C strings: anything after a NUL is ignored
fn until_nul(text: &[u8]) -> &[u8] {
    match text.iter().position(|&b| b == 0) {
        Some(end) => &text[..end],
        None => text,
    }
}

fn truncate_on_boundary(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    &s[..cut]
}

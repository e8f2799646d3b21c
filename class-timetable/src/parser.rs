use percent_encoding::percent_decode_str;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ImportError;

/// Where a raw payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadOrigin {
    /// Text produced by a QR decoder (camera frame or uploaded image)
    Scanned,
    /// Text pasted by the user
    Pasted,
}

/// Untrusted input text, tagged with its origin
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub text: String,
    pub origin: PayloadOrigin,
}

impl RawPayload {
    pub fn scanned(text: impl Into<String>) -> Self {
        RawPayload { text: text.into(), origin: PayloadOrigin::Scanned }
    }

    pub fn pasted(text: impl Into<String>) -> Self {
        RawPayload { text: text.into(), origin: PayloadOrigin::Pasted }
    }
}

/// Parses text as JSON, treating blank text as a failure
fn parse_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// Decodes `%XX` escapes the way a URI component is decoded.
/// Returns None when there is nothing to decode or the result is not UTF-8.
fn uri_decode(text: &str) -> Option<String> {
    if !text.contains('%') {
        return None;
    }
    percent_decode_str(text)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Matches every bracket of `bytes` in one pass.
///
/// Returns `(start, end)` for each opener in text order, `end` being exclusive
/// and None when the span never closes or closes with the wrong kind. Inside an
/// open span, delimiters within string literals are ignored; outside any span
/// quotes are plain noise.
fn bracket_spans(bytes: &[u8]) -> Vec<(usize, Option<usize>)> {
    let mut spans: Vec<(usize, Option<usize>)> = Vec::new();
    // (index into spans, expected closer)
    let mut open: Vec<(usize, u8)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (pos, &byte) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' if !open.is_empty() => in_string = true,
            b'[' | b'{' => {
                let closer = if byte == b'[' { b']' } else { b'}' };
                open.push((spans.len(), closer));
                spans.push((pos, None));
            }
            b']' | b'}' => match open.pop() {
                Some((index, closer)) if closer == byte => spans[index].1 = Some(pos + 1),
                // Wrong kind: none of the spans still open can close now
                Some(_) => open.clear(),
                None => {}
            },
            _ => {}
        }
    }

    spans
}

/// Scans `text` for top-level `[...]` / `{...}` spans in order and returns the
/// first one that parses as JSON. A balanced span that is not JSON is skipped
/// whole; an opener that never closes gives way to the next opener.
fn scan_balanced(text: &str) -> Option<Value> {
    let mut cursor = 0;

    for (start, end) in bracket_spans(text.as_bytes()) {
        let end = match end {
            Some(end) if start >= cursor => end,
            _ => continue,
        };
        if let Some(value) = parse_json(&text[start..end]) {
            return Some(value);
        }
        cursor = end;
    }

    None
}

/// Isolates the structured data inside arbitrary decoded text.
///
/// Strategies, first success wins:
/// 1. the trimmed text parsed directly
/// 2. the URI-decoded text parsed directly
/// 3. the first balanced top-level bracket span that parses, over the raw
///    text and then over the decoded text
pub fn extract_payload(raw: &str) -> Result<Value, ImportError> {
    let trimmed = raw.trim();

    if let Some(value) = parse_json(trimmed) {
        debug!("payload parsed as plain JSON");
        return Ok(value);
    }

    let decoded = uri_decode(trimmed).filter(|decoded| decoded != trimmed);
    if let Some(value) = decoded.as_deref().and_then(parse_json) {
        debug!("payload parsed after URI decoding");
        return Ok(value);
    }

    if let Some(value) = scan_balanced(trimmed) {
        debug!("payload extracted from surrounding text");
        return Ok(value);
    }

    if let Some(value) = decoded.as_deref().and_then(scan_balanced) {
        debug!("payload extracted from URI-decoded text");
        return Ok(value);
    }

    Err(ImportError::PayloadNotParseable)
}

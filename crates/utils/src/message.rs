//! Core email message types used by the forwarding pipeline.
//!
//! This module defines [`EmailMessage`], a lossless representation of a raw
//! [RFC 5322](https://www.rfc-editor.org/rfc/rfc5322) message as retrieved
//! from the message store. Headers are kept with their verbatim source bytes
//! so that anything not explicitly modified is re-emitted byte-for-byte, and
//! every modification returns a new value instead of mutating in place.

use crate::{mime::line_ending_of, parse_raw_headers};

/// A single header field.
///
/// Parsed headers carry their verbatim source lines (including folding and
/// line terminators), headers created through the setters do not and are
/// serialized as `Name: value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
    raw: Option<Vec<u8>>,
}

impl Header {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            raw: None,
        }
    }

    pub(crate) fn parsed(name: String, value: String, raw: Vec<u8>) -> Self {
        Self {
            name,
            value,
            raw: Some(raw),
        }
    }

    /// Appends a continuation line to this header.
    pub(crate) fn fold(&mut self, line: &[u8], content: &str) {
        let content = content.trim();
        if !content.is_empty() {
            if !self.value.is_empty() {
                self.value.push(' ');
            }
            self.value.push_str(content);
        }
        if let Some(raw) = self.raw.as_mut() {
            raw.extend_from_slice(line);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the unfolded, trimmed header value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the verbatim source bytes, `None` for headers created in code.
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// Tests if this header has the given name (case-insensitive).
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Represents a raw email message retrieved for forwarding.
///
/// Headers are stored as an ordered `Vec` (preserving RFC 5322 order and
/// supporting duplicate headers such as `Received`). The bytes following the
/// header section, blank separator included, are kept untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Ordered list of MIME headers.
    headers: Vec<Header>,

    /// Everything after the header section, starting at the blank line.
    tail: Vec<u8>,

    /// Line terminator used when serializing headers created in code.
    line_ending: &'static str,
}

impl EmailMessage {
    /// Parses a raw message, never fails as unparseable lines are treated
    /// as the start of the content.
    pub fn parse(raw: &[u8]) -> Self {
        let (headers, tail) = parse_raw_headers(raw);
        let line_ending = headers
            .first()
            .and_then(|header| header.raw())
            .and_then(line_ending_of)
            .unwrap_or("\r\n");
        Self {
            headers,
            tail: tail.to_vec(),
            line_ending,
        }
    }

    pub fn from_raw(raw: &str) -> Self {
        Self::parse(raw.as_bytes())
    }

    /// Returns the first header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.is(name))
            .map(Header::value)
    }

    /// Returns every header value matching `name` in message order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |header| header.is(name))
            .map(Header::value)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|header| header.is(name))
    }

    /// Returns a reference to the ordered header list.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Returns the message body after the blank-line separator.
    pub fn body(&self) -> &[u8] {
        let tail = self.tail.as_slice();
        tail.strip_prefix(b"\r\n")
            .or_else(|| tail.strip_prefix(b"\n"))
            .unwrap_or(tail)
    }

    pub fn line_ending(&self) -> &'static str {
        self.line_ending
    }

    /// Returns a message where `name` is set to `value`.
    ///
    /// The first existing occurrence is replaced in place and any further
    /// occurrences are dropped, the header is appended when absent.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match self.headers.iter().position(|header| header.is(name)) {
            Some(index) => {
                self.headers[index] = Header::new(name, value);
                let mut position = 0;
                self.headers.retain(|header| {
                    let keep = position == index || !header.is(name);
                    position += 1;
                    keep
                });
            }
            None => self.headers.push(Header::new(name, value)),
        }
        self
    }

    /// Returns a message with an extra `name` header at the end of the
    /// header section.
    pub fn with_appended_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Returns a message without any occurrence of `name`.
    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.retain(|header| !header.is(name));
        self
    }

    /// Serializes the message, parsed headers and content are written back
    /// verbatim.
    pub fn to_bytes(&self) -> Vec<u8> {
        let headers_len: usize = self
            .headers
            .iter()
            .map(|header| match header.raw() {
                Some(raw) => raw.len(),
                None => header.name.len() + 2 + header.value.len() + self.line_ending.len(),
            })
            .sum();

        let mut raw = Vec::with_capacity(headers_len + self.line_ending.len() + self.tail.len());

        for header in &self.headers {
            if !raw.is_empty() && !raw.ends_with(b"\n") {
                raw.extend_from_slice(self.line_ending.as_bytes());
            }
            match header.raw() {
                Some(source) => raw.extend_from_slice(source),
                None => {
                    raw.extend_from_slice(header.name.as_bytes());
                    raw.extend_from_slice(b": ");
                    raw.extend_from_slice(header.value.as_bytes());
                    raw.extend_from_slice(self.line_ending.as_bytes());
                }
            }
        }

        if !self.tail.is_empty() && !raw.is_empty() && !raw.ends_with(b"\n") {
            raw.extend_from_slice(self.line_ending.as_bytes());
        }

        raw.extend_from_slice(&self.tail);
        raw
    }
}

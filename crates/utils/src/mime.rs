use crate::Header;

/// Parses the header section of a raw email, returning the ordered list of
/// headers and the remaining bytes.
///
/// Headers are preserved in their original order with case-preserved names,
/// trimmed values and their verbatim source lines, duplicate headers (e.g.
/// `Received`) are kept. Continuation lines (starting with a space or a tab)
/// are folded into the preceding header. The header section ends at the
/// first blank line, or at the first line that is neither a header nor a
/// continuation. The returned remainder starts at that line, so the blank
/// separator is part of it.
///
/// # Examples
///
/// ```rust
/// let (headers, rest) = mailfwd_utils::parse_raw_headers(
///     b"From: alice@example.com\r\nSubject: Hello\r\n  World\r\n\r\nHi!"
/// );
/// assert_eq!(headers.len(), 2);
/// assert_eq!(headers[0].name(), "From");
/// assert_eq!(headers[1].value(), "Hello World");
/// assert_eq!(rest, b"\r\nHi!");
/// ```
pub fn parse_raw_headers(raw: &[u8]) -> (Vec<Header>, &[u8]) {
    let mut headers: Vec<Header> = Vec::new();
    let mut pos = 0;

    while pos < raw.len() {
        let end = raw[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i + 1)
            .unwrap_or(raw.len());
        let line = &raw[pos..end];
        let content = strip_line_ending(line);

        if content.iter().all(u8::is_ascii_whitespace) {
            break;
        }

        if matches!(content.first(), Some(b' ' | b'\t')) {
            match headers.last_mut() {
                Some(last) => last.fold(line, &String::from_utf8_lossy(content)),
                None => break,
            }
            pos = end;
            continue;
        }

        let Some(colon) = content.iter().position(|&b| b == b':') else {
            // Line is not a header (no colon) and not blank, treat as start of content
            break;
        };
        let name = String::from_utf8_lossy(&content[..colon]).trim().to_string();
        if name.is_empty() {
            break;
        }
        let value = String::from_utf8_lossy(&content[colon + 1..])
            .trim()
            .to_string();
        headers.push(Header::parsed(name, value, line.to_vec()));

        pos = end;
    }

    (headers, &raw[pos..])
}

/// Returns the line terminator used by a raw header line, if any.
pub(crate) fn line_ending_of(line: &[u8]) -> Option<&'static str> {
    if line.ends_with(b"\r\n") {
        Some("\r\n")
    } else if line.ends_with(b"\n") {
        Some("\n")
    } else {
        None
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

//! Header rewriting that makes a received message safe to re-send.
//!
//! The forwarded copy must originate from an address the sending
//! infrastructure is allowed to use, so the original sender is moved to the
//! display portion of `From` (and into `Reply-To` when none exists), the
//! destinations replace `To`, and headers tied to the original transmission
//! are dropped before the message is re-signed.

use tracing::debug;

use crate::{Address, EmailMessage, ForwardError, ForwardResult};

/// Headers removed from every forwarded message.
pub const STRIPPED_HEADERS: [&str; 4] = ["Return-Path", "Sender", "Message-ID", "DKIM-Signature"];

/// Produces the retransmission-safe copy of `message`.
///
/// The input is left untouched, body and unrelated headers are carried over
/// byte-for-byte. Fails with [`ForwardError::MissingHeader`] when the
/// message has no `From` header.
pub fn rewrite(
    message: &EmailMessage,
    resolved_origin: &Address,
    destinations: &[String],
) -> ForwardResult<EmailMessage> {
    let original_from = message
        .header("From")
        .ok_or(ForwardError::MissingHeader("From"))?
        .to_string();

    let mut rewritten = message.clone();

    if !rewritten.has_header("Reply-To") {
        debug!(reply_to = %original_from, "Adding Reply-To header");
        rewritten = rewritten.with_appended_header("Reply-To", &original_from);
    }

    let from = format!("{} <{}>", sanitize(&original_from), resolved_origin);
    let to = destinations.join(", ");
    debug!(from = %from, to = %to, "Replacing From and To headers");
    rewritten = rewritten.with_header("From", &from).with_header("To", &to);

    for name in STRIPPED_HEADERS {
        rewritten = rewritten.without_header(name);
    }

    Ok(rewritten)
}

/// Replaces every `<` and `>` with `-` so that the original address cannot
/// be read as the effective address of the rewritten `From`.
pub fn sanitize(value: &str) -> String {
    value.replace(['<', '>'], "-")
}

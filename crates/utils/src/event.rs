//! Inbound notification announcing that a message has been received.
//!
//! Two JSON shapes are accepted: a flat notification and the mail-receipt
//! event envelope emitted by a receiving mail service, in which case the
//! first record is used.
//!
//! ```json
//! { "recipients": ["a@x.com"], "messageId": "abc123" }
//! ```
//!
//! ```json
//! { "Records": [ { "ses": {
//!     "receipt": { "recipients": ["a@x.com"] },
//!     "mail": { "messageId": "abc123" } } } ] }
//! ```

use serde::Deserialize;
use tracing::error;

use crate::{Address, ForwardError, ForwardResult};

/// A validated notification: non-empty recipient list and message identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundNotification {
    recipients: Vec<Address>,
    message_id: String,
}

#[derive(Debug, Deserialize)]
struct FlatEvent {
    recipients: Option<Vec<String>>,
    #[serde(rename = "messageId")]
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReceiptEvent {
    #[serde(rename = "Records")]
    records: Vec<ReceiptRecord>,
}

#[derive(Debug, Deserialize)]
struct ReceiptRecord {
    ses: Option<ReceiptPayload>,
}

#[derive(Debug, Deserialize)]
struct ReceiptPayload {
    receipt: Option<Receipt>,
    mail: Option<ReceiptMail>,
}

#[derive(Debug, Deserialize)]
struct Receipt {
    recipients: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ReceiptMail {
    #[serde(rename = "messageId")]
    message_id: Option<String>,
}

impl InboundNotification {
    /// Creates a notification, failing with [`ForwardError::InvalidEventFormat`]
    /// on an empty recipient list, an invalid address or an empty identifier.
    pub fn new<S: AsRef<str>>(recipients: &[S], message_id: &str) -> ForwardResult<Self> {
        if recipients.is_empty() {
            return Err(invalid("no recipients"));
        }
        if message_id.trim().is_empty() {
            return Err(invalid("missing message identifier"));
        }
        let recipients = recipients
            .iter()
            .map(|recipient| Address::parse(recipient.as_ref()).map_err(|e| invalid(&e.to_string())))
            .collect::<ForwardResult<Vec<_>>>()?;
        Ok(Self {
            recipients,
            message_id: message_id.trim().to_string(),
        })
    }

    /// Parses and validates a JSON notification in either accepted shape.
    pub fn from_json(raw: &[u8]) -> ForwardResult<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(raw).map_err(|e| invalid(&e.to_string()))?;

        let (recipients, message_id) = if value.get("Records").is_some() {
            let event: ReceiptEvent =
                serde_json::from_value(value).map_err(|e| invalid(&e.to_string()))?;
            let payload = event
                .records
                .into_iter()
                .next()
                .and_then(|record| record.ses)
                .ok_or_else(|| invalid("no mail receipt record"))?;
            (
                payload.receipt.and_then(|receipt| receipt.recipients),
                payload.mail.and_then(|mail| mail.message_id),
            )
        } else {
            let event: FlatEvent =
                serde_json::from_value(value).map_err(|e| invalid(&e.to_string()))?;
            (event.recipients, event.message_id)
        };

        let recipients = recipients.ok_or_else(|| invalid("missing recipients"))?;
        let message_id = message_id.ok_or_else(|| invalid("missing message identifier"))?;
        Self::new(&recipients, &message_id)
    }

    /// Returns the original recipients in their received order.
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

fn invalid(reason: &str) -> ForwardError {
    error!(reason = %reason, "Invalid event format");
    ForwardError::InvalidEventFormat(reason.to_string())
}

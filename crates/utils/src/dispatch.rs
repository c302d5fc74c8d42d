//! Mail submission boundary.
//!
//! A [`Dispatcher`] hands a rewritten message and its destinations to a
//! submission service. Dispatch is attempted exactly once, a failure leaves
//! the delivery status of the message indeterminate and is reported as-is.

use std::{future::Future, path::PathBuf, pin::Pin, sync::Arc};

use lettre::{
    address::Envelope, transport::smtp::authentication::Credentials, Address, SmtpTransport,
    Transport,
};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{effective_address, EmailMessage, UpstreamError, UpstreamResult};

/// Boxed future type for dispatch operations, resolving to the identifier
/// assigned by the submission service.
pub type DispatchFuture<'a> = Pin<Box<dyn Future<Output = UpstreamResult<String>> + Send + 'a>>;

/// Trait for mail submission services.
pub trait Dispatcher: Send + Sync {
    /// Submits the serialized message for delivery to `destinations`.
    fn send<'a>(&'a self, raw: &'a [u8], destinations: &'a [String]) -> DispatchFuture<'a>;

    /// Returns the name of this dispatcher.
    fn name(&self) -> &str;
}

/// Dispatcher submitting messages to an SMTP relay.
///
/// The envelope sender is the effective address of the message `From`
/// header, which after rewriting is the resolved origin. The blocking
/// transport runs on the blocking thread pool.
pub struct SmtpDispatcher {
    transport: Arc<SmtpTransport>,
    host: String,
}

impl SmtpDispatcher {
    /// Creates a new [`SmtpDispatcher`] for the relay at `host:port`.
    ///
    /// With `tls` the connection is secured with implicit TLS, otherwise
    /// it is made in plain text.
    pub fn new(
        host: &str,
        port: u16,
        tls: bool,
        credentials: Option<(String, String)>,
    ) -> UpstreamResult<Self> {
        let builder = if tls {
            SmtpTransport::relay(host).map_err(|e| {
                error!(host = %host, error = %e, "Failed to create SMTP transport");
                UpstreamError::Dispatch(format!("Failed to create SMTP transport: {e}"))
            })?
        } else {
            SmtpTransport::builder_dangerous(host)
        };
        let builder = builder.port(port);
        let builder = match credentials {
            Some((username, password)) => builder.credentials(Credentials::new(username, password)),
            None => builder,
        };
        info!(host = %host, port = port, tls = tls, "SMTP dispatcher initialized");
        Ok(Self {
            transport: Arc::new(builder.build()),
            host: host.to_string(),
        })
    }
}

/// Builds the SMTP envelope for a rewritten message.
pub fn build_envelope(raw: &[u8], destinations: &[String]) -> UpstreamResult<Envelope> {
    let message = EmailMessage::parse(raw);
    let sender = message
        .header("From")
        .and_then(effective_address)
        .map(|address| address.parse::<Address>())
        .transpose()
        .map_err(|e| UpstreamError::Dispatch(format!("Invalid envelope sender: {e}")))?;
    let recipients = destinations
        .iter()
        .map(|destination| {
            destination.parse::<Address>().map_err(|e| {
                UpstreamError::Dispatch(format!("Invalid destination {destination}: {e}"))
            })
        })
        .collect::<UpstreamResult<Vec<_>>>()?;
    Envelope::new(sender, recipients)
        .map_err(|e| UpstreamError::Dispatch(format!("Invalid envelope: {e}")))
}

impl Dispatcher for SmtpDispatcher {
    fn send<'a>(&'a self, raw: &'a [u8], destinations: &'a [String]) -> DispatchFuture<'a> {
        Box::pin(async move {
            let envelope = build_envelope(raw, destinations)?;
            debug!(
                host = %self.host,
                destinations = ?destinations,
                size = raw.len(),
                "Submitting message over SMTP"
            );

            let transport = self.transport.clone();
            let raw = raw.to_vec();
            let response = tokio::task::spawn_blocking(move || transport.send_raw(&envelope, &raw))
                .await
                .map_err(|e| UpstreamError::Dispatch(e.to_string()))?
                .map_err(|e| {
                    error!(host = %self.host, error = %e, "SMTP submission failed");
                    UpstreamError::Dispatch(format!("SMTP submission failed: {e}"))
                })?;

            let id = response.first_line().unwrap_or_default().to_string();
            info!(host = %self.host, response = %id, "Submitted message over SMTP");
            Ok(id)
        })
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

/// JSON envelope written next to every spooled message.
#[derive(Debug, Serialize)]
struct SpoolEnvelope<'a> {
    id: &'a str,
    destinations: &'a [String],
}

/// Dispatcher spooling messages to an outbox directory.
///
/// Every message is written as `{id}.eml` together with a `{id}.json`
/// envelope listing its destinations, for a relay (or a human) to pick up.
pub struct FileDispatcher {
    path: PathBuf,
}

impl FileDispatcher {
    /// Creates a new [`FileDispatcher`] spooling into `path`.
    pub fn new(path: PathBuf) -> Self {
        info!(path = %path.display(), "File dispatcher initialized");
        Self { path }
    }
}

impl Dispatcher for FileDispatcher {
    fn send<'a>(&'a self, raw: &'a [u8], destinations: &'a [String]) -> DispatchFuture<'a> {
        Box::pin(async move {
            let id = Uuid::new_v4().to_string();
            let envelope = serde_json::to_vec(&SpoolEnvelope {
                id: &id,
                destinations,
            })
            .map_err(|e| UpstreamError::Dispatch(e.to_string()))?;

            let write = async {
                fs::create_dir_all(&self.path).await?;
                fs::write(self.path.join(format!("{id}.eml")), raw).await?;
                fs::write(self.path.join(format!("{id}.json")), &envelope).await
            };
            write.await.map_err(|e| {
                error!(path = %self.path.display(), error = %e, "Failed to spool message");
                UpstreamError::Dispatch(format!("Failed to spool message: {e}"))
            })?;

            info!(
                id = %id,
                path = %self.path.display(),
                destinations = ?destinations,
                "Spooled message to outbox"
            );
            Ok(id)
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}

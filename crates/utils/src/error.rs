use std::{error::Error, fmt::Display};

/// Result type for collaborator operations (mapping store, message store
/// and mail submission).
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Result type for forwarding operations.
pub type ForwardResult<T> = Result<T, ForwardError>;

/// Errors surfaced by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The mapping store failed to answer a lookup.
    Mapping(String),
    /// The raw message store failed to return the message.
    Storage(String),
    /// The mail submission service rejected or failed the send.
    Dispatch(String),
}

impl Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::Mapping(msg) => write!(f, "Mapping store error: {msg}"),
            UpstreamError::Storage(msg) => write!(f, "Message store error: {msg}"),
            UpstreamError::Dispatch(msg) => write!(f, "Dispatch error: {msg}"),
        }
    }
}

impl Error for UpstreamError {}

/// Coarse failure categories reported for a processed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidEventFormat,
    NoMappingFound,
    MalformedMessage,
    UpstreamFailure,
}

/// Errors that abort the processing of a single notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    /// The inbound notification does not have the expected shape.
    InvalidEventFormat(String),
    /// No destination could be determined for the listed recipients.
    NoMappingFound(Vec<String>),
    /// The retrieved message lacks a header the rewrite depends on.
    MissingHeader(&'static str),
    /// A collaborator failed, the error is carried unmodified.
    Upstream(UpstreamError),
}

impl ForwardError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForwardError::InvalidEventFormat(_) => ErrorKind::InvalidEventFormat,
            ForwardError::NoMappingFound(_) => ErrorKind::NoMappingFound,
            ForwardError::MissingHeader(_) => ErrorKind::MalformedMessage,
            ForwardError::Upstream(_) => ErrorKind::UpstreamFailure,
        }
    }
}

impl Display for ForwardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardError::InvalidEventFormat(msg) => write!(f, "Invalid event format: {msg}"),
            ForwardError::NoMappingFound(recipients) => write!(
                f,
                "No match found in mapping table for recipients [{}]",
                recipients.join(", ")
            ),
            ForwardError::MissingHeader(name) => write!(f, "Missing header: {name}"),
            ForwardError::Upstream(e) => write!(f, "{e}"),
        }
    }
}

impl Error for ForwardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ForwardError::Upstream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<UpstreamError> for ForwardError {
    fn from(e: UpstreamError) -> Self {
        ForwardError::Upstream(e)
    }
}

use std::fmt::Display;

/// Errors that can occur while parsing a recipient address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The address does not contain exactly one `@`.
    InvalidSeparator(String),
    /// The local-part before the `@` is empty.
    EmptyLocalPart(String),
    /// The domain after the `@` is empty.
    EmptyDomain(String),
}

impl Display for AddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressError::InvalidSeparator(address) => {
                write!(f, "Address must contain exactly one '@': {address}")
            }
            AddressError::EmptyLocalPart(address) => {
                write!(f, "Address has an empty local-part: {address}")
            }
            AddressError::EmptyDomain(address) => write!(f, "Address has an empty domain: {address}"),
        }
    }
}

impl std::error::Error for AddressError {}

/// An email address split into its local-part and domain.
///
/// The address is kept exactly as received, no case folding is applied,
/// mapping lookups are performed on the literal parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    address: String,
    at: usize,
}

impl Address {
    /// Parses an address with exactly one `@` and non-empty parts.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let address = mailfwd_utils::Address::parse("alice@example.com").unwrap();
    /// assert_eq!(address.local_part(), "alice");
    /// assert_eq!(address.domain(), "example.com");
    /// assert!(mailfwd_utils::Address::parse("alice@b@example.com").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let value = value.trim();
        let mut positions = value.match_indices('@').map(|(i, _)| i);
        let at = match (positions.next(), positions.next()) {
            (Some(at), None) => at,
            _ => return Err(AddressError::InvalidSeparator(value.to_string())),
        };
        if at == 0 {
            return Err(AddressError::EmptyLocalPart(value.to_string()));
        }
        if at + 1 == value.len() {
            return Err(AddressError::EmptyDomain(value.to_string()));
        }
        Ok(Self {
            address: value.to_string(),
            at,
        })
    }

    pub fn local_part(&self) -> &str {
        &self.address[..self.at]
    }

    pub fn domain(&self) -> &str {
        &self.address[self.at + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.address
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.address)
    }
}

/// Returns the address enclosed in the last `<...>` pair of a header value.
///
/// # Examples
///
/// ```rust
/// assert_eq!(
///     mailfwd_utils::effective_address("-Bob- bob@y.com- <a@x.com>"),
///     Some("a@x.com")
/// );
/// assert_eq!(mailfwd_utils::effective_address("plain@x.com"), None);
/// ```
pub fn effective_address(value: &str) -> Option<&str> {
    let start = value.rfind('<')?;
    let end = start + value[start..].find('>')?;
    let address = value[start + 1..end].trim();
    if address.is_empty() {
        None
    } else {
        Some(address)
    }
}

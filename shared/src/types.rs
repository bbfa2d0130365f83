use std::fmt;
use thiserror::Error;

use crate::protocol::LOCAL_SUFFIX;

/// Longest label usable as a DNS-SD service name (`_<label>`). RFC 6763
/// section 7.2 caps the name after the underscore at 15 bytes, and mdns-sd
/// refuses longer ones on register.
pub const MAX_LABEL_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid domain name {0:?}: use 1-15 letters, digits or inner hyphens")]
pub struct InvalidName(pub String);

/// A normalized short domain name, e.g. `hello` for `hello.local`.
///
/// `hello`, ` Hello `, `hello.local` and `hello.local.` all normalize to the
/// same name, so every registry key is derived from one canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainName {
    label: String,
}

impl DomainName {
    pub fn parse(raw: &str) -> Result<Self, InvalidName> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
        let lower = trimmed.to_ascii_lowercase();

        let suffix = format!(".{LOCAL_SUFFIX}");
        let label = lower.strip_suffix(suffix.as_str()).unwrap_or(&lower);

        if !is_service_label(label) {
            return Err(InvalidName(raw.to_string()));
        }

        Ok(Self {
            label: label.to_string(),
        })
    }

    /// The bare label, e.g. `hello`
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Registry key and reverse proxy domain, e.g. `hello.local`
    pub fn full_domain(&self) -> String {
        format!("{}.{LOCAL_SUFFIX}", self.label)
    }

    /// DNS-SD service type advertised for this name, e.g. `_hello._tcp`
    pub fn service_type(&self) -> String {
        format!("_{}._tcp", self.label)
    }

    /// Fully-qualified target host, e.g. `hello.local.`
    pub fn host(&self) -> String {
        format!("{}.{LOCAL_SUFFIX}.", self.label)
    }
}

fn is_service_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{LOCAL_SUFFIX}", self.label)
    }
}

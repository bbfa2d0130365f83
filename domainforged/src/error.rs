use thiserror::Error;

/// Failures from the Local-Network Resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no suitable local IPv4 address found")]
    NoSuitableAddress,

    #[error("failed to enumerate network interfaces: {0}")]
    Interfaces(#[from] std::io::Error),
}

/// Failures from the Service Advertiser.
#[derive(Debug, Error)]
pub enum AdvertiseError {
    #[error("invalid advertisement for {service_type}: {reason}")]
    Invalid { service_type: String, reason: String },

    #[error("mDNS daemon error: {0}")]
    Daemon(String),
}

/// Failures from the Route Synchronizer.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("reverse proxy rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("reverse proxy unreachable at {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors returned by registry operations. The `Display` output is what the
/// admin protocol sends back after `Error: `.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("domain {0} already registered")]
    AlreadyRegistered(String),

    #[error("domain {0} not registered")]
    NotFound(String),

    #[error(transparent)]
    InvalidName(#[from] shared::types::InvalidName),

    #[error("failed to get local IP: {0}")]
    Resolver(#[from] ResolveError),

    #[error("failed to advertise {domain}: {source}")]
    Advertisement {
        domain: String,
        #[source]
        source: AdvertiseError,
    },

    #[error("failed to add reverse proxy server block for {domain}: {source}")]
    RouteSync {
        domain: String,
        #[source]
        source: RouteError,
    },
}

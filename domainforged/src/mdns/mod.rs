pub mod advertise;

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::error::AdvertiseError;

/// Everything needed to publish one proxy service record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementRequest {
    /// Instance name, e.g. "domainforge"
    pub instance: String,
    /// Service type without the domain, e.g. "_hello._tcp"
    pub service_type: String,
    /// Discovery domain, e.g. "local"
    pub domain_suffix: String,
    pub port: u16,
    /// Target host, e.g. "hello.local."
    pub host: String,
    pub ip: Ipv4Addr,
    pub txt: HashMap<String, String>,
}

/// A live advertisement. Releasing consumes the handle, so it can only
/// happen once.
pub trait Advertisement: Send + Sync {
    fn release(self: Box<Self>) -> Result<(), AdvertiseError>;
}

/// Publishes proxy service records on the local network.
pub trait Advertiser: Send + Sync {
    fn register(
        &self,
        request: &AdvertisementRequest,
    ) -> Result<Box<dyn Advertisement>, AdvertiseError>;
}

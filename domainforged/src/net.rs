use std::net::{IpAddr, Ipv4Addr};

use crate::error::ResolveError;

/// Finds the address advertisements should point at.
pub trait Resolver: Send + Sync {
    fn local_ipv4(&self) -> Result<Ipv4Addr, ResolveError>;
}

/// Reads the host's interface table and picks the first non-loopback IPv4
/// address, optionally restricted to one named interface.
#[derive(Debug, Clone, Default)]
pub struct SystemResolver {
    interface: Option<String>,
}

impl SystemResolver {
    pub fn new(interface: Option<String>) -> Self {
        Self { interface }
    }
}

impl Resolver for SystemResolver {
    fn local_ipv4(&self) -> Result<Ipv4Addr, ResolveError> {
        let interfaces = if_addrs::get_if_addrs()?;
        pick_ipv4(
            interfaces.iter().map(|iface| (iface.name.as_str(), iface.ip())),
            self.interface.as_deref(),
        )
        .ok_or(ResolveError::NoSuitableAddress)
    }
}

fn pick_ipv4<'a>(
    addrs: impl IntoIterator<Item = (&'a str, IpAddr)>,
    only: Option<&str>,
) -> Option<Ipv4Addr> {
    addrs
        .into_iter()
        .filter(|(name, _)| only.map_or(true, |wanted| *name == wanted))
        .find_map(|(_, ip)| match ip {
            IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Some(v4),
            _ => None,
        })
}

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::Mutex;
use shared::protocol::LOCAL_SUFFIX;
use shared::types::DomainName;
use crate::config::MdnsConfig;
use crate::error::{RegistryError, ResolveError};
use crate::mdns::{Advertisement, AdvertisementRequest, Advertiser};
use crate::net::Resolver;
use crate::proxy::RouteSync;

/// One registered domain and the advertisement that keeps it resolvable.
struct DomainRecord {
    name: DomainName,
    port: u16,
    /// Address the current advertisement points at
    ip: Ipv4Addr,
    /// `None` only after a refresh failed to re-register; the next refresh
    /// retries.
    advertisement: Option<Box<dyn Advertisement>>,
}

/// Outcome of one refresh pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failed: usize,
}

/// An advertisement created during `add` that has not been committed to the
/// registry yet. Dropping it releases the advertisement, so an add that
/// fails (or is cancelled) after advertising never leaks a record on the
/// network.
struct PendingAdvertisement {
    domain: String,
    advertisement: Option<Box<dyn Advertisement>>,
}

impl PendingAdvertisement {
    fn commit(mut self) -> Option<Box<dyn Advertisement>> {
        self.advertisement.take()
    }
}

impl Drop for PendingAdvertisement {
    fn drop(&mut self) {
        if let Some(advertisement) = self.advertisement.take() {
            match advertisement.release() {
                Ok(()) => tracing::info!("Rolled back advertisement for {}", self.domain),
                Err(e) => tracing::error!(
                    "Failed to roll back advertisement for {}: {}",
                    self.domain,
                    e
                ),
            }
        }
    }
}

/// Authoritative map of registered domains, keyed by full domain
/// (`hello.local`).
///
/// Every operation holds the one lock for its whole duration, including
/// the calls out to the advertiser, resolver and reverse proxy, so adds,
/// removes and refreshes never interleave.
pub struct Registry {
    records: Mutex<HashMap<String, DomainRecord>>,
    advertiser: Arc<dyn Advertiser>,
    routes: Arc<dyn RouteSync>,
    resolver: Arc<dyn Resolver>,
    instance: String,
    proxy_port: u16,
}

impl Registry {
    pub fn new(
        advertiser: Arc<dyn Advertiser>,
        routes: Arc<dyn RouteSync>,
        resolver: Arc<dyn Resolver>,
        mdns: &MdnsConfig,
    ) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            advertiser,
            routes,
            resolver,
            instance: mdns.instance.clone(),
            proxy_port: mdns.proxy_port,
        }
    }

    fn request(&self, name: &DomainName, ip: Ipv4Addr) -> AdvertisementRequest {
        AdvertisementRequest {
            instance: self.instance.clone(),
            service_type: name.service_type(),
            domain_suffix: LOCAL_SUFFIX.to_string(),
            port: self.proxy_port,
            host: name.host(),
            ip,
            txt: HashMap::new(),
        }
    }

    /// Advertise `name` and route it to `port`. Returns the full domain.
    ///
    /// Either both the advertisement and the reverse proxy route succeed and
    /// the domain is inserted, or nothing is inserted and any advertisement
    /// created along the way is released.
    pub async fn add(&self, name: &str, port: u16) -> Result<String, RegistryError> {
        let mut records = self.records.lock().await;

        let name = DomainName::parse(name)?;
        let domain = name.full_domain();
        if records.contains_key(&domain) {
            return Err(RegistryError::AlreadyRegistered(domain));
        }

        let ip = self.resolver.local_ipv4()?;

        let advertisement = self
            .advertiser
            .register(&self.request(&name, ip))
            .map_err(|source| RegistryError::Advertisement {
                domain: domain.clone(),
                source,
            })?;
        let pending = PendingAdvertisement {
            domain: domain.clone(),
            advertisement: Some(advertisement),
        };

        let domains = [domain.clone()];
        if let Err(source) = self.routes.add_route(&domains, port).await {
            drop(pending);
            return Err(RegistryError::RouteSync { domain, source });
        }

        records.insert(
            domain.clone(),
            DomainRecord {
                name,
                port,
                ip,
                advertisement: pending.commit(),
            },
        );

        tracing::info!("Added domain: {} with port: {} ({})", domain, port, ip);
        Ok(domain)
    }

    /// Withdraw the advertisement for `name` and forget it. Accepts the same
    /// forms as `add` (`hello` or `hello.local`). Returns the full domain.
    ///
    /// The reverse proxy route is left in place.
    pub async fn remove(&self, name: &str) -> Result<String, RegistryError> {
        let mut records = self.records.lock().await;

        let not_found = || RegistryError::NotFound(name.trim().to_string());
        let domain = DomainName::parse(name)
            .map_err(|_| not_found())?
            .full_domain();
        let record = records.remove(&domain).ok_or_else(not_found)?;

        if let Some(advertisement) = record.advertisement {
            if let Err(e) = advertisement.release() {
                tracing::error!("Failed to unregister {}: {}", domain, e);
            }
        }

        tracing::info!("Removed domain: {} (port {})", domain, record.port);
        Ok(domain)
    }

    /// Snapshot of all registered full domains, sorted
    pub async fn list(&self) -> Vec<String> {
        let records = self.records.lock().await;
        let mut domains: Vec<String> = records.keys().cloned().collect();
        domains.sort();
        domains
    }

    /// Release every advertisement and empty the registry. Reverse proxy
    /// routes are not touched. Calling it again is a no-op.
    pub async fn shutdown(&self) -> usize {
        let mut records = self.records.lock().await;
        let count = records.len();

        for (domain, record) in records.drain() {
            tracing::info!("Shutting down domain: {}", domain);
            if let Some(advertisement) = record.advertisement {
                if let Err(e) = advertisement.release() {
                    tracing::error!("Failed to unregister {}: {}", domain, e);
                }
            }
        }

        count
    }

    /// Re-register every advertisement against the current local address.
    ///
    /// Each record's old advertisement is released before its replacement
    /// is registered. The set of registered domains never changes here.
    pub async fn refresh(&self) -> Result<RefreshReport, ResolveError> {
        let mut records = self.records.lock().await;
        let ip = self.resolver.local_ipv4()?;
        let mut report = RefreshReport::default();

        for (domain, record) in records.iter_mut() {
            if let Some(old) = record.advertisement.take() {
                if let Err(e) = old.release() {
                    tracing::warn!("Failed to unregister stale advertisement for {}: {}", domain, e);
                }
            }

            match self.advertiser.register(&self.request(&record.name, ip)) {
                Ok(advertisement) => {
                    if record.ip != ip {
                        tracing::info!("{} moved from {} to {}", domain, record.ip, ip);
                        record.ip = ip;
                    }
                    record.advertisement = Some(advertisement);
                    report.refreshed += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to re-advertise {}: {}", domain, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

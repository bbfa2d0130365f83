//! In-process stand-ins for the advertiser, reverse proxy and resolver.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use futures::future::{BoxFuture, FutureExt};
use crate::config::MdnsConfig;
use crate::error::{AdvertiseError, ResolveError, RouteError};
use crate::mdns::{Advertisement, AdvertisementRequest, Advertiser};
use crate::net::Resolver;
use crate::proxy::RouteSync;
use crate::registry::Registry;

#[derive(Default)]
struct AdvertiserState {
    next_id: u64,
    live: HashMap<u64, AdvertisementRequest>,
    registrations: usize,
    releases: usize,
    failed_releases: usize,
    failing: bool,
    release_failing: bool,
}

#[derive(Default)]
pub struct FakeAdvertiser {
    state: Arc<Mutex<AdvertiserState>>,
}

struct FakeAdvertisement {
    id: u64,
    state: Arc<Mutex<AdvertiserState>>,
}

impl FakeAdvertiser {
    /// Currently registered advertisements, ordered by service type
    pub fn live(&self) -> Vec<AdvertisementRequest> {
        let state = self.state.lock().unwrap();
        let mut live: Vec<_> = state.live.values().cloned().collect();
        live.sort_by(|a, b| a.service_type.cmp(&b.service_type));
        live
    }

    pub fn registrations(&self) -> usize {
        self.state.lock().unwrap().registrations
    }

    pub fn releases(&self) -> usize {
        self.state.lock().unwrap().releases
    }

    /// Releases that returned an error
    pub fn failed_releases(&self) -> usize {
        self.state.lock().unwrap().failed_releases
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    /// Make every later release fail. The handle is still consumed.
    pub fn set_release_failing(&self, failing: bool) {
        self.state.lock().unwrap().release_failing = failing;
    }
}

impl Advertiser for FakeAdvertiser {
    fn register(
        &self,
        request: &AdvertisementRequest,
    ) -> Result<Box<dyn Advertisement>, AdvertiseError> {
        let mut state = self.state.lock().unwrap();
        if state.failing {
            return Err(AdvertiseError::Daemon("advertiser offline".to_string()));
        }

        // mDNS full names are unique per service type
        assert!(
            state
                .live
                .values()
                .all(|live| live.service_type != request.service_type),
            "{} advertised twice",
            request.service_type
        );

        let id = state.next_id;
        state.next_id += 1;
        state.registrations += 1;
        state.live.insert(id, request.clone());

        Ok(Box::new(FakeAdvertisement {
            id,
            state: self.state.clone(),
        }))
    }
}

impl Advertisement for FakeAdvertisement {
    fn release(self: Box<Self>) -> Result<(), AdvertiseError> {
        let mut state = self.state.lock().unwrap();
        assert!(state.live.remove(&self.id).is_some(), "advertisement released twice");
        if state.release_failing {
            state.failed_releases += 1;
            return Err(AdvertiseError::Daemon("unregister failed".to_string()));
        }
        state.releases += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRoutes {
    routes: Mutex<Vec<(Vec<String>, u16)>>,
    failing: AtomicBool,
    unreachable: AtomicBool,
}

impl FakeRoutes {
    pub fn routes(&self) -> Vec<(Vec<String>, u16)> {
        self.routes.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

impl RouteSync for FakeRoutes {
    fn add_route<'a>(
        &'a self,
        domains: &'a [String],
        port: u16,
    ) -> BoxFuture<'a, Result<(), RouteError>> {
        async move {
            // Yield so concurrent callers really contend for the registry lock
            tokio::task::yield_now().await;
            if self.failing.load(Ordering::SeqCst) {
                return Err(RouteError::Rejected {
                    status: 503,
                    body: "proxy unavailable".to_string(),
                });
            }
            self.routes.lock().unwrap().push((domains.to_vec(), port));
            Ok(())
        }
        .boxed()
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), RouteError>> {
        async move {
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(RouteError::Rejected {
                    status: 502,
                    body: "no admin api".to_string(),
                });
            }
            Ok(())
        }
        .boxed()
    }
}

pub struct FakeResolver {
    ip: Mutex<Option<Ipv4Addr>>,
}

impl FakeResolver {
    pub fn set(&self, ip: Option<Ipv4Addr>) {
        *self.ip.lock().unwrap() = ip;
    }
}

impl Resolver for FakeResolver {
    fn local_ipv4(&self) -> Result<Ipv4Addr, ResolveError> {
        self.ip.lock().unwrap().ok_or(ResolveError::NoSuitableAddress)
    }
}

/// One set of fakes plus a registry wired to them.
pub struct Fakes {
    pub advertiser: Arc<FakeAdvertiser>,
    pub routes: Arc<FakeRoutes>,
    pub resolver: Arc<FakeResolver>,
}

impl Fakes {
    pub const IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);

    pub fn new() -> Self {
        Self {
            advertiser: Arc::new(FakeAdvertiser::default()),
            routes: Arc::new(FakeRoutes::default()),
            resolver: Arc::new(FakeResolver {
                ip: Mutex::new(Some(Self::IP)),
            }),
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::new(Registry::new(
            self.advertiser.clone(),
            self.routes.clone(),
            self.resolver.clone(),
            &MdnsConfig::default(),
        ))
    }
}

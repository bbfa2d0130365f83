use mdns_sd::{ServiceDaemon, ServiceInfo};
use crate::error::AdvertiseError;
use super::{Advertisement, AdvertisementRequest, Advertiser};

/// Advertiser backed by the mdns-sd daemon thread.
#[derive(Clone)]
pub struct MdnsAdvertiser {
    daemon: ServiceDaemon,
}

/// Handle for one registered service, identified by its DNS-SD full name.
pub struct MdnsAdvertisement {
    daemon: ServiceDaemon,
    fullname: String,
}

impl MdnsAdvertiser {
    pub fn new(daemon: ServiceDaemon) -> Self {
        Self { daemon }
    }
}

impl Advertiser for MdnsAdvertiser {
    fn register(
        &self,
        request: &AdvertisementRequest,
    ) -> Result<Box<dyn Advertisement>, AdvertiseError> {
        let ty_domain = format!("{}.{}.", request.service_type, request.domain_suffix);
        let ip = request.ip.to_string();

        let service_info = ServiceInfo::new(
            &ty_domain,
            &request.instance,
            &request.host,
            ip.as_str(),
            request.port,
            request.txt.clone(),
        )
        .map_err(|e| AdvertiseError::Invalid {
            service_type: ty_domain.clone(),
            reason: e.to_string(),
        })?;

        let fullname = service_info.get_fullname().to_string();

        self.daemon
            .register(service_info)
            .map_err(|e| AdvertiseError::Daemon(e.to_string()))?;

        tracing::debug!(
            "Registered {} -> {} ({}) on port {}",
            fullname,
            request.host,
            request.ip,
            request.port
        );

        Ok(Box::new(MdnsAdvertisement {
            daemon: self.daemon.clone(),
            fullname,
        }))
    }
}

impl Advertisement for MdnsAdvertisement {
    fn release(self: Box<Self>) -> Result<(), AdvertiseError> {
        self.daemon
            .unregister(&self.fullname)
            .map_err(|e| AdvertiseError::Daemon(e.to_string()))?;

        tracing::debug!("Unregistered {}", self.fullname);
        Ok(())
    }
}

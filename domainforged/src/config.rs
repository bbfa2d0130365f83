use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::{
    ADVERTISED_PORT, ADVERTISER_INSTANCE, DEFAULT_ADMIN_ADDRESS, DEFAULT_PROXY_ADMIN,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub mdns: MdnsConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Base URL of the reverse proxy's admin API
    #[serde(default = "default_admin_endpoint")]
    pub admin_endpoint: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MdnsConfig {
    #[serde(default = "default_instance")]
    pub instance: String,
    /// Port published in every advertisement
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,
    /// Restrict mDNS and address lookup to one interface
    #[serde(default)]
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_listen() -> String {
    DEFAULT_ADMIN_ADDRESS.to_string()
}

fn default_admin_endpoint() -> String {
    DEFAULT_PROXY_ADMIN.to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_instance() -> String {
    ADVERTISER_INSTANCE.to_string()
}

fn default_proxy_port() -> u16 {
    ADVERTISED_PORT
}

fn default_interval() -> u64 {
    15
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            admin_endpoint: default_admin_endpoint(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            proxy_port: default_proxy_port(),
            interface: None,
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

impl ProxyConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl BroadcastConfig {
    /// Refresh period, never shorter than one second
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}

//! Configuration types for unifi-names.

use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::DnsError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    pub dns: DnsConfig,

    /// UniFi controller connection.
    pub unifi: UnifiConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Check the configuration for values the server cannot run with.
    pub fn validate(&self) -> Result<(), DnsError> {
        self.dns.validate()?;
        if self.unifi.url.trim().is_empty() {
            return Err(DnsError::Config("unifi.url must not be empty".to_string()));
        }
        Ok(())
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for DNS server to listen on (UDP and TCP).
    pub listen_addr: SocketAddr,

    /// Refresh interval in seconds. Also the TTL records carry right after a refresh.
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Network identifier -> zone suffix its clients are published under
    /// (e.g., "lan" -> "home.arpa").
    pub networks: HashMap<String, String>,

    /// Use the client's alias (`name`) instead of its DHCP `hostname`.
    #[serde(default)]
    pub use_name_as_hostname: bool,

    /// Verbose logging of refreshes and answers.
    #[serde(default)]
    pub debug: bool,

    /// Recursive resolvers that receive every query not answered from the
    /// client cache. When empty, misses inside a served zone get an
    /// authoritative NXDOMAIN/NODATA and other names are refused.
    #[serde(default)]
    pub upstreams: Vec<SocketAddr>,

    /// Per-upstream query timeout in milliseconds.
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,
}

impl DnsConfig {
    /// Validate the DNS section.
    pub fn validate(&self) -> Result<(), DnsError> {
        if self.ttl == 0 {
            return Err(DnsError::Config("dns.ttl must be greater than 0".to_string()));
        }
        if self.networks.is_empty() {
            return Err(DnsError::Config(
                "dns.networks must map at least one network to a domain".to_string(),
            ));
        }
        if !self.upstreams.is_empty() && self.upstream_timeout_ms == 0 {
            return Err(DnsError::Config(
                "dns.upstream_timeout_ms must be greater than 0".to_string(),
            ));
        }
        for (network, domain) in &self.networks {
            if network.trim().is_empty() {
                return Err(DnsError::Config(
                    "dns.networks contains an empty network name".to_string(),
                ));
            }
            let domain = domain.trim_end_matches('.');
            if domain.is_empty() || Name::from_ascii(domain).is_err() {
                return Err(DnsError::Config(format!(
                    "dns.networks.{network}: '{domain}' is not a valid domain"
                )));
            }
        }
        Ok(())
    }
}

/// UniFi controller connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiConfig {
    /// Controller base URL (e.g., "https://192.168.1.1" or "https://unifi:8443").
    pub url: String,

    /// Controller account name.
    pub username: String,

    /// Controller account password.
    pub password: String,

    /// Verify the controller's TLS certificate.
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Whether the controller runs on UniFi OS. Detected when unset.
    #[serde(default)]
    pub unifi_os: Option<bool>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "unifi_names=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    crate::telemetry::SERVICE_NAME.to_string()
}

fn default_ttl() -> u32 {
    60
}

fn default_upstream_timeout_ms() -> u64 {
    2_000
}

fn default_verify_ssl() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

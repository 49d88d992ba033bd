//! Upstream source of connected clients: the UniFi Network controller API.
//!
//! The snapshot builder only sees the [`ClientSource`] trait, so tests and
//! other controllers can stand in for [`UnifiClient`].

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::UnifiConfig;
use crate::error::DnsError;

/// A controller site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Site {
    /// Short site identifier used in API paths (e.g., "default").
    #[serde(default)]
    pub name: String,
    /// Human readable site name.
    #[serde(default, rename = "desc")]
    pub description: String,
}

/// One connected client as reported by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientEntry {
    /// Alias assigned in the controller UI.
    #[serde(default)]
    pub name: String,
    /// Hostname the client announced over DHCP.
    #[serde(default)]
    pub hostname: String,
    /// Current IP address, unparsed.
    #[serde(default)]
    pub ip: String,
    /// Network (VLAN) name the client is attached to.
    #[serde(default)]
    pub network: String,
}

/// Source of connected-client listings.
#[async_trait]
pub trait ClientSource: Send + Sync {
    /// List the controller's sites.
    async fn sites(&self) -> Result<Vec<Site>, DnsError>;

    /// List clients connected to the given sites, in site order.
    async fn clients(&self, sites: &[Site]) -> Result<Vec<ClientEntry>, DnsError>;
}

/// Standard UniFi API response wrapper.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    meta: Meta,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    rc: String,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// HTTP client for a UniFi Network controller.
///
/// Each [`ClientSource::sites`] call starts a fresh session, so one refresh
/// cycle is one login followed by the listing calls.
pub struct UnifiClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    unifi_os: OnceLock<bool>,
}

impl UnifiClient {
    /// Create a client from connection parameters. No request is made yet.
    pub fn new(config: &UnifiConfig) -> Result<Self, DnsError> {
        Url::parse(&config.url)
            .map_err(|e| DnsError::InvalidAddress(format!("{}: {}", config.url, e)))?;

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .redirect(Policy::none())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let unifi_os = OnceLock::new();
        if let Some(flag) = config.unifi_os {
            let _ = unifi_os.set(flag);
        }

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            unifi_os,
        })
    }

    /// UniFi OS consoles answer the root with 200; classic controllers redirect.
    async fn is_unifi_os(&self) -> Result<bool, DnsError> {
        if let Some(flag) = self.unifi_os.get() {
            return Ok(*flag);
        }

        let response = self.http.get(&self.base_url).send().await?;
        let detected = response.status() == StatusCode::OK;
        info!(url = %self.base_url, unifi_os = detected, "detected controller type");
        let _ = self.unifi_os.set(detected);
        Ok(detected)
    }

    async fn login(&self) -> Result<(), DnsError> {
        let path = if self.is_unifi_os().await? {
            "/api/auth/login"
        } else {
            "/api/login"
        };
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DnsError::Upstream(format!(
                "login failed with status {}",
                response.status()
            )));
        }

        debug!(url = %url, "logged in to controller");
        Ok(())
    }

    /// URL of a Network application API path.
    async fn api_url(&self, path: &str) -> Result<String, DnsError> {
        let prefix = if self.is_unifi_os().await? {
            "/proxy/network"
        } else {
            ""
        };
        Ok(format!("{}{}{}", self.base_url, prefix, path))
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, DnsError> {
        let url = self.api_url(path).await?;
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DnsError::Upstream(format!("GET {path} returned {status}")));
        }

        let envelope: Envelope<T> = response.json().await?;
        unwrap_envelope(path, envelope)
    }
}

fn unwrap_envelope<T>(path: &str, envelope: Envelope<T>) -> Result<Vec<T>, DnsError> {
    if !envelope.meta.rc.is_empty() && envelope.meta.rc != "ok" {
        return Err(DnsError::Upstream(format!(
            "GET {} failed: {}",
            path,
            envelope.meta.msg.as_deref().unwrap_or(&envelope.meta.rc)
        )));
    }
    Ok(envelope.data)
}

#[async_trait]
impl ClientSource for UnifiClient {
    async fn sites(&self) -> Result<Vec<Site>, DnsError> {
        self.login().await?;
        self.get_data("/api/self/sites").await
    }

    async fn clients(&self, sites: &[Site]) -> Result<Vec<ClientEntry>, DnsError> {
        let mut clients = Vec::new();
        for site in sites {
            let site_clients: Vec<ClientEntry> = self
                .get_data(&format!("/api/s/{}/stat/sta", site.name))
                .await?;
            debug!(site = %site.name, count = site_clients.len(), "listed clients");
            clients.extend(site_clients);
        }
        Ok(clients)
    }
}

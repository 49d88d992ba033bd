//! Error types for unifi-names.

use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error talking to the controller
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Controller answered, but with an error
    #[error("UniFi controller error: {0}")]
    Upstream(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Forwarding to an upstream resolver failed
    #[error("Upstream DNS error: {0}")]
    Forward(String),

    /// Failed to parse address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

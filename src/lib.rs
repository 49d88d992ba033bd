//! unifi-names - DNS for the clients of a UniFi network.
//!
//! This crate answers `A` and `AAAA` queries for devices connected to a UniFi
//! controller. Client names are sanitized into DNS labels and published under
//! a zone suffix chosen by the client's network. Everything else falls
//! through to the next authority in the chain: the configured upstream
//! resolvers, or an authoritative NXDOMAIN/NODATA when there are none.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          unifi-names                            │
//! │                                                                 │
//! │  ┌──────────────────┐    ┌──────────────────┐                  │
//! │  │ UniFi controller │───▶│ SnapshotBuilder  │                  │
//! │  │ (sites, clients) │    │ sanitize + map   │                  │
//! │  └──────────────────┘    └────────┬─────────┘                  │
//! │         ▲                         │ swap every `ttl` seconds    │
//! │         │                         ▼                             │
//! │  ┌──────┴───────────┐    ┌──────────────────┐                  │
//! │  │ RefreshScheduler │───▶│   ClientCache    │                  │
//! │  │ (started by the  │    │   (in-memory)    │                  │
//! │  │  first query)    │    └────────┬─────────┘                  │
//! │  └──────────────────┘             ▼                             │
//! │                          ┌──────────────────┐                  │
//! │                          │  Hickory DNS     │◀── UDP/TCP   │
//! │                          │  Server          │    :53       │
//! │                          └──────────────────┘                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! living-room-tv.home.arpa  (client "Living Room TV" on network "lan")
//!   → name ends with a served suffix
//!   → first A record named living-room-tv.home.arpa in the snapshot
//!   → TTL = ttl - seconds since the last successful refresh
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use unifi_names::{Config, DnsServer, UnifiClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config: Config = load_config();
//!     let source = Arc::new(UnifiClient::new(&config.unifi).unwrap());
//!
//!     let shutdown = CancellationToken::new();
//!     let server = DnsServer::new(config.dns, source);
//!     server.run(shutdown).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod config;
pub mod domains;
pub mod error;
pub mod forward;
pub mod metrics;
pub mod refresh;
pub mod resolver;
pub mod sanitize;
pub mod server;
pub mod snapshot;
pub mod state;
pub mod telemetry;
pub mod unifi;

// Re-export main types
pub use config::{Config, DnsConfig, TelemetryConfig, UnifiConfig};
pub use error::DnsError;
pub use refresh::RefreshScheduler;
pub use resolver::ClientResolver;
pub use server::DnsServer;
pub use state::ClientCache;
pub use unifi::{ClientSource, UnifiClient};

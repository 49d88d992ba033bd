//! Building an immutable snapshot of address records from the controller's
//! client list.

use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

use crate::domains::NetworkDomains;
use crate::error::DnsError;
use crate::metrics;
use crate::sanitize::{is_fqdn, sanitize_name};
use crate::unifi::{ClientEntry, ClientSource};

/// Which client field provides the DNS label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    /// The DHCP hostname the client announced.
    Hostname,
    /// The alias set in the controller.
    Name,
}

impl NameSource {
    /// Map the `use_name_as_hostname` toggle.
    pub fn from_toggle(use_name_as_hostname: bool) -> Self {
        if use_name_as_hostname {
            NameSource::Name
        } else {
            NameSource::Hostname
        }
    }

    fn pick<'a>(&self, entry: &'a ClientEntry) -> &'a str {
        match self {
            NameSource::Hostname => &entry.hostname,
            NameSource::Name => &entry.name,
        }
    }
}

/// One published A or AAAA record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    /// Fully-qualified owner name, `<client-label>.<domain>.`.
    pub name: Name,
    /// Lowercase owner name without the trailing dot, used for matching.
    pub key: String,
    /// Address; its family decides A versus AAAA.
    pub address: IpAddr,
    /// TTL right after a refresh.
    pub ttl: u32,
}

impl AddressRecord {
    /// `A` for IPv4, `AAAA` for IPv6.
    pub fn record_type(&self) -> RecordType {
        match self.address {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::AAAA,
        }
    }

    /// Render as a resource record with the given TTL.
    pub fn to_record(&self, ttl: u32) -> Record {
        let rdata = match self.address {
            IpAddr::V4(v4) => RData::A(A::from(v4)),
            IpAddr::V6(v6) => RData::AAAA(AAAA::from(v6)),
        };
        let mut record = Record::from_rdata(self.name.clone(), ttl, rdata);
        record.set_dns_class(DNSClass::IN);
        record
    }
}

/// The full record set produced by one refresh cycle.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// A records, in controller enumeration order.
    pub ipv4: Vec<AddressRecord>,
    /// AAAA records, in controller enumeration order.
    pub ipv6: Vec<AddressRecord>,
    /// When the snapshot was built.
    pub captured_at: Instant,
}

impl ClientSnapshot {
    /// A snapshot with no records.
    pub fn empty() -> Self {
        Self {
            ipv4: Vec::new(),
            ipv6: Vec::new(),
            captured_at: Instant::now(),
        }
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    /// True when there are no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First record matching `name` (case-insensitive, trailing dot ignored)
    /// in the list for `record_type`.
    pub fn find(&self, name: &str, record_type: RecordType) -> Option<&AddressRecord> {
        let records = match record_type {
            RecordType::A => &self.ipv4,
            RecordType::AAAA => &self.ipv6,
            _ => return None,
        };
        let name = name.trim_end_matches('.');
        records.iter().find(|r| r.key.eq_ignore_ascii_case(name))
    }

    /// Whether any record, A or AAAA, is published under `name`.
    pub fn contains_name(&self, name: &str) -> bool {
        self.find(name, RecordType::A).is_some() || self.find(name, RecordType::AAAA).is_some()
    }
}

/// Builds snapshots from a [`ClientSource`].
#[derive(Clone)]
pub struct SnapshotBuilder {
    source: Arc<dyn ClientSource>,
    domains: NetworkDomains,
    name_source: NameSource,
    ttl: u32,
}

impl SnapshotBuilder {
    /// Create a builder.
    pub fn new(
        source: Arc<dyn ClientSource>,
        domains: NetworkDomains,
        name_source: NameSource,
        ttl: u32,
    ) -> Self {
        Self {
            source,
            domains,
            name_source,
            ttl,
        }
    }

    /// Fetch the client list and turn it into a snapshot.
    ///
    /// Upstream failures abort the build. Entries that cannot be published
    /// are skipped silently.
    pub async fn build(&self) -> Result<ClientSnapshot, DnsError> {
        let sites = self.source.sites().await?;
        let clients = self.source.clients(&sites).await?;

        let mut snapshot = ClientSnapshot::empty();
        for entry in &clients {
            let Some(record) = self.record_for(entry) else {
                continue;
            };
            match record.address {
                IpAddr::V4(_) => snapshot.ipv4.push(record),
                IpAddr::V6(_) => snapshot.ipv6.push(record),
            }
        }
        snapshot.captured_at = Instant::now();

        metrics::record_host_count(snapshot.len());
        Ok(snapshot)
    }

    fn record_for(&self, entry: &ClientEntry) -> Option<AddressRecord> {
        let raw = self.name_source.pick(entry);
        if raw.is_empty() {
            return None;
        }

        // Dots are outside the allow-list, so a dotted raw name like
        // "nas.local" becomes the single label "nas-local". The FQDN check is
        // kept as a guard on the label; it cannot fire for sanitized input.
        let label = sanitize_name(raw);
        if label.is_empty() || is_fqdn(&label) {
            return None;
        }

        // IPv4-mapped IPv6 addresses are published as A records.
        let address = entry.ip.trim().parse::<IpAddr>().ok()?.to_canonical();
        let domain = self.domains.map_domain(&entry.network)?;

        let key = format!("{label}.{domain}");
        let name = Name::from_ascii(format!("{key}.")).ok()?;

        debug!(name = %key, ip = %address, "adding client");
        Some(AddressRecord {
            name,
            key,
            address,
            ttl: self.ttl,
        })
    }
}

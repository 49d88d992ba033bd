//! Shared test infrastructure for catalog and refresh integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{Catalog, MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tokio::net::UdpSocket;

use unifi_names::config::DnsConfig;
use unifi_names::error::DnsError;
use unifi_names::server::DnsServer;
use unifi_names::unifi::{ClientEntry, ClientSource, Site};

// --- Constants ---

pub const DOMAIN: &str = "home.arpa";
pub const TTL: u32 = 300;
pub const UPSTREAM_TTL: u32 = 3600;

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// Implements `ResponseHandler` so it can be passed to `Catalog::handle_request()`.
/// The response is serialized via `MessageResponse::destructive_emit()` and stored
/// as raw wire-format bytes, which can then be parsed with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

// --- In-memory controller ---

/// A controller whose client list and health are set by the test.
#[derive(Clone, Default)]
pub struct StaticSource {
    clients: Arc<Mutex<Vec<ClientEntry>>>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new(clients: Vec<ClientEntry>) -> Self {
        let source = Self::default();
        source.set_clients(clients);
        source
    }

    pub fn set_clients(&self, clients: Vec<ClientEntry>) {
        *self.clients.lock().unwrap() = clients;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of completed `sites()` calls, i.e. refresh attempts.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientSource for StaticSource {
    async fn sites(&self) -> Result<Vec<Site>, DnsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DnsError::Upstream("unable to get sites".to_string()));
        }
        Ok(vec![Site {
            name: "default".to_string(),
            description: "Default".to_string(),
        }])
    }

    async fn clients(&self, _sites: &[Site]) -> Result<Vec<ClientEntry>, DnsError> {
        Ok(self.clients.lock().unwrap().clone())
    }
}

pub fn client(name: &str, hostname: &str, ip: &str, network: &str) -> ClientEntry {
    ClientEntry {
        name: name.to_string(),
        hostname: hostname.to_string(),
        ip: ip.to_string(),
        network: network.to_string(),
    }
}

// --- Config builders ---

pub fn test_dns_config() -> DnsConfig {
    let mut networks = HashMap::new();
    networks.insert("lan".to_string(), DOMAIN.to_string());
    DnsConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        ttl: TTL,
        networks,
        use_name_as_hostname: false,
        debug: false,
        upstreams: Vec::new(),
        upstream_timeout_ms: 2_000,
    }
}

/// Test config forwarding misses to `upstream`.
pub fn forwarding_dns_config(upstream: SocketAddr) -> DnsConfig {
    let mut config = test_dns_config();
    config.upstreams = vec![upstream];
    config
}

/// Build a server over `source` and its catalog, without refreshing.
pub fn build_server(source: StaticSource, config: DnsConfig) -> (DnsServer, Catalog) {
    let server = DnsServer::new(config, Arc::new(source));
    let catalog = server.catalog().expect("failed to build catalog");
    (server, catalog)
}

/// Build a server over `source`, refresh it once, and return its catalog.
pub async fn build_catalog(source: StaticSource, config: DnsConfig) -> (DnsServer, Catalog) {
    let (server, catalog) = build_server(source, config);
    assert!(server.ensure_ready().await);
    (server, catalog)
}

// --- Upstream resolver ---

/// A recursive resolver stand-in on a loopback UDP socket.
///
/// Names in its table get their A record; a known name asked for another
/// type gets NODATA; anything else gets NXDOMAIN.
pub async fn spawn_upstream(table: &[(&str, &str)]) -> SocketAddr {
    let table: HashMap<String, Ipv4Addr> = table
        .iter()
        .map(|(name, ip)| (name.trim_end_matches('.').to_ascii_lowercase(), ip.parse().unwrap()))
        .collect();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let Ok(request) = Message::from_vec(&buf[..len]) else {
                continue;
            };
            let mut response = Message::new();
            response
                .set_id(request.id())
                .set_message_type(MessageType::Response)
                .set_op_code(OpCode::Query)
                .set_recursion_desired(request.recursion_desired())
                .set_recursion_available(true);

            if let Some(query) = request.queries().first() {
                let name = query.name().to_ascii();
                let name = name.trim_end_matches('.').to_ascii_lowercase();
                match table.get(&name) {
                    Some(ip) if query.query_type() == RecordType::A => {
                        response.add_answer(Record::from_rdata(
                            query.name().clone(),
                            UPSTREAM_TTL,
                            RData::A(A::from(*ip)),
                        ));
                    }
                    Some(_) => {}
                    None => {
                        response.set_response_code(ResponseCode::NXDomain);
                    }
                }
                response.add_query(query.clone());
            }
            let Ok(bytes) = response.to_vec() else {
                continue;
            };
            let _ = socket.send_to(&bytes, peer).await;
        }
    });
    addr
}

// --- Query/Request construction ---

/// Build a DNS query message.
pub fn build_query(name: &str, record_type: RecordType, id: u16) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` from a LAN client address.
pub fn build_request(name: &str, record_type: RecordType, id: u16) -> Request {
    let bytes = build_query(name, record_type, id).to_vec().unwrap();
    let msg = parse_message_request(&bytes);
    let src: SocketAddr = "192.168.1.50:53000".parse().unwrap();
    Request::new(msg, src, Protocol::Udp)
}

// --- Response helpers ---

/// Execute a query through the catalog and return the parsed response.
pub async fn execute_query(
    catalog: &Catalog,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    let request = build_request(name, record_type, id);
    let handler = TestResponseHandler::new();
    catalog.handle_request(&request, handler.clone()).await;
    handler.into_message()
}

/// Extract A/AAAA addresses from a response's answer section.
pub fn extract_ips(msg: &Message) -> Vec<IpAddr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}

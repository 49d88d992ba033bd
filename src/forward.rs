//! Forwarding of queries the client cache does not answer.
//!
//! A [`ForwardAuthority`] sits after the client authority in every served
//! zone and alone at the root zone, so misses and foreign names reach a
//! recursive resolver instead of ending the catalog chain empty-handed.

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{LowerName, Name, Record, RecordType};
use hickory_server::authority::{
    Authority, LookupControlFlow, LookupError, LookupObject, LookupOptions, MessageRequest,
    UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use crate::authority::zone_origin;
use crate::error::DnsError;

/// Maximum UDP DNS response size with EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Sends single-question queries to a list of upstream resolvers over UDP.
///
/// Upstreams are tried in order; the first reply wins, whatever its rcode.
#[derive(Debug, Clone)]
pub struct UpstreamForwarder {
    upstreams: Arc<[SocketAddr]>,
    timeout: Duration,
}

impl UpstreamForwarder {
    /// Create a forwarder with a per-upstream `timeout`.
    pub fn new(upstreams: Vec<SocketAddr>, timeout: Duration) -> Self {
        Self {
            upstreams: upstreams.into(),
            timeout,
        }
    }

    /// Configured upstream addresses, in the order they are tried.
    pub fn upstreams(&self) -> &[SocketAddr] {
        &self.upstreams
    }

    /// Resolve `query` through the first upstream that replies.
    pub async fn query(&self, query: &Query) -> Result<Message, DnsError> {
        let mut last_error = None;
        for server in self.upstreams.iter().copied() {
            match self.query_server(server, query).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(%server, name = %query.name(), error = %e, "upstream query failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| DnsError::Forward("no upstream resolvers configured".to_string())))
    }

    async fn query_server(&self, server: SocketAddr, query: &Query) -> Result<Message, DnsError> {
        let id = fastrand::u16(..);
        let mut request = Message::new();
        request
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true);
        request.add_query(query.clone());
        let bytes = request.to_vec()?;

        let bind_addr: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server).await?;
        socket.send(&bytes).await?;

        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        loop {
            let len = tokio::time::timeout_at(deadline, socket.recv(&mut buf))
                .await
                .map_err(|_| DnsError::Forward(format!("timed out waiting for {server}")))??;

            let response = Message::from_vec(&buf[..len])?;
            if response.id() != id || response.message_type() != MessageType::Response {
                trace!(%server, "ignoring unrelated datagram");
                continue;
            }
            debug!(
                %server,
                name = %query.name(),
                rcode = ?response.response_code(),
                answers = response.answers().len(),
                "upstream replied"
            );
            return Ok(response);
        }
    }
}

/// Answer records relayed from an upstream reply.
#[derive(Debug, Default)]
pub struct ForwardLookup {
    records: Vec<Record>,
}

impl ForwardLookup {
    /// Wrap the answer section of an upstream reply.
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl LookupObject for ForwardLookup {
    fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Record> + Send + 'a> {
        Box::new(self.records.iter())
    }

    fn take_additionals(&mut self) -> Option<Box<dyn LookupObject>> {
        None
    }
}

/// Non-authoritative authority relaying queries to [`UpstreamForwarder`].
pub struct ForwardAuthority {
    origin: LowerName,
    forwarder: UpstreamForwarder,
}

impl ForwardAuthority {
    /// Forward everything under `zone` (`"."` for the root).
    pub fn new(zone: &str, forwarder: UpstreamForwarder) -> Result<Self, hickory_proto::ProtoError> {
        Ok(Self {
            origin: zone_origin(zone)?,
            forwarder,
        })
    }

    async fn forward(&self, query: &Query) -> LookupControlFlow<ForwardLookup> {
        match self.forwarder.query(query).await {
            Ok(response) => match response.response_code() {
                ResponseCode::NoError => {
                    LookupControlFlow::Break(Ok(ForwardLookup::new(response.answers().to_vec())))
                }
                code => LookupControlFlow::Break(Err(LookupError::ResponseCode(code))),
            },
            Err(e) => {
                warn!(name = %query.name(), error = %e, "all upstreams failed");
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::ServFail)))
            }
        }
    }
}

#[async_trait]
impl Authority for ForwardAuthority {
    type Lookup = ForwardLookup;

    fn zone_type(&self) -> ZoneType {
        ZoneType::External
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        self.forward(&Query::query(Name::from(name.clone()), rtype)).await
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let lower = request_info.query;
        let mut query = Query::query(Name::from(lower.name().clone()), lower.query_type());
        query.set_query_class(lower.query_class());

        trace!(name = %query.name(), rtype = ?query.query_type(), "forwarding");
        self.forward(&query).await
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
    }

    async fn update(&self, _update: &MessageRequest) -> UpdateResult<bool> {
        Err(ResponseCode::NotImp)
    }
}

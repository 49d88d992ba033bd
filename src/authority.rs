//! Hickory DNS authorities for the served client suffixes.
//!
//! [`ClientAuthority`] answers from the client cache and returns
//! [`LookupControlFlow::Skip`] for everything else, so the catalog moves on
//! to the next authority chained for the zone: a forwarder when upstreams
//! are configured, otherwise [`NegativeAuthority`].

use async_trait::async_trait;
use hickory_proto::op::{Query, ResponseCode};
use hickory_proto::rr::{LowerName, Name, Record, RecordSet, RecordType};
use hickory_server::authority::{
    Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords, MessageRequest,
    UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::refresh::RefreshScheduler;
use crate::resolver::ClientResolver;

/// Origin for `zone`; `"."` and `""` give the root.
pub(crate) fn zone_origin(zone: &str) -> Result<LowerName, hickory_proto::ProtoError> {
    let zone = zone.trim_end_matches('.');
    if zone.is_empty() {
        return Ok(Name::root().into());
    }
    Ok(Name::from_ascii(format!("{zone}."))?.into())
}

fn query_from(request_info: &RequestInfo<'_>) -> Query {
    let lower = request_info.query;
    let mut query = Query::query(Name::from(lower.name().clone()), lower.query_type());
    query.set_query_class(lower.query_class());
    query
}

/// Authority for one served suffix.
pub struct ClientAuthority {
    origin: LowerName,
    resolver: ClientResolver,
    scheduler: RefreshScheduler,
}

impl ClientAuthority {
    /// Create an authority for `suffix`.
    pub fn new(
        suffix: &str,
        resolver: ClientResolver,
        scheduler: RefreshScheduler,
    ) -> Result<Self, hickory_proto::ProtoError> {
        Ok(Self {
            origin: zone_origin(suffix)?,
            resolver,
            scheduler,
        })
    }

    fn records(
        answers: Vec<Record>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<LookupRecords> {
        let mut answers = answers.into_iter();
        match answers.next() {
            Some(record) => {
                let mut record_set = RecordSet::new(record.name().clone(), record.record_type(), 0);
                record_set.insert(record, 0);
                LookupControlFlow::Break(Ok(LookupRecords::new(
                    lookup_options,
                    Arc::new(record_set),
                )))
            }
            None => LookupControlFlow::Skip,
        }
    }
}

#[async_trait]
impl Authority for ClientAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    /// Catalog-internal lookups (SOA, NS). Not counted as requests.
    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        trace!(name = %name, rtype = ?rtype, "DNS lookup");
        let query = Query::query(Name::from(name.clone()), rtype);
        let view = self.resolver.view();
        let answers = self.resolver.answer(&view, &query).into_iter().collect();
        Self::records(answers, lookup_options)
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // First query served wins the race to launch the refresh loop.
        if self.scheduler.start() {
            debug!(origin = %self.origin, "refresh loop launched by first query");
        }

        let query = query_from(&request_info);
        let answers = self.resolver.resolve_queries(std::slice::from_ref(&query));
        if answers.is_empty() {
            trace!(name = %query.name(), rtype = ?query.query_type(), "falling through");
        }
        Self::records(answers, lookup_options)
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // DNSSEC not supported
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
    }

    async fn update(&self, _update: &MessageRequest) -> UpdateResult<bool> {
        // Dynamic updates not supported
        Err(ResponseCode::NotImp)
    }
}

/// Last authority of a served zone when no upstream is configured.
///
/// Names the cache knows (under any address family) and the zone apex get
/// NODATA; everything else gets NXDOMAIN. Both are authoritative.
pub struct NegativeAuthority {
    origin: LowerName,
    resolver: ClientResolver,
}

impl NegativeAuthority {
    /// Create the terminal authority for `suffix`.
    pub fn new(suffix: &str, resolver: ClientResolver) -> Result<Self, hickory_proto::ProtoError> {
        Ok(Self {
            origin: zone_origin(suffix)?,
            resolver,
        })
    }

    fn name_exists(&self, name: &LowerName) -> bool {
        if *name == self.origin {
            return true;
        }
        let name = Name::from(name.clone()).to_ascii();
        self.resolver.view().snapshot().contains_name(&name)
    }
}

#[async_trait]
impl Authority for NegativeAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        _name: &LowerName,
        _rtype: RecordType,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        LookupControlFlow::Skip
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let name = request_info.query.name();
        if self.name_exists(name) {
            trace!(name = %name, "no data for this type");
            LookupControlFlow::Break(Err(LookupError::NameExists))
        } else {
            trace!(name = %name, "no such name");
            LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NXDomain)))
        }
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

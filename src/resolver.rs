//! Query-time read path: answering A/AAAA questions from the client cache.

use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Record, RecordType};
use tracing::debug;

use crate::domains::NetworkDomains;
use crate::metrics::{self, QueryResult, Timer};
use crate::state::{CacheView, ClientCache};

/// Answers questions for names under the served suffixes.
#[derive(Debug, Clone)]
pub struct ClientResolver {
    cache: ClientCache,
    domains: NetworkDomains,
}

impl ClientResolver {
    /// Create a resolver reading from `cache`.
    pub fn new(cache: ClientCache, domains: NetworkDomains) -> Self {
        Self { cache, domains }
    }

    /// The cache this resolver reads.
    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    /// The served suffixes.
    pub fn domains(&self) -> &NetworkDomains {
        &self.domains
    }

    /// Take a consistent view of the cache for one query.
    pub fn view(&self) -> CacheView {
        self.cache.view()
    }

    /// Answer a single question from `view`, or `None` if it is not ours.
    pub fn answer(&self, view: &CacheView, query: &Query) -> Option<Record> {
        if query.query_class() != DNSClass::IN {
            return None;
        }
        match query.query_type() {
            RecordType::A | RecordType::AAAA => {}
            _ => return None,
        }

        let name = query.name().to_ascii();
        if !self.domains.is_served(&name) {
            return None;
        }
        view.answer(&name, query.query_type())
    }

    /// Resolve every question of `request`.
    ///
    /// Returns a reply carrying all collected answers, or `None` when nothing
    /// matched and the next handler should run.
    pub fn resolve(&self, request: &Message) -> Option<Message> {
        let answers = self.resolve_queries(request.queries());
        if answers.is_empty() {
            return None;
        }

        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(request.op_code())
            .set_recursion_desired(request.recursion_desired())
            .set_checking_disabled(request.checking_disabled())
            .set_authoritative(true)
            .set_response_code(ResponseCode::NoError);
        response.add_queries(request.queries().to_vec());
        response.add_answers(answers);
        Some(response)
    }

    /// Answer `queries` from one cache view, counting one request.
    ///
    /// This is the query path shared by [`resolve`](Self::resolve) and the
    /// catalog authority. It owns the request counter and outcome metrics.
    pub fn resolve_queries(&self, queries: &[Query]) -> Vec<Record> {
        metrics::record_request();
        let timer = Timer::start();

        let Some(first) = queries.first() else {
            return Vec::new();
        };
        let rtype_str = format!("{:?}", first.query_type());

        let view = self.view();
        let answers: Vec<Record> = queries
            .iter()
            .filter_map(|query| self.answer(&view, query))
            .collect();

        if answers.is_empty() {
            metrics::record_query(&rtype_str, QueryResult::FallThrough, timer.elapsed());
        } else {
            debug!(answers = answers.len(), "answering from client cache");
            metrics::record_query(&rtype_str, QueryResult::Answered, timer.elapsed());
        }
        answers
    }
}

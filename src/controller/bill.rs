//! Census for one bill in one district.

use super::cache_aside::CacheAside;
use crate::analysis::DemographicAggregator;
use crate::cache::ResultCache;
use crate::error::CensusError;
use crate::models::{CensusRequest, CensusResult, Query, Served};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info_span, warn, Instrument, Span};

/// Validates a census request and serves it through the cache.
pub struct BillController {
    aggregator: DemographicAggregator,
    cache: CacheAside,
    span: Span,
}

impl BillController {
    pub fn new(aggregator: DemographicAggregator, cache: Arc<dyn ResultCache>, ttl: Duration) -> Self {
        Self {
            aggregator,
            cache: CacheAside::new(cache, ttl),
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.aggregator = self.aggregator.with_span(span.clone());
        self.span = span;
        self
    }

    /// Invalid requests are rejected before the cache or any reader is touched.
    pub async fn handle(&self, request: &CensusRequest) -> Result<Served<CensusResult>, CensusError> {
        let query = Query::parse(request).map_err(|e| {
            warn!(
                "Rejected request (billId: {:?}, state: {:?}, district: {:?}): {}",
                request.bill_id, request.state, request.district, e
            );
            e
        })?;

        let span = info_span!(parent: &self.span, "census", key = %query.cache_key());
        self.cache
            .serve(query.cache_key(), self.aggregator.aggregate(&query))
            .instrument(span)
            .await
    }
}

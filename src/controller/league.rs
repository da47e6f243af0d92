//! District league: the most engaged district of every state for a bill.

use super::cache_aside::CacheAside;
use crate::cache::ResultCache;
use crate::error::{CensusError, SourceError};
use crate::models::{DistrictLeague, LeagueQuery, LeagueRequest, Served};
use crate::sources::DistrictLeagueReader;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument, Span};

/// Serves the district league for a bill.
pub struct LeagueController {
    league: Arc<dyn DistrictLeagueReader>,
    cache: CacheAside,
    span: Span,
}

impl LeagueController {
    pub fn new(league: Arc<dyn DistrictLeagueReader>, cache: Arc<dyn ResultCache>, ttl: Duration) -> Self {
        Self {
            league,
            cache: CacheAside::new(cache, ttl),
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub async fn handle(&self, request: &LeagueRequest) -> Result<Served<DistrictLeague>, CensusError> {
        let query = LeagueQuery::parse(request).map_err(|e| {
            warn!("Rejected league request (billId: {:?}): {}", request.bill_id, e);
            e
        })?;

        let span = info_span!(parent: &self.span, "league", bill_id = %query.bill_id);
        self.cache
            .serve(query.cache_key(), self.build(&query.bill_id))
            .instrument(span)
            .await
    }

    async fn build(&self, bill_id: &str) -> Result<DistrictLeague, SourceError> {
        let league = self.league.league(bill_id).await?;
        debug!("League for {} has {} states", bill_id, league.league.len());
        Ok(league)
    }
}

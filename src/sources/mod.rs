//! Data source capabilities consumed by the aggregators.
//!
//! Each reader is an object-safe async trait so components can be wired
//! with `Arc<dyn ...>` at construction. [`dataset::CensusDataset`] is the
//! bundled implementation of all of them.

pub mod dataset;

use crate::error::SourceError;
use crate::models::{
    AgeRange, District, DistrictLeague, PopulationGender, Query, RawBreakdown, VoteCountRow,
};
use async_trait::async_trait;

pub use dataset::CensusDataset;

/// Population counts from the census tables.
#[async_trait]
pub trait PopulationReader: Send + Sync {
    /// Total population of a district.
    async fn by_district(&self, area: &District) -> Result<u64, SourceError>;

    /// Population of one gender in a district.
    async fn by_district_and_gender(
        &self,
        area: &District,
        gender: PopulationGender,
    ) -> Result<u64, SourceError>;

    /// Population of one gender within an age range of a district.
    async fn by_district_gender_and_range(
        &self,
        area: &District,
        gender: PopulationGender,
        range: AgeRange,
    ) -> Result<u64, SourceError>;
}

/// Vote tallies for a bill.
#[async_trait]
pub trait VoteCountReader: Send + Sync {
    /// `None` means no votes were recorded for the query.
    async fn by_district(&self, query: &Query) -> Result<Option<VoteCountRow>, SourceError>;
}

/// Per-gender, per-age-range vote tallies for a bill.
#[async_trait]
pub trait GenderBreakdownReader: Send + Sync {
    async fn gender_breakdown_for_age_ranges(
        &self,
        query: &Query,
        ranges: &[AgeRange],
    ) -> Result<RawBreakdown, SourceError>;
}

/// The most engaged district of each state for a bill.
#[async_trait]
pub trait DistrictLeagueReader: Send + Sync {
    async fn league(&self, bill_id: &str) -> Result<DistrictLeague, SourceError>;
}

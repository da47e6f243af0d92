//! Census aggregation for one (state, district, bill).
//!
//! Four independent branches run concurrently and are merged into a single
//! [`CensusResult`]:
//!
//! 1. total district population
//! 2. vote tallies, overall and per gender
//! 3. population and sample size per gender
//! 4. the gender-by-age breakdown, each range carrying its own population
//!
//! The overall sample size is computed last, from the merged document.

use super::fanout::join_all;
use super::merge::{self, GenderPopulation};
use super::ranges::{AgeRangePopulationFetcher, GenderRangeAggregator};
use crate::error::SourceError;
use crate::models::{
    AgeRange, Breakdown, CensusResult, District, Gender, PopulationGender, Query, VoteCountRow,
    AGE_RANGES,
};
use crate::sampler::Sampler;
use crate::sources::{CensusDataset, GenderBreakdownReader, PopulationReader, VoteCountReader};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info_span, warn, Instrument, Span};

/// Everything the aggregator reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub population: Arc<dyn PopulationReader>,
    pub votes: Arc<dyn VoteCountReader>,
    pub breakdown: Arc<dyn GenderBreakdownReader>,
    pub sampler: Arc<dyn Sampler>,
}

impl Collaborators {
    /// Wire every reader to the same dataset.
    pub fn from_dataset(dataset: Arc<CensusDataset>, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            population: dataset.clone(),
            votes: dataset.clone(),
            breakdown: dataset,
            sampler,
        }
    }
}

/// Output of one top-level branch.
#[derive(Debug)]
enum Branch {
    Population(u64),
    Votes(Option<VoteCountRow>),
    GenderPopulation(Vec<GenderPopulation>),
    Breakdown(Option<Breakdown>),
}

/// Builds the census document for a query.
#[derive(Clone)]
pub struct DemographicAggregator {
    sources: Collaborators,
    ranges: Arc<[AgeRange]>,
    range_aggregator: GenderRangeAggregator,
    span: Span,
}

impl DemographicAggregator {
    pub fn new(sources: Collaborators) -> Self {
        let range_aggregator = GenderRangeAggregator::new(AgeRangePopulationFetcher::new(
            sources.population.clone(),
            sources.sampler.clone(),
        ));
        Self {
            sources,
            ranges: Arc::from(AGE_RANGES.as_slice()),
            range_aggregator,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.range_aggregator = self.range_aggregator.with_span(span.clone());
        self.span = span;
        self
    }

    /// Run all branches and merge them. Any branch failure fails the whole
    /// aggregation, after the other branches have finished.
    pub async fn aggregate(&self, query: &Query) -> Result<CensusResult, SourceError> {
        let area = query.area();
        let mut branches: JoinSet<Result<Branch, SourceError>> = JoinSet::new();

        branches.spawn(
            population_branch(self.sources.population.clone(), area.clone())
                .instrument(info_span!(parent: &self.span, "population")),
        );
        branches.spawn(
            vote_branch(self.sources.votes.clone(), query.clone())
                .instrument(info_span!(parent: &self.span, "votes")),
        );
        branches.spawn(
            gender_population_branch(
                self.sources.population.clone(),
                self.sources.sampler.clone(),
                area.clone(),
                self.span.clone(),
            )
            .instrument(info_span!(parent: &self.span, "gender_population")),
        );
        branches.spawn(
            breakdown_branch(
                self.sources.breakdown.clone(),
                self.range_aggregator.clone(),
                self.ranges.clone(),
                query.clone(),
            )
            .instrument(info_span!(parent: &self.span, "breakdown")),
        );

        let outputs = join_all(branches).await.map_err(|e| {
            error!("Aggregation for {} failed: {}", query.cache_key(), e);
            e
        })?;

        let mut result = CensusResult::default();
        for output in outputs {
            match output {
                Branch::Population(population) => result.population = population,
                Branch::Votes(row) => merge::apply_vote_counts(&mut result, row.as_ref()),
                Branch::GenderPopulation(entries) => {
                    for entry in &entries {
                        merge::apply_gender_population(&mut result, entry);
                    }
                }
                Branch::Breakdown(Some(breakdown)) => merge::apply_breakdown(&mut result, breakdown),
                Branch::Breakdown(None) => {}
            }
        }

        result.sample_size = self.sources.sampler.sample_size(&result);
        debug!(
            "Aggregated {}: population {}, sample {}",
            query.cache_key(),
            result.population,
            result.sample_size
        );
        Ok(result)
    }
}

async fn population_branch(
    reader: Arc<dyn PopulationReader>,
    area: District,
) -> Result<Branch, SourceError> {
    let population = reader.by_district(&area).await?;
    Ok(Branch::Population(population))
}

async fn vote_branch(reader: Arc<dyn VoteCountReader>, query: Query) -> Result<Branch, SourceError> {
    let row = reader.by_district(&query).await?;
    Ok(Branch::Votes(row))
}

/// Population for every gender the census tables know about.
async fn gender_population_branch(
    reader: Arc<dyn PopulationReader>,
    sampler: Arc<dyn Sampler>,
    area: District,
    span: Span,
) -> Result<Branch, SourceError> {
    let mut tasks: JoinSet<Result<GenderPopulation, SourceError>> = JoinSet::new();

    for gender in Gender::ALL.iter().filter_map(Gender::population_code) {
        let reader = reader.clone();
        let sampler = sampler.clone();
        let area = area.clone();
        tasks.spawn(
            async move {
                let population = reader.by_district_and_gender(&area, gender).await?;
                Ok::<_, SourceError>(GenderPopulation {
                    gender,
                    population,
                    sample_size: sampler.sample_size(&population),
                })
            }
            .instrument(info_span!(parent: &span, "gender", gender = %gender)),
        );
    }

    Ok(Branch::GenderPopulation(join_all(tasks).await?))
}

/// Fetch the breakdown, then attach range populations for male and female.
///
/// A breakdown missing any gender is dropped with a warning rather than
/// failing the aggregation. Non-binary ranges never get a population.
async fn breakdown_branch(
    reader: Arc<dyn GenderBreakdownReader>,
    range_aggregator: GenderRangeAggregator,
    ranges: Arc<[AgeRange]>,
    query: Query,
) -> Result<Branch, SourceError> {
    let raw = reader.gender_breakdown_for_age_ranges(&query, &ranges).await?;

    let missing = raw.missing_keys();
    let Some(mut breakdown) = raw.into_complete() else {
        warn!(
            "Gender breakdown for {} is missing {:?}, leaving ranges out",
            query.cache_key(),
            missing
        );
        return Ok(Branch::Breakdown(None));
    };

    // Both genders run to completion before either error is surfaced.
    let area = query.area();
    let (male, female) = futures::join!(
        range_aggregator.attach_population(
            &area,
            PopulationGender::Male,
            std::mem::take(&mut breakdown.male)
        ),
        range_aggregator.attach_population(
            &area,
            PopulationGender::Female,
            std::mem::take(&mut breakdown.female)
        ),
    );
    breakdown.male = male?;
    breakdown.female = female?;

    Ok(Branch::Breakdown(Some(breakdown)))
}

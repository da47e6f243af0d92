//! Merging branch outputs into a census document.
//!
//! Each function writes a disjoint set of fields, so branch results can be
//! applied in any order.

use crate::models::{Breakdown, CensusResult, Gender, PopulationGender, RangeBucket, VoteCountRow};
use tracing::warn;

/// Population and sample size of one gender in the district.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenderPopulation {
    pub gender: PopulationGender,
    pub population: u64,
    pub sample_size: u64,
}

/// Population and sample size of one age range, by its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePopulation {
    pub index: usize,
    pub population: u64,
    pub sample_size: u64,
}

/// Copy overall and per-gender vote tallies. No row means no votes.
pub fn apply_vote_counts(result: &mut CensusResult, row: Option<&VoteCountRow>) {
    let Some(row) = row else {
        warn!("No vote counts found, reporting zero votes");
        for gender in Gender::ALL {
            result.gender.bucket_mut(gender).votes = Default::default();
        }
        result.votes = Default::default();
        return;
    };

    result.votes = row.overall();
    for gender in Gender::ALL {
        result.gender.bucket_mut(gender).votes = row.for_gender(gender);
    }
}

pub fn apply_gender_population(result: &mut CensusResult, entry: &GenderPopulation) {
    let bucket = result.gender.bucket_mut(entry.gender.gender());
    bucket.population = Some(entry.population);
    bucket.sample_size = Some(entry.sample_size);
}

/// Attach the age ranges of each gender. "they" lands in `nonBinary`.
pub fn apply_breakdown(result: &mut CensusResult, breakdown: Breakdown) {
    result.gender.male.ranges = Some(breakdown.male);
    result.gender.female.ranges = Some(breakdown.female);
    result.gender.non_binary.ranges = Some(breakdown.non_binary);
}

/// Write fetched populations back onto the ranges they were fetched for.
pub fn apply_range_populations(ranges: &mut [RangeBucket], populations: &[RangePopulation]) {
    for entry in populations {
        if let Some(bucket) = ranges.get_mut(entry.index) {
            bucket.population = Some(entry.population);
            bucket.sample_size = Some(entry.sample_size);
        }
    }
}

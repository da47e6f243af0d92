//! Data models for the census aggregator.
//!
//! This module contains the query types, the hierarchical census document
//! that gets cached and returned, and the raw shapes the data readers hand
//! back before they are merged.

use crate::error::CensusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed, process-wide age partition. Half-open except the last range.
pub const AGE_RANGES: [AgeRange; 4] = [
    AgeRange { min: 18, max: 30 },
    AgeRange { min: 30, max: 45 },
    AgeRange { min: 45, max: 60 },
    AgeRange { min: 60, max: 120 },
];

/// An age bucket used to partition the breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

/// Index of the range containing `age`.
///
/// Every range is `[min, max)` except the last one in `ranges`, which also
/// includes its upper bound.
pub fn range_index_for_age(ranges: &[AgeRange], age: u32) -> Option<usize> {
    let last = ranges.len().checked_sub(1)?;
    ranges.iter().enumerate().position(|(i, range)| {
        age >= range.min && (age < range.max || (i == last && age == range.max))
    })
}

/// Gender buckets present in every census document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    NonBinary,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::NonBinary];

    /// Field name of the bucket in the census document.
    pub fn bucket_name(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::NonBinary => "nonBinary",
        }
    }

    /// Key used by the gender breakdown source. Non-binary voters are "they" there.
    pub fn breakdown_key(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::NonBinary => "they",
        }
    }

    /// Population tables are only keyed by M/F, so non-binary has no code.
    pub fn population_code(&self) -> Option<PopulationGender> {
        match self {
            Gender::Male => Some(PopulationGender::Male),
            Gender::Female => Some(PopulationGender::Female),
            Gender::NonBinary => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bucket_name())
    }
}

/// Gender as recorded in the population tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PopulationGender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl PopulationGender {
    pub fn code(&self) -> char {
        match self {
            PopulationGender::Male => 'M',
            PopulationGender::Female => 'F',
        }
    }

    pub fn gender(&self) -> Gender {
        match self {
            PopulationGender::Male => Gender::Male,
            PopulationGender::Female => Gender::Female,
        }
    }
}

impl fmt::Display for PopulationGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A census request as it arrives, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CensusRequest {
    pub state: Option<String>,
    pub district: Option<String>,
    pub bill_id: Option<String>,
}

/// A validated census query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub state: String,
    pub district: i64,
    pub bill_id: String,
}

impl Query {
    /// Validate a raw request into a query.
    ///
    /// All three fields must be present and non-empty, and `district` must
    /// parse as an integer.
    pub fn parse(request: &CensusRequest) -> Result<Self, CensusError> {
        let bill_id = required(request.bill_id.as_deref(), "billId")?;
        let state = required(request.state.as_deref(), "state")?;
        let district = required(request.district.as_deref(), "district")?;

        let district = district
            .trim()
            .parse::<i64>()
            .map_err(|_| CensusError::invalid(format!("district '{}' is not an integer", district)))?;

        Ok(Self {
            state: state.to_string(),
            district,
            bill_id: bill_id.to_string(),
        })
    }

    /// One cached document per (state, billId, district).
    pub fn cache_key(&self) -> String {
        format!("{}-{}-{}", self.state, self.bill_id, self.district)
    }

    pub fn area(&self) -> District {
        District {
            state: self.state.clone(),
            district: self.district,
        }
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, CensusError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CensusError::invalid(format!("missing {}", field))),
    }
}

/// A (state, district) pair, the unit the population tables are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct District {
    pub state: String,
    pub district: i64,
}

impl fmt::Display for District {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.state, self.district)
    }
}

/// A district league request as it arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeagueRequest {
    pub bill_id: Option<String>,
}

/// A validated district league query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeagueQuery {
    pub bill_id: String,
}

impl LeagueQuery {
    pub fn parse(request: &LeagueRequest) -> Result<Self, CensusError> {
        let bill_id = required(request.bill_id.as_deref(), "billId")?;
        Ok(Self {
            bill_id: bill_id.to_string(),
        })
    }

    pub fn cache_key(&self) -> String {
        format!("{}-districtleague", self.bill_id)
    }
}

/// Yes/no/total vote counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub yes: u64,
    pub no: u64,
    pub total: u64,
}

impl VoteTally {
    /// Build a tally, defaulting missing yes/no counts to zero.
    ///
    /// `total` is always `yes + no`; a reported total that disagrees is ignored.
    pub fn from_counts(total: Option<u64>, yes: Option<u64>, no: Option<u64>) -> Self {
        let tally = Self::from_yes_no(yes.unwrap_or(0), no.unwrap_or(0));
        if let Some(reported) = total.filter(|reported| *reported != tally.total) {
            tracing::debug!(
                "Reported vote total {} disagrees with yes + no = {}",
                reported,
                tally.total
            );
        }
        tally
    }

    /// Tally built from yes/no counts alone.
    pub fn from_yes_no(yes: u64, no: u64) -> Self {
        Self {
            yes,
            no,
            total: yes + no,
        }
    }
}

/// Per-age-range slice of a gender bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeBucket {
    pub min_age: u32,
    pub max_age: u32,
    pub votes: VoteTally,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u64>,
}

impl RangeBucket {
    pub fn new(range: AgeRange, votes: VoteTally) -> Self {
        Self {
            min_age: range.min,
            max_age: range.max,
            votes,
            population: None,
            sample_size: None,
        }
    }

    pub fn age_range(&self) -> AgeRange {
        AgeRange {
            min: self.min_age,
            max: self.max_age,
        }
    }
}

/// Votes, population and the age breakdown for one gender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderBucket {
    #[serde(default)]
    pub votes: VoteTally,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Vec<RangeBucket>>,
}

/// The three gender buckets of a census document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderBuckets {
    pub male: GenderBucket,
    pub female: GenderBucket,
    pub non_binary: GenderBucket,
}

impl GenderBuckets {
    pub fn bucket(&self, gender: Gender) -> &GenderBucket {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
            Gender::NonBinary => &self.non_binary,
        }
    }

    pub fn bucket_mut(&mut self, gender: Gender) -> &mut GenderBucket {
        match gender {
            Gender::Male => &mut self.male,
            Gender::Female => &mut self.female,
            Gender::NonBinary => &mut self.non_binary,
        }
    }
}

/// The aggregate census document. This is what gets cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CensusResult {
    pub population: u64,
    pub sample_size: u64,
    pub votes: VoteTally,
    pub gender: GenderBuckets,
}

/// Raw vote count row as produced by the vote count reader.
///
/// Fields follow the `{gender}`, `{gender}Yes`, `{gender}No` convention;
/// any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCountRow {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub yes: Option<u64>,
    #[serde(default)]
    pub no: Option<u64>,
    #[serde(default)]
    pub male: Option<u64>,
    #[serde(default)]
    pub male_yes: Option<u64>,
    #[serde(default)]
    pub male_no: Option<u64>,
    #[serde(default)]
    pub female: Option<u64>,
    #[serde(default)]
    pub female_yes: Option<u64>,
    #[serde(default)]
    pub female_no: Option<u64>,
    #[serde(default)]
    pub non_binary: Option<u64>,
    #[serde(default)]
    pub non_binary_yes: Option<u64>,
    #[serde(default)]
    pub non_binary_no: Option<u64>,
}

impl VoteCountRow {
    pub fn overall(&self) -> VoteTally {
        VoteTally::from_counts(self.total, self.yes, self.no)
    }

    pub fn for_gender(&self, gender: Gender) -> VoteTally {
        match gender {
            Gender::Male => VoteTally::from_counts(self.male, self.male_yes, self.male_no),
            Gender::Female => VoteTally::from_counts(self.female, self.female_yes, self.female_no),
            Gender::NonBinary => {
                VoteTally::from_counts(self.non_binary, self.non_binary_yes, self.non_binary_no)
            }
        }
    }
}

/// Age ranges for one gender in a breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderRanges {
    pub ranges: Vec<RangeBucket>,
}

/// Gender breakdown exactly as the reader returns it. Any key may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBreakdown {
    #[serde(default)]
    pub male: Option<GenderRanges>,
    #[serde(default)]
    pub female: Option<GenderRanges>,
    #[serde(default)]
    pub they: Option<GenderRanges>,
}

/// A breakdown known to carry all three genders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakdown {
    pub male: Vec<RangeBucket>,
    pub female: Vec<RangeBucket>,
    pub non_binary: Vec<RangeBucket>,
}

impl RawBreakdown {
    /// `None` when any of male/female/they is missing.
    pub fn into_complete(self) -> Option<Breakdown> {
        match (self.male, self.female, self.they) {
            (Some(male), Some(female), Some(they)) => Some(Breakdown {
                male: male.ranges,
                female: female.ranges,
                non_binary: they.ranges,
            }),
            _ => None,
        }
    }

    /// Names of the keys that are absent.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.male.is_none() {
            missing.push(Gender::Male.breakdown_key());
        }
        if self.female.is_none() {
            missing.push(Gender::Female.breakdown_key());
        }
        if self.they.is_none() {
            missing.push(Gender::NonBinary.breakdown_key());
        }
        missing
    }
}

/// One row of a district league: the most engaged district of a state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntry {
    pub state: String,
    pub district: i64,
    pub hits: u64,
}

/// District league document for a bill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictLeague {
    pub total: u64,
    pub league: Vec<LeagueEntry>,
}

/// Anything the sampler can derive a sample size from.
pub trait Populated {
    fn population(&self) -> u64;
}

impl Populated for u64 {
    fn population(&self) -> u64 {
        *self
    }
}

impl Populated for CensusResult {
    fn population(&self) -> u64 {
        self.population
    }
}

impl Populated for GenderBucket {
    fn population(&self) -> u64 {
        self.population.unwrap_or(0)
    }
}

impl Populated for RangeBucket {
    fn population(&self) -> u64 {
        self.population.unwrap_or(0)
    }
}

/// How a response was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Served<T> {
    /// Body read from the cache, untouched.
    Cached(String),
    /// Freshly aggregated document and the exact JSON it was serialized to.
    Computed { document: T, body: String },
}

impl<T> Served<T> {
    /// The response body as it goes on the wire.
    pub fn body(&self) -> &str {
        match self {
            Served::Cached(body) => body,
            Served::Computed { body, .. } => body,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Served::Cached(_))
    }
}

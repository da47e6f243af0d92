//! Test doubles shared by the unit tests.

use crate::cache::{CacheEntry, ResultCache};
use crate::error::{CacheError, SourceError};
use crate::models::{
    AgeRange, District, DistrictLeague, GenderRanges, LeagueEntry, Populated, PopulationGender,
    Query, RangeBucket, RawBreakdown, VoteCountRow, VoteTally, AGE_RANGES,
};
use crate::sampler::Sampler;
use crate::sources::{
    CensusDataset, DistrictLeagueReader, GenderBreakdownReader, PopulationReader,
    VoteCountReader,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// The bundled fixture dataset.
pub fn fixture_dataset() -> CensusDataset {
    CensusDataset::from_json(include_str!("../fixtures/census.json")).unwrap()
}

/// The query every aggregation test runs.
pub fn ca6() -> Query {
    Query {
        state: "CA".to_string(),
        district: 6,
        bill_id: "id".to_string(),
    }
}

/// The vote row from the reference scenario.
pub fn scenario_votes() -> VoteCountRow {
    VoteCountRow {
        total: Some(130),
        yes: Some(100),
        no: Some(30),
        male: Some(50),
        male_yes: Some(20),
        male_no: Some(30),
        female: Some(70),
        female_yes: Some(20),
        female_no: Some(50),
        non_binary: Some(10),
        non_binary_yes: Some(10),
        non_binary_no: Some(0),
    }
}

/// A complete breakdown with one vote in every range of every gender.
pub fn full_breakdown() -> RawBreakdown {
    let ranges = || GenderRanges {
        ranges: AGE_RANGES
            .iter()
            .map(|range| RangeBucket::new(*range, VoteTally::from_yes_no(1, 0)))
            .collect(),
    };
    RawBreakdown {
        male: Some(ranges()),
        female: Some(ranges()),
        they: Some(ranges()),
    }
}

/// Per-method call counters.
#[derive(Debug, Default)]
pub struct Calls {
    pub district: AtomicUsize,
    pub gender: AtomicUsize,
    pub range: AtomicUsize,
    pub votes: AtomicUsize,
    pub breakdown: AtomicUsize,
    pub league: AtomicUsize,
}

impl Calls {
    pub fn total(&self) -> usize {
        [
            &self.district,
            &self.gender,
            &self.range,
            &self.votes,
            &self.breakdown,
            &self.league,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

/// Scripted implementation of every reader capability.
///
/// Answers come from the public fields; failures and delays are switched on
/// per method. `finished` counts calls that ran to completion, failed or not.
#[derive(Debug)]
pub struct ScriptedSources {
    pub district_population: u64,
    pub gender_population: HashMap<PopulationGender, u64>,
    pub range_population: HashMap<(PopulationGender, AgeRange), u64>,
    pub votes: Option<VoteCountRow>,
    pub breakdown: RawBreakdown,
    pub league: DistrictLeague,

    pub fail_all_districts: bool,
    pub fail_gender: Option<PopulationGender>,
    pub fail_range: Option<(PopulationGender, AgeRange)>,
    pub fail_votes: bool,
    pub fail_breakdown: bool,
    pub fail_league: bool,

    pub votes_delay: Option<Duration>,
    pub breakdown_delay: Option<Duration>,

    pub calls: Calls,
    pub finished: AtomicUsize,
}

impl Default for ScriptedSources {
    fn default() -> Self {
        Self {
            district_population: 20,
            gender_population: HashMap::from([
                (PopulationGender::Male, 12),
                (PopulationGender::Female, 8),
            ]),
            range_population: HashMap::new(),
            votes: Some(scenario_votes()),
            breakdown: RawBreakdown::default(),
            league: DistrictLeague::default(),
            fail_all_districts: false,
            fail_gender: None,
            fail_range: None,
            fail_votes: false,
            fail_breakdown: false,
            fail_league: false,
            votes_delay: None,
            breakdown_delay: None,
            calls: Calls::default(),
            finished: AtomicUsize::new(0),
        }
    }
}

impl ScriptedSources {
    /// Run one scripted call: count it, wait, then fail or answer.
    async fn answer<T>(
        &self,
        counter: &AtomicUsize,
        delay: Option<Duration>,
        fail: bool,
        source_name: &'static str,
        value: impl FnOnce() -> T,
    ) -> Result<T, SourceError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.finished.fetch_add(1, Ordering::SeqCst);
        if fail {
            Err(SourceError::unavailable(source_name, "scripted failure"))
        } else {
            Ok(value())
        }
    }

    pub fn started(&self) -> usize {
        self.calls.total()
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PopulationReader for ScriptedSources {
    async fn by_district(&self, _area: &District) -> Result<u64, SourceError> {
        self.answer(&self.calls.district, None, self.fail_all_districts, "population", || {
            self.district_population
        })
        .await
    }

    async fn by_district_and_gender(
        &self,
        _area: &District,
        gender: PopulationGender,
    ) -> Result<u64, SourceError> {
        let fail = self.fail_gender == Some(gender);
        self.answer(&self.calls.gender, None, fail, "population", || {
            self.gender_population.get(&gender).copied().unwrap_or(0)
        })
        .await
    }

    async fn by_district_gender_and_range(
        &self,
        _area: &District,
        gender: PopulationGender,
        range: AgeRange,
    ) -> Result<u64, SourceError> {
        let fail = self.fail_range == Some((gender, range));
        self.answer(&self.calls.range, None, fail, "population", || {
            self.range_population
                .get(&(gender, range))
                .copied()
                .unwrap_or(0)
        })
        .await
    }
}

#[async_trait]
impl VoteCountReader for ScriptedSources {
    async fn by_district(&self, _query: &Query) -> Result<Option<VoteCountRow>, SourceError> {
        self.answer(&self.calls.votes, self.votes_delay, self.fail_votes, "votes", || {
            self.votes.clone()
        })
        .await
    }
}

#[async_trait]
impl GenderBreakdownReader for ScriptedSources {
    async fn gender_breakdown_for_age_ranges(
        &self,
        _query: &Query,
        _ranges: &[AgeRange],
    ) -> Result<RawBreakdown, SourceError> {
        self.answer(
            &self.calls.breakdown,
            self.breakdown_delay,
            self.fail_breakdown,
            "breakdown",
            || self.breakdown.clone(),
        )
        .await
    }
}

#[async_trait]
impl DistrictLeagueReader for ScriptedSources {
    async fn league(&self, _bill_id: &str) -> Result<DistrictLeague, SourceError> {
        self.answer(&self.calls.league, None, self.fail_league, "league", || {
            self.league.clone()
        })
        .await
    }
}

pub fn league_entry(state: &str, district: i64, hits: u64) -> LeagueEntry {
    LeagueEntry {
        state: state.to_string(),
        district,
        hits,
    }
}

/// Sampler returning a fixed size and remembering what it was asked about.
#[derive(Debug, Default)]
pub struct FixedSampler {
    pub size: u64,
    pub seen: Mutex<Vec<u64>>,
}

impl FixedSampler {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<u64> {
        self.seen.lock().unwrap().clone()
    }
}

impl Sampler for FixedSampler {
    fn sample_size(&self, subject: &dyn Populated) -> u64 {
        self.seen.lock().unwrap().push(subject.population());
        self.size
    }
}

/// In-memory cache that records every write and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingCache {
    pub stored: Mutex<HashMap<String, String>>,
    pub writes: Mutex<Vec<CacheEntry>>,
    pub reads: AtomicUsize,
    /// Reads behave like a broken backend: always a miss.
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl RecordingCache {
    pub fn with_entry(key: &str, body: &str) -> Self {
        let cache = Self::default();
        cache
            .stored
            .lock()
            .unwrap()
            .insert(key.to_string(), body.to_string());
        cache
    }

    pub fn writes(&self) -> Vec<CacheEntry> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultCache for RecordingCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return None;
        }
        self.stored.lock().unwrap().get(key).cloned()
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.writes.lock().unwrap().push(entry.clone());
        if self.fail_writes {
            return Err(CacheError::Backend("scripted write failure".to_string()));
        }
        self.stored.lock().unwrap().insert(entry.key, entry.body);
        Ok(())
    }
}

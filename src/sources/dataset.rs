//! In-memory census dataset.
//!
//! Loads population, voter and vote rows from a JSON file and answers every
//! reader capability from them. The shape of each answer matches what the
//! aggregators expect from a live census store.

use super::{DistrictLeagueReader, GenderBreakdownReader, PopulationReader, VoteCountReader};
use crate::error::SourceError;
use crate::models::{
    range_index_for_age, AgeRange, District, DistrictLeague, Gender, GenderRanges, LeagueEntry,
    PopulationGender, Query, RangeBucket, RawBreakdown, VoteCountRow, VoteTally,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// One census population row.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationRow {
    pub state: String,
    pub district: i64,
    pub gender: PopulationGender,
    pub age_low: u32,
    /// 0 marks an open-ended bucket (e.g. "80 and over").
    pub age_high: u32,
    pub population: u64,
}

/// Gender as recorded on a voter profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoterGender {
    Male,
    Female,
    They,
}

impl VoterGender {
    pub fn gender(&self) -> Gender {
        match self {
            VoterGender::Male => Gender::Male,
            VoterGender::Female => Gender::Female,
            VoterGender::They => Gender::NonBinary,
        }
    }
}

/// A registered voter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterRow {
    pub user_id: String,
    pub state: String,
    pub district: i64,
    pub gender: VoterGender,
    pub age: u32,
}

/// A single vote on a bill. `true` is a yes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRow {
    pub user_id: String,
    pub bill_id: String,
    pub vote: bool,
}

#[derive(Debug, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    population: Vec<PopulationRow>,
    #[serde(default)]
    voters: Vec<VoterRow>,
    #[serde(default)]
    votes: Vec<VoteRow>,
}

/// Census data held in memory.
#[derive(Debug, Clone, Default)]
pub struct CensusDataset {
    population: Vec<PopulationRow>,
    voters: HashMap<String, VoterRow>,
    votes: Vec<VoteRow>,
}

impl CensusDataset {
    /// Load a dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to load dataset: {}", path.display()))
    }

    /// Parse and validate a dataset document.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: DatasetFile =
            serde_json::from_str(content).context("Dataset is not valid census JSON")?;

        let mut voters = HashMap::with_capacity(file.voters.len());
        for voter in file.voters {
            if voter.user_id.is_empty() {
                bail!("Voter row without a userId");
            }
            let user_id = voter.user_id.clone();
            if voters.insert(user_id.clone(), voter).is_some() {
                bail!("Duplicate voter userId: {}", user_id);
            }
        }

        debug!(
            "Loaded dataset: {} population rows, {} voters, {} votes",
            file.population.len(),
            voters.len(),
            file.votes.len()
        );

        Ok(Self {
            population: file.population,
            voters,
            votes: file.votes,
        })
    }

    fn sum_population(&self, filter: impl Fn(&PopulationRow) -> bool) -> u64 {
        self.population
            .iter()
            .filter(|row| filter(row))
            .map(|row| row.population)
            .sum()
    }

    /// Votes on `bill_id` cast by voters of `area`, joined to the voter.
    fn district_votes<'a>(
        &'a self,
        bill_id: &'a str,
        area: &'a District,
    ) -> impl Iterator<Item = (&'a VoterRow, bool)> + 'a {
        self.votes
            .iter()
            .filter(move |vote| vote.bill_id == bill_id)
            .filter_map(move |vote| {
                self.voters
                    .get(&vote.user_id)
                    .filter(|voter| voter.state == area.state && voter.district == area.district)
                    .map(|voter| (voter, vote.vote))
            })
    }

    fn count_votes(&self, query: &Query) -> Option<VoteCountRow> {
        let area = query.area();
        let mut overall = Counts::default();
        let mut by_gender: HashMap<Gender, Counts> = HashMap::new();

        for (voter, yes) in self.district_votes(&query.bill_id, &area) {
            overall.record(yes);
            by_gender.entry(voter.gender.gender()).or_default().record(yes);
        }

        if overall.total == 0 {
            return None;
        }

        let gender = |g: Gender| by_gender.get(&g).copied().unwrap_or_default();
        let (male, female, non_binary) = (
            gender(Gender::Male),
            gender(Gender::Female),
            gender(Gender::NonBinary),
        );

        Some(VoteCountRow {
            total: Some(overall.total),
            yes: Some(overall.yes),
            no: Some(overall.no),
            male: Some(male.total),
            male_yes: Some(male.yes),
            male_no: Some(male.no),
            female: Some(female.total),
            female_yes: Some(female.yes),
            female_no: Some(female.no),
            non_binary: Some(non_binary.total),
            non_binary_yes: Some(non_binary.yes),
            non_binary_no: Some(non_binary.no),
        })
    }

    fn breakdown(&self, query: &Query, ranges: &[AgeRange]) -> RawBreakdown {
        let area = query.area();
        let mut counts: HashMap<Gender, Vec<Counts>> = Gender::ALL
            .iter()
            .map(|g| (*g, vec![Counts::default(); ranges.len()]))
            .collect();

        for (voter, yes) in self.district_votes(&query.bill_id, &area) {
            let Some(index) = range_index_for_age(ranges, voter.age) else {
                continue;
            };
            if let Some(slots) = counts.get_mut(&voter.gender.gender()) {
                slots[index].record(yes);
            }
        }

        let mut ranges_for = |gender: Gender| {
            let slots = counts.remove(&gender).unwrap_or_default();
            GenderRanges {
                ranges: ranges
                    .iter()
                    .zip(slots)
                    .map(|(range, c)| RangeBucket::new(*range, VoteTally::from_yes_no(c.yes, c.no)))
                    .collect(),
            }
        };

        RawBreakdown {
            male: Some(ranges_for(Gender::Male)),
            female: Some(ranges_for(Gender::Female)),
            they: Some(ranges_for(Gender::NonBinary)),
        }
    }

    fn league_for(&self, bill_id: &str) -> DistrictLeague {
        let mut hits: HashMap<(&str, i64), u64> = HashMap::new();
        for vote in self.votes.iter().filter(|v| v.bill_id == bill_id) {
            if let Some(voter) = self.voters.get(&vote.user_id) {
                if voter.state.is_empty() {
                    continue;
                }
                *hits.entry((voter.state.as_str(), voter.district)).or_default() += 1;
            }
        }

        // Top district per state; ties go to the lowest district number.
        let mut best: BTreeMap<&str, (i64, u64)> = BTreeMap::new();
        for ((state, district), count) in hits {
            best.entry(state)
                .and_modify(|current| {
                    if count > current.1 || (count == current.1 && district < current.0) {
                        *current = (district, count);
                    }
                })
                .or_insert((district, count));
        }

        let league: Vec<LeagueEntry> = best
            .into_iter()
            .map(|(state, (district, hits))| LeagueEntry {
                state: state.to_string(),
                district,
                hits,
            })
            .collect();

        DistrictLeague {
            total: league.iter().map(|e| e.hits).sum(),
            league,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    total: u64,
    yes: u64,
    no: u64,
}

impl Counts {
    fn record(&mut self, yes: bool) {
        self.total += 1;
        if yes {
            self.yes += 1;
        } else {
            self.no += 1;
        }
    }
}

#[async_trait]
impl PopulationReader for CensusDataset {
    async fn by_district(&self, area: &District) -> Result<u64, SourceError> {
        Ok(self.sum_population(|row| row.state == area.state && row.district == area.district))
    }

    async fn by_district_and_gender(
        &self,
        area: &District,
        gender: PopulationGender,
    ) -> Result<u64, SourceError> {
        Ok(self.sum_population(|row| {
            row.state == area.state && row.district == area.district && row.gender == gender
        }))
    }

    async fn by_district_gender_and_range(
        &self,
        area: &District,
        gender: PopulationGender,
        range: AgeRange,
    ) -> Result<u64, SourceError> {
        // Open-ended rows (age_high == 0) never fall inside a bounded range.
        Ok(self.sum_population(|row| {
            row.state == area.state
                && row.district == area.district
                && row.gender == gender
                && row.age_low >= range.min
                && row.age_high <= range.max
                && row.age_high > 0
        }))
    }
}

#[async_trait]
impl VoteCountReader for CensusDataset {
    async fn by_district(&self, query: &Query) -> Result<Option<VoteCountRow>, SourceError> {
        let row = self.count_votes(query);
        if row.is_none() {
            debug!("No votes for bill {} in {}", query.bill_id, query.area());
        }
        Ok(row)
    }
}

#[async_trait]
impl GenderBreakdownReader for CensusDataset {
    async fn gender_breakdown_for_age_ranges(
        &self,
        query: &Query,
        ranges: &[AgeRange],
    ) -> Result<RawBreakdown, SourceError> {
        Ok(self.breakdown(query, ranges))
    }
}

#[async_trait]
impl DistrictLeagueReader for CensusDataset {
    async fn league(&self, bill_id: &str) -> Result<DistrictLeague, SourceError> {
        Ok(self.league_for(bill_id))
    }
}

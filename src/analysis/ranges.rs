//! Population for the age ranges of one gender.

use super::fanout::join_all;
use super::merge::{apply_range_populations, RangePopulation};
use crate::error::SourceError;
use crate::models::{AgeRange, District, PopulationGender, RangeBucket};
use crate::sampler::Sampler;
use crate::sources::PopulationReader;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info_span, Instrument, Span};

/// Fetches the population of one (district, gender, range) and sizes a sample for it.
#[derive(Clone)]
pub struct AgeRangePopulationFetcher {
    population: Arc<dyn PopulationReader>,
    sampler: Arc<dyn Sampler>,
}

impl AgeRangePopulationFetcher {
    pub fn new(population: Arc<dyn PopulationReader>, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            population,
            sampler,
        }
    }

    /// Returns `(population, sample_size)`.
    pub async fn fetch(
        &self,
        area: &District,
        gender: PopulationGender,
        range: AgeRange,
    ) -> Result<(u64, u64), SourceError> {
        let population = self
            .population
            .by_district_gender_and_range(area, gender, range)
            .await?;
        let sample_size = self.sampler.sample_size(&population);
        debug!(
            "{} {} [{}, {}]: population {}, sample {}",
            area, gender, range.min, range.max, population, sample_size
        );
        Ok((population, sample_size))
    }
}

/// Attaches population and sample size to every range of a gender.
#[derive(Clone)]
pub struct GenderRangeAggregator {
    fetcher: AgeRangePopulationFetcher,
    span: Span,
}

impl GenderRangeAggregator {
    pub fn new(fetcher: AgeRangePopulationFetcher) -> Self {
        Self {
            fetcher,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// One lookup per range, all concurrent. The returned ranges keep their
    /// input order, and any failed lookup fails the whole gender.
    pub async fn attach_population(
        &self,
        area: &District,
        gender: PopulationGender,
        mut ranges: Vec<RangeBucket>,
    ) -> Result<Vec<RangeBucket>, SourceError> {
        let mut tasks: JoinSet<Result<RangePopulation, SourceError>> = JoinSet::new();
        for (index, bucket) in ranges.iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let area = area.clone();
            let range = bucket.age_range();
            let span = info_span!(parent: &self.span, "range", gender = %gender, min = range.min, max = range.max);

            tasks.spawn(
                async move {
                    let (population, sample_size) = fetcher.fetch(&area, gender, range).await?;
                    Ok::<_, SourceError>(RangePopulation {
                        index,
                        population,
                        sample_size,
                    })
                }
                .instrument(span),
            );
        }

        let populations = join_all(tasks).await?;
        apply_range_populations(&mut ranges, &populations);
        Ok(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{VoteTally, AGE_RANGES};
    use crate::testing::{FixedSampler, ScriptedSources};
    use std::sync::atomic::Ordering;

    fn ranges() -> Vec<RangeBucket> {
        AGE_RANGES
            .iter()
            .map(|r| RangeBucket::new(*r, VoteTally::from_yes_no(2, 1)))
            .collect()
    }

    fn area() -> District {
        District {
            state: "CA".to_string(),
            district: 6,
        }
    }

    fn aggregator(sources: Arc<ScriptedSources>, sampler: Arc<FixedSampler>) -> GenderRangeAggregator {
        GenderRangeAggregator::new(AgeRangePopulationFetcher::new(sources, sampler))
    }

    #[tokio::test]
    async fn test_attaches_population_in_order() {
        let mut sources = ScriptedSources::default();
        for (i, range) in AGE_RANGES.iter().enumerate() {
            sources
                .range_population
                .insert((PopulationGender::Male, *range), 100 * (i as u64 + 1));
        }
        let sources = Arc::new(sources);
        let sampler = Arc::new(FixedSampler::new(7));

        let ranges = aggregator(sources.clone(), sampler.clone())
            .attach_population(&area(), PopulationGender::Male, ranges())
            .await
            .unwrap();

        let populations: Vec<_> = ranges.iter().map(|r| r.population).collect();
        assert_eq!(populations, vec![Some(100), Some(200), Some(300), Some(400)]);
        assert!(ranges.iter().all(|r| r.sample_size == Some(7)));
        assert_eq!(ranges[3].min_age, 60);
        assert_eq!(ranges[3].votes.total, 3);
        assert_eq!(sources.calls.range.load(Ordering::SeqCst), 4);
        assert_eq!(sampler.seen().len(), 4);
    }

    #[tokio::test]
    async fn test_one_failed_range_fails_the_gender() {
        let sources = Arc::new(ScriptedSources {
            fail_range: Some((PopulationGender::Female, AGE_RANGES[1])),
            ..Default::default()
        });

        let result = aggregator(sources.clone(), Arc::new(FixedSampler::new(0)))
            .attach_population(&area(), PopulationGender::Female, ranges())
            .await;

        assert!(result.is_err());
        assert_eq!(sources.finished(), 4);
    }

    #[tokio::test]
    async fn test_empty_ranges_need_no_lookups() {
        let sources = Arc::new(ScriptedSources::default());
        let ranges = aggregator(sources.clone(), Arc::new(FixedSampler::new(0)))
            .attach_population(&area(), PopulationGender::Male, Vec::new())
            .await
            .unwrap();
        assert!(ranges.is_empty());
        assert_eq!(sources.started(), 0);
    }
}

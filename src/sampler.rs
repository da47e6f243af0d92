//! Sample size estimation.

use crate::config::SamplerConfig;
use crate::models::Populated;

/// Derives a sample size from anything that carries a population.
///
/// Implementations read the population and ignore every other field of the
/// subject, so a partially built census document is a valid argument.
pub trait Sampler: Send + Sync {
    fn sample_size(&self, subject: &dyn Populated) -> u64;
}

/// Cochran's formula with finite population correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CochranSampler {
    /// Standard score of the confidence level (1.96 for 95%).
    pub z_score: f64,
    /// Acceptable margin of error, as a fraction.
    pub margin_of_error: f64,
    /// Expected proportion; 0.5 is the most conservative.
    pub proportion: f64,
}

impl Default for CochranSampler {
    fn default() -> Self {
        Self {
            z_score: 1.96,
            margin_of_error: 0.05,
            proportion: 0.5,
        }
    }
}

impl From<&SamplerConfig> for CochranSampler {
    fn from(config: &SamplerConfig) -> Self {
        Self {
            z_score: config.z_score,
            margin_of_error: config.margin_of_error,
            proportion: config.proportion,
        }
    }
}

impl CochranSampler {
    /// Sample size for an infinite population.
    fn unbounded(&self) -> f64 {
        self.z_score.powi(2) * self.proportion * (1.0 - self.proportion)
            / self.margin_of_error.powi(2)
    }
}

impl Sampler for CochranSampler {
    fn sample_size(&self, subject: &dyn Populated) -> u64 {
        let population = subject.population();
        if population == 0 {
            return 0;
        }

        let n0 = self.unbounded();
        let n = n0 / (1.0 + (n0 - 1.0) / population as f64);
        (n.ceil() as u64).min(population)
    }
}

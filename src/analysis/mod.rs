//! Census aggregation.
//!
//! [`DemographicAggregator`] fans out to the data sources and merges the
//! answers into a census document. [`ranges::GenderRangeAggregator`] does
//! the same for the age ranges of a single gender.

pub mod aggregator;
pub mod fanout;
pub mod merge;
pub mod ranges;

pub use aggregator::{Collaborators, DemographicAggregator};

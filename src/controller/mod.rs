//! Request handlers.
//!
//! Each controller validates its request, then serves the answer through
//! the result cache, aggregating only on a miss.

pub mod bill;
pub mod cache_aside;
pub mod league;

pub use bill::BillController;
pub use league::LeagueController;

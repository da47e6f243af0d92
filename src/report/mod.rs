//! Output rendering for census and league responses.

pub mod generator;

pub use generator::{render_census, render_error, render_league, write_output};

//! Output rendering.
//!
//! `json` output is the response body exactly as served. `text` output is a
//! Markdown summary built from the document; a cached body that does not
//! parse as the expected document is printed as-is.

use crate::config::OutputFormat;
use crate::error::CensusError;
use crate::models::{
    CensusResult, DistrictLeague, Gender, GenderBucket, Query, RangeBucket, Served, VoteTally,
};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Render a census response.
pub fn render_census(served: &Served<CensusResult>, query: &Query, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => served.body().to_string(),
        OutputFormat::Text => match document(served) {
            Some(result) => generate_census_text(&result, query),
            None => served.body().to_string(),
        },
    }
}

/// Render a district league response.
pub fn render_league(served: &Served<DistrictLeague>, bill_id: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => served.body().to_string(),
        OutputFormat::Text => match document(served) {
            Some(league) => generate_league_text(&league, bill_id),
            None => served.body().to_string(),
        },
    }
}

/// The fixed JSON body for a failed request.
pub fn render_error(err: &CensusError) -> String {
    serde_json::to_string(&err.error_body())
        .unwrap_or_else(|_| format!("{{\"message\":\"{}\"}}", err.error_body().message))
}

/// The served document, parsing cached bodies on demand.
fn document<T: DeserializeOwned + Clone>(served: &Served<T>) -> Option<Cow<'_, T>> {
    match served {
        Served::Computed { document, .. } => Some(Cow::Borrowed(document)),
        Served::Cached(body) => match serde_json::from_str(body) {
            Ok(document) => Some(Cow::Owned(document)),
            Err(e) => {
                warn!("Cached body does not match the expected document, printing raw: {}", e);
                None
            }
        },
    }
}

/// Generate the Markdown summary of a census document.
fn generate_census_text(result: &CensusResult, query: &Query) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Census for {} in {}\n\n",
        query.bill_id,
        query.area()
    ));
    output.push_str(&format!("- **Population:** {}\n", result.population));
    output.push_str(&format!("- **Sample Size:** {}\n", result.sample_size));
    output.push_str(&format!("- **Votes:** {}\n\n", tally(&result.votes)));

    for gender in Gender::ALL {
        output.push_str(&generate_gender_section(gender, result.gender.bucket(gender)));
    }

    output
}

fn generate_gender_section(gender: Gender, bucket: &GenderBucket) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", gender.bucket_name()));
    section.push_str(&format!("- **Votes:** {}\n", tally(&bucket.votes)));
    match (bucket.population, bucket.sample_size) {
        (Some(population), Some(sample)) => section.push_str(&format!(
            "- **Population:** {} (sample size {})\n",
            population, sample
        )),
        (Some(population), None) => {
            section.push_str(&format!("- **Population:** {}\n", population))
        }
        _ => section.push_str("- **Population:** n/a\n"),
    }
    section.push('\n');

    if let Some(ref ranges) = bucket.ranges {
        section.push_str(&generate_range_table(ranges));
    }

    section
}

fn generate_range_table(ranges: &[RangeBucket]) -> String {
    let mut table = String::new();

    table.push_str("| Ages | Yes | No | Total | Population | Sample |\n");
    table.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    for range in ranges {
        table.push_str(&format!(
            "| {}-{} | {} | {} | {} | {} | {} |\n",
            range.min_age,
            range.max_age,
            range.votes.yes,
            range.votes.no,
            range.votes.total,
            optional(range.population),
            optional(range.sample_size),
        ));
    }
    table.push('\n');

    table
}

/// Generate the Markdown table of a district league.
fn generate_league_text(league: &DistrictLeague, bill_id: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!("# District league for {}\n\n", bill_id));
    output.push_str(&format!("- **Votes in top districts:** {}\n\n", league.total));

    if league.league.is_empty() {
        output.push_str("No votes recorded.\n");
        return output;
    }

    output.push_str("| State | District | Votes |\n");
    output.push_str("|:---|:---:|:---:|\n");
    for entry in &league.league {
        output.push_str(&format!(
            "| {} | {} | {} |\n",
            entry.state, entry.district, entry.hits
        ));
    }

    output
}

fn tally(votes: &VoteTally) -> String {
    format!("{} yes / {} no ({} total)", votes.yes, votes.no, votes.total)
}

fn optional(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Write rendered output to `path`, or stdout when no path is given.
pub fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write output to {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", content).context("Failed to write to stdout")
        }
    }
}

//! Approximate feature density over an interval.
//!
//! Counts come from a precomputed cumulative table keyed by
//! `(type, summary bin, reference frame)` rather than from scanning
//! features: each output-bin boundary is snapped to a summary-bin boundary
//! and the per-bin count is the delta of successive cumulative counts. The
//! trade is O(1) lookups per bin against roughly half-summary-bin
//! resolution; callers must not rely on output bins narrower than
//! [`SUMMARY_BIN_SIZE`].

use serde::Serialize;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::Segment;
use crate::ontology::OntologyTermIndex;

/// Width of one precomputed summary bin, in reference-frame units.
pub const SUMMARY_BIN_SIZE: i64 = 1000;

/// Estimated per-bin feature counts over a segment.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub counts: Vec<i64>,
    /// Comma-joined list of the requested type names.
    pub label: String,
    /// Width of one output bin in reference-frame units.
    pub bin_width: f64,
}

pub(crate) fn estimate(
    db: &Database,
    terms: &OntologyTermIndex,
    segment: &Segment,
    types: &[&str],
    bins: usize,
) -> Result<FeatureSummary> {
    if bins == 0 {
        return Err(Error::Config("feature summary requires at least one bin".into()));
    }

    let boundaries = boundary_bins(segment.start, segment.end, bins);
    let mut counts = vec![0i64; bins];

    for ty in types {
        // Homonymous type names contribute all their ids.
        let Some(type_ids) = terms.ids(ty) else {
            continue;
        };
        for type_id in type_ids.as_vec() {
            let Some(total) = db.cum_count_total(type_id, segment.feature_id)? else {
                continue;
            };
            let cums = boundaries
                .iter()
                .map(|&bin| {
                    db.cum_count_at_or_after(type_id, segment.feature_id, bin)
                        .map(|c| c.unwrap_or(total))
                })
                .collect::<Result<Vec<i64>>>()?;
            for (i, count) in counts.iter_mut().enumerate() {
                *count += (cums[i + 1] - cums[i]).max(0);
            }
        }
    }

    Ok(FeatureSummary {
        counts,
        label: types.join(","),
        bin_width: (segment.end - segment.start + 1) as f64 / bins as f64,
    })
}

/// Snap the `bins + 1` output-bin boundaries of a 1-based inclusive range
/// to summary-bin indices.
fn boundary_bins(start: i64, end: i64, bins: usize) -> Vec<i64> {
    let width = (end - start + 1) as f64 / bins as f64;
    (0..=bins)
        .map(|i| {
            let pos = start as f64 + i as f64 * width;
            pos as i64 / SUMMARY_BIN_SIZE
        })
        .collect()
}

use std::sync::Arc;

use serde::Serialize;

use super::{CvTerm, Segment, Strand};

/// A composed, caller-owned feature.
///
/// Coordinates are 1-based inclusive, expressed against `segment` when one
/// is present. Features of the configured reference class (and bare
/// reference sequences that other features map onto) are emitted with
/// `segment: None` and coordinates spanning their own extent.
///
/// Features sharing a reference frame within one result set share the same
/// `Arc<Segment>`; the segment never holds references back to its features.
#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    pub feature_id: i64,
    pub name: Option<String>,
    pub uniquename: String,
    pub kind: CvTerm,
    /// 1-based inclusive.
    pub start: i64,
    /// 1-based inclusive.
    pub end: i64,
    pub strand: Strand,
    pub phase: Option<i64>,
    /// Analysis significance, when the feature is an analysis result.
    pub score: Option<f64>,
    /// GFF source string resolved through the feature's dbxref provenance.
    pub source: Option<String>,
    pub segment: Option<Arc<Segment>>,
}

impl Feature {
    /// The display name: `name` when present, else `uniquename`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uniquename)
    }

    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Whether this feature was emitted as a reference frame rather than
    /// as an annotation on one.
    pub fn is_reference(&self) -> bool {
        self.segment.is_none()
    }
}

use serde::Serialize;

/// Strand of a feature relative to its reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strand {
    Reverse,
    #[default]
    Unknown,
    Forward,
}

impl Strand {
    /// Parse the `featureloc.strand` column (`-1`, `0`/NULL, `1`).
    pub fn from_db(value: Option<i64>) -> Self {
        match value {
            Some(v) if v < 0 => Strand::Reverse,
            Some(v) if v > 0 => Strand::Forward,
            _ => Strand::Unknown,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Strand::Reverse => -1,
            Strand::Unknown => 0,
            Strand::Forward => 1,
        }
    }

    /// The opposite orientation. Unknown stays unknown.
    pub fn flipped(&self) -> Self {
        match self {
            Strand::Reverse => Strand::Forward,
            Strand::Unknown => Strand::Unknown,
            Strand::Forward => Strand::Reverse,
        }
    }
}

/// A `featureloc` row: where a feature sits on its reference frame.
///
/// Coordinates are interbase: zero-based, half-open, `fmin < fmax`. The
/// external 1-based inclusive view is `start = fmin + 1`, `end = fmax`.
/// `rank = 0` marks the canonical mapping when a feature has several.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureLoc {
    pub feature_id: i64,
    /// The reference frame this location is expressed against. `None` for
    /// top-level reference sequences, which are not located on anything.
    pub srcfeature_id: Option<i64>,
    pub fmin: i64,
    pub fmax: i64,
    pub strand: Strand,
    pub phase: Option<i64>,
    pub rank: i64,
}

impl FeatureLoc {
    /// 1-based inclusive start.
    pub fn start(&self) -> i64 {
        self.fmin + 1
    }

    /// 1-based inclusive end.
    pub fn end(&self) -> i64 {
        self.fmax
    }

    pub fn len(&self) -> i64 {
        self.fmax - self.fmin
    }

    pub fn is_empty(&self) -> bool {
        self.fmax <= self.fmin
    }

    /// Interbase overlap test against `[qmin, qmax)`.
    pub fn overlaps(&self, qmin: i64, qmax: i64) -> bool {
        self.fmin < qmax && self.fmax > qmin
    }
}

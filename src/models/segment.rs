use serde::Serialize;

/// A named reference frame with 1-based inclusive bounds.
///
/// A segment plays a dual role: it is the coordinate context handed to
/// callers for range queries, and it is itself backed by a `feature` row
/// (a chromosome, contig, scaffold...), so it can appear as the resolved
/// reference sequence of a child feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub name: String,
    pub feature_id: i64,
    /// 1-based inclusive.
    pub start: i64,
    /// 1-based inclusive.
    pub end: i64,
}

impl Segment {
    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// The segment's extent as an interbase `[qmin, qmax)` pair, for
    /// overlap predicates against `featureloc`.
    pub fn interbase(&self) -> (i64, i64) {
        (self.start - 1, self.end)
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}..{}", self.name, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interbase_conversion() {
        let seg = Segment {
            name: "chr1".into(),
            feature_id: 1,
            start: 1,
            end: 10_000,
        };
        assert_eq!(seg.interbase(), (0, 10_000));
        assert_eq!(seg.len(), 10_000);
        assert_eq!(seg.to_string(), "chr1:1..10000");
    }
}

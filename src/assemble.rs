//! Hierarchical feature composition.
//!
//! Turns candidate feature ids into caller-owned [`Feature`] objects:
//! fetches canonical locations and scores, groups candidates by the
//! reference frame they are mapped onto (one shared [`Segment`] per frame),
//! and applies the session's assembly mode: direct two-level emission,
//! recursive coordinate remapping onto the top-most reference, or CDS
//! inference for coding-product features.

use std::sync::Arc;

use itertools::Itertools;

use crate::cds;
use crate::config::{AssemblyMode, StoreConfig};
use crate::db::{CandidateRow, Database};
use crate::error::Result;
use crate::models::{Feature, FeatureLoc, Segment, Strand};
use crate::ontology::OntologyTermIndex;

/// Nested reference frames deeper than this are treated as unmappable
/// (defends against relationship cycles in dirty data).
const MAX_REMAP_DEPTH: usize = 16;

pub(crate) struct Assembler<'a> {
    pub db: &'a Database,
    pub terms: &'a OntologyTermIndex,
    pub cfg: &'a StoreConfig,
    pub reference_type_ids: &'a [i64],
    pub source_db: Option<i64>,
}

impl Assembler<'_> {
    /// Compose features for the given candidate ids.
    ///
    /// Individual malformed candidates (missing frame row, unresolvable
    /// type) are skipped, not fatal; a storage failure aborts the whole
    /// call.
    pub fn assemble(&self, ids: &[i64]) -> Result<Vec<Feature>> {
        let mut out = Vec::new();
        let mut located: Vec<(CandidateRow, FeatureLoc)> = Vec::new();

        for cand in self.db.candidate_rows(ids)? {
            if cand.row.is_obsolete && !self.cfg.allow_obsolete {
                continue;
            }
            match cand.loc {
                Some(loc) if !self.reference_type_ids.contains(&cand.row.type_id) => {
                    located.push((cand, loc));
                }
                Some(_) => {
                    // The reference class itself: emitted as a
                    // segment-rooted feature with no parent.
                    if let Some(feature) = self.reference_feature(&cand)? {
                        out.push(feature);
                    }
                }
                None => {
                    // No location row: a top-level reference sequence if
                    // anything maps onto it, otherwise nothing to emit.
                    if self.db.is_reference_frame(cand.row.feature_id)? {
                        if let Some(feature) = self.reference_feature(&cand)? {
                            out.push(feature);
                        }
                    }
                }
            }
        }

        // Substitute recursively remapped coordinates where requested,
        // falling back to the canonical location when composition yields
        // nothing (the location is then assumed to already be expressed
        // against the lowest usable reference).
        if self.cfg.assembly_mode == AssemblyMode::Recursive {
            for (_, loc) in located.iter_mut() {
                if let Some(remapped) = self.remap_to_root(loc)? {
                    *loc = remapped;
                }
            }
        }

        // Grouping by frame requires frame-ordered input; re-sort because
        // remapping may have moved candidates across frames.
        located.sort_by_key(|(cand, loc)| (loc.srcfeature_id, loc.fmin, cand.row.feature_id));

        for (src, group) in &located
            .into_iter()
            .chunk_by(|(_, loc)| loc.srcfeature_id)
        {
            let Some(src) = src else {
                // Locations without a reference frame are unmappable.
                continue;
            };
            let Some(segment) = self.frame_segment(src)? else {
                tracing::debug!(srcfeature_id = src, "skipping candidates on malformed frame");
                continue;
            };
            let segment = Arc::new(segment);

            for (cand, loc) in group {
                if self.cfg.assembly_mode == AssemblyMode::InferCds
                    && self.is_coding_product(&cand)
                {
                    out.extend(cds::infer(self, &cand, &loc, &segment)?);
                } else if let Some(feature) = self.compose(&cand, &loc, &segment)? {
                    out.push(feature);
                }
            }
        }

        Ok(out)
    }

    /// One shared segment per reference frame encountered in a result set.
    fn frame_segment(&self, srcfeature_id: i64) -> Result<Option<Segment>> {
        let Some(row) = self.db.feature_row(srcfeature_id)? else {
            return Ok(None);
        };
        let Some(extent) = self.db.reference_extent(srcfeature_id)? else {
            return Ok(None);
        };
        Ok(Some(Segment {
            name: row.name.unwrap_or(row.uniquename),
            feature_id: srcfeature_id,
            start: 1,
            end: extent,
        }))
    }

    fn compose(
        &self,
        cand: &CandidateRow,
        loc: &FeatureLoc,
        segment: &Arc<Segment>,
    ) -> Result<Option<Feature>> {
        let Some(kind) = self.terms.term(cand.row.type_id).cloned() else {
            tracing::debug!(
                feature_id = cand.row.feature_id,
                type_id = cand.row.type_id,
                "skipping candidate with unresolvable type"
            );
            return Ok(None);
        };
        Ok(Some(Feature {
            feature_id: cand.row.feature_id,
            name: cand.row.name.clone(),
            uniquename: cand.row.uniquename.clone(),
            kind,
            start: loc.start(),
            end: loc.end(),
            strand: loc.strand,
            phase: loc.phase,
            score: cand.score,
            source: self.source_of(cand.row.feature_id)?,
            segment: Some(segment.clone()),
        }))
    }

    /// Emit a reference sequence as a parentless feature spanning its own
    /// extent.
    fn reference_feature(&self, cand: &CandidateRow) -> Result<Option<Feature>> {
        let Some(kind) = self.terms.term(cand.row.type_id).cloned() else {
            return Ok(None);
        };
        let extent = self
            .db
            .reference_extent(cand.row.feature_id)?
            .unwrap_or(0);
        Ok(Some(Feature {
            feature_id: cand.row.feature_id,
            name: cand.row.name.clone(),
            uniquename: cand.row.uniquename.clone(),
            kind,
            start: 1,
            end: extent,
            strand: Strand::Unknown,
            phase: None,
            score: cand.score,
            source: self.source_of(cand.row.feature_id)?,
            segment: None,
        }))
    }

    pub(crate) fn source_of(&self, feature_id: i64) -> Result<Option<String>> {
        match self.source_db {
            Some(db_id) => self.db.feature_source(feature_id, db_id),
            None => Ok(None),
        }
    }

    fn is_coding_product(&self, cand: &CandidateRow) -> bool {
        self.terms
            .term(cand.row.type_id)
            .is_some_and(|t| {
                self.cfg
                    .coding_product_classes
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(&t.name))
            })
    }

    /// Compose `featureloc` rows across nested reference frames until the
    /// top-most one. Returns `None` when the location is not nested (or
    /// the chain is deeper than [`MAX_REMAP_DEPTH`]).
    fn remap_to_root(&self, loc: &FeatureLoc) -> Result<Option<FeatureLoc>> {
        let Some(mut src) = loc.srcfeature_id else {
            return Ok(None);
        };
        let (mut fmin, mut fmax, mut strand) = (loc.fmin, loc.fmax, loc.strand);
        let mut hops = 0;

        while let Some(parent) = self.db.canonical_location(src)? {
            let Some(parent_src) = parent.srcfeature_id else {
                break;
            };
            (fmin, fmax, strand) = compose_onto_parent(&parent, fmin, fmax, strand);
            src = parent_src;
            hops += 1;
            if hops > MAX_REMAP_DEPTH {
                tracing::debug!(feature_id = loc.feature_id, "remap depth exceeded");
                return Ok(None);
            }
        }

        if hops == 0 {
            return Ok(None);
        }
        Ok(Some(FeatureLoc {
            feature_id: loc.feature_id,
            srcfeature_id: Some(src),
            fmin,
            fmax,
            strand,
            phase: loc.phase,
            rank: loc.rank,
        }))
    }
}

/// Lift a child interval through its frame's own location on the next
/// frame up. A reversed frame mirrors the interval around its end and
/// flips the strand.
fn compose_onto_parent(
    parent: &FeatureLoc,
    fmin: i64,
    fmax: i64,
    strand: Strand,
) -> (i64, i64, Strand) {
    match parent.strand {
        Strand::Reverse => (parent.fmax - fmax, parent.fmax - fmin, strand.flipped()),
        _ => (parent.fmin + fmin, parent.fmin + fmax, strand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fmin: i64, fmax: i64, strand: Strand) -> FeatureLoc {
        FeatureLoc {
            feature_id: 9,
            srcfeature_id: Some(1),
            fmin,
            fmax,
            strand,
            phase: None,
            rank: 0,
        }
    }

    #[test]
    fn forward_frame_offsets() {
        let (fmin, fmax, strand) =
            compose_onto_parent(&frame(5000, 7000, Strand::Forward), 100, 300, Strand::Reverse);
        assert_eq!((fmin, fmax), (5100, 5300));
        assert_eq!(strand, Strand::Reverse);
    }

    #[test]
    fn reverse_frame_mirrors_and_flips() {
        let (fmin, fmax, strand) =
            compose_onto_parent(&frame(8000, 9000, Strand::Reverse), 100, 300, Strand::Forward);
        assert_eq!((fmin, fmax), (8700, 8900));
        assert_eq!(strand, Strand::Reverse);
    }

    #[test]
    fn unknown_frame_strand_behaves_as_forward() {
        let (fmin, fmax, strand) =
            compose_onto_parent(&frame(10, 20, Strand::Unknown), 2, 4, Strand::Forward);
        assert_eq!((fmin, fmax), (12, 14));
        assert_eq!(strand, Strand::Forward);
    }
}

//! Derived CDS inference.
//!
//! The store has no explicit CDS rows; coding intervals are approximated
//! from the intersection of a transcript's exons with its polypeptide
//! product's mapped extent. The traversal is polypeptide --`derives_from`-->
//! transcript, then exons --`part_of`--> transcript, each exon clipped to
//! the polypeptide bounds.
//!
//! Inferred CDS features inherit strand, phase, and score from the
//! polypeptide row, not from the originating exon. This is observed
//! upstream behavior kept as-is; per-exon phase continuation for multi-exon
//! CDS is not modeled, so phase values on the second and later pieces are
//! approximate.

use std::sync::Arc;

use crate::assemble::Assembler;
use crate::db::CandidateRow;
use crate::error::Result;
use crate::models::{Feature, FeatureLoc, Segment};

/// Infer zero or more CDS features for a polypeptide candidate.
pub(crate) fn infer(
    asm: &Assembler<'_>,
    poly: &CandidateRow,
    poly_loc: &FeatureLoc,
    segment: &Arc<Segment>,
) -> Result<Vec<Feature>> {
    let derives_from = asm.terms.require_one("derives_from")?;
    let part_of = asm.terms.require_one("part_of")?;
    let cds_type = asm.terms.require_one("CDS")?;
    let exon_type_ids = asm
        .terms
        .ids("exon")
        .map(|ids| ids.as_vec())
        .unwrap_or_default();

    // The transcript the polypeptide was derived from. No edge, no CDS.
    let Some(edge) = asm
        .db
        .edges_from_subject(poly.row.feature_id, derives_from)?
        .into_iter()
        .next()
    else {
        return Ok(Vec::new());
    };
    let transcript_id = edge.object_id;

    let mut intervals = Vec::new();
    for edge in asm.db.edges_to_object(transcript_id, part_of)? {
        let Some(exon) = asm.db.feature_row(edge.subject_id)? else {
            continue;
        };
        if !exon_type_ids.contains(&exon.type_id) {
            continue;
        }
        let Some(exon_loc) = asm.db.canonical_location(exon.feature_id)? else {
            continue;
        };
        if let Some(clipped) =
            clip_to_extent((poly_loc.fmin, poly_loc.fmax), (exon_loc.fmin, exon_loc.fmax))
        {
            intervals.push(clipped);
        }
    }
    intervals.sort_unstable();

    let Some(kind) = asm.terms.term(cds_type).cloned() else {
        return Ok(Vec::new());
    };
    let source = asm.source_of(poly.row.feature_id)?;

    let features = intervals
        .into_iter()
        .map(|(fmin, fmax)| Feature {
            feature_id: poly.row.feature_id,
            name: poly.row.name.clone(),
            uniquename: poly.row.uniquename.clone(),
            kind: kind.clone(),
            start: fmin + 1,
            end: fmax,
            strand: poly_loc.strand,
            phase: poly_loc.phase,
            score: poly.score,
            source: source.clone(),
            segment: Some(segment.clone()),
        })
        .collect();

    Ok(features)
}

/// Clip an exon interval to the polypeptide extent, both interbase.
/// Exons wholly outside the extent are discarded; internal boundaries
/// between adjacent exons are preserved exactly.
fn clip_to_extent(poly: (i64, i64), exon: (i64, i64)) -> Option<(i64, i64)> {
    let (pmin, pmax) = poly;
    let (emin, emax) = exon;
    if emax <= pmin || emin >= pmax {
        return None;
    }
    Some((emin.max(pmin), emax.min(pmax)))
}

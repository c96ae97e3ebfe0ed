//! Landmark resolution and interval overlap predicates.
//!
//! A landmark name is resolved to a [`Segment`]: its backing feature, its
//! bounds, and implicitly whether it is a top-level reference sequence.
//! Construction of child features is delegated to the assembler; resolution
//! never decides feature membership itself.

use rusqlite::ToSql;

use crate::config::OverlapStrategy;
use crate::db::{BuiltQuery, Database, FeatureRow};
use crate::error::Result;
use crate::models::Segment;

/// Resolve a named landmark to a segment. `None` when the name matches
/// nothing usable (not fatal). `end` defaults to the landmark's extent.
/// Landmark names are not unique across organisms, so the session's
/// organism selector scopes the match like every other query.
pub(crate) fn resolve_landmark(
    db: &Database,
    reference_type_ids: &[i64],
    organism_id: Option<i64>,
    name: &str,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<Option<Segment>> {
    let rows = db.landmark_rows(name, organism_id)?;
    let Some(row) = pick_landmark(db, reference_type_ids, &rows)? else {
        tracing::debug!(name, "unknown landmark");
        return Ok(None);
    };

    let extent = db.reference_extent(row.feature_id)?.unwrap_or(0);
    let start = start.unwrap_or(1);
    let end = end.unwrap_or(extent.max(start));

    Ok(Some(Segment {
        name: row.name.clone().unwrap_or_else(|| row.uniquename.clone()),
        feature_id: row.feature_id,
        start,
        end,
    }))
}

/// Among exact name matches, prefer a feature of the reference class, then
/// one that other features map onto, then a unique match of any type.
fn pick_landmark<'a>(
    db: &Database,
    reference_type_ids: &[i64],
    rows: &'a [FeatureRow],
) -> Result<Option<&'a FeatureRow>> {
    if let Some(row) = rows.iter().find(|r| reference_type_ids.contains(&r.type_id)) {
        return Ok(Some(row));
    }
    for row in rows {
        if db.is_reference_frame(row.feature_id)? {
            return Ok(Some(row));
        }
    }
    Ok(match rows {
        [row] => Some(row),
        _ => None,
    })
}

/// The SQL overlap predicate for `featureloc fl` against an interbase
/// `[?, ?)` query window bound as (qmin, qmax).
///
/// Both shapes return identical result sets; the strategy only changes the
/// plan. The clamped form mirrors an indexed range-function query.
pub(crate) fn overlap_predicate(strategy: OverlapStrategy) -> &'static str {
    match strategy {
        OverlapStrategy::Generic => "fl.fmin < ?2 AND fl.fmax > ?1",
        OverlapStrategy::RangeIndexed => "max(fl.fmin, ?1) < min(fl.fmax, ?2)",
    }
}

/// Build the candidate-id query for features overlapping a segment,
/// optionally filtered by resolved type ids and `featureprop` attributes.
#[allow(clippy::too_many_arguments)]
pub(crate) fn overlapping_ids_query(
    segment: &Segment,
    strategy: OverlapStrategy,
    type_ids: &[i64],
    attributes: &[(i64, String)],
    organism_id: Option<i64>,
    allow_obsolete: bool,
) -> BuiltQuery {
    let (qmin, qmax) = segment.interbase();
    // The overlap predicate references ?1/?2 positionally, so every later
    // placeholder is numbered explicitly as well.
    let mut params: Vec<Box<dyn ToSql>> = vec![
        Box::new(qmin),
        Box::new(qmax),
        Box::new(segment.feature_id),
    ];
    let mut conditions = vec![
        overlap_predicate(strategy).to_string(),
        "fl.srcfeature_id = ?3".to_string(),
    ];
    let mut next_index = 4;

    if !type_ids.is_empty() {
        let placeholders: Vec<String> = (0..type_ids.len())
            .map(|i| format!("?{}", next_index + i))
            .collect();
        conditions.push(format!("f.type_id IN ({})", placeholders.join(", ")));
        for id in type_ids {
            params.push(Box::new(*id));
        }
        next_index += type_ids.len();
    }

    for (type_id, value) in attributes {
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM featureprop fp
                     WHERE fp.feature_id = f.feature_id
                       AND fp.type_id = ?{} AND fp.value = ?{})",
            next_index,
            next_index + 1
        ));
        params.push(Box::new(*type_id));
        params.push(Box::new(value.clone()));
        next_index += 2;
    }

    if let Some(organism_id) = organism_id {
        conditions.push(format!("f.organism_id = ?{next_index}"));
        params.push(Box::new(organism_id));
    }

    if !allow_obsolete {
        conditions.push("f.is_obsolete = 0".to_string());
    }

    let sql = format!(
        "SELECT DISTINCT f.feature_id
         FROM featureloc fl
         JOIN feature f ON f.feature_id = fl.feature_id
         WHERE {}
         ORDER BY f.feature_id",
        conditions.join(" AND ")
    );

    BuiltQuery { sql, params }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_differ_only_in_shape() {
        let generic = overlap_predicate(OverlapStrategy::Generic);
        let indexed = overlap_predicate(OverlapStrategy::RangeIndexed);
        assert_ne!(generic, indexed);
        // Both are two-parameter predicates over the same bindings.
        assert!(generic.contains("?1") && generic.contains("?2"));
        assert!(indexed.contains("?1") && indexed.contains("?2"));
    }
}

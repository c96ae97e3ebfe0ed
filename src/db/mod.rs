mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, ToSql};

use crate::error::Result;
use crate::models::{FeatureLoc, FeatureRelationship, Strand};

/// A raw `feature` row, before type resolution and composition.
#[derive(Debug, Clone)]
pub(crate) struct FeatureRow {
    pub feature_id: i64,
    pub name: Option<String>,
    pub uniquename: String,
    pub type_id: i64,
    pub organism_id: i64,
    pub seqlen: Option<i64>,
    pub is_obsolete: bool,
}

/// A candidate joined with its canonical location and score, as fetched for
/// assembly. `loc` is `None` for candidates with no `rank = 0` mapping.
#[derive(Debug, Clone)]
pub(crate) struct CandidateRow {
    pub row: FeatureRow,
    pub loc: Option<FeatureLoc>,
    pub score: Option<f64>,
}

/// A dynamically built, fully parameterized statement returning feature ids.
pub(crate) struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Box<dyn ToSql>>,
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create the schema on an embedded or test store. Production feature
    /// stores already carry it and are only baselined.
    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    /// Execute a raw SQL batch. Loading escape hatch for hosts and test
    /// fixtures; the query layer itself never mutates the store.
    pub fn batch(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute_batch(sql)?;
        Ok(())
    }

    // ============================================================
    // Vocabulary and session bootstrap
    // ============================================================

    pub(crate) fn load_cvs(&self) -> Result<Vec<(i64, String)>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare("SELECT cv_id, name FROM cv ORDER BY cv_id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub(crate) fn load_cvterms(&self) -> Result<Vec<(i64, i64, String)>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt =
            conn.prepare("SELECT cvterm_id, cv_id, name FROM cvterm ORDER BY cvterm_id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub(crate) fn organisms_by_binomial(&self, genus: &str, species: &str) -> Result<Vec<i64>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT organism_id FROM organism
             WHERE lower(genus) = lower(?) AND lower(species) = lower(?)",
        )?;
        let ids = stmt
            .query_map([genus, species], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    pub(crate) fn organisms_by_common_name(&self, name: &str) -> Result<Vec<i64>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT organism_id FROM organism
             WHERE lower(common_name) = lower(?1) OR lower(abbreviation) = lower(?1)",
        )?;
        let ids = stmt
            .query_map([name], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// External database names, used to recognize `Source:name` prefixes.
    pub(crate) fn external_db_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare("SELECT name FROM db")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub(crate) fn db_id_by_name(&self, name: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = conn
            .query_row("SELECT db_id FROM db WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    /// Probe once whether an optional table or view exists.
    pub(crate) fn has_relation(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table','view') AND name = ?",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ============================================================
    // Feature and location reads
    // ============================================================

    pub(crate) fn feature_row(&self, feature_id: i64) -> Result<Option<FeatureRow>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let row = conn
            .query_row(
                "SELECT feature_id, name, uniquename, type_id, organism_id, seqlen, is_obsolete
                 FROM feature WHERE feature_id = ?",
                [feature_id],
                read_feature_row,
            )
            .optional()?;
        Ok(row)
    }

    /// The canonical (`rank = 0`) location of a feature, if any.
    pub(crate) fn canonical_location(&self, feature_id: i64) -> Result<Option<FeatureLoc>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let loc = conn
            .query_row(
                "SELECT feature_id, srcfeature_id, fmin, fmax, strand, phase, rank
                 FROM featureloc WHERE feature_id = ? AND rank = 0",
                [feature_id],
                read_location,
            )
            .optional()?;
        Ok(loc)
    }

    /// The usable length of a reference frame: declared `seqlen` when set,
    /// otherwise the furthest extent of anything mapped onto it.
    pub(crate) fn reference_extent(&self, feature_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let seqlen: Option<i64> = conn
            .query_row(
                "SELECT seqlen FROM feature WHERE feature_id = ?",
                [feature_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        if seqlen.is_some() {
            return Ok(seqlen);
        }
        let max_fmax: Option<i64> = conn.query_row(
            "SELECT MAX(fmax) FROM featureloc WHERE srcfeature_id = ?",
            [feature_id],
            |row| row.get(0),
        )?;
        Ok(max_fmax)
    }

    /// Whether any features are mapped onto this one, i.e. it acts as a
    /// reference frame.
    pub(crate) fn is_reference_frame(&self, feature_id: i64) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM featureloc WHERE srcfeature_id = ?",
            [feature_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Features matching a landmark name exactly (case-insensitive), by
    /// name or uniquename, scoped to one organism when a selector is set.
    pub(crate) fn landmark_rows(
        &self,
        name: &str,
        organism_id: Option<i64>,
    ) -> Result<Vec<FeatureRow>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut sql = String::from(
            "SELECT feature_id, name, uniquename, type_id, organism_id, seqlen, is_obsolete
             FROM feature
             WHERE (lower(name) = lower(?1) OR lower(uniquename) = lower(?1))",
        );
        if organism_id.is_some() {
            sql.push_str(" AND organism_id = ?2");
        }
        sql.push_str(" ORDER BY feature_id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = match organism_id {
            Some(org) => stmt.query_map(rusqlite::params![name, org], read_feature_row)?,
            None => stmt.query_map([name], read_feature_row)?,
        }
        .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Execute a dynamically built id query.
    pub(crate) fn select_ids(&self, query: &BuiltQuery) -> Result<Vec<i64>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&query.sql)?;
        let params: Vec<&dyn ToSql> = query.params.iter().map(|p| p.as_ref()).collect();
        let ids = stmt
            .query_map(params.as_slice(), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Batch fetch for assembly: each candidate joined with its canonical
    /// location and analysis score, ordered by reference frame so grouping
    /// is stable without a stateful cache.
    pub(crate) fn candidate_rows(&self, ids: &[i64]) -> Result<Vec<CandidateRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().expect("database lock poisoned");
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT f.feature_id, f.name, f.uniquename, f.type_id, f.organism_id,
                    f.seqlen, f.is_obsolete,
                    fl.srcfeature_id, fl.fmin, fl.fmax, fl.strand, fl.phase, fl.rank,
                    af.significance
             FROM feature f
             LEFT JOIN featureloc fl ON fl.feature_id = f.feature_id AND fl.rank = 0
             LEFT JOIN analysisfeature af ON af.feature_id = f.feature_id
             WHERE f.feature_id IN ({placeholders})
             ORDER BY fl.srcfeature_id, fl.fmin, f.feature_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                let feature = FeatureRow {
                    feature_id: row.get(0)?,
                    name: row.get(1)?,
                    uniquename: row.get(2)?,
                    type_id: row.get(3)?,
                    organism_id: row.get(4)?,
                    seqlen: row.get(5)?,
                    is_obsolete: row.get::<_, i64>(6)? != 0,
                };
                let srcfeature_id: Option<i64> = row.get(7)?;
                let fmin: Option<i64> = row.get(8)?;
                let fmax: Option<i64> = row.get(9)?;
                let loc = match (fmin, fmax) {
                    (Some(fmin), Some(fmax)) => Some(FeatureLoc {
                        feature_id: feature.feature_id,
                        srcfeature_id,
                        fmin,
                        fmax,
                        strand: Strand::from_db(row.get(10)?),
                        phase: row.get(11)?,
                        rank: row.get::<_, Option<i64>>(12)?.unwrap_or(0),
                    }),
                    _ => None,
                };
                Ok(CandidateRow {
                    row: feature,
                    loc,
                    score: row.get(13)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The GFF source string attached to a feature through its dbxref rows
    /// under the given external db.
    pub(crate) fn feature_source(&self, feature_id: i64, source_db: i64) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let source = conn
            .query_row(
                "SELECT dx.accession
                 FROM feature_dbxref fd
                 JOIN dbxref dx ON dx.dbxref_id = fd.dbxref_id
                 WHERE fd.feature_id = ? AND dx.db_id = ?",
                [feature_id, source_db],
                |row| row.get(0),
            )
            .optional()?;
        Ok(source)
    }

    // ============================================================
    // Relationship traversal
    // ============================================================

    /// Edges where the given feature is the subject (e.g. polypeptide
    /// `derives_from` transcript).
    pub(crate) fn edges_from_subject(
        &self,
        subject_id: i64,
        type_id: i64,
    ) -> Result<Vec<FeatureRelationship>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT subject_id, object_id, type_id FROM feature_relationship
             WHERE subject_id = ? AND type_id = ?
             ORDER BY feature_relationship_id",
        )?;
        let edges = stmt
            .query_map([subject_id, type_id], read_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Edges where the given feature is the object (e.g. exons `part_of`
    /// transcript).
    pub(crate) fn edges_to_object(
        &self,
        object_id: i64,
        type_id: i64,
    ) -> Result<Vec<FeatureRelationship>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT subject_id, object_id, type_id FROM feature_relationship
             WHERE object_id = ? AND type_id = ?
             ORDER BY feature_relationship_id",
        )?;
        let edges = stmt
            .query_map([object_id, type_id], read_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    // ============================================================
    // Cumulative interval statistics
    // ============================================================

    /// The nearest cumulative count at or after a summary-bin boundary.
    pub(crate) fn cum_count_at_or_after(
        &self,
        type_id: i64,
        srcfeature_id: i64,
        bin: i64,
    ) -> Result<Option<i64>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count = conn
            .query_row(
                "SELECT cum_count FROM interval_stats
                 WHERE type_id = ? AND srcfeature_id = ? AND bin >= ?
                 ORDER BY bin LIMIT 1",
                [type_id, srcfeature_id, bin],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count)
    }

    /// The total cumulative count for a type on a frame, used when a
    /// boundary falls past the last precomputed bin.
    pub(crate) fn cum_count_total(
        &self,
        type_id: i64,
        srcfeature_id: i64,
    ) -> Result<Option<i64>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: Option<i64> = conn.query_row(
            "SELECT MAX(cum_count) FROM interval_stats
             WHERE type_id = ? AND srcfeature_id = ?",
            [type_id, srcfeature_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn read_feature_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeatureRow> {
    Ok(FeatureRow {
        feature_id: row.get(0)?,
        name: row.get(1)?,
        uniquename: row.get(2)?,
        type_id: row.get(3)?,
        organism_id: row.get(4)?,
        seqlen: row.get(5)?,
        is_obsolete: row.get::<_, i64>(6)? != 0,
    })
}

fn read_location(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeatureLoc> {
    Ok(FeatureLoc {
        feature_id: row.get(0)?,
        srcfeature_id: row.get(1)?,
        fmin: row.get(2)?,
        fmax: row.get(3)?,
        strand: Strand::from_db(row.get(4)?),
        phase: row.get(5)?,
        rank: row.get(6)?,
    })
}

fn read_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeatureRelationship> {
    Ok(FeatureRelationship {
        subject_id: row.get(0)?,
        object_id: row.get(1)?,
        type_id: row.get(2)?,
    })
}

//! Bidirectional ontology term index.
//!
//! Loaded once per session by scanning the `cv`/`cvterm` tables; immutable
//! afterwards. Term names are homonymous across vocabularies, so name
//! lookups return a closed sum type ([`TermIds`]) and every caller states
//! its disambiguation policy: [`OntologyTermIndex::ids`] when multiple ids
//! can be OR'ed into a predicate, [`OntologyTermIndex::one`] when exactly
//! one id is needed (preferring the primary sequence ontology, then the
//! relationship vocabulary, then the lowest id).

use std::collections::HashMap;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::CvTerm;

/// Accepted names for the primary feature-annotation ontology, probed in
/// order.
const PRIMARY_CV_NAMES: &[&str] = &["SOFA", "Sequence Ontology Feature Annotation", "sofa.ontology"];

/// Fallback when no feature-annotation subset is installed.
const FALLBACK_CV_NAMES: &[&str] = &["Sequence Ontology", "sequence", "SO"];

/// The vocabulary holding graph edge types (`part_of`, `derives_from`...).
const RELATIONSHIP_CV: &str = "relationship";

/// Result of resolving a term name. Homonyms are explicit, never a silently
/// picked first match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermIds {
    One(i64),
    Many(Vec<i64>),
}

impl TermIds {
    pub fn as_vec(&self) -> Vec<i64> {
        match self {
            TermIds::One(id) => vec![*id],
            TermIds::Many(ids) => ids.clone(),
        }
    }
}

pub struct OntologyTermIndex {
    by_id: HashMap<i64, CvTerm>,
    by_name: HashMap<String, Vec<i64>>,
    primary_cv: String,
}

impl OntologyTermIndex {
    /// Scan the vocabulary tables and build both directions of the index.
    ///
    /// Fails with [`Error::OntologyNotFound`] when neither the primary nor
    /// the fallback ontology name set resolves.
    pub fn load(db: &Database) -> Result<Self> {
        let cvs = db.load_cvs()?;
        let cv_names: HashMap<i64, String> = cvs.into_iter().collect();

        let find_cv = |candidates: &[&str]| -> Option<&String> {
            candidates.iter().find_map(|wanted| {
                cv_names
                    .values()
                    .find(|name| name.eq_ignore_ascii_case(wanted))
            })
        };

        let primary_cv = find_cv(PRIMARY_CV_NAMES)
            .or_else(|| find_cv(FALLBACK_CV_NAMES))
            .ok_or(Error::OntologyNotFound)?
            .clone();

        let mut by_id = HashMap::new();
        let mut by_name: HashMap<String, Vec<i64>> = HashMap::new();
        for (cvterm_id, cv_id, name) in db.load_cvterms()? {
            let cv = cv_names.get(&cv_id).cloned().unwrap_or_default();
            by_name
                .entry(name.to_lowercase())
                .or_default()
                .push(cvterm_id);
            by_id.insert(
                cvterm_id,
                CvTerm {
                    cvterm_id,
                    name,
                    cv,
                },
            );
        }

        tracing::debug!(terms = by_id.len(), %primary_cv, "loaded ontology term index");

        Ok(Self {
            by_id,
            by_name,
            primary_cv,
        })
    }

    pub fn primary_cv(&self) -> &str {
        &self.primary_cv
    }

    /// All ids a (case-insensitive) name maps to.
    pub fn ids(&self, name: &str) -> Option<TermIds> {
        let ids = self.by_name.get(&name.to_lowercase())?;
        match ids.as_slice() {
            [] => None,
            [id] => Some(TermIds::One(*id)),
            many => Some(TermIds::Many(many.to_vec())),
        }
    }

    /// Exactly one id for a name, with the documented preference order:
    /// primary ontology, then relationship vocabulary, then lowest id.
    pub fn one(&self, name: &str) -> Option<i64> {
        let ids = self.by_name.get(&name.to_lowercase())?;
        let in_cv = |cv: &str| {
            ids.iter()
                .find(|id| self.by_id.get(id).is_some_and(|t| t.cv == cv))
                .copied()
        };
        in_cv(&self.primary_cv)
            .or_else(|| in_cv(RELATIONSHIP_CV))
            .or_else(|| ids.iter().min().copied())
    }

    /// Like [`Self::one`], but missing vocabulary is an error.
    pub fn require_one(&self, name: &str) -> Result<i64> {
        self.one(name)
            .ok_or_else(|| Error::TermNotFound(name.to_string()))
    }

    /// Resolve an id back to its term. Every type id stored in the feature
    /// graph must round-trip through this.
    pub fn term(&self, id: i64) -> Option<&CvTerm> {
        self.by_id.get(&id)
    }

    pub fn name(&self, id: i64) -> Option<&str> {
        self.by_id.get(&id).map(|t| t.name.as_str())
    }
}

//! Error taxonomy for locusgraph.
//!
//! Resolution failures that only affect completeness (unknown landmark,
//! empty search) are reported as empty results, not errors. Failures that
//! would make downstream filtering silently wrong (ambiguous organism,
//! missing ontology) are fatal and surfaced here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Neither the primary nor the fallback sequence-ontology name set
    /// resolves against the `cv` table. The session cannot proceed.
    #[error("no sequence ontology found in this database")]
    OntologyNotFound,

    /// A vocabulary term required for traversal or typing is missing from
    /// the loaded ontologies.
    #[error("ontology term not found: {0:?}")]
    TermNotFound(String),

    /// The organism selector matched more than one record. Picking one
    /// silently would make every organism-filtered query wrong.
    #[error("organism name {name:?} matches {count} records; use a \"Genus species\" form")]
    AmbiguousOrganism { name: String, count: usize },

    /// The organism selector matched nothing.
    #[error("organism not found: {0:?}")]
    OrganismNotFound(String),

    /// An unsupported configuration combination, rejected at construction
    /// time rather than at query time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Any underlying query execution failure. Propagated immediately, no
    /// retry.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

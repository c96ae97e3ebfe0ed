//! locusgraph — a landmark/interval query layer over a Chado-style genomic
//! feature store.
//!
//! The store keeps annotations in a generic entity/location/ontology model:
//! `feature` rows typed by ontology terms, located on other features via
//! interbase `featureloc` rows, and linked by typed `feature_relationship`
//! edges. This crate translates a small set of typed requests into bounded,
//! parameterized queries against that schema and assembles the results into
//! hierarchically linked [`Feature`](models::Feature) objects with 1-based
//! coordinates, strand, phase, and provenance.
//!
//! # Usage
//!
//! ```no_run
//! use locusgraph::{Database, Session, StoreConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let db = Database::open("annotations.db".into())?;
//! let session = Session::open(db, StoreConfig::default())?;
//!
//! let segment = session
//!     .resolve_segment("2L", Some(1), Some(50_000))?
//!     .expect("unknown landmark");
//! for feature in session.features_overlapping(&segment, &["gene"], &[])? {
//!     println!("{} {}..{}", feature.display_name(), feature.start, feature.end);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Coordinate semantics
//!
//! The store is interbase (zero-based, half-open, `fmin < fmax`); the API
//! is 1-based inclusive (`start = fmin + 1`, `end = fmax`). Every code path
//! (direct assembly, recursive remapping, CDS inference, density
//! estimation) agrees on this conversion.
//!
//! # Scope
//!
//! Connection credentials, process-wide configuration, full-text index
//! maintenance, and sequence retrieval are the host's concern; this crate
//! is a read-only query layer.

pub mod config;
pub mod db;
pub mod density;
pub mod error;
pub mod models;
pub mod ontology;
pub mod search;
pub mod session;

mod assemble;
mod cds;
mod resolver;

pub use config::{AssemblyMode, OverlapStrategy, SchemaCompat, StoreConfig};
pub use db::Database;
pub use density::{FeatureSummary, SUMMARY_BIN_SIZE};
pub use error::{Error, Result};
pub use models::{CvTerm, Feature, FeatureLoc, FeatureRelationship, Segment, Strand};
pub use ontology::{OntologyTermIndex, TermIds};
pub use search::SearchOp;
pub use session::Session;

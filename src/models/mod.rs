//! Domain models for locusgraph.
//!
//! # Core Concepts
//!
//! ## Session-lifetime entities
//!
//! - [`CvTerm`]: an ontology term (`cvterm` row) with its controlled
//!   vocabulary name. Term mappings are loaded once per session and treated
//!   as immutable afterwards.
//!
//! ## Request-scoped entities
//!
//! These are constructed fresh per query and owned by the caller:
//!
//! - [`FeatureLoc`]: a raw `featureloc` row in interbase (zero-based,
//!   half-open) coordinates.
//! - [`Segment`]: a named reference frame in 1-based inclusive coordinates.
//! - [`Feature`]: a composed feature with resolved type, 1-based location,
//!   score, provenance, and a shared link to its parent segment. Segments
//!   never reference their features back, so the parent links cannot form
//!   cycles.
//! - [`FeatureRelationship`]: a typed edge of the feature graph, used for
//!   exon/transcript and polypeptide/transcript traversal.

mod feature;
mod location;
mod segment;
mod term;

pub use feature::*;
pub use location::*;
pub use segment::*;
pub use term::*;

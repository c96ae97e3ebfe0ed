//! Session configuration.
//!
//! Mutually exclusive composition paths are modeled as an enumerated
//! [`AssemblyMode`] rather than independent boolean flags, so unsupported
//! combinations are unrepresentable. The remaining knobs are validated once
//! at [`StoreConfig::validate`] time.

use crate::error::{Error, Result};

/// How located features are composed into result objects.
///
/// The three paths are mutually exclusive per session. A host that wants
/// both recursive mapping and CDS inference must pick `Recursive`; recursive
/// mapping takes precedence by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssemblyMode {
    /// Emit each feature against its direct reference frame only.
    #[default]
    TwoLevel,
    /// Compose `featureloc` rows across nested reference frames and express
    /// coordinates on the top-most reference sequence, falling back to the
    /// canonical location when no nesting exists.
    Recursive,
    /// For features of a coding-product class, emit derived CDS intervals
    /// instead of the feature itself.
    InferCds,
}

/// Which SQL shape is used for interval overlap queries.
///
/// A performance knob, not a semantic one: both strategies must return
/// identical result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapStrategy {
    /// Plain half-open interval comparison.
    #[default]
    Generic,
    /// A clamped-intersection form that lets the planner drive the
    /// `(srcfeature_id, fmin, fmax)` index.
    RangeIndexed,
}

/// Compatibility with older schema dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaCompat {
    #[default]
    Modern,
    /// Pre-view schemas: no denormalized name table, no range-indexed
    /// overlap support.
    Legacy,
}

/// Host-owned configuration consumed by [`crate::Session`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Restrict all queries to one organism. Either a common name or a
    /// "Genus species" form; an ambiguous match is fatal at session open.
    pub organism: Option<String>,
    /// Ontology type name of top-level reference sequences.
    pub reference_class: String,
    pub assembly_mode: AssemblyMode,
    pub overlap: OverlapStrategy,
    /// Use token-normalized full-text matching for name searches.
    pub fulltext: bool,
    /// Surface features flagged obsolete instead of silently skipping them.
    pub allow_obsolete: bool,
    pub compat: SchemaCompat,
    /// Type names whose features trigger CDS inference under
    /// [`AssemblyMode::InferCds`].
    pub coding_product_classes: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            organism: None,
            reference_class: "chromosome".to_string(),
            assembly_mode: AssemblyMode::default(),
            overlap: OverlapStrategy::default(),
            fulltext: false,
            allow_obsolete: false,
            compat: SchemaCompat::default(),
            coding_product_classes: vec!["polypeptide".to_string()],
        }
    }
}

impl StoreConfig {
    /// Reject unsupported combinations up front, before any query runs.
    pub fn validate(&self) -> Result<()> {
        if self.compat == SchemaCompat::Legacy && self.overlap == OverlapStrategy::RangeIndexed {
            return Err(Error::Config(
                "range-indexed overlap queries are not available on legacy schemas".into(),
            ));
        }
        if self.reference_class.trim().is_empty() {
            return Err(Error::Config("reference_class must not be empty".into()));
        }
        if self.assembly_mode == AssemblyMode::InferCds && self.coding_product_classes.is_empty() {
            return Err(Error::Config(
                "CDS inference requires at least one coding product class".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn legacy_schema_rejects_range_indexed_overlap() {
        let cfg = StoreConfig {
            compat: SchemaCompat::Legacy,
            overlap: OverlapStrategy::RangeIndexed,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn cds_mode_needs_a_product_class() {
        let cfg = StoreConfig {
            assembly_mode: AssemblyMode::InferCds,
            coding_product_classes: vec![],
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }
}

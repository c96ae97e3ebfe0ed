use serde::Serialize;

/// An ontology term resolved from the `cvterm` table.
///
/// Term names are not unique across controlled vocabularies: the same name
/// may appear in the primary sequence ontology and in an older or unrelated
/// cv. Identity is the `cvterm_id`; the `cv` field records which vocabulary
/// the term came from so callers can disambiguate homonyms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CvTerm {
    pub cvterm_id: i64,
    pub name: String,
    /// Name of the controlled vocabulary (`cv.name`) this term belongs to.
    pub cv: String,
}

/// A typed edge of the feature graph (`feature_relationship` row).
///
/// Only a small controlled vocabulary of edge types is traversed here:
/// `part_of` (exon → transcript) and `derives_from` (polypeptide →
/// transcript).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureRelationship {
    pub subject_id: i64,
    pub object_id: i64,
    pub type_id: i64,
}

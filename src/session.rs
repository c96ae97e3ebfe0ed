//! The session context: one connection, one configuration, and the caches
//! shared by every request.
//!
//! All lazily-derivable state (ontology index, organism id, reference-class
//! ids, source prefixes, name-view probe) is resolved eagerly in
//! [`Session::open`], so every component can rely on init-before-use and no
//! per-call memoization on shared mutable state is needed. Requests are
//! synchronous and bounded; callers issuing concurrent requests should give
//! each thread its own session.

use std::collections::HashSet;

use crate::assemble::Assembler;
use crate::config::StoreConfig;
use crate::db::Database;
use crate::density::{self, FeatureSummary};
use crate::error::{Error, Result};
use crate::models::{Feature, Segment};
use crate::ontology::OntologyTermIndex;
use crate::resolver;
use crate::search::{self, Candidates, SearchOp};

/// External db name under which GFF source strings are stored as dbxrefs.
const GFF_SOURCE_DB: &str = "GFF_source";

/// Optional denormalized name lookup, probed once per session.
const NAME_VIEW: &str = "all_feature_names";

pub struct Session {
    db: Database,
    cfg: StoreConfig,
    terms: OntologyTermIndex,
    organism_id: Option<i64>,
    reference_type_ids: Vec<i64>,
    source_prefixes: HashSet<String>,
    source_db: Option<i64>,
    has_name_view: bool,
}

impl Session {
    /// Validate the configuration and populate every session cache.
    pub fn open(db: Database, cfg: StoreConfig) -> Result<Self> {
        cfg.validate()?;

        let terms = OntologyTermIndex::load(&db)?;

        let reference_type_ids = terms
            .ids(&cfg.reference_class)
            .ok_or_else(|| Error::TermNotFound(cfg.reference_class.clone()))?
            .as_vec();

        let organism_id = match cfg.organism.as_deref() {
            Some(name) => Some(resolve_organism(&db, name)?),
            None => None,
        };

        let source_prefixes = db
            .external_db_names()?
            .into_iter()
            .map(|n| n.to_lowercase())
            .collect();
        let source_db = db.db_id_by_name(GFF_SOURCE_DB)?;

        let has_name_view = match cfg.compat {
            crate::config::SchemaCompat::Modern => db.has_relation(NAME_VIEW)?,
            crate::config::SchemaCompat::Legacy => false,
        };

        tracing::info!(
            primary_cv = terms.primary_cv(),
            ?organism_id,
            has_name_view,
            "feature store session opened"
        );

        Ok(Self {
            db,
            cfg,
            terms,
            organism_id,
            reference_type_ids,
            source_prefixes,
            source_db,
            has_name_view,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    pub fn terms(&self) -> &OntologyTermIndex {
        &self.terms
    }

    pub fn organism_id(&self) -> Option<i64> {
        self.organism_id
    }

    // ============================================================
    // Request API
    // ============================================================

    /// Resolve a named landmark to a segment. `None` when the name is
    /// unknown; `end` defaults to the landmark's extent.
    pub fn resolve_segment(
        &self,
        name: &str,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Option<Segment>> {
        resolver::resolve_landmark(
            &self.db,
            &self.reference_type_ids,
            self.organism_id,
            name,
            start,
            end,
        )
    }

    /// Search by primary feature name (and uniquename).
    pub fn search_by_name(&self, name: &str, class: Option<&str>) -> Result<Vec<Feature>> {
        self.run_search(name, class, SearchOp::ByName)
    }

    /// Search synonyms/aliases.
    pub fn search_by_alias(&self, name: &str, class: Option<&str>) -> Result<Vec<Feature>> {
        self.run_search(name, class, SearchOp::ByAlias)
    }

    /// All features overlapping a segment, optionally filtered by type
    /// names and by `featureprop` attribute `(name, value)` pairs.
    pub fn features_overlapping(
        &self,
        segment: &Segment,
        types: &[&str],
        attributes: &[(&str, &str)],
    ) -> Result<Vec<Feature>> {
        let type_ids: Vec<i64> = types
            .iter()
            .filter_map(|ty| self.terms.ids(ty))
            .flat_map(|ids| ids.as_vec())
            .collect();
        if !types.is_empty() && type_ids.is_empty() {
            // Every requested type is unknown: nothing can match.
            return Ok(Vec::new());
        }

        let mut attr_filters = Vec::with_capacity(attributes.len());
        for (name, value) in attributes {
            match self.terms.one(name) {
                Some(type_id) => attr_filters.push((type_id, value.to_string())),
                None => return Ok(Vec::new()),
            }
        }

        let query = resolver::overlapping_ids_query(
            segment,
            self.cfg.overlap,
            &type_ids,
            &attr_filters,
            self.organism_id,
            self.cfg.allow_obsolete,
        );
        let ids = self.db.select_ids(&query)?;
        self.assembler().assemble(&ids)
    }

    /// Approximate per-bin feature density over a segment.
    pub fn feature_summary(
        &self,
        segment: &Segment,
        types: &[&str],
        bins: usize,
    ) -> Result<FeatureSummary> {
        density::estimate(&self.db, &self.terms, segment, types, bins)
    }

    fn run_search(&self, name: &str, class: Option<&str>, op: SearchOp) -> Result<Vec<Feature>> {
        let ctx = search::SearchContext {
            terms: &self.terms,
            organism_id: self.organism_id,
            source_prefixes: &self.source_prefixes,
            has_name_view: self.has_name_view,
            fulltext: self.cfg.fulltext,
            allow_obsolete: self.cfg.allow_obsolete,
        };
        let ids = match search::build(&ctx, name, class, op) {
            Candidates::Direct(id) => vec![id],
            Candidates::Query(query) => self.db.select_ids(&query)?,
            Candidates::Empty => return Ok(Vec::new()),
        };
        self.assembler().assemble(&ids)
    }

    fn assembler(&self) -> Assembler<'_> {
        Assembler {
            db: &self.db,
            terms: &self.terms,
            cfg: &self.cfg,
            reference_type_ids: &self.reference_type_ids,
            source_db: self.source_db,
        }
    }
}

/// Resolve the organism selector to a single id.
///
/// A "Genus species" form matches the binomial columns; anything else
/// matches common name or abbreviation. More than one match is fatal:
/// silently picking one would make all downstream organism filtering wrong.
fn resolve_organism(db: &Database, name: &str) -> Result<i64> {
    let ids = match name.split_once(char::is_whitespace) {
        Some((genus, species)) => db.organisms_by_binomial(genus, species.trim())?,
        None => db.organisms_by_common_name(name)?,
    };
    match ids.as_slice() {
        [] => Err(Error::OrganismNotFound(name.to_string())),
        [id] => Ok(*id),
        many => Err(Error::AmbiguousOrganism {
            name: name.to_string(),
            count: many.len(),
        }),
    }
}

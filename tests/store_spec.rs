use locusgraph::{
    AssemblyMode, Database, Error, OverlapStrategy, SchemaCompat, Session, StoreConfig, Strand,
    TermIds,
};
use speculate2::speculate;

/// A small annotated genome: one chromosome with a gene, a transcript with
/// exons and a polypeptide product, two nested contigs (one reversed), a
/// synonym, an obsolete feature, a second organism sharing a common name,
/// and precomputed density stats.
const FIXTURE: &str = "
    INSERT INTO cv (cv_id, name) VALUES
        (1, 'SOFA'),
        (2, 'relationship'),
        (3, 'synonym_type'),
        (4, 'legacy_so'),
        (5, 'feature_property');

    INSERT INTO cvterm (cvterm_id, cv_id, name) VALUES
        (10, 1, 'chromosome'),
        (11, 1, 'gene'),
        (12, 1, 'mRNA'),
        (13, 1, 'exon'),
        (14, 1, 'polypeptide'),
        (15, 1, 'CDS'),
        (16, 1, 'contig'),
        (20, 2, 'part_of'),
        (21, 2, 'derives_from'),
        (22, 3, 'exact'),
        (23, 5, 'note'),
        (30, 4, 'gene');

    INSERT INTO organism (organism_id, abbreviation, genus, species, common_name) VALUES
        (1, 'Dmel', 'Drosophila', 'melanogaster', 'fruit fly'),
        (2, 'Dsim', 'Drosophila', 'simulans', 'fruit fly');

    INSERT INTO db (db_id, name) VALUES (1, 'GFF_source'), (2, 'FlyBase');
    INSERT INTO dbxref (dbxref_id, db_id, accession) VALUES (1, 1, 'curated');

    INSERT INTO feature (feature_id, organism_id, name, uniquename, type_id, seqlen, is_obsolete) VALUES
        (100, 1, '2L', '2L', 10, 10000, 0),
        (101, 1, 'white', 'FBgn0001', 11, NULL, 0),
        (104, 1, 'white-RA', 'FBtr0001', 12, NULL, 0),
        (105, 1, 'white-E1', 'FBtr0001:1', 13, NULL, 0),
        (106, 1, 'white-E2', 'FBtr0001:2', 13, NULL, 0),
        (107, 1, 'white-E3', 'FBtr0001:3', 13, NULL, 0),
        (108, 1, 'white-PA', 'FBpp0001', 14, NULL, 0),
        (120, 1, 'ctg1', 'ctg1', 16, 2000, 0),
        (121, 1, 'rovA', 'rovA', 11, NULL, 0),
        (122, 1, 'ctg2', 'ctg2', 16, 1000, 0),
        (123, 1, 'revgene', 'revgene', 11, NULL, 0),
        (130, 1, 'ghost', 'ghost', 11, NULL, 1),
        (141, 2, '2L', 'Dsim_2L', 10, 5000, 0),
        (140, 2, 'white', 'Dsim_white', 11, NULL, 0);

    INSERT INTO featureloc (feature_id, srcfeature_id, fmin, fmax, strand, phase, rank) VALUES
        (101, 100, 999, 2000, 1, NULL, 0),
        (104, 100, 50, 450, 1, NULL, 0),
        (105, 100, 50, 150, 1, NULL, 0),
        (106, 100, 150, 300, 1, NULL, 0),
        (107, 100, 300, 450, 1, NULL, 0),
        (108, 100, 100, 400, 1, 0, 0),
        (120, 100, 5000, 7000, 1, NULL, 0),
        (121, 120, 100, 300, -1, NULL, 0),
        (122, 100, 8000, 9000, -1, NULL, 0),
        (123, 122, 100, 300, 1, NULL, 0),
        (130, 100, 3000, 3100, 1, NULL, 0),
        (140, 141, 10, 20, 1, NULL, 0);

    INSERT INTO feature_relationship (subject_id, object_id, type_id) VALUES
        (105, 104, 20),
        (106, 104, 20),
        (107, 104, 20),
        (108, 104, 21);

    INSERT INTO synonym (synonym_id, name, type_id) VALUES (1, 'wht', 22);
    INSERT INTO feature_synonym (synonym_id, feature_id, is_current) VALUES (1, 101, 1);

    INSERT INTO feature_dbxref (feature_id, dbxref_id) VALUES (101, 1);
    INSERT INTO featureprop (feature_id, type_id, value) VALUES (101, 23, 'eye pigment');

    INSERT INTO analysis (analysis_id, name, program) VALUES (1, 'genescan', 'genescan');
    INSERT INTO analysisfeature (feature_id, analysis_id, significance) VALUES (121, 1, 0.95);

    INSERT INTO all_feature_names (feature_id, name, organism_id) VALUES
        (101, 'white', 1),
        (101, 'FBgn0001', 1),
        (101, 'wht', 1),
        (140, 'white', 2);

    INSERT INTO interval_stats (type_id, srcfeature_id, bin, cum_count) VALUES
        (11, 100, 0, 2), (11, 100, 1, 4), (11, 100, 2, 6), (11, 100, 3, 8),
        (11, 100, 4, 10), (11, 100, 5, 12), (11, 100, 6, 14), (11, 100, 7, 16),
        (11, 100, 8, 18), (11, 100, 9, 20), (11, 100, 10, 22);
";

fn seeded_db() -> Database {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let db = Database::open_memory().expect("Failed to create in-memory database");
    db.migrate().expect("Failed to run migrations");
    db.batch(FIXTURE).expect("Failed to seed fixture");
    db
}

fn open_session(cfg: StoreConfig) -> Session {
    Session::open(seeded_db(), cfg).expect("Failed to open session")
}

fn ids(features: &[locusgraph::Feature]) -> Vec<i64> {
    features.iter().map(|f| f.feature_id).collect()
}

speculate! {
    before {
        let session = open_session(StoreConfig::default());
    }

    describe "coordinate_semantics" {
        it "exports 1-based inclusive coordinates" {
            let features = session.search_by_name("white", Some("gene")).expect("Query failed");
            let white = features.iter().find(|f| f.feature_id == 101).expect("white missing");
            // fmin 999, fmax 2000 in the store.
            assert_eq!(white.start, 1000);
            assert_eq!(white.end, 2000);
            assert_eq!(white.len(), 2000 - 999);
            assert_eq!(white.strand, Strand::Forward);
        }

        it "hands out the parent segment for coordinate context" {
            let features = session.search_by_name("white", Some("gene")).expect("Query failed");
            let white = features.iter().find(|f| f.feature_id == 101).unwrap();
            let segment = white.segment.as_ref().expect("missing parent segment");
            assert_eq!(segment.name, "2L");
            assert_eq!((segment.start, segment.end), (1, 10000));
        }
    }

    describe "resolve_segment" {
        it "returns None for an unknown landmark" {
            let segment = session.resolve_segment("nope", None, None).expect("Query failed");
            assert!(segment.is_none());
        }

        it "defaults bounds to the landmark extent" {
            let segment = session.resolve_segment("2L", None, None)
                .expect("Query failed").expect("Landmark not found");
            assert_eq!(segment.feature_id, 100);
            assert_eq!((segment.start, segment.end), (1, 10000));
        }

        it "round-trips its own coordinates" {
            let first = session.resolve_segment("2L", None, None)
                .expect("Query failed").expect("Landmark not found");
            let again = session.resolve_segment("2L", Some(first.start), Some(first.end))
                .expect("Query failed").expect("Landmark not found");
            assert_eq!(first, again);
        }

        it "honors an explicit sub-range" {
            let segment = session.resolve_segment("2L", Some(500), Some(1500))
                .expect("Query failed").expect("Landmark not found");
            assert_eq!((segment.start, segment.end), (500, 1500));
        }

        it "resolves a nested contig as a landmark" {
            let segment = session.resolve_segment("ctg1", None, None)
                .expect("Query failed").expect("Landmark not found");
            assert_eq!(segment.feature_id, 120);
            assert_eq!((segment.start, segment.end), (1, 2000));
        }
    }

    describe "search_by_name" {
        it "matches the primary name case-insensitively" {
            let features = session.search_by_name("WHITE", Some("gene")).expect("Query failed");
            assert!(ids(&features).contains(&101));
        }

        it "matches the uniquename too" {
            let features = session.search_by_name("FBgn0001", Some("gene")).expect("Query failed");
            assert_eq!(ids(&features), vec![101]);
        }

        it "honors the class filter on exact search" {
            let as_gene = session.search_by_name("white", Some("gene")).expect("Query failed");
            assert!(!as_gene.is_empty());
            let as_exon = session.search_by_name("white", Some("exon")).expect("Query failed");
            assert!(as_exon.is_empty());
        }

        it "returns empty for an unknown name" {
            let features = session.search_by_name("no-such-gene", None).expect("Query failed");
            assert!(features.is_empty());
        }

        it "returns empty for an unknown class" {
            let features = session.search_by_name("white", Some("no_such_type")).expect("Query failed");
            assert!(features.is_empty());
        }

        it "short-circuits explicit identifiers" {
            let features = session.search_by_name("id:101", None).expect("Query failed");
            assert_eq!(ids(&features), vec![101]);
        }

        it "strips a known source prefix" {
            let features = session.search_by_name("FlyBase:white", Some("gene")).expect("Query failed");
            assert!(ids(&features).contains(&101));
        }

        it "keeps an unknown prefix verbatim" {
            let features = session.search_by_name("GenBank:white", None).expect("Query failed");
            assert!(features.is_empty());
        }

        it "resolves the source string through the provenance db" {
            let features = session.search_by_name("white", Some("gene")).expect("Query failed");
            let white = features.iter().find(|f| f.feature_id == 101).unwrap();
            assert_eq!(white.source.as_deref(), Some("curated"));
        }
    }

    describe "wildcard_search" {
        it "returns a superset of the exact results" {
            let exact = session.search_by_name("white", None).expect("Query failed");
            let wild = session.search_by_name("whi*", None).expect("Query failed");
            let wild_ids = ids(&wild);
            for id in ids(&exact) {
                assert!(wild_ids.contains(&id), "wildcard lost exact match {id}");
            }
            assert!(wild_ids.len() >= exact.len());
        }

        it "ignores the class filter" {
            // Intentionally broader: the wildcard still finds the gene even
            // under a non-matching class.
            let features = session.search_by_name("whi*", Some("exon")).expect("Query failed");
            assert!(ids(&features).contains(&101));
        }

        it "treats question marks as single-character wildcards" {
            let features = session.search_by_name("whit?", Some("gene")).expect("Query failed");
            assert!(ids(&features).contains(&101));
        }
    }

    describe "search_by_alias" {
        it "finds a feature through its synonym" {
            let features = session.search_by_alias("wht", None).expect("Query failed");
            assert_eq!(ids(&features), vec![101]);
        }

        it "does not leak synonyms into name search" {
            let features = session.search_by_name("wht", None).expect("Query failed");
            assert!(features.is_empty());
        }

        it "falls back to the synonym join on legacy schemas" {
            let session = open_session(StoreConfig {
                compat: SchemaCompat::Legacy,
                ..Default::default()
            });
            let features = session.search_by_alias("wht", None).expect("Query failed");
            assert_eq!(ids(&features), vec![101]);
        }
    }

    describe "fulltext_search" {
        it "ands normalized tokens" {
            let session = open_session(StoreConfig {
                fulltext: true,
                ..Default::default()
            });
            let features = session.search_by_name("white RA", None).expect("Query failed");
            assert_eq!(ids(&features), vec![104]);
        }

        it "matches substrings of a single token" {
            let session = open_session(StoreConfig {
                fulltext: true,
                ..Default::default()
            });
            let features = session.search_by_name("hite", Some("gene")).expect("Query failed");
            assert!(ids(&features).contains(&101));
        }
    }

    describe "organism_selection" {
        it "rejects an ambiguous common name" {
            let result = Session::open(seeded_db(), StoreConfig {
                organism: Some("fruit fly".to_string()),
                ..Default::default()
            });
            assert!(matches!(result, Err(Error::AmbiguousOrganism { count: 2, .. })));
        }

        it "resolves a binomial form deterministically" {
            let session = open_session(StoreConfig {
                organism: Some("Drosophila melanogaster".to_string()),
                ..Default::default()
            });
            let features = session.search_by_name("white", Some("gene")).expect("Query failed");
            assert_eq!(ids(&features), vec![101]);
        }

        it "rejects an unknown organism" {
            let result = Session::open(seeded_db(), StoreConfig {
                organism: Some("Drosophila imaginaria".to_string()),
                ..Default::default()
            });
            assert!(matches!(result, Err(Error::OrganismNotFound(_))));
        }

        it "scopes landmark resolution to the selected organism" {
            // Both organisms carry a chromosome named 2L; the selector must
            // pick its own, not whichever feature id sorts first.
            let session = open_session(StoreConfig {
                organism: Some("Drosophila simulans".to_string()),
                ..Default::default()
            });
            let segment = session.resolve_segment("2L", None, None)
                .expect("Query failed").expect("Landmark not found");
            assert_eq!(segment.feature_id, 141);
            assert_eq!((segment.start, segment.end), (1, 5000));
            let features = session.features_overlapping(&segment, &["gene"], &[]).expect("Query failed");
            assert_eq!(ids(&features), vec![140]);
        }

        it "returns both organisms' features when no selector is set" {
            let features = session.search_by_name("white", Some("gene")).expect("Query failed");
            assert_eq!(ids(&features), vec![101, 140]);
        }
    }

    describe "features_overlapping" {
        it "finds typed features in a range" {
            let segment = session.resolve_segment("2L", None, None)
                .expect("Query failed").expect("Landmark not found");
            let features = session.features_overlapping(&segment, &["gene"], &[]).expect("Query failed");
            assert_eq!(ids(&features), vec![101]);
        }

        it "excludes features outside the window" {
            let segment = session.resolve_segment("2L", Some(2500), Some(2900))
                .expect("Query failed").expect("Landmark not found");
            let features = session.features_overlapping(&segment, &["gene"], &[]).expect("Query failed");
            assert!(features.is_empty());
        }

        it "treats range ends as inclusive" {
            // white spans 1000..2000; a window ending exactly at 1000
            // still overlaps it.
            let segment = session.resolve_segment("2L", Some(900), Some(1000))
                .expect("Query failed").expect("Landmark not found");
            let features = session.features_overlapping(&segment, &["gene"], &[]).expect("Query failed");
            assert_eq!(ids(&features), vec![101]);
        }

        it "returns identical results for both overlap strategies" {
            let indexed = open_session(StoreConfig {
                overlap: OverlapStrategy::RangeIndexed,
                ..Default::default()
            });
            let segment = session.resolve_segment("2L", None, None)
                .expect("Query failed").expect("Landmark not found");
            for types in [vec![], vec!["gene"], vec!["exon", "mRNA"]] {
                let generic = session.features_overlapping(&segment, &types, &[]).expect("Query failed");
                let ranged = indexed.features_overlapping(&segment, &types, &[]).expect("Query failed");
                assert_eq!(ids(&generic), ids(&ranged));
            }
        }

        it "filters by featureprop attributes" {
            let segment = session.resolve_segment("2L", None, None)
                .expect("Query failed").expect("Landmark not found");
            let hit = session
                .features_overlapping(&segment, &["gene"], &[("note", "eye pigment")])
                .expect("Query failed");
            assert_eq!(ids(&hit), vec![101]);
            let miss = session
                .features_overlapping(&segment, &["gene"], &[("note", "wings")])
                .expect("Query failed");
            assert!(miss.is_empty());
        }

        it "queries a nested contig in its own coordinates" {
            let segment = session.resolve_segment("ctg1", None, None)
                .expect("Query failed").expect("Landmark not found");
            let features = session.features_overlapping(&segment, &["gene"], &[]).expect("Query failed");
            assert_eq!(ids(&features), vec![121]);
            assert_eq!((features[0].start, features[0].end), (101, 300));
            assert_eq!(features[0].strand, Strand::Reverse);
            assert_eq!(features[0].score, Some(0.95));
        }
    }

    describe "obsolete_features" {
        it "are silently skipped by default" {
            let features = session.search_by_name("ghost", None).expect("Query failed");
            assert!(features.is_empty());
        }

        it "surface when allowed" {
            let session = open_session(StoreConfig {
                allow_obsolete: true,
                ..Default::default()
            });
            let features = session.search_by_name("ghost", None).expect("Query failed");
            assert_eq!(ids(&features), vec![130]);
        }
    }

    describe "recursive_mapping" {
        before {
            let session = open_session(StoreConfig {
                assembly_mode: AssemblyMode::Recursive,
                ..Default::default()
            });
        }

        it "lifts a contig-mapped feature onto the chromosome" {
            let features = session.search_by_name("rovA", Some("gene")).expect("Query failed");
            assert_eq!(features.len(), 1);
            let rov = &features[0];
            // [100,300) on ctg1, which sits at [5000,7000) on 2L.
            assert_eq!((rov.start, rov.end), (5101, 5300));
            assert_eq!(rov.strand, Strand::Reverse);
            assert_eq!(rov.segment.as_ref().unwrap().name, "2L");
        }

        it "mirrors through a reversed frame and flips strand" {
            let features = session.search_by_name("revgene", Some("gene")).expect("Query failed");
            assert_eq!(features.len(), 1);
            let rev = &features[0];
            // [100,300) forward on ctg2, which is reversed at [8000,9000).
            assert_eq!((rev.start, rev.end), (8701, 8900));
            assert_eq!(rev.strand, Strand::Reverse);
            assert_eq!(rev.segment.as_ref().unwrap().name, "2L");
        }

        it "falls back to the canonical location for unnested features" {
            let features = session.search_by_name("white", Some("gene")).expect("Query failed");
            let white = features.iter().find(|f| f.feature_id == 101).unwrap();
            assert_eq!((white.start, white.end), (1000, 2000));
            assert_eq!(white.strand, Strand::Forward);
        }
    }

    describe "cds_inference" {
        before {
            let session = open_session(StoreConfig {
                assembly_mode: AssemblyMode::InferCds,
                ..Default::default()
            });
        }

        it "derives clipped coding intervals from the exons" {
            let features = session.search_by_name("white-PA", None).expect("Query failed");
            assert_eq!(features.len(), 3);
            let intervals: Vec<(i64, i64)> = features.iter().map(|f| (f.start, f.end)).collect();
            // Polypeptide [100,400) clipped against exons [50,150),
            // [150,300), [300,450): internal boundaries preserved exactly.
            assert_eq!(intervals, vec![(101, 150), (151, 300), (301, 400)]);
            for f in &features {
                assert_eq!(f.kind.name, "CDS");
                assert_eq!(f.strand, Strand::Forward);
                assert_eq!(f.phase, Some(0)); // from the polypeptide row
            }
        }

        it "never exceeds the polypeptide span" {
            let features = session.search_by_name("white-PA", None).expect("Query failed");
            let total: i64 = features.iter().map(|f| f.len()).sum();
            assert!(total <= 400 - 100);
        }

        it "leaves non-coding features untouched" {
            let features = session.search_by_name("white", Some("gene")).expect("Query failed");
            let white = features.iter().find(|f| f.feature_id == 101).unwrap();
            assert_eq!(white.kind.name, "gene");
        }
    }

    describe "feature_summary" {
        it "estimates per-bin counts from cumulative stats" {
            let segment = session.resolve_segment("2L", None, None)
                .expect("Query failed").expect("Landmark not found");
            let summary = session.feature_summary(&segment, &["gene"], 10).expect("Query failed");
            assert_eq!(summary.label, "gene");
            assert_eq!(summary.counts, vec![2; 10]);
            // Deltas telescope to the cumulative difference at the ends.
            assert_eq!(summary.counts.iter().sum::<i64>(), 22 - 2);
        }

        it "clamps boundaries past the last summary bin to the total" {
            let segment = session.resolve_segment("2L", Some(1), Some(15000))
                .expect("Query failed").expect("Landmark not found");
            let summary = session.feature_summary(&segment, &["gene"], 10).expect("Query failed");
            assert!(summary.counts.iter().all(|&c| c >= 0));
            assert_eq!(summary.counts.iter().sum::<i64>(), 22 - 2);
        }

        it "sums counts across requested types" {
            let segment = session.resolve_segment("2L", None, None)
                .expect("Query failed").expect("Landmark not found");
            let summary = session.feature_summary(&segment, &["gene", "exon"], 10).expect("Query failed");
            // No stats rows exist for exon, so the merge adds nothing.
            assert_eq!(summary.label, "gene,exon");
            assert_eq!(summary.counts.iter().sum::<i64>(), 20);
        }

        it "rejects zero bins" {
            let segment = session.resolve_segment("2L", None, None)
                .expect("Query failed").expect("Landmark not found");
            assert!(matches!(
                session.feature_summary(&segment, &["gene"], 0),
                Err(Error::Config(_))
            ));
        }
    }

    describe "ontology_index" {
        it "reports homonyms as an explicit set" {
            match session.terms().ids("gene") {
                Some(TermIds::Many(ids)) => {
                    assert!(ids.contains(&11) && ids.contains(&30));
                }
                other => panic!("expected homonymous gene term, got {other:?}"),
            }
        }

        it "prefers the primary ontology when one id is needed" {
            assert_eq!(session.terms().one("gene"), Some(11));
        }

        it "resolves every stored type id back to a name" {
            for id in [10, 11, 12, 13, 14, 15, 16, 20, 21] {
                assert!(session.terms().name(id).is_some(), "type id {id} unresolvable");
            }
        }

        it "fails the session when no sequence ontology exists" {
            let db = Database::open_memory().expect("Failed to create in-memory database");
            db.migrate().expect("Failed to run migrations");
            db.batch("INSERT INTO cv (cv_id, name) VALUES (1, 'something_else');")
                .expect("Failed to seed");
            let result = Session::open(db, StoreConfig::default());
            assert!(matches!(result, Err(Error::OntologyNotFound)));
        }
    }

    describe "file_backed_store" {
        it "opens, migrates, and answers queries from disk" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("annotations.db");
            {
                let db = Database::open(path.clone()).expect("Failed to open database");
                db.migrate().expect("Failed to run migrations");
                db.batch(FIXTURE).expect("Failed to seed fixture");
            }
            let db = Database::open(path).expect("Failed to reopen database");
            db.migrate().expect("Migrations not idempotent on reopen");
            let session = Session::open(db, StoreConfig::default()).expect("Failed to open session");
            let features = session.search_by_name("white", Some("gene")).expect("Query failed");
            assert_eq!(ids(&features), vec![101, 140]);
        }
    }

    describe "serialization" {
        it "exports features as JSON with their segment context" {
            let features = session.search_by_name("white", Some("gene")).expect("Query failed");
            let white = features.iter().find(|f| f.feature_id == 101).unwrap();
            let json = serde_json::to_value(white).expect("Serialization failed");
            assert_eq!(json["start"], 1000);
            assert_eq!(json["end"], 2000);
            assert_eq!(json["kind"]["name"], "gene");
            assert_eq!(json["segment"]["name"], "2L");
            assert_eq!(json["strand"], "forward");
        }
    }
}

//! Name/alias search query construction.
//!
//! Translates a typed search request into a bounded, fully parameterized
//! statement returning distinct candidate feature ids. Zero rows is not an
//! error; callers treat it as "no match, try another interpretation".

use std::collections::HashSet;

use rusqlite::ToSql;

use crate::db::BuiltQuery;
use crate::ontology::OntologyTermIndex;

/// Which name space a search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOp {
    /// The primary feature name (and uniquename).
    ByName,
    /// Synonyms, via the denormalized name table when present or the
    /// synonym relation otherwise.
    ByAlias,
}

/// Everything the builder needs from the session, borrowed per request.
pub(crate) struct SearchContext<'a> {
    pub terms: &'a OntologyTermIndex,
    pub organism_id: Option<i64>,
    /// Lowercased external db names recognized as `Source:name` prefixes.
    pub source_prefixes: &'a HashSet<String>,
    pub has_name_view: bool,
    pub fulltext: bool,
    pub allow_obsolete: bool,
}

/// Outcome of query construction.
pub(crate) enum Candidates {
    /// The name was an explicit identifier; no search needed.
    Direct(i64),
    Query(BuiltQuery),
    /// Statically unsatisfiable (e.g. an unknown class name): empty result
    /// without touching the store.
    Empty,
}

pub(crate) fn build(
    ctx: &SearchContext<'_>,
    name: &str,
    class: Option<&str>,
    op: SearchOp,
) -> Candidates {
    // Explicit identifier short circuit bypasses search entirely.
    if let Some(id) = parse_id_prefix(name) {
        return Candidates::Direct(id);
    }

    // Strip a single known `Source:` prefix.
    let name = strip_source_prefix(name, ctx.source_prefixes);

    let wildcard = name.contains('*') || name.contains('?');

    // Wildcard search is intentionally broader: class filtering is dropped.
    let type_ids = if wildcard {
        None
    } else {
        match class {
            None => None,
            Some(class) => match ctx.terms.ids(class) {
                Some(ids) => Some(ids.as_vec()),
                // Unknown class: nothing can match.
                None => return Candidates::Empty,
            },
        }
    };

    let (from, name_cols): (&str, &[&str]) = match op {
        SearchOp::ByName => ("FROM feature f", &["f.name", "f.uniquename"]),
        SearchOp::ByAlias if ctx.has_name_view => (
            "FROM all_feature_names an JOIN feature f ON f.feature_id = an.feature_id",
            &["an.name"],
        ),
        SearchOp::ByAlias => (
            "FROM feature f
             JOIN feature_synonym fs ON fs.feature_id = f.feature_id AND fs.is_current = 1
             JOIN synonym s ON s.synonym_id = fs.synonym_id",
            &["s.name"],
        ),
    };

    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    let mut conditions: Vec<String> = Vec::new();

    // Matching strategy priority: full-text, then wildcard, then exact.
    if ctx.fulltext {
        let tokens = tokenize(name);
        if tokens.is_empty() {
            return Candidates::Empty;
        }
        for token in tokens {
            let per_col: Vec<String> = name_cols
                .iter()
                .map(|col| {
                    params.push(Box::new(token.clone()));
                    format!("lower({col}) LIKE '%' || ? || '%'")
                })
                .collect();
            conditions.push(format!("({})", per_col.join(" OR ")));
        }
    } else if wildcard {
        let pattern = wildcard_to_like(name);
        let per_col: Vec<String> = name_cols
            .iter()
            .map(|col| {
                params.push(Box::new(pattern.clone()));
                format!("lower({col}) LIKE ? ESCAPE '\\'")
            })
            .collect();
        conditions.push(format!("({})", per_col.join(" OR ")));
    } else {
        let per_col: Vec<String> = name_cols
            .iter()
            .map(|col| {
                params.push(Box::new(name.to_string()));
                format!("lower({col}) = lower(?)")
            })
            .collect();
        conditions.push(format!("({})", per_col.join(" OR ")));
    }

    if let Some(type_ids) = type_ids {
        let placeholders = vec!["?"; type_ids.len()].join(", ");
        conditions.push(format!("f.type_id IN ({placeholders})"));
        for id in type_ids {
            params.push(Box::new(id));
        }
    }

    if let Some(organism_id) = ctx.organism_id {
        conditions.push("f.organism_id = ?".to_string());
        params.push(Box::new(organism_id));
    }

    if !ctx.allow_obsolete {
        conditions.push("f.is_obsolete = 0".to_string());
    }

    let sql = format!(
        "SELECT DISTINCT f.feature_id {from} WHERE {} ORDER BY f.feature_id",
        conditions.join(" AND ")
    );

    tracing::debug!(%sql, "built feature search");

    Candidates::Query(BuiltQuery { sql, params })
}

/// `id:<number>` resolves straight to a feature id. The prefix is
/// case-insensitive like every other comparison in the builder.
fn parse_id_prefix(name: &str) -> Option<i64> {
    let prefix = name.get(..3)?;
    if !prefix.eq_ignore_ascii_case("id:") {
        return None;
    }
    name[3..].trim().parse().ok()
}

/// Strip `Source:` when `Source` is a known external db and exactly one
/// separator is present.
fn strip_source_prefix<'a>(name: &'a str, sources: &HashSet<String>) -> &'a str {
    let mut parts = name.splitn(2, ':');
    let (Some(prefix), Some(rest)) = (parts.next(), parts.next()) else {
        return name;
    };
    if !rest.contains(':') && sources.contains(&prefix.to_lowercase()) {
        rest
    } else {
        name
    }
}

/// Translate shell-style wildcards to a lowercased LIKE pattern, escaping
/// any literal LIKE metacharacters first.
fn wildcard_to_like(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        match c {
            '\\' | '%' | '_' => {
                pattern.push('\\');
                pattern.push(c);
            }
            '*' => pattern.push('%'),
            '?' => pattern.push('_'),
            c => pattern.push(c),
        }
    }
    pattern
}

/// Normalize a query into lowercase alphanumeric tokens. Multi-word
/// queries are ANDed by the builder.
fn tokenize(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_prefix_short_circuits() {
        assert_eq!(parse_id_prefix("id:1234"), Some(1234));
        assert_eq!(parse_id_prefix("ID:7"), Some(7));
        assert_eq!(parse_id_prefix("Id:9"), Some(9));
        assert_eq!(parse_id_prefix("id:abc"), None);
        assert_eq!(parse_id_prefix("white"), None);
        assert_eq!(parse_id_prefix("id"), None);
    }

    #[test]
    fn source_prefix_is_stripped_only_when_known() {
        let sources: HashSet<String> = ["flybase".to_string()].into_iter().collect();
        assert_eq!(strip_source_prefix("FlyBase:white", &sources), "white");
        assert_eq!(strip_source_prefix("GenBank:white", &sources), "GenBank:white");
        // Two separators: not a source-qualified name.
        assert_eq!(strip_source_prefix("FlyBase:a:b", &sources), "FlyBase:a:b");
        assert_eq!(strip_source_prefix("white", &sources), "white");
    }

    #[test]
    fn wildcard_translation_escapes_metacharacters() {
        assert_eq!(wildcard_to_like("abc*"), "abc%");
        assert_eq!(wildcard_to_like("a?c"), "a_c");
        assert_eq!(wildcard_to_like("50%*"), "50\\%%");
        assert_eq!(wildcard_to_like("a_b"), "a\\_b");
    }

    #[test]
    fn tokenization_normalizes() {
        assert_eq!(tokenize("White Gene"), vec!["white", "gene"]);
        assert_eq!(tokenize("abc-1.2"), vec!["abc", "1", "2"]);
        assert!(tokenize("**").is_empty());
    }
}

//! Parsed request parameters and predicate assembly.

use std::collections::HashMap;
use tracing::{debug, trace};

use crate::ast::{FilterTerm, Value};
use crate::dialect::{Binds, Dialect, ReservedKeys};
use crate::filter::FilterSpec;

/// Terms of one request, in the order they were received.
///
/// Keys may repeat; every occurrence is kept and rendered.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    id: Option<FilterTerm>,
    terms: Vec<FilterTerm>,
    index: HashMap<String, Vec<usize>>,
    filter: Option<FilterSpec>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a term under `key`.
    pub fn set(&mut self, key: impl Into<String>, term: FilterTerm) {
        self.index.entry(key.into()).or_default().push(self.terms.len());
        self.terms.push(term);
    }

    /// Identifier term, rendered first in the chain.
    pub fn set_id(&mut self, term: FilterTerm) {
        self.id = Some(term);
    }

    pub fn id(&self) -> Option<&FilterTerm> {
        self.id.as_ref()
    }

    /// All terms stored under `key`, oldest first.
    pub fn get<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a FilterTerm> + 'a {
        self.index
            .get(key)
            .into_iter()
            .flatten()
            .map(|&i| &self.terms[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len() + usize::from(self.id.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.terms.is_empty()
    }

    pub fn filter(&self) -> Option<&FilterSpec> {
        self.filter.as_ref()
    }

    pub fn set_filter(&mut self, filter: FilterSpec) {
        self.filter = Some(filter);
    }

    /// Whether assembly needs the table's column list: a wildcard term is
    /// present and the filter names no fields.
    pub fn needs_columns(&self, reserved: &ReservedKeys) -> bool {
        self.contains(&reserved.wildcard) && self.fields().is_empty()
    }

    fn fields(&self) -> &[String] {
        self.filter.as_ref().map_or(&[], |f| f.fields.as_slice())
    }
}

/// Assemble the predicate text and its bind values.
///
/// The wildcard group renders first so its binds lead the list; then the id
/// term and every stored term in insertion order, joined with AND (or OR when
/// the term asks for it).
pub fn assemble<D: Dialect + ?Sized>(
    dialect: &D,
    params: &QueryParams,
    columns: &[String],
) -> (String, Vec<Value>) {
    if params.is_empty() {
        return (String::new(), Vec::new());
    }

    let reserved = dialect.reserved();
    let mut binds = Binds::new();

    let group = params.get(&reserved.wildcard).last().and_then(|wildcard| {
        let targets = match params.fields() {
            [] => columns,
            fields => fields,
        };
        let parts: Vec<String> = targets
            .iter()
            .filter(|column| !params.contains(column) && !reserved.is_excluded(column))
            .map(|column| {
                trace!(column = %column, "expanding wildcard");
                dialect.render(&wildcard.rebind(column), &mut binds)
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(format!("({})", parts.join(" OR ")))
        }
    });

    let mut chain = String::new();
    let chained = params
        .id
        .iter()
        .chain(params.terms.iter().filter(|t| !reserved.is_excluded(&t.key)));
    for term in chained {
        let sql = dialect.render(term, &mut binds);
        if !chain.is_empty() {
            chain.push_str(if term.is_or { " OR " } else { " AND " });
        }
        chain.push_str(&sql);
    }

    let text = match (group, chain.is_empty()) {
        (Some(group), false) => format!("{} AND {}", group, chain),
        (Some(group), true) => group,
        (None, _) => chain,
    };

    debug!(dialect = dialect.name(), predicate = %text, binds = binds.len(), "assembled predicate");
    (text, binds.into_values())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Postgres;
    use crate::parser::TermParser;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        let parser = TermParser::new(Arc::new(Postgres::new())).unwrap();
        let mut params = QueryParams::new();
        for (key, value) in pairs {
            let term = parser.parse(key, value).unwrap();
            params.set(term.key.clone(), term);
        }
        params
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn placeholders(sql: &str) -> usize {
        sql.matches('?').count()
    }

    #[test]
    fn test_empty() {
        let (sql, values) = assemble(&Postgres::new(), &QueryParams::new(), &[]);
        assert_eq!(sql, "");
        assert!(values.is_empty());
    }

    #[test]
    fn test_and_chain_in_insertion_order() {
        let p = params(&[("name", "john"), ("age[>]", "30::int")]);
        let (sql, values) = assemble(&Postgres::new(), &p, &[]);
        assert_eq!(sql, r#""name" = ? AND "age" > ?"#);
        assert_eq!(values, vec![Value::from("john"), Value::Int(30)]);
    }

    #[test]
    fn test_null_binds_nothing() {
        let p = params(&[("deleted_at", "null"), ("name[!]", "null")]);
        let (sql, values) = assemble(&Postgres::new(), &p, &[]);
        assert_eq!(sql, r#""deleted_at" IS NULL AND "name" IS NOT NULL"#);
        assert!(values.is_empty());
    }

    #[test]
    fn test_or_override() {
        let p = params(&[("id", "1"), ("name", "a"), ("[|]index", "2")]);
        let (sql, values) = assemble(&Postgres::new(), &p, &[]);
        assert_eq!(sql, r#""id" = ? AND "name" = ? OR "index" = ?"#);
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_wildcard_skips_explicit_keys() {
        let p = params(&[("*[%]", "%jo%"), ("name", "john")]);
        let (sql, values) = assemble(&Postgres::new(), &p, &columns(&["id", "name", "status"]));
        assert_eq!(
            sql,
            r#"("id"::text LIKE ? OR "status"::text LIKE ?) AND "name" = ?"#
        );
        assert_eq!(
            values,
            vec![Value::from("%jo%"), Value::from("%jo%"), Value::from("john")]
        );
    }

    #[test]
    fn test_wildcard_prefers_filter_fields() {
        let mut p = params(&[("*", "x")]);
        p.set_filter(FilterSpec {
            fields: vec!["title".into(), "body".into()],
            ..FilterSpec::default()
        });
        assert!(!p.needs_columns(&ReservedKeys::default()));
        let (sql, _) = assemble(&Postgres::new(), &p, &columns(&["id"]));
        assert_eq!(sql, r#"("title" = ? OR "body" = ?)"#);
    }

    #[test]
    fn test_wildcard_without_columns_renders_nothing() {
        let p = params(&[("*", "x")]);
        assert!(p.needs_columns(&ReservedKeys::default()));
        let (sql, values) = assemble(&Postgres::new(), &p, &[]);
        assert_eq!(sql, "");
        assert!(values.is_empty());
    }

    #[test]
    fn test_id_leads_the_chain() {
        let parser = TermParser::new(Arc::new(Postgres::new())).unwrap();
        let mut p = params(&[("status", "open"), ("*", "x")]);
        p.set_id(parser.parse("id", "7::int").unwrap());
        let (sql, values) = assemble(&Postgres::new(), &p, &columns(&["id", "status"]));
        assert_eq!(sql, r#"("id" = ?) AND "id" = ? AND "status" = ?"#);
        assert_eq!(values, vec![Value::from("x"), Value::Int(7), Value::from("open")]);
    }

    #[test]
    fn test_extra_key_is_excluded() {
        let mut p = params(&[("name", "a")]);
        p.set("+", FilterTerm::verbatim("+", "meta"));
        let (sql, values) = assemble(&Postgres::new(), &p, &[]);
        assert_eq!(sql, r#""name" = ?"#);
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_repeated_keys_are_all_rendered() {
        let p = params(&[("age[>]", "1::int"), ("age[<]", "9::int")]);
        assert_eq!(p.get("age").count(), 2);
        let (sql, _) = assemble(&Postgres::new(), &p, &[]);
        assert_eq!(sql, r#""age" > ? AND "age" < ?"#);
    }

    #[test]
    fn test_placeholder_count_matches_binds() {
        let p = params(&[
            ("*[~*]", "^a"),
            ("name", "[a,b]"),
            ("age[:]", "[1|9]::int"),
            ("tags[any]", "red"),
            ("result[->>]", "type=2"),
            ("deleted", "null"),
        ]);
        let (sql, values) = assemble(&Postgres::new(), &p, &columns(&["id", "email"]));
        assert_eq!(placeholders(&sql), values.len());
    }

    #[test]
    fn test_deterministic() {
        let pairs = [("*", "x"), ("b", "1"), ("a[>]", "2::int"), ("[|]c", "null")];
        let cols = columns(&["a", "b", "c", "d", "e"]);
        let first = assemble(&Postgres::new(), &params(&pairs), &cols);
        for _ in 0..10 {
            assert_eq!(assemble(&Postgres::new(), &params(&pairs), &cols), first);
        }
    }
}

//! Term parser.
//!
//! Turns one raw query pair into a [`FilterTerm`]:
//!
//! ```text
//! [|]created_at[:]=[2024-08-01|2024-08-31]::date
//! ─┬─ ────┬───── ┬  ───────────┬───────── ──┬──
//!  │      │      │             │            └── inline type hint
//!  │      │      │             └── value (array / range / scalar)
//!  │      │      └── operator suffix
//!  │      └── column
//!  └── OR marker
//! ```
//!
//! JSON path operators take a nested `subkey=subvalue` comparison:
//! `result[->>]=status[!]=failed` compares `result ->> 'status'` with `failed`.

use regex::Regex;
use std::sync::Arc;

use crate::ast::{FilterTerm, Operator, Value};
use crate::dialect::Dialect;
use crate::error::{FilterError, FilterResult};

/// Parses query pairs for one dialect.
pub struct TermParser {
    dialect: Arc<dyn Dialect>,
    suffix: Regex,
}

impl TermParser {
    pub fn new(dialect: Arc<dyn Dialect>) -> FilterResult<Self> {
        let suffix = Regex::new(&format!(r"\[({})\]$", dialect.pattern())).map_err(|e| {
            FilterError::Config(format!("invalid operator pattern for {}: {}", dialect.name(), e))
        })?;
        Ok(Self { dialect, suffix })
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    /// Parse a raw `(key, value)` pair into a cast and formatted term.
    pub fn parse(&self, key: &str, value: &str) -> FilterResult<FilterTerm> {
        self.parse_at(key, value, 0)
    }

    fn parse_at(&self, key: &str, value: &str, depth: usize) -> FilterResult<FilterTerm> {
        let (key, is_or) = self.split_or(key.trim());
        let (key, operator) = self.split_operator(key);

        let mut term = FilterTerm::new(key, operator);
        term.is_or = is_or;
        term.raw = value.to_string();

        if operator.is_json_path() {
            match split_path(value).filter(|_| depth == 0) {
                Some((sub_key, sub_value)) => {
                    let mut nested = self.parse_at(sub_key, sub_value, depth + 1)?;
                    nested.quoted = false;
                    nested.is_or = false;
                    term.value = Value::String(nested.key.clone());
                    term.path = Some(Box::new(nested));
                }
                None => term.value = Value::String(value.to_string()),
            }
        } else {
            self.dialect.cast(value, &mut term)?;
        }

        self.dialect.format(term)
    }

    fn split_or<'a>(&self, key: &'a str) -> (&'a str, bool) {
        match key.strip_prefix(self.dialect.reserved().or_prefix.as_str()) {
            Some(rest) => (rest.trim_start(), true),
            None => (key, false),
        }
    }

    /// Strip a recognised `[token]` suffix. Anything else leaves the key
    /// untouched and compares with `=`.
    fn split_operator<'a>(&self, key: &'a str) -> (&'a str, Operator) {
        let Some(caps) = self.suffix.captures(key) else {
            return (key, Operator::Eq);
        };
        let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
            return (key, Operator::Eq);
        };
        match Operator::from_token(token.as_str()) {
            Some(op) => (key[..whole.start()].trim_end(), op),
            None => (key, Operator::Eq),
        }
    }
}

/// `subkey=subvalue` with exactly one `=`.
fn split_path(value: &str) -> Option<(&str, &str)> {
    let (key, rest) = value.split_once('=')?;
    if key.trim().is_empty() || rest.contains('=') {
        return None;
    }
    Some((key, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DataType, Shape};
    use crate::dialect::{MySql, Postgres};
    use pretty_assertions::assert_eq;

    fn parser() -> TermParser {
        TermParser::new(Arc::new(Postgres::new())).unwrap()
    }

    #[test]
    fn test_plain_key_is_eq() {
        let term = parser().parse("  name ", "john").unwrap();
        assert_eq!(term.key, "name");
        assert_eq!(term.operator, Operator::Eq);
        assert_eq!(term.value, Value::from("john"));
        assert!(term.quoted);
        assert!(!term.is_or);
    }

    #[test]
    fn test_suffix_tokens() {
        let p = parser();
        for (key, op) in [
            ("age[>]", Operator::Gt),
            ("age[<]", Operator::Lt),
            ("age[>-]", Operator::Gte),
            ("age[<-]", Operator::Lte),
            ("age[!]", Operator::Neq),
            ("age[<>]", Operator::Neq),
            ("name[%]", Operator::Like),
            ("name[!%]", Operator::NotLike),
            ("name[~]", Operator::Regex),
            ("name[~*]", Operator::IRegex),
            ("name[!~]", Operator::NotRegex),
            ("name[!~*]", Operator::NotIRegex),
            ("name[+]", Operator::Similar),
            ("name[!+]", Operator::NotSimilar),
            ("tags[array]", Operator::ArrayOverlap),
            ("tags[!&&]", Operator::NotArrayOverlap),
            ("tags[some]", Operator::Some),
            ("tags[!all]", Operator::NotAll),
        ] {
            let term = p.parse(key, "x").unwrap();
            assert_eq!(term.operator, op, "{}", key);
            assert_eq!(term.key, key.split('[').next().unwrap());
        }
    }

    #[test]
    fn test_unknown_suffix_keeps_key() {
        let term = parser().parse("name[foo]", "x").unwrap();
        assert_eq!(term.key, "name[foo]");
        assert_eq!(term.operator, Operator::Eq);
    }

    #[test]
    fn test_or_prefix() {
        let term = parser().parse("[|]index[>]", "3").unwrap();
        assert!(term.is_or);
        assert_eq!(term.key, "index");
        assert_eq!(term.operator, Operator::Gt);
    }

    #[test]
    fn test_range_with_type() {
        let term = parser()
            .parse("created_at[:]", "[2024-08-01 00:00:00|2024-08-31 23:59:59]::datetime")
            .unwrap();
        assert_eq!(term.operator, Operator::Between);
        assert_eq!(term.shape(), Shape::Range);
        assert_eq!(term.data_type, Some(DataType::DateTime));
        assert_eq!(term.raw, "[2024-08-01 00:00:00|2024-08-31 23:59:59]::datetime");
    }

    #[test]
    fn test_json_path_nested() {
        let term = parser().parse("result[->>]", "status[!]=failed").unwrap();
        assert_eq!(term.operator, Operator::JsonPathText);
        assert_eq!(term.value, Value::from("status"));
        let nested = term.path.unwrap();
        assert_eq!(nested.key, "status");
        assert_eq!(nested.operator, Operator::Neq);
        assert_eq!(nested.value, Value::from("failed"));
        assert!(!nested.quoted);
    }

    #[test]
    fn test_json_path_rejects_column_operators() {
        let p = parser();
        for (key, value) in [
            ("meta[->>]", "tags[any]=red"),
            ("meta[->]", "tags[!all]=red"),
            ("meta[->]", "a[array]=[x,y]"),
            ("meta[->>]", "a[!&&]=[x,y]"),
        ] {
            let err = p.parse(key, value).unwrap_err();
            assert!(
                matches!(err, FilterError::Unsupported { dialect: "postgres", .. }),
                "{}={}",
                key,
                value
            );
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_brackets_stay_text_for_single_value_operators() {
        let p = parser();
        let term = p.parse("name[%]", "[abc]").unwrap();
        assert_eq!(term.operator, Operator::Like);
        assert_eq!(term.value, Value::from("[abc]"));

        assert!(matches!(
            p.parse("age[>]", "[1,2]::int"),
            Err(FilterError::Cast { .. })
        ));
    }

    #[test]
    fn test_json_path_without_comparison() {
        let term = parser().parse("result[->]", "a=b=c").unwrap();
        assert!(term.path.is_none());
        assert_eq!(term.value, Value::from("a=b=c"));
    }

    #[test]
    fn test_cast_error_propagates() {
        assert!(matches!(
            parser().parse("id", "abc::int"),
            Err(FilterError::Cast { .. })
        ));
        assert!(matches!(
            parser().parse("id", "1::uuid"),
            Err(FilterError::UnknownType(_))
        ));
    }

    #[test]
    fn test_mysql_rejects_similar() {
        let p = TermParser::new(Arc::new(MySql::new())).unwrap();
        assert!(matches!(
            p.parse("name[+]", "x"),
            Err(FilterError::Unsupported { .. })
        ));
    }
}

use super::{check_nested, normalize_shape, Dialect, ReservedKeys};
use crate::ast::{FilterTerm, Operator};
use crate::error::{FilterError, FilterResult};

const PATTERN: &str =
    r"->>|->|>-|<-|<>|!~\*|~\*|!~|~|!%|%|!\+|\+|!&&|&&|!array|array|!any|any|!some|some|!all|all|!|>|<|:";

/// MySQL has no row count meaning "all rows", so an offset without a limit
/// uses the largest value it accepts.
const MAX_ROWS: u64 = u64::MAX;

/// MySQL / MariaDB dialect.
///
/// Recognises the same suffixes as Postgres so that unsupported operators fail
/// loudly instead of being read as part of the column name.
#[derive(Debug, Clone, Default)]
pub struct MySql {
    reserved: ReservedKeys,
}

impl MySql {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reserved(mut self, reserved: ReservedKeys) -> Self {
        self.reserved = reserved;
        self
    }

    fn supports(op: Operator) -> bool {
        !(op.is_overlap()
            || op.is_quantified()
            || matches!(
                op,
                Operator::Similar | Operator::NotSimilar | Operator::IRegex | Operator::NotIRegex
            ))
    }
}

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn reserved(&self) -> &ReservedKeys {
        &self.reserved
    }

    fn pattern(&self) -> &str {
        PATTERN
    }

    fn format(&self, mut term: FilterTerm) -> FilterResult<FilterTerm> {
        if !Self::supports(term.operator) {
            return Err(FilterError::Unsupported {
                dialect: self.name(),
                operator: term.operator.to_string(),
            });
        }
        normalize_shape(&mut term);
        if let Some(nested) = term.path.take() {
            check_nested(self, &nested)?;
            term.path = Some(Box::new(self.format(*nested)?));
        }
        Ok(term)
    }

    fn quote_identifier(&self, name: &str) -> String {
        name.split('.')
            .map(|part| format!("`{}`", part.replace('`', "``")))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn operator_sql(&self, op: Operator) -> &'static str {
        match op {
            Operator::Regex => "REGEXP",
            Operator::NotRegex => "NOT REGEXP",
            other => other.sql(),
        }
    }

    fn json_path(&self, column: &str, op: Operator, key: &str) -> String {
        let extract = format!("JSON_EXTRACT({}, CONCAT('$.', {}))", column, key);
        match op {
            Operator::JsonPathText => format!("JSON_UNQUOTE({})", extract),
            _ => extract,
        }
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(n), Some(m)) => format!(" LIMIT {} OFFSET {}", n, m),
            (Some(n), None) => format!(" LIMIT {}", n),
            (None, Some(m)) => format!(" LIMIT {} OFFSET {}", MAX_ROWS, m),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Value;
    use crate::dialect::Binds;
    use pretty_assertions::assert_eq;

    fn render(token: &str, key: &str, operator: Operator) -> FilterResult<(String, Vec<Value>)> {
        let my = MySql::new();
        let mut term = FilterTerm::new(key, operator);
        my.cast(token, &mut term)?;
        let term = my.format(term)?;
        let mut binds = Binds::new();
        let sql = my.render(&term, &mut binds);
        Ok((sql, binds.into_values()))
    }

    #[test]
    fn test_backtick_quoting() {
        let (sql, values) = render("5::int", "id", Operator::Eq).unwrap();
        assert_eq!(sql, "`id` = ?");
        assert_eq!(values, vec![Value::Int(5)]);
        assert_eq!(MySql::new().quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_regexp() {
        let (sql, _) = render("^jo", "name", Operator::Regex).unwrap();
        assert_eq!(sql, "`name` REGEXP ?");
        let (sql, _) = render("^jo", "name", Operator::NotRegex).unwrap();
        assert_eq!(sql, "`name` NOT REGEXP ?");
    }

    #[test]
    fn test_in_and_between() {
        let (sql, _) = render("[a,b]", "name", Operator::Eq).unwrap();
        assert_eq!(sql, "`name` IN (?)");
        let (sql, values) = render("[1|9]::int", "age", Operator::Between).unwrap();
        assert_eq!(sql, "`age` BETWEEN ? AND ?");
        assert_eq!(values, vec![Value::Int(1), Value::Int(9)]);
    }

    #[test]
    fn test_colon_is_not_a_range_delimiter() {
        let (sql, values) = render("[1:9]", "age", Operator::Between).unwrap();
        assert_eq!(sql, "`age` IN (?)");
        assert_eq!(values, vec![Value::from(vec!["1:9"])]);
    }

    #[test]
    fn test_unsupported_operators() {
        for op in [
            Operator::Similar,
            Operator::IRegex,
            Operator::ArrayOverlap,
            Operator::NotAll,
        ] {
            let err = render("x", "name", op).unwrap_err();
            assert!(matches!(err, FilterError::Unsupported { dialect: "mysql", .. }));
        }
    }

    #[test]
    fn test_limit_offset() {
        let my = MySql::new();
        assert_eq!(my.limit_offset(Some(5), None), " LIMIT 5");
        assert_eq!(
            my.limit_offset(None, Some(20)),
            " LIMIT 18446744073709551615 OFFSET 20"
        );
    }
}

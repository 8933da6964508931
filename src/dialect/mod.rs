//! SQL dialects.
//!
//! A [`Dialect`] decides which operator suffixes are recognised, how literal
//! values are cast, and how a parsed term renders into SQL for one backend.
//! Adding a backend means implementing the trait; the term parser and the
//! assembly algorithm stay untouched.

mod mysql;
mod postgres;

pub use mysql::MySql;
pub use postgres::Postgres;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ast::{DataType, FilterTerm, Operator, Shape, Value};
use crate::cast;
use crate::error::{FilterError, FilterResult};
use crate::query::{self, QueryParams};

/// Sentinel keys of the query-string grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservedKeys {
    /// Key prefix that joins a term with OR (`[|]name=x`)
    pub or_prefix: String,
    /// Key that applies its condition to every unconstrained column
    pub wildcard: String,
    /// Key carrying out-of-band metadata, never part of the predicate
    pub extra: String,
    /// Query parameter holding the JSON filter document
    pub filter: String,
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Self {
            or_prefix: "[|]".to_string(),
            wildcard: "*".to_string(),
            extra: "+".to_string(),
            filter: "~".to_string(),
        }
    }
}

impl ReservedKeys {
    /// Keys that never reach the assembled chain.
    pub fn is_excluded(&self, key: &str) -> bool {
        key == self.wildcard || key == self.extra
    }

    pub fn validate(&self) -> FilterResult<()> {
        let keys = [&self.or_prefix, &self.wildcard, &self.extra, &self.filter];
        if keys.iter().any(|k| k.trim().is_empty()) {
            return Err(FilterError::Config("reserved keys must not be empty".into()));
        }
        for (i, a) in keys.iter().enumerate() {
            if keys[i + 1..].contains(a) {
                return Err(FilterError::Config(format!("reserved key '{}' is used twice", a)));
            }
        }
        Ok(())
    }
}

/// Bind placeholder style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placeholder {
    /// `?` for every value; array binds are expanded by the driver
    #[default]
    Question,
    /// `$1`, `$2`, ...; array binds are native arrays
    Dollar,
}

/// Supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Postgres,
    MySql,
}

impl DialectKind {
    pub fn build(
        &self,
        reserved: ReservedKeys,
        placeholder: Placeholder,
    ) -> FilterResult<Arc<dyn Dialect>> {
        reserved.validate()?;
        match self {
            DialectKind::Postgres => Ok(Arc::new(
                Postgres::new()
                    .with_reserved(reserved)
                    .with_placeholder(placeholder),
            )),
            DialectKind::MySql => {
                if placeholder != Placeholder::Question {
                    return Err(FilterError::Config(
                        "the mysql dialect only supports '?' placeholders".into(),
                    ));
                }
                Ok(Arc::new(MySql::new().with_reserved(reserved)))
            }
        }
    }
}

impl std::str::FromStr for DialectKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            other => Err(FilterError::Config(format!("unknown dialect '{}'", other))),
        }
    }
}

/// Ordered bind values collected while rendering.
#[derive(Debug, Default)]
pub struct Binds {
    values: Vec<Value>,
}

impl Binds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value and return the placeholder for it.
    pub fn push<D: Dialect + ?Sized>(&mut self, value: Value, dialect: &D) -> String {
        self.values.push(value);
        dialect.placeholder(self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Dialect-specific parsing and rendering.
pub trait Dialect: Send + Sync {
    /// Name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Sentinel keys this dialect instance was configured with.
    fn reserved(&self) -> &ReservedKeys;

    /// Regex alternation of the operator tokens accepted inside `key[...]`.
    fn pattern(&self) -> &str;

    /// Characters separating the endpoints of a `[from|to]` range.
    fn range_delimiters(&self) -> &[char] {
        &['|']
    }

    /// Cast `token` into `term.value`, honouring an inline `::type` suffix.
    fn cast(&self, token: &str, term: &mut FilterTerm) -> FilterResult<()> {
        let (token, hint) = cast::split_type_hint(token)?;
        apply_cast(token, hint, term, self.range_delimiters())
    }

    /// Rewrite the operator and annotations from the value's shape.
    /// Must be idempotent.
    fn format(&self, term: FilterTerm) -> FilterResult<FilterTerm>;

    /// Assemble the predicate and its bind values.
    fn query(&self, params: &QueryParams, columns: &[String]) -> (String, Vec<Value>) {
        query::assemble(self, params, columns)
    }

    /// Quote an identifier (column name).
    fn quote_identifier(&self, name: &str) -> String;

    /// Placeholder for the 1-based bind index.
    fn placeholder(&self, index: usize) -> String;

    /// Concrete SQL token of a comparison operator.
    fn operator_sql(&self, op: Operator) -> &'static str {
        op.sql()
    }

    /// `lhs IN (value)`
    fn in_array(&self, lhs: &str, value: &str) -> String {
        format!("{} IN ({})", lhs, value)
    }

    /// `lhs NOT IN (value)`
    fn not_in_array(&self, lhs: &str, value: &str) -> String {
        format!("{} NOT IN ({})", lhs, value)
    }

    /// Array overlap of a column with a bound array.
    fn array_overlap(&self, column: &str, value: &str, cast: Option<&str>) -> String {
        format!("{} && ARRAY[{}]{}", column, value, cast.unwrap_or(""))
    }

    /// JSON field lookup on `column` with a bound `key`.
    fn json_path(&self, column: &str, op: Operator, key: &str) -> String {
        format!("{} {} {}", column, op.sql(), key)
    }

    /// Render one formatted term, pushing its binds.
    fn render(&self, term: &FilterTerm, binds: &mut Binds) -> String {
        render_term(self, term, binds)
    }

    /// Pagination suffix.
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = String::new();
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }
        sql
    }
}

/// Store the cast value and the effective type on the term.
pub(crate) fn apply_cast(
    token: &str,
    hint: Option<DataType>,
    term: &mut FilterTerm,
    range_delimiters: &[char],
) -> FilterResult<()> {
    if hint.is_some() {
        term.data_type = hint;
    }
    term.value = cast::cast(token, term.data_type, term.operator, range_delimiters)?;
    Ok(())
}

/// Operator rewrites shared by all dialects.
///
/// eq/neq with an array become IN/NOT IN, eq with a range becomes BETWEEN,
/// and operators whose value lost its expected shape fall back to plain
/// comparisons.
pub(crate) fn normalize_shape(term: &mut FilterTerm) {
    term.operator = match (term.operator, term.shape()) {
        (Operator::Eq, Shape::Array) => Operator::In,
        (Operator::Neq, Shape::Array) => Operator::NotIn,
        (Operator::Eq, Shape::Range) => Operator::Between,
        (Operator::Between, Shape::Array) => Operator::In,
        (Operator::Between, Shape::Scalar | Shape::Null) => Operator::Eq,
        (Operator::In, Shape::Scalar | Shape::Null) => Operator::Eq,
        (Operator::NotIn, Shape::Scalar | Shape::Null) => Operator::Neq,
        (op, _) => op,
    };
    if term.operator.is_overlap() && term.shape() == Shape::Scalar {
        let value = std::mem::replace(&mut term.value, Value::Null);
        term.value = Value::Array(vec![value]);
    }
}

/// A JSON path comparison puts the lookup on the left of a single-value
/// operator. Quantified and overlap operators need the column itself.
pub(crate) fn check_nested<D: Dialect + ?Sized>(dialect: &D, nested: &FilterTerm) -> FilterResult<()> {
    if nested.operator.is_quantified() || nested.operator.is_overlap() {
        return Err(FilterError::Unsupported {
            dialect: dialect.name(),
            operator: format!("{} inside a json path", nested.operator),
        });
    }
    Ok(())
}

/// Render a term the way every dialect does unless it overrides [`Dialect::render`].
pub fn render_term<D: Dialect + ?Sized>(dialect: &D, term: &FilterTerm, binds: &mut Binds) -> String {
    let column = if term.quoted {
        dialect.quote_identifier(&term.key)
    } else {
        term.key.clone()
    };

    match term.operator {
        op if op.is_json_path() => {
            let key = binds.push(term.value.clone(), dialect);
            let lhs = dialect.json_path(&column, op, &key);
            match &term.path {
                Some(nested) => {
                    let lhs = match nested.key_cast {
                        Some(cast) => format!("({}){}", lhs, cast),
                        None => lhs,
                    };
                    render_comparison(dialect, &lhs, nested, binds)
                }
                None => lhs,
            }
        }
        op if op.is_quantified() => {
            let value = binds.push(term.value.clone(), dialect);
            let cmp = if op.is_negated_quantifier() { "!=" } else { "=" };
            format!("{} {} {}({})", value, cmp, dialect.operator_sql(op), column)
        }
        op if op.is_overlap() => {
            let value = binds.push(term.value.clone(), dialect);
            let sql = dialect.array_overlap(&column, &value, term.value_cast);
            if op == Operator::NotArrayOverlap {
                format!("NOT {}", sql)
            } else {
                sql
            }
        }
        _ => {
            let lhs = match term.key_cast {
                Some(cast) => format!("{}{}", column, cast),
                None => column,
            };
            render_comparison(dialect, &lhs, term, binds)
        }
    }
}

fn render_comparison<D: Dialect + ?Sized>(
    dialect: &D,
    lhs: &str,
    term: &FilterTerm,
    binds: &mut Binds,
) -> String {
    match (term.operator, &term.value) {
        (Operator::Eq, Value::Null) => format!("{} IS NULL", lhs),
        (Operator::Neq, Value::Null) => format!("{} IS NOT NULL", lhs),
        (Operator::In, value) => {
            let value = binds.push(value.clone(), dialect);
            dialect.in_array(lhs, &value)
        }
        (Operator::NotIn, value) => {
            let value = binds.push(value.clone(), dialect);
            dialect.not_in_array(lhs, &value)
        }
        (Operator::Between, Value::Range(from, to)) => {
            let from = binds.push((**from).clone(), dialect);
            let to = binds.push((**to).clone(), dialect);
            format!("{} BETWEEN {} AND {}", lhs, from, to)
        }
        (op, value) => {
            let value = binds.push(value.clone(), dialect);
            format!(
                "{} {} {}{}",
                lhs,
                dialect.operator_sql(op),
                value,
                term.value_cast.unwrap_or("")
            )
        }
    }
}

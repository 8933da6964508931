//! Filter terms and their typed values.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::FilterError;

/// Logical filter operators.
///
/// Most operators are selected by a bracketed suffix on the query key
/// (`name[!]`, `age[>-]`); `In` and `NotIn` are only produced by a dialect's
/// `format` step when an equality meets an array value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Equal (=), the default when the key carries no suffix
    Eq,
    /// Not equal (`[!]`, `[<>]`)
    Neq,
    /// Greater than (`[>]`)
    Gt,
    /// Less than (`[<]`)
    Lt,
    /// Greater than or equal (`[>-]`)
    Gte,
    /// Less than or equal (`[<-]`)
    Lte,
    /// LIKE (`[%]`)
    Like,
    /// NOT LIKE (`[!%]`)
    NotLike,
    /// SIMILAR TO (`[+]`)
    Similar,
    /// NOT SIMILAR TO (`[!+]`)
    NotSimilar,
    /// Regex match (`[~]`)
    Regex,
    /// Case-insensitive regex match (`[~*]`)
    IRegex,
    /// Regex mismatch (`[!~]`)
    NotRegex,
    /// Case-insensitive regex mismatch (`[!~*]`)
    NotIRegex,
    /// BETWEEN a range (`[:]`)
    Between,
    /// IN array
    In,
    /// NOT IN array
    NotIn,
    /// Array overlap (`[array]`, `[&&]`)
    ArrayOverlap,
    /// Negated array overlap (`[!array]`, `[!&&]`)
    NotArrayOverlap,
    /// JSON path lookup (`[->]`)
    JsonPath,
    /// JSON path lookup as text (`[->>]`)
    JsonPathText,
    /// `value = ANY(column)`
    Any,
    /// `value = SOME(column)`
    Some,
    /// `value = ALL(column)`
    All,
    /// `value != ANY(column)`
    NotAny,
    /// `value != SOME(column)`
    NotSome,
    /// `value != ALL(column)`
    NotAll,
}

impl Operator {
    /// Map a key suffix token to its operator.
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "!" | "<>" => Self::Neq,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">-" => Self::Gte,
            "<-" => Self::Lte,
            "%" => Self::Like,
            "!%" => Self::NotLike,
            "+" => Self::Similar,
            "!+" => Self::NotSimilar,
            "~" => Self::Regex,
            "~*" => Self::IRegex,
            "!~" => Self::NotRegex,
            "!~*" => Self::NotIRegex,
            ":" => Self::Between,
            "->" => Self::JsonPath,
            "->>" => Self::JsonPathText,
            "array" | "&&" => Self::ArrayOverlap,
            "!array" | "!&&" => Self::NotArrayOverlap,
            "any" => Self::Any,
            "some" => Self::Some,
            "all" => Self::All,
            "!any" => Self::NotAny,
            "!some" => Self::NotSome,
            "!all" => Self::NotAll,
            _ => return None,
        };
        Some(op)
    }

    /// The canonical suffix token, if the operator has one.
    pub fn token(&self) -> Option<&'static str> {
        let token = match self {
            Self::Eq | Self::In | Self::NotIn => return None,
            Self::Neq => "!",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">-",
            Self::Lte => "<-",
            Self::Like => "%",
            Self::NotLike => "!%",
            Self::Similar => "+",
            Self::NotSimilar => "!+",
            Self::Regex => "~",
            Self::IRegex => "~*",
            Self::NotRegex => "!~",
            Self::NotIRegex => "!~*",
            Self::Between => ":",
            Self::ArrayOverlap => "&&",
            Self::NotArrayOverlap => "!&&",
            Self::JsonPath => "->",
            Self::JsonPathText => "->>",
            Self::Any => "any",
            Self::Some => "some",
            Self::All => "all",
            Self::NotAny => "!any",
            Self::NotSome => "!some",
            Self::NotAll => "!all",
        };
        Some(token)
    }

    /// ANSI rendering of the comparison operators. Operators with a
    /// structural rendering (IN, BETWEEN, overlap, quantified, JSON path)
    /// return their keyword only.
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Similar => "SIMILAR TO",
            Self::NotSimilar => "NOT SIMILAR TO",
            Self::Regex => "~",
            Self::IRegex => "~*",
            Self::NotRegex => "!~",
            Self::NotIRegex => "!~*",
            Self::Between => "BETWEEN",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::ArrayOverlap | Self::NotArrayOverlap => "&&",
            Self::JsonPath => "->",
            Self::JsonPathText => "->>",
            Self::Any | Self::NotAny => "ANY",
            Self::Some | Self::NotSome => "SOME",
            Self::All | Self::NotAll => "ALL",
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Between)
    }

    pub fn is_json_path(&self) -> bool {
        matches!(self, Self::JsonPath | Self::JsonPathText)
    }

    pub fn is_overlap(&self) -> bool {
        matches!(self, Self::ArrayOverlap | Self::NotArrayOverlap)
    }

    /// Operators that take a `[a,b]` list. Everything else compares a single
    /// value and reads the brackets as text.
    pub fn accepts_array(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Neq | Self::In | Self::NotIn | Self::Between
        ) || self.is_overlap()
    }

    pub fn is_quantified(&self) -> bool {
        matches!(
            self,
            Self::Any | Self::Some | Self::All | Self::NotAny | Self::NotSome | Self::NotAll
        )
    }

    /// Quantified operators that compare with `!=` instead of `=`.
    pub fn is_negated_quantifier(&self) -> bool {
        matches!(self, Self::NotAny | Self::NotSome | Self::NotAll)
    }

    /// Pattern operators that compare the column as text.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::Like
                | Self::NotLike
                | Self::Similar
                | Self::NotSimilar
                | Self::Regex
                | Self::IRegex
                | Self::NotRegex
                | Self::NotIRegex
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::NotLike => "notlike",
            Self::Similar => "similar",
            Self::NotSimilar => "notsimilar",
            Self::Regex => "regex",
            Self::IRegex => "iregex",
            Self::NotRegex => "notregex",
            Self::NotIRegex => "notiregex",
            Self::Between => "between",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::ArrayOverlap => "arrayoverlap",
            Self::NotArrayOverlap => "notarrayoverlap",
            Self::JsonPath => "jsonpath",
            Self::JsonPathText => "jsonpathtext",
            Self::Any => "any",
            Self::Some => "some",
            Self::All => "all",
            Self::NotAny => "notany",
            Self::NotSome => "notsome",
            Self::NotAll => "notall",
        };
        f.write_str(name)
    }
}

/// Explicit type hints accepted in `value::type` suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Int,
    Int64,
    Float,
    Float64,
    Uint,
    Uint64,
    Date,
    Time,
    DateTime,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Float64 => "float64",
            Self::Uint => "uint",
            Self::Uint64 => "uint64",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
        }
    }
}

impl FromStr for DataType {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "int" => Ok(Self::Int),
            "int64" => Ok(Self::Int64),
            "float" => Ok(Self::Float),
            "float64" => Ok(Self::Float64),
            "uint" => Ok(Self::Uint),
            "uint64" => Ok(Self::Uint64),
            "date" => Ok(Self::Date),
            "time" => Ok(Self::Time),
            "datetime" => Ok(Self::DateTime),
            other => Err(FilterError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a term's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Scalar,
    Array,
    Range,
    Null,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scalar => "scalar",
            Self::Array => "array",
            Self::Range => "range",
            Self::Null => "null",
        };
        f.write_str(name)
    }
}

/// A typed bind value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// Untyped or `string` value
    String(String),
    /// 32-bit integer (`int`)
    Int(i32),
    /// 64-bit integer (`int64`)
    Int64(i64),
    /// 32-bit float (`float`); the parse is lossy
    Float(f32),
    /// 64-bit float (`float64`)
    Float64(f64),
    /// Unsigned integer (`uint`, `uint64`)
    Uint(u64),
    /// Calendar date (`YYYY-MM-DD`)
    Date(NaiveDate),
    /// Time of day (`HH:MM:SS`)
    Time(NaiveTime),
    /// Date and time (`YYYY-MM-DD HH:MM:SS`)
    DateTime(NaiveDateTime),
    /// Ordered list of scalars
    Array(Vec<Value>),
    /// Inclusive `(from, to)` interval
    Range(Box<Value>, Box<Value>),
}

impl Value {
    pub fn shape(&self) -> Shape {
        match self {
            Self::Null => Shape::Null,
            Self::Array(_) => Shape::Array,
            Self::Range(..) => Shape::Range,
            _ => Shape::Scalar,
        }
    }

    /// Widen a numeric value to `f64`. A `float` value keeps the precision it
    /// lost when it was parsed as 32 bits.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(f64::from(*n)),
            Self::Int64(n) => Some(*n as f64),
            Self::Float(n) => Some(f64::from(*n)),
            Self::Float64(n) => Some(*n),
            Self::Uint(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::Uint(n) => write!(f, "{}", n),
            Value::Date(d) => write!(f, "'{}'", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "'{}'", t.format("%H:%M:%S")),
            Value::DateTime(dt) => write!(f, "'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Range(from, to) => write!(f, "{} .. {}", from, to),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float64(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

/// One parsed filter condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterTerm {
    /// Column name with the operator suffix and OR marker stripped
    pub key: String,
    pub operator: Operator,
    /// Raw token as received, before casting
    pub raw: String,
    pub value: Value,
    /// Type hint taken from a `::type` suffix
    pub data_type: Option<DataType>,
    /// Render the key as a quoted identifier
    pub quoted: bool,
    /// Join with OR instead of AND
    pub is_or: bool,
    /// Nested comparison of a JSON path term (`result[->>]=type=2`)
    pub path: Option<Box<FilterTerm>>,
    /// Cast appended to the column (`::text`)
    pub key_cast: Option<&'static str>,
    /// Cast appended to the bind placeholder (`::int[]`)
    pub value_cast: Option<&'static str>,
}

impl FilterTerm {
    /// A term on `key` with no value yet.
    pub fn new(key: impl Into<String>, operator: Operator) -> Self {
        Self {
            key: key.into(),
            operator,
            raw: String::new(),
            value: Value::Null,
            data_type: None,
            quoted: true,
            is_or: false,
            path: None,
            key_cast: None,
            value_cast: None,
        }
    }

    /// A term holding `raw` verbatim as a string, with no casting applied.
    pub fn verbatim(key: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            value: Value::String(raw.clone()),
            raw,
            ..Self::new(key, Operator::Eq)
        }
    }

    pub fn shape(&self) -> Shape {
        self.value.shape()
    }

    /// Copy of this term bound to another column.
    pub fn rebind(&self, key: &str) -> Self {
        Self {
            key: key.to_string(),
            quoted: true,
            ..self.clone()
        }
    }
}

impl fmt::Display for FilterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.operator, self.value)?;
        if let Some(dt) = self.data_type {
            write!(f, "::{}", dt)?;
        }
        if let Some(path) = &self.path {
            write!(f, " ({})", path)?;
        }
        Ok(())
    }
}

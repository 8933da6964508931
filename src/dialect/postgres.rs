use std::borrow::Cow;

use super::{apply_cast, check_nested, normalize_shape, Dialect, Placeholder, ReservedKeys};
use crate::ast::{DataType, FilterTerm, Operator};
use crate::cast::split_type_hint;
use crate::error::FilterResult;

const PATTERN: &str =
    r"->>|->|>-|<-|<>|!~\*|~\*|!~|~|!%|%|!\+|\+|!&&|&&|!array|array|!any|any|!some|some|!all|all|!|>|<|:";

/// PostgreSQL dialect, the default.
///
/// Identifiers are double-quoted, pattern operators compare the column as
/// `::text`, and array overlap uses `&&`. With `?` placeholders an array bind
/// renders as `IN (?)` / `ARRAY[?]` and is expanded by the driver; with `$n`
/// placeholders it is bound as a native array (`= ANY($1)`, `&& $1::text[]`).
#[derive(Debug, Clone, Default)]
pub struct Postgres {
    reserved: ReservedKeys,
    placeholder: Placeholder,
}

impl Postgres {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reserved(mut self, reserved: ReservedKeys) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn with_placeholder(mut self, placeholder: Placeholder) -> Self {
        self.placeholder = placeholder;
        self
    }
}

/// Array cast for a bound overlap value.
fn array_cast(data_type: DataType) -> &'static str {
    match data_type {
        DataType::String => "::text[]",
        DataType::Int => "::int[]",
        DataType::Int64 => "::bigint[]",
        DataType::Uint | DataType::Uint64 => "::numeric[]",
        DataType::Float => "::real[]",
        DataType::Float64 => "::double precision[]",
        DataType::Date => "::date[]",
        DataType::Time => "::time[]",
        DataType::DateTime => "::timestamp[]",
    }
}

/// Contents of a native array literal `{a,b,c}`.
fn native_array(token: &str) -> Option<&str> {
    token
        .strip_prefix('{')?
        .strip_suffix('}')
        .filter(|inner| !inner.is_empty())
}

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn reserved(&self) -> &ReservedKeys {
        &self.reserved
    }

    fn pattern(&self) -> &str {
        PATTERN
    }

    fn range_delimiters(&self) -> &[char] {
        &['|', ':']
    }

    fn cast(&self, token: &str, term: &mut FilterTerm) -> FilterResult<()> {
        let (token, hint) = split_type_hint(token)?;
        let token = match native_array(token) {
            Some(inner) if term.operator.accepts_array() => Cow::Owned(format!("[{}]", inner)),
            _ => Cow::Borrowed(token),
        };
        apply_cast(&token, hint, term, self.range_delimiters())
    }

    fn format(&self, mut term: FilterTerm) -> FilterResult<FilterTerm> {
        normalize_shape(&mut term);

        if term.operator.is_textual() {
            term.key_cast = Some("::text");
        }
        if term.operator.is_overlap() {
            term.value_cast = match (term.data_type, self.placeholder) {
                (Some(data_type), _) => Some(array_cast(data_type)),
                (None, Placeholder::Dollar) => Some("::text[]"),
                (None, Placeholder::Question) => None,
            };
        }
        if let Some(nested) = term.path.take() {
            check_nested(self, &nested)?;
            let mut nested = self.format(*nested)?;
            // ->> already yields text
            if term.operator == Operator::JsonPathText {
                nested.key_cast = None;
            }
            term.path = Some(Box::new(nested));
        }
        Ok(term)
    }

    fn quote_identifier(&self, name: &str) -> String {
        name.split('.')
            .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn placeholder(&self, index: usize) -> String {
        match self.placeholder {
            Placeholder::Question => "?".to_string(),
            Placeholder::Dollar => format!("${}", index),
        }
    }

    fn in_array(&self, lhs: &str, value: &str) -> String {
        match self.placeholder {
            Placeholder::Question => format!("{} IN ({})", lhs, value),
            Placeholder::Dollar => format!("{} = ANY({})", lhs, value),
        }
    }

    fn not_in_array(&self, lhs: &str, value: &str) -> String {
        match self.placeholder {
            Placeholder::Question => format!("{} NOT IN ({})", lhs, value),
            Placeholder::Dollar => format!("{} != ALL({})", lhs, value),
        }
    }

    fn array_overlap(&self, column: &str, value: &str, cast: Option<&str>) -> String {
        match self.placeholder {
            Placeholder::Question => format!("{} && ARRAY[{}]{}", column, value, cast.unwrap_or("")),
            Placeholder::Dollar => format!("{} && {}{}", column, value, cast.unwrap_or("")),
        }
    }
}

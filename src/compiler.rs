//! Request-level entry point.
//!
//! A [`Compiler`] is built once per dialect and shared across requests. Per
//! request it parses the raw query pairs into [`QueryParams`], then assembles
//! them into a [`Predicate`].

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::ast::{FilterTerm, Value};
use crate::config::CompilerConfig;
use crate::dialect::Dialect;
use crate::error::FilterResult;
use crate::filter::FilterSpec;
use crate::parser::TermParser;
use crate::query::QueryParams;
use crate::schema::ColumnSource;

/// A parameterized predicate ready to be placed after `WHERE`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub text: String,
    pub values: Vec<Value>,
    pub filter: Option<FilterSpec>,
}

impl Predicate {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// ` WHERE <text>`, or nothing for an empty predicate.
    pub fn where_clause(&self) -> String {
        if self.text.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.text)
        }
    }
}

/// Compiles query parameters into predicates for one dialect.
pub struct Compiler {
    parser: TermParser,
    id_field: String,
}

impl Compiler {
    pub fn new(dialect: Arc<dyn Dialect>) -> FilterResult<Self> {
        Ok(Self {
            parser: TermParser::new(dialect)?,
            id_field: "id".to_string(),
        })
    }

    pub fn from_config(config: &CompilerConfig) -> FilterResult<Self> {
        Ok(Self::new(config.dialect()?)?.with_id_field(config.id_field.clone()))
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.parser.dialect().as_ref()
    }

    /// Parse a single pair.
    pub fn parse(&self, key: &str, value: &str) -> FilterResult<FilterTerm> {
        self.parser.parse(key, value)
    }

    /// Parse raw query pairs, the optional identifier and the optional request
    /// body into request parameters.
    ///
    /// A filter document passed in the filter query parameter wins over the
    /// body. Blank keys are skipped; the extra key is stored uncast.
    pub fn collect<I, K, V>(
        &self,
        pairs: I,
        id: Option<&str>,
        body: Option<&[u8]>,
    ) -> FilterResult<QueryParams>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let reserved = self.dialect().reserved();
        let mut params = QueryParams::new();
        let mut filter_param = None;

        for (key, value) in pairs {
            let (key, value) = (key.as_ref().trim(), value.as_ref());
            if key.is_empty() {
                continue;
            }
            if key == reserved.filter {
                filter_param = Some(value.to_string());
                continue;
            }
            if key == reserved.extra {
                params.set(key, FilterTerm::verbatim(key, value));
                continue;
            }
            let term = self.parser.parse(key, value)?;
            debug!(
                key = %term.key,
                operator = %term.operator,
                shape = %term.shape(),
                or = term.is_or,
                "parsed term"
            );
            params.set(term.key.clone(), term);
        }

        if let Some(id) = id {
            params.set_id(self.parser.parse(&self.id_field, id)?);
        }

        let filter = match (filter_param, body) {
            (Some(doc), _) => Some(FilterSpec::from_slice(doc.as_bytes())?),
            (None, Some(body)) => Some(FilterSpec::from_slice(body)?),
            (None, None) => None,
        };
        if let Some(filter) = filter {
            params.set_filter(filter);
        }

        Ok(params)
    }

    /// Assemble collected parameters. The column source is only asked when a
    /// wildcard needs it.
    pub fn assemble<C: ColumnSource + ?Sized>(
        &self,
        params: &QueryParams,
        columns: &C,
        table: &str,
    ) -> FilterResult<Predicate> {
        let known = if params.needs_columns(self.dialect().reserved()) {
            columns.columns(table)?
        } else {
            Vec::new()
        };
        let (text, values) = self.dialect().query(params, &known);
        Ok(Predicate {
            text,
            values,
            filter: params.filter().cloned(),
        })
    }

    /// Parse and assemble in one step.
    pub fn build_predicate<I, K, V, C>(
        &self,
        pairs: I,
        id: Option<&str>,
        body: Option<&[u8]>,
        columns: &C,
        table: &str,
    ) -> FilterResult<Predicate>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
        C: ColumnSource + ?Sized,
    {
        let params = self.collect(pairs, id, body)?;
        self.assemble(&params, columns, table)
    }
}

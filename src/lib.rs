//! # crud-filter
//!
//! Turns HTTP query-string parameters into a parameterized SQL predicate and
//! an ordered list of typed bind values. Values never reach the SQL text.
//!
//! ## Quick Example
//!
//! ```
//! let predicate = crud_filter::compile("name[%]=jo%25&age[>-]=18::int").unwrap();
//! assert_eq!(predicate.text, r#""name"::text LIKE ? AND "age" >= ?"#);
//! assert_eq!(predicate.values.len(), 2);
//! ```
//!
//! ## Grammar
//!
//! | Key suffix          | Operator            | Example                          |
//! |---------------------|---------------------|----------------------------------|
//! | (none)              | `=`, `IN`, `IS NULL`| `status=[open,closed]`           |
//! | `[!]` `[<>]`        | `!=`, `NOT IN`      | `deleted_at[!]=null`             |
//! | `[>]` `[<]`         | `>` `<`             | `age[>]=18::int`                 |
//! | `[>-]` `[<-]`       | `>=` `<=`           | `price[<-]=9.5::float64`         |
//! | `[:]`               | `BETWEEN`           | `created_at[:]=[2024-01-01\|2024-12-31]::date` |
//! | `[%]` `[!%]`        | `LIKE`              | `email[%]=%@example.com`         |
//! | `[+]` `[!+]`        | `SIMILAR TO`        | `code[+]=%(a\|b)%`               |
//! | `[~]` `[~*]` `[!~]` `[!~*]` | regex       | `name[~*]=^jo`                   |
//! | `[array]` `[&&]` `[!array]` `[!&&]` | array overlap | `tags[&&]=[red,blue]`   |
//! | `[any]` `[some]` `[all]` `[!any]` ... | quantified | `tags[any]=red`          |
//! | `[->]` `[->>]`      | JSON path           | `meta[->>]=kind=invoice`         |
//!
//! | Reserved | Meaning                                              |
//! |----------|------------------------------------------------------|
//! | `[\|]`   | Key prefix joining the term with `OR`                |
//! | `*`      | Apply the condition to every unconstrained column    |
//! | `+`      | Out-of-band metadata, never part of the predicate    |
//! | `~`      | JSON filter document (fields, orders, limit, offset) |
//!
//! Values may carry an inline type: `5::int`, `[1,2]::int64`,
//! `2024-08-01 00:00:00::datetime`.

pub mod ast;
pub mod cast;
pub mod compiler;
pub mod config;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod parser;
pub mod query;
pub mod schema;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::compiler::{Compiler, Predicate};
    pub use crate::config::CompilerConfig;
    pub use crate::dialect::{Dialect, DialectKind, MySql, Placeholder, Postgres, ReservedKeys};
    pub use crate::error::*;
    pub use crate::filter::FilterSpec;
    pub use crate::query::QueryParams;
    pub use crate::schema::{ColumnSource, NoColumns};
}

use std::sync::Arc;

/// Compile a URL-encoded query string with the default Postgres dialect.
///
/// The wildcard key expands only over the `fields` of a `~` filter document,
/// since no column source is available here. Form decoding turns `+` into a
/// space, so the similar-to suffix and the extra key are sent as `%2B`.
///
/// ```
/// let predicate = crud_filter::compile("id=5::int&deleted_at=null").unwrap();
/// assert_eq!(predicate.text, r#""id" = ? AND "deleted_at" IS NULL"#);
/// ```
pub fn compile(query: &str) -> error::FilterResult<compiler::Predicate> {
    let compiler = compiler::Compiler::new(Arc::new(dialect::Postgres::new()))?;
    let pairs = url::form_urlencoded::parse(query.as_bytes());
    compiler.build_predicate(pairs, None, None, &schema::NoColumns, "")
}

//! JSON filter document.
//!
//! ```json
//! {"fields": ["id", "name"], "orders": ["-created_at"], "limit": 20, "offset": 40,
//!  "vars": {"tenant": 3}}
//! ```

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{FilterError, FilterResult};

/// Projection, ordering and pagination hints sent alongside the filter terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Columns to return; empty means all
    pub fields: Vec<String>,
    /// Order expressions: `col`, `col asc`, `col desc`, `-col`
    pub orders: Vec<String>,
    /// Negative means unset
    pub limit: i64,
    /// Negative means unset
    pub offset: i64,
    pub vars: serde_json::Map<String, serde_json::Value>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            orders: Vec::new(),
            limit: -1,
            offset: -1,
            vars: serde_json::Map::new(),
        }
    }
}

impl FilterSpec {
    /// Decode a filter document. An empty or blank document is the default.
    pub fn from_slice(bytes: &[u8]) -> FilterResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn limit(&self) -> Option<u64> {
        u64::try_from(self.limit).ok()
    }

    pub fn offset(&self) -> Option<u64> {
        u64::try_from(self.offset).ok()
    }

    pub fn var(&self, name: &str) -> Option<&serde_json::Value> {
        self.vars.get(name)
    }

    /// Render `orders` as a quoted `ORDER BY` list, or `None` when empty.
    pub fn order_by(&self, dialect: &dyn Dialect) -> FilterResult<Option<String>> {
        if self.orders.is_empty() {
            return Ok(None);
        }
        let items = self
            .orders
            .iter()
            .map(|expr| order_item(expr, dialect))
            .collect::<FilterResult<Vec<_>>>()?;
        Ok(Some(format!("ORDER BY {}", items.join(", "))))
    }

    /// Pagination suffix in the dialect's syntax.
    pub fn limit_offset(&self, dialect: &dyn Dialect) -> String {
        dialect.limit_offset(self.limit(), self.offset())
    }
}

impl std::str::FromStr for FilterSpec {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(s.as_bytes())
    }
}

fn order_item(expr: &str, dialect: &dyn Dialect) -> FilterResult<String> {
    let invalid = || FilterError::InvalidOrder(expr.to_string());
    let mut parts = expr.split_whitespace();
    let column = parts.next().ok_or_else(invalid)?;
    let direction = parts.next();
    if parts.next().is_some() {
        return Err(invalid());
    }

    let (column, desc) = match (column.strip_prefix('-'), direction) {
        (Some(column), None) => (column, true),
        (Some(_), Some(_)) => return Err(invalid()),
        (None, None) => (column, false),
        (None, Some(dir)) if dir.eq_ignore_ascii_case("asc") => (column, false),
        (None, Some(dir)) if dir.eq_ignore_ascii_case("desc") => (column, true),
        (None, Some(_)) => return Err(invalid()),
    };

    let valid = !column.is_empty()
        && column
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid {
        return Err(invalid());
    }

    let column = dialect.quote_identifier(column);
    Ok(if desc {
        format!("{} DESC", column)
    } else {
        format!("{} ASC", column)
    })
}

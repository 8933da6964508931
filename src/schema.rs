//! Column sources for wildcard expansion.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::{FilterError, FilterResult};

/// Supplies the known columns of a table.
pub trait ColumnSource {
    fn columns(&self, table: &str) -> FilterResult<Vec<String>>;
}

/// A fixed column list, whatever the table.
impl ColumnSource for Vec<String> {
    fn columns(&self, _table: &str) -> FilterResult<Vec<String>> {
        Ok(self.clone())
    }
}

impl ColumnSource for [String] {
    fn columns(&self, _table: &str) -> FilterResult<Vec<String>> {
        Ok(self.to_vec())
    }
}

/// No schema available; a wildcard without `fields` expands to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoColumns;

impl ColumnSource for NoColumns {
    fn columns(&self, _table: &str) -> FilterResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Connect a small pool for introspection.
pub async fn connect(url: &str) -> FilterResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(url)
        .await
        .map_err(|e| FilterError::schema("database", e))
}

/// Column names of `table` (optionally `schema.table`) in ordinal order.
pub async fn fetch_columns(pool: &PgPool, table: &str) -> FilterResult<Vec<String>> {
    let (schema, name) = split_table(table);
    let columns: Vec<String> = sqlx::query_scalar(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2 \
         ORDER BY ordinal_position",
    )
    .bind(schema)
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(|e| FilterError::schema(table, e))?;

    if columns.is_empty() {
        return Err(FilterError::schema(table, "table not found or has no columns"));
    }
    Ok(columns)
}

/// `schema.table` or `table` (in `public`).
fn split_table(table: &str) -> (&str, &str) {
    table.split_once('.').unwrap_or(("public", table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_table() {
        assert_eq!(split_table("users"), ("public", "users"));
        assert_eq!(split_table("audit.events"), ("audit", "events"));
    }

    #[test]
    fn test_static_sources() {
        let cols = vec!["id".to_string(), "name".to_string()];
        assert_eq!(cols.columns("any").unwrap(), cols);
        assert_eq!(cols.as_slice().columns("any").unwrap(), cols);
        assert!(NoColumns.columns("users").unwrap().is_empty());
    }
}

//! `PostgreSQL` store.
//!
//! Queries are checked at runtime (`query_as` plus `FromRow` rows) so the
//! crate builds without a live database. Uniqueness and references are
//! enforced by constraints declared in the migrations; violations are mapped
//! to [`RepositoryError::Conflict`] and [`RepositoryError::InvalidReference`].

mod categories;
mod orders;
mod products;
mod users;

use sqlx::{PgPool, Postgres, QueryBuilder};

use emporium_core::{Pagination, SortDirection};

use super::{RepositoryError, Store};

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map constraint violations on a write to repository errors.
fn map_write_error(err: sqlx::Error, conflict: &str, reference: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(conflict.to_owned());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::InvalidReference(reference.to_owned());
        }
    }
    RepositoryError::Database(err)
}

/// `ILIKE` pattern matching `keyword` anywhere, with wildcards escaped.
fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Append `ORDER BY`, `LIMIT` and `OFFSET`.
///
/// `column` comes from a whitelisted sort enum, never from the client. Ties
/// are broken by id in the same direction so pages are stable.
fn push_page(
    qb: &mut QueryBuilder<'_, Postgres>,
    column: &'static str,
    direction: SortDirection,
    page: Pagination,
) {
    let dir = direction.as_sql();
    qb.push(format!(" ORDER BY {column} {dir}, id {dir}"));
    qb.push(" LIMIT ").push_bind(i64::from(page.limit()));
    qb.push(" OFFSET ")
        .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
}

/// Convert a `COUNT(*)` result.
fn count_to_total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

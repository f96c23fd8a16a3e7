//! Categories table.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use emporium_core::{CategoryId, Pagination, Slug, Sort, UserId};

use super::{PgStore, count_to_total, like_pattern, map_write_error, push_page};
use crate::db::{CategoryStore, Page, RepositoryError};
use crate::models::{Category, CategoryChanges, CategoryFilter, CategorySort, NewCategory};

const CONFLICT: &str = "Category already exists";

macro_rules! category_columns {
    () => {
        "id, name, slug, description, is_active, created_by, created_at, updated_at"
    };
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: String,
    is_active: bool,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: Slug::from_stored(row.slug),
            description: row.description,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &CategoryFilter) {
    if let Some(active) = filter.active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if let Some(keyword) = &filter.keyword {
        qb.push(" AND name ILIKE ")
            .push_bind(like_pattern(keyword))
            .push(" ESCAPE '\\'");
    }
}

impl CategoryStore for PgStore {
    async fn create_category(&self, category: NewCategory) -> Result<Category, RepositoryError> {
        let row: CategoryRow = sqlx::query_as(concat!(
            "INSERT INTO categories (name, slug, description, is_active, created_by) ",
            "VALUES ($1, $2, $3, $4, $5) RETURNING ",
            category_columns!()
        ))
        .bind(&category.name)
        .bind(category.slug.as_str())
        .bind(&category.description)
        .bind(category.is_active)
        .bind(category.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, CONFLICT, "Creator not found"))?;

        Ok(row.into())
    }

    async fn list_categories(
        &self,
        filter: &CategoryFilter,
        sort: Sort<CategorySort>,
        page: Pagination,
    ) -> Result<Page<Category>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM categories WHERE TRUE");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            category_columns!(),
            " FROM categories WHERE TRUE"
        ));
        push_filter(&mut select, filter);
        push_page(&mut select, sort.field.column(), sort.direction, page);
        let rows: Vec<CategoryRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok((
            rows.into_iter().map(Category::from).collect(),
            count_to_total(total),
        ))
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(concat!(
            "SELECT ",
            category_columns!(),
            " FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    async fn get_category_by_slug(&self, slug: &Slug) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(concat!(
            "SELECT ",
            category_columns!(),
            " FROM categories WHERE slug = $1"
        ))
        .bind(slug.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    async fn update_category(
        &self,
        slug: &Slug,
        changes: CategoryChanges,
    ) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(concat!(
            "UPDATE categories SET ",
            "name = COALESCE($2, name), ",
            "slug = COALESCE($3, slug), ",
            "description = COALESCE($4, description), ",
            "is_active = COALESCE($5, is_active), ",
            "updated_at = NOW() ",
            "WHERE slug = $1 RETURNING ",
            category_columns!()
        ))
        .bind(slug.as_str())
        .bind(changes.name)
        .bind(changes.slug.as_ref().map(Slug::as_str))
        .bind(changes.description)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, CONFLICT, "Creator not found"))?;

        Ok(row.map(Category::from))
    }

    async fn delete_category(&self, slug: &Slug) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE slug = $1")
            .bind(slug.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, CONFLICT, "Category still has products"))?;

        Ok(result.rows_affected() > 0)
    }
}

//! Products table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};

use emporium_core::{CategoryId, Pagination, ProductId, Sort, UserId};

use super::{PgStore, count_to_total, like_pattern, map_write_error, push_page};
use crate::db::{Page, ProductStore, RepositoryError};
use crate::models::{
    NewProduct, Product, ProductChanges, ProductFilter, ProductImage, ProductSort, UpdatedProduct,
};

const MISSING_CATEGORY: &str = "Category not found";

macro_rules! product_columns {
    () => {
        "id, name, description, price, stock, category_id, image_url, image_public_id, \
         created_by, created_at, updated_at"
    };
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    category_id: CategoryId,
    image_url: Option<String>,
    image_public_id: Option<String>,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UpdatedProductRow {
    #[sqlx(flatten)]
    product: ProductRow,
    previous_url: Option<String>,
    previous_public_id: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        let image = match (row.image_url, row.image_public_id) {
            (Some(url), Some(public_id)) => Some(ProductImage { url, public_id }),
            _ => None,
        };

        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            category_id: row.category_id,
            image,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if let Some(category) = filter.category {
        qb.push(" AND category_id = ").push_bind(category);
    }
    if let Some(keyword) = &filter.keyword {
        qb.push(" AND name ILIKE ")
            .push_bind(like_pattern(keyword))
            .push(" ESCAPE '\\'");
    }
}

impl ProductStore for PgStore {
    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let (image_url, image_public_id) = product
            .image
            .map_or((None, None), |img| (Some(img.url), Some(img.public_id)));

        let row: ProductRow = sqlx::query_as(concat!(
            "INSERT INTO products ",
            "(name, description, price, stock, category_id, image_url, image_public_id, created_by) ",
            "VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING ",
            product_columns!()
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.category_id)
        .bind(image_url)
        .bind(image_public_id)
        .bind(product.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Product already exists", MISSING_CATEGORY))?;

        Ok(row.into())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        sort: Sort<ProductSort>,
        page: Pagination,
    ) -> Result<Page<Product>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products WHERE TRUE");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products WHERE TRUE"
        ));
        push_filter(&mut select, filter);
        push_page(&mut select, sort.field.column(), sort.direction, page);
        let rows: Vec<ProductRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok((
            rows.into_iter().map(Product::from).collect(),
            count_to_total(total),
        ))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        let rows: Vec<ProductRow> = sqlx::query_as(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn update_product(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Option<UpdatedProduct>, RepositoryError> {
        let (image_url, image_public_id) = changes
            .image
            .map_or((None, None), |img| (Some(img.url), Some(img.public_id)));
        let replacing_image = image_public_id.is_some();

        // The locked CTE row is the version this UPDATE overwrites
        let row: Option<UpdatedProductRow> = sqlx::query_as(concat!(
            "WITH previous AS (",
            "SELECT id AS previous_id, image_url AS previous_url, ",
            "image_public_id AS previous_public_id ",
            "FROM products WHERE id = $1 FOR UPDATE) ",
            "UPDATE products SET ",
            "name = COALESCE($2, name), ",
            "description = COALESCE($3, description), ",
            "price = COALESCE($4, price), ",
            "stock = COALESCE($5, stock), ",
            "category_id = COALESCE($6, category_id), ",
            "image_url = COALESCE($7, image_url), ",
            "image_public_id = COALESCE($8, image_public_id), ",
            "updated_at = NOW() ",
            "FROM previous WHERE id = previous_id RETURNING ",
            product_columns!(),
            ", previous_url, previous_public_id"
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.price)
        .bind(changes.stock)
        .bind(changes.category_id)
        .bind(image_url)
        .bind(image_public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Product already exists", MISSING_CATEGORY))?;

        Ok(row.map(|row| {
            let replaced_image = match (row.previous_url, row.previous_public_id) {
                (Some(url), Some(public_id)) if replacing_image => {
                    Some(ProductImage { url, public_id })
                }
                _ => None,
            };
            UpdatedProduct {
                product: row.product.into(),
                replaced_image,
            }
        }))
    }

    async fn delete_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(concat!(
            "DELETE FROM products WHERE id = $1 RETURNING ",
            product_columns!()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }
}

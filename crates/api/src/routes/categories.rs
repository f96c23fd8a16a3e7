//! Category route handlers.
//!
//! Categories are addressed by slug. The slug is derived from the name on
//! create and re-derived when a rename is requested.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::{PageInfo, Pagination, Slug, Sort};

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::AdminOnly;
use crate::models::{Category, CategoryChanges, CategoryFilter, CategorySort, NewCategory};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::{Envelope, NoData};
use crate::services::images::ImageHost;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Query string for category listings.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub keyword: Option<String>,
    pub active: Option<bool>,
}

/// Create request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Update request body. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CategoryData {
    pub category: Category,
}

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: Vec<Category>,
    #[serde(flatten)]
    pub page: PageInfo,
}

// =============================================================================
// Handlers
// =============================================================================

pub fn router<S: Store, H: ImageHost>() -> Router<AppState<S, H>> {
    Router::new()
        .route("/", get(list::<S, H>).post(create::<S, H>))
        .route("/public", get(list_public::<S, H>))
        .route(
            "/{slug}",
            get(show::<S, H>).put(update::<S, H>).delete(destroy::<S, H>),
        )
}

/// Every category, with optional `active` filter.
#[instrument(skip(_admin, state))]
async fn list<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    AdminOnly(_admin): AdminOnly,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<Envelope<CategoryList>>> {
    let filter = CategoryFilter {
        active: query.active,
        keyword: query.keyword.clone(),
    };
    fetch_page(&state, &filter, &query).await
}

/// Active categories only; any `active` parameter is ignored.
async fn list_public<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<Envelope<CategoryList>>> {
    let filter = CategoryFilter {
        active: Some(true),
        keyword: query.keyword.clone(),
    };
    fetch_page(&state, &filter, &query).await
}

async fn fetch_page<S: Store, H: ImageHost>(
    state: &AppState<S, H>,
    filter: &CategoryFilter,
    query: &CategoryQuery,
) -> Result<Json<Envelope<CategoryList>>> {
    let sort = Sort::<CategorySort>::parse(query.sort.as_deref())?;
    let pagination = Pagination::new(query.page, query.limit);

    let (categories, total) = state
        .store()
        .list_categories(filter, sort, pagination)
        .await?;

    Ok(Json(Envelope::ok(CategoryList {
        categories,
        page: PageInfo::new(total, pagination),
    })))
}

#[instrument(skip(admin, state, body), fields(admin_id = %admin.id))]
async fn create<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    AdminOnly(admin): AdminOnly,
    ApiJson(body): ApiJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Envelope<CategoryData>>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Category name is required".to_string()));
    }

    let category = state
        .store()
        .create_category(NewCategory {
            name: name.to_string(),
            slug: Slug::derive(name)?,
            description: body.description.unwrap_or_default(),
            is_active: body.is_active.unwrap_or(true),
            created_by: admin.id,
        })
        .await?;

    tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(
            "Category created successfully",
            CategoryData { category },
        )),
    ))
}

async fn show<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Envelope<CategoryData>>> {
    let category = state
        .store()
        .get_category_by_slug(&Slug::from_stored(slug))
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(Envelope::ok(CategoryData { category })))
}

#[instrument(skip(_admin, state, body))]
async fn update<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    AdminOnly(_admin): AdminOnly,
    ApiPath(slug): ApiPath<String>,
    ApiJson(body): ApiJson<UpdateCategoryRequest>,
) -> Result<Json<Envelope<CategoryData>>> {
    let (name, new_slug) = match body.name.as_deref().map(str::trim) {
        Some("") => {
            return Err(AppError::Validation("Category name cannot be empty".to_string()));
        }
        Some(name) => (Some(name.to_string()), Some(Slug::derive(name)?)),
        None => (None, None),
    };

    let changes = CategoryChanges {
        name,
        slug: new_slug,
        description: body.description,
        is_active: body.is_active,
    };

    let category = state
        .store()
        .update_category(&Slug::from_stored(slug), changes)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(category_id = %category.id, slug = %category.slug, "Category updated");

    Ok(Json(Envelope::with_message(
        "Category updated successfully",
        CategoryData { category },
    )))
}

#[instrument(skip(_admin, state))]
async fn destroy<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    AdminOnly(_admin): AdminOnly,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Envelope<NoData>>> {
    let deleted = state
        .store()
        .delete_category(&Slug::from_stored(slug))
        .await?;

    if !deleted {
        return Err(not_found());
    }

    Ok(Json(Envelope::with_message(
        "Category deleted successfully",
        NoData {},
    )))
}

fn not_found() -> AppError {
    AppError::NotFound("Category not found".to_string())
}

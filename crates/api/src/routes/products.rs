//! Product route handlers.
//!
//! Create and update take `multipart/form-data` with text fields and an
//! optional `image` file. The image is relayed to the host before the
//! database write, so a failed write must destroy the uploaded image; a
//! replaced image is only destroyed once the new row is stored.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::StatusCode,
    routing::get,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::{CategoryId, PageInfo, Pagination, ProductId, Sort, money};

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::AdminOnly;
use crate::models::{NewProduct, Product, ProductChanges, ProductFilter, ProductSort};
use crate::routes::extract::{ApiPath, ApiQuery};
use crate::routes::{Envelope, NoData};
use crate::services::images::{ImageHost, UploadedImage};
use crate::services::upload::{MAX_IMAGE_BYTES, StagedUpload, relay, stage_field};
use crate::state::AppState;

/// Body limit for product forms: the image plus room for the text fields.
const FORM_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 1024 * 1024;

/// Name of the multipart file field.
const IMAGE_FIELD: &str = "image";

// =============================================================================
// Request Types
// =============================================================================

/// Query string for the catalog.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub keyword: Option<String>,
    pub category: Option<CategoryId>,
}

/// A parsed product form: text fields plus the staged image, if any.
///
/// Dropping the form removes the staged file, so a request rejected after
/// the body was read leaves nothing on disk.
#[derive(Debug, Default)]
pub struct ProductForm {
    fields: HashMap<String, String>,
    image: Option<StagedUpload>,
}

impl ProductForm {
    /// A trimmed, non-empty text field.
    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str, message: &str) -> Result<Option<T>> {
        self.text(name)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| AppError::Validation(message.to_string()))
            })
            .transpose()
    }

    /// Validate the text fields. Absent fields are `None`.
    fn fields(&self) -> Result<ProductFields> {
        let price = self
            .parsed::<Decimal>("price", "Price must be a number")?
            .map(|price| money(price, "Price"))
            .transpose()?;

        let stock = self.parsed::<i32>("stock", "Stock must be a whole number")?;
        if stock.is_some_and(|stock| stock < 0) {
            return Err(AppError::Validation("Stock cannot be negative".to_string()));
        }

        Ok(ProductFields {
            name: self.text("name").map(str::to_string),
            description: self.text("description").map(str::to_string),
            price,
            stock,
            category_id: self.parsed::<CategoryId>("category", "Invalid category id")?,
        })
    }
}

impl<S: Store, H: ImageHost> FromRequest<AppState<S, H>> for ProductForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState<S, H>) -> Result<Self> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == IMAGE_FIELD {
                // Browsers send an empty part when no file was chosen
                if field.file_name().is_some_and(str::is_empty) {
                    continue;
                }
                if form.image.is_some() {
                    return Err(AppError::Validation(
                        "Only one image may be uploaded".to_string(),
                    ));
                }
                form.image = Some(stage_field(field, &state.config().upload_dir).await?);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }
}

#[derive(Debug)]
struct ProductFields {
    name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    stock: Option<i32>,
    category_id: Option<CategoryId>,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProductData {
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    #[serde(flatten)]
    pub page: PageInfo,
}

// =============================================================================
// Handlers
// =============================================================================

pub fn router<S: Store, H: ImageHost>() -> Router<AppState<S, H>> {
    Router::new()
        .route("/", get(list::<S, H>).post(create::<S, H>))
        .route(
            "/{id}",
            get(show::<S, H>).put(update::<S, H>).delete(destroy::<S, H>),
        )
        .layer(DefaultBodyLimit::max(FORM_BODY_LIMIT))
}

async fn list<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Envelope<ProductList>>> {
    let sort = Sort::<ProductSort>::parse(query.sort.as_deref())?;
    let pagination = Pagination::new(query.page, query.limit);
    let filter = ProductFilter {
        keyword: query.keyword,
        category: query.category,
    };

    let (products, total) = state
        .store()
        .list_products(&filter, sort, pagination)
        .await?;

    Ok(Json(Envelope::ok(ProductList {
        products,
        page: PageInfo::new(total, pagination),
    })))
}

async fn show<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Envelope<ProductData>>> {
    let product = state
        .store()
        .get_product(id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(Envelope::ok(ProductData { product })))
}

/// Create a product, relaying the image first.
#[instrument(skip(admin, state, form), fields(admin_id = %admin.id))]
async fn create<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    AdminOnly(admin): AdminOnly,
    mut form: ProductForm,
) -> Result<(StatusCode, Json<Envelope<ProductData>>)> {
    let ProductFields {
        name: Some(name),
        description: Some(description),
        price: Some(price),
        stock: Some(stock),
        category_id: Some(category_id),
    } = form.fields()?
    else {
        return Err(AppError::Validation(
            "Please fill all required fields".to_string(),
        ));
    };

    let uploaded = upload_image(&state, form.image.take()).await?;

    let result = state
        .store()
        .create_product(NewProduct {
            name,
            description,
            price,
            stock,
            category_id,
            image: uploaded.clone().map(Into::into),
            created_by: admin.id,
        })
        .await;

    let product = match result {
        Ok(product) => product,
        Err(e) => {
            if let Some(image) = &uploaded {
                discard_image(state.images(), &image.public_id).await;
            }
            return Err(e.into());
        }
    };

    tracing::info!(product_id = %product.id, "Product created");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(
            "Product created successfully",
            ProductData { product },
        )),
    ))
}

/// Update a product. Provided fields overwrite; a new image replaces the
/// old one.
#[instrument(skip(_admin, state, form))]
async fn update<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    AdminOnly(_admin): AdminOnly,
    ApiPath(id): ApiPath<ProductId>,
    mut form: ProductForm,
) -> Result<Json<Envelope<ProductData>>> {
    let fields = form.fields()?;

    // No upload for a missing product
    if state.store().get_product(id).await?.is_none() {
        return Err(not_found());
    }

    let uploaded = upload_image(&state, form.image.take()).await?;

    let changes = ProductChanges {
        name: fields.name,
        description: fields.description,
        price: fields.price,
        stock: fields.stock,
        category_id: fields.category_id,
        image: uploaded.clone().map(Into::into),
    };

    let updated = match state.store().update_product(id, changes).await {
        Ok(Some(updated)) => updated,
        outcome => {
            if let Some(image) = &uploaded {
                discard_image(state.images(), &image.public_id).await;
            }
            return Err(match outcome {
                Err(e) => e.into(),
                Ok(_) => not_found(),
            });
        }
    };

    if let Some(old) = &updated.replaced_image {
        discard_image(state.images(), &old.public_id).await;
    }
    let product = updated.product;

    tracing::info!(product_id = %product.id, "Product updated");

    Ok(Json(Envelope::with_message(
        "Product updated successfully",
        ProductData { product },
    )))
}

/// Delete a product, then its image.
#[instrument(skip(_admin, state))]
async fn destroy<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    AdminOnly(_admin): AdminOnly,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Envelope<NoData>>> {
    let product = state
        .store()
        .delete_product(id)
        .await?
        .ok_or_else(not_found)?;

    if let Some(image) = &product.image {
        discard_image(state.images(), &image.public_id).await;
    }

    tracing::info!(product_id = %product.id, "Product deleted");

    Ok(Json(Envelope::with_message(
        "Product deleted successfully",
        NoData {},
    )))
}

async fn upload_image<S, H: ImageHost>(
    state: &AppState<S, H>,
    staged: Option<StagedUpload>,
) -> Result<Option<UploadedImage>> {
    let Some(staged) = staged else {
        return Ok(None);
    };

    let image = relay(state.images(), staged).await?;
    tracing::info!(public_id = %image.public_id, "Image uploaded");
    Ok(Some(image))
}

/// Best-effort removal of a hosted image. Failures are logged; the row
/// change they follow has already been made.
async fn discard_image<H: ImageHost>(images: &H, public_id: &str) {
    match images.destroy(public_id).await {
        Ok(()) => tracing::info!(public_id, "Image destroyed"),
        Err(e) => tracing::error!(public_id, error = %e, "Failed to destroy image"),
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Product not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(fields: &[(&str, &str)]) -> ProductForm {
        ProductForm {
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            image: None,
        }
    }

    #[test]
    fn test_fields_parse() {
        let parsed = form(&[
            ("name", " Lamp "),
            ("price", "19.999"),
            ("stock", "3"),
            ("category", "7"),
            ("description", ""),
        ])
        .fields()
        .ok();

        let parsed = parsed.as_ref();
        assert_eq!(parsed.and_then(|f| f.name.as_deref()), Some("Lamp"));
        assert_eq!(parsed.and_then(|f| f.price), Some(Decimal::new(2000, 2)));
        assert_eq!(parsed.and_then(|f| f.stock), Some(3));
        assert_eq!(parsed.and_then(|f| f.category_id), Some(CategoryId::new(7)));
        assert!(parsed.is_some_and(|f| f.description.is_none()));
    }

    #[test]
    fn test_fields_reject_bad_numbers() {
        assert!(form(&[("price", "cheap")]).fields().is_err());
        assert!(form(&[("price", "-1")]).fields().is_err());
        assert!(form(&[("price", "10000000000")]).fields().is_err());
        assert!(form(&[("price", "79228162514264337593543950335")]).fields().is_err());
        assert!(form(&[("stock", "-2")]).fields().is_err());
        assert!(form(&[("stock", "1.5")]).fields().is_err());
        assert!(form(&[("category", "shoes")]).fields().is_err());
        assert!(form(&[("price", "0"), ("stock", "0")]).fields().is_ok());
    }
}

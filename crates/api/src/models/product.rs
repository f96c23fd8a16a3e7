//! Product domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use emporium_core::{CategoryId, ProductId, SortDirection, SortField, UserId};

use super::contains_ignore_case;

/// Reference to an image held by the external image host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    /// Public HTTPS URL.
    pub url: String,
    /// Host-side id used to destroy the image.
    pub public_id: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    #[serde(rename = "category")]
    pub category_id: CategoryId,
    pub image: Option<ProductImage>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: CategoryId,
    pub image: Option<ProductImage>,
    pub created_by: UserId,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category_id: Option<CategoryId>,
    pub image: Option<ProductImage>,
}

impl ProductChanges {
    /// Apply the changes to a loaded product, returning the image a new
    /// one displaced.
    pub fn apply(self, product: &mut Product, now: DateTime<Utc>) -> Option<ProductImage> {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category_id) = self.category_id {
            product.category_id = category_id;
        }
        let replaced = self.image.and_then(|image| product.image.replace(image));
        product.updated_at = now;
        replaced
    }
}

/// A product after an update, with the image the update displaced.
#[derive(Debug, Clone)]
pub struct UpdatedProduct {
    pub product: Product,
    /// Read in the same write as the update, so concurrent replacements
    /// each see the image they actually overwrote.
    pub replaced_image: Option<ProductImage>,
}

/// Filters for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of the name.
    pub keyword: Option<String>,
    pub category: Option<CategoryId>,
}

impl ProductFilter {
    /// Whether a product passes the filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        self.category.is_none_or(|id| product.category_id == id)
            && self
                .keyword
                .as_deref()
                .is_none_or(|kw| contains_ignore_case(&product.name, kw))
    }
}

/// Sortable product fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSort {
    Name,
    Price,
    CreatedAt,
}

impl ProductSort {
    /// Column to order by.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::CreatedAt => "created_at",
        }
    }
}

impl SortField for ProductSort {
    const DEFAULT: Self = Self::CreatedAt;
    const DEFAULT_DIRECTION: SortDirection = SortDirection::Desc;

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Self::Name),
            "price" => Some(Self::Price),
            "createdAt" => Some(Self::CreatedAt),
            _ => None,
        }
    }
}

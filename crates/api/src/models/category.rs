//! Category domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use emporium_core::{CategoryId, Slug, SortDirection, SortField, UserId};

use super::contains_ignore_case;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub is_active: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub is_active: bool,
    pub created_by: UserId,
}

/// Partial update. `slug` must be re-derived whenever `name` changes.
#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub slug: Option<Slug>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl CategoryChanges {
    /// Apply the changes to a loaded category.
    pub fn apply(self, category: &mut Category, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            category.name = name;
        }
        if let Some(slug) = self.slug {
            category.slug = slug;
        }
        if let Some(description) = self.description {
            category.description = description;
        }
        if let Some(is_active) = self.is_active {
            category.is_active = is_active;
        }
        category.updated_at = now;
    }
}

/// Filters for category listings.
#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    pub active: Option<bool>,
    /// Case-insensitive substring of the name.
    pub keyword: Option<String>,
}

impl CategoryFilter {
    /// Whether a category passes the filter.
    #[must_use]
    pub fn matches(&self, category: &Category) -> bool {
        self.active.is_none_or(|active| category.is_active == active)
            && self
                .keyword
                .as_deref()
                .is_none_or(|kw| contains_ignore_case(&category.name, kw))
    }
}

/// Sortable category fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySort {
    Name,
    CreatedAt,
}

impl CategorySort {
    /// Column to order by.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CreatedAt => "created_at",
        }
    }
}

impl SortField for CategorySort {
    const DEFAULT: Self = Self::Name;
    const DEFAULT_DIRECTION: SortDirection = SortDirection::Asc;

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Self::Name),
            "createdAt" => Some(Self::CreatedAt),
            _ => None,
        }
    }
}

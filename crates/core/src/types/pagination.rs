//! Pagination and sorting for collection endpoints.
//!
//! Pages are 1-based. A request for `page=2, limit=10` skips 10 records and
//! returns the next 10; the response reports `pages = ceil(total / limit)`.

use serde::Serialize;

/// Default page size when the client sends no `limit`.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest page size a client may request.
pub const MAX_LIMIT: u32 = 100;

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    /// Build a page request from optional query values.
    ///
    /// Missing or zero values fall back to page 1 and [`DEFAULT_LIMIT`]; the
    /// limit is capped at [`MAX_LIMIT`].
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Self { page, limit }
    }

    /// The 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Records per page.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of records to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    /// Apply this page to an already filtered and sorted slice.
    #[must_use]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let start = start.min(items.len());
        let end = start.saturating_add(self.limit as usize).min(items.len());
        items.get(start..end).unwrap_or_default()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Page metadata attached to collection responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Records matching the filter, across all pages.
    pub total: u64,
    /// The page that was returned.
    pub page: u32,
    /// Number of pages at the requested limit.
    pub pages: u64,
}

impl PageInfo {
    /// Compute page metadata for `total` matching records.
    #[must_use]
    pub const fn new(total: u64, pagination: Pagination) -> Self {
        Self {
            total,
            page: pagination.page,
            pages: total.div_ceil(pagination.limit as u64),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// SQL keyword for this direction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A whitelisted field a collection can be sorted by.
pub trait SortField: Sized + Copy {
    /// Field used when the client sends no sort.
    const DEFAULT: Self;
    /// Direction used when the client sends no sort.
    const DEFAULT_DIRECTION: SortDirection;

    /// Map a client-facing key (e.g. `createdAt`) to a field.
    fn from_key(key: &str) -> Option<Self>;
}

/// Error returned for an unknown sort key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot sort by `{0}`")]
pub struct SortError(pub String);

/// A parsed sort key such as `name` or `-createdAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F: SortField> Sort<F> {
    /// Parse a sort parameter. A leading `-` sorts descending.
    ///
    /// # Errors
    ///
    /// Returns [`SortError`] if the key is not a sortable field.
    pub fn parse(raw: Option<&str>) -> Result<Self, SortError> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Self::default());
        };

        let (direction, key) = raw
            .strip_prefix('-')
            .map_or((SortDirection::Asc, raw), |rest| (SortDirection::Desc, rest));

        let field = F::from_key(key).ok_or_else(|| SortError(key.to_owned()))?;
        Ok(Self { field, direction })
    }
}

impl<F: SortField> Default for Sort<F> {
    fn default() -> Self {
        Self {
            field: F::DEFAULT,
            direction: F::DEFAULT_DIRECTION,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestField {
        Name,
        CreatedAt,
    }

    impl SortField for TestField {
        const DEFAULT: Self = Self::CreatedAt;
        const DEFAULT_DIRECTION: SortDirection = SortDirection::Desc;

        fn from_key(key: &str) -> Option<Self> {
            match key {
                "name" => Some(Self::Name),
                "createdAt" => Some(Self::CreatedAt),
                _ => None,
            }
        }
    }

    #[test]
    fn test_defaults_and_clamping() {
        let p = Pagination::new(None, None);
        assert_eq!((p.page(), p.limit()), (1, DEFAULT_LIMIT));

        let p = Pagination::new(Some(0), Some(0));
        assert_eq!((p.page(), p.limit()), (1, DEFAULT_LIMIT));

        let p = Pagination::new(Some(3), Some(10_000));
        assert_eq!(p.limit(), MAX_LIMIT);
    }

    #[test]
    fn test_second_page_of_twenty_five() {
        let records: Vec<u32> = (1..=25).collect();
        let p = Pagination::new(Some(2), Some(10));

        assert_eq!(p.offset(), 10);
        assert_eq!(p.slice(&records), (11..=20).collect::<Vec<_>>().as_slice());

        let info = PageInfo::new(25, p);
        assert_eq!(info.pages, 3);
        assert_eq!(info.page, 2);
        assert_eq!(info.total, 25);
    }

    #[test]
    fn test_last_and_out_of_range_pages() {
        let records: Vec<u32> = (1..=25).collect();
        assert_eq!(Pagination::new(Some(3), Some(10)).slice(&records), &[21, 22, 23, 24, 25]);
        assert!(Pagination::new(Some(9), Some(10)).slice(&records).is_empty());
    }

    #[test]
    fn test_page_info_empty_collection() {
        let info = PageInfo::new(0, Pagination::default());
        assert_eq!(info.pages, 0);
    }

    #[test]
    fn test_sort_parse() {
        let sort = Sort::<TestField>::parse(Some("-name")).unwrap();
        assert_eq!(sort.field, TestField::Name);
        assert_eq!(sort.direction, SortDirection::Desc);

        let sort = Sort::<TestField>::parse(Some("name")).unwrap();
        assert_eq!(sort.direction, SortDirection::Asc);

        let sort = Sort::<TestField>::parse(None).unwrap();
        assert_eq!(sort, Sort::default());
        assert_eq!(sort.field, TestField::CreatedAt);

        assert_eq!(
            Sort::<TestField>::parse(Some("password")),
            Err(SortError("password".to_owned()))
        );
    }
}

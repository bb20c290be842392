//! Shared pagination types for API query parameters and responses.
//!
//! List endpoints take zero-based `page`/`size` parameters plus a `sort` expression and
//! answer with a [`Page`], whose JSON shape matches the page objects Spring Data clients
//! already understand (`content`, `pageable`, `totalElements`, `totalPages`, ...).

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::config::PaginationConfig;
use crate::errors::{Error, Result};

/// Sort expression used when the request does not give one.
pub const DEFAULT_SORT: &str = "createdAt,desc";

/// Largest accepted page index
pub const MAX_PAGE: i64 = i32::MAX as i64;

/// Page-based pagination parameters.
///
/// Out-of-range values are rejected rather than clamped, so a client asking for
/// `size=500` learns about the limit instead of silently getting fewer rows.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct PageParams {
    /// Zero-based page index (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page: Option<i64>,

    /// Page size (default: 20, max: 50)
    #[param(default = 20, minimum = 1, maximum = 50)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub size: Option<i64>,

    /// Sort expression `property[,asc|desc]` (default: `createdAt,desc`)
    #[param(default = "createdAt,desc", example = "displayName,asc")]
    pub sort: Option<String>,
}

impl PageParams {
    /// Get the page index, defaulting to 0 if not specified.
    ///
    /// Pages are bounded by `i32::MAX` so that `page * size` and `page + 1` stay in range.
    pub fn page(&self) -> Result<i64> {
        match self.page {
            None => Ok(0),
            Some(page) if page < 0 => Err(Error::BadRequest {
                message: "page: must be greater than or equal to 0".to_string(),
            }),
            Some(page) if page > MAX_PAGE => Err(Error::BadRequest {
                message: format!("page: must be less than or equal to {MAX_PAGE}"),
            }),
            Some(page) => Ok(page),
        }
    }

    /// Get the page size, defaulting to the configured default if not specified.
    pub fn size(&self, limits: &PaginationConfig) -> Result<i64> {
        match self.size {
            None => Ok(limits.default_size),
            Some(size) if (1..=limits.max_size).contains(&size) => Ok(size),
            Some(_) => Err(Error::BadRequest {
                message: format!("size: must be between 1 and {}", limits.max_size),
            }),
        }
    }

    pub fn sort(&self) -> &str {
        self.sort.as_deref().unwrap_or(DEFAULT_SORT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SortInfo {
    pub sorted: bool,
    pub unsorted: bool,
    pub empty: bool,
}

impl SortInfo {
    pub fn new(sorted: bool) -> Self {
        Self {
            sorted,
            unsorted: !sorted,
            empty: !sorted,
        }
    }
}

/// The request side of a page: where it starts and how it was ordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pageable {
    pub page_number: i64,
    pub page_size: i64,
    pub offset: i64,
    pub paged: bool,
    pub unpaged: bool,
    pub sort: SortInfo,
}

/// One page of results with totals for client-side navigation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// The items for the current page
    pub content: Vec<T>,
    pub pageable: Pageable,
    /// Total number of items matching the query (before pagination)
    pub total_elements: i64,
    pub total_pages: i64,
    /// Zero-based index of this page
    pub number: i64,
    /// Requested page size
    pub size: i64,
    /// Number of items actually on this page
    pub number_of_elements: i64,
    pub first: bool,
    pub last: bool,
    pub empty: bool,
    pub sort: SortInfo,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, page: i64, size: i64, total_elements: i64) -> Self {
        let total_pages = if size > 0 { (total_elements + size - 1) / size } else { 0 };
        let number_of_elements = content.len() as i64;
        let sort = SortInfo::new(true);

        Self {
            pageable: Pageable {
                page_number: page,
                page_size: size,
                offset: page.saturating_mul(size),
                paged: true,
                unpaged: false,
                sort: sort.clone(),
            },
            total_elements,
            total_pages,
            number: page,
            size,
            number_of_elements,
            first: page == 0,
            last: page.saturating_add(1) >= total_pages,
            empty: content.is_empty(),
            sort,
            content,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            pageable: self.pageable,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            number: self.number,
            size: self.size,
            number_of_elements: self.number_of_elements,
            first: self.first,
            last: self.last,
            empty: self.empty,
            sort: self.sort,
        }
    }
}

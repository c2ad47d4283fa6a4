use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ErrorMessage, HttpError};
use crate::models::SubscriptionType;

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients.
// Catalog rows are serialized straight from the models; requests get their own types.

// ============================================================================
// Pagination DTOs
// ============================================================================

pub const MAX_PAGE_SIZE: u32 = 50;

/// Page-based pagination query parameters: `?page=2&page_size=20`
#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct PageQuery {
    #[validate(range(min = 1, message = "Page must be greater than 0"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 50, message = "Page size must be between 1 and 50"))]
    pub page_size: Option<u32>,
}

/// Resolved page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.number as i64 - 1) * self.size as i64
    }

    pub fn limit(&self) -> i64 {
        self.size as i64
    }
}

impl PageQuery {
    pub fn resolve(&self, default_size: u32) -> Result<Page, HttpError> {
        self.validate()
            .map_err(|e| HttpError::bad_request(e.to_string()))?;

        Ok(Page {
            number: self.page.unwrap_or(1),
            size: self.page_size.unwrap_or(default_size).min(MAX_PAGE_SIZE),
        })
    }
}

/// List envelope: `{count, next, previous, results}`
///
/// `next`/`previous` are links relative to the server root, built from the
/// path of the current request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    /// Wrap one page of results
    ///
    /// Asking for a page past the end is a 404, except for page 1 of an
    /// empty collection, which is a valid empty list.
    pub fn new(results: Vec<T>, count: i64, page: Page, path: &str) -> Result<Self, HttpError> {
        let total_pages = ((count.max(0) as f64) / page.size as f64).ceil() as i64;
        if page.number > 1 && page.number as i64 > total_pages {
            return Err(HttpError::not_found(ErrorMessage::InvalidPage.to_string()));
        }

        let link = |number: u32| format!("{}?page={}&page_size={}", path, number, page.size);

        Ok(Paginated {
            count,
            next: ((page.number as i64) < total_pages).then(|| link(page.number + 1)),
            previous: (page.number > 1).then(|| link(page.number - 1)),
            results,
        })
    }
}

// ============================================================================
// Module DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateModuleDto {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: Option<i32>,
}

/// Partial update: absent fields keep their stored value
#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdateModuleDto {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: Option<i32>,
}

// ============================================================================
// Course DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCourseDto {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: Option<i32>,

    #[validate(length(max = 300, message = "Preview reference is too long"))]
    pub preview: Option<String>,

    pub module: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdateCourseDto {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: Option<i32>,

    #[validate(length(max = 300, message = "Preview reference is too long"))]
    pub preview: Option<String>,

    pub module: Option<i64>,
}

// ============================================================================
// Lesson DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateLessonDto {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(length(max = 300, message = "Preview reference is too long"))]
    pub preview: Option<String>,

    // Host is checked against the configured allow-list in the handler
    #[validate(length(min = 1, max = 300, message = "Video link must be between 1 and 300 characters"))]
    pub video: Option<String>,

    pub course: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct UpdateLessonDto {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,

    #[validate(length(max = 300, message = "Preview reference is too long"))]
    pub preview: Option<String>,

    #[validate(length(min = 1, max = 300, message = "Video link must be between 1 and 300 characters"))]
    pub video: Option<String>,

    pub course: Option<i64>,
}

// ============================================================================
// Subscription DTOs
// ============================================================================

/// Toggle request body: `{"module": 7}`
///
/// `module` stays optional so a missing id surfaces as 404 from the manager
/// instead of a body rejection.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ToggleSubscriptionDto {
    pub module: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateSubscriptionDto {
    pub subscription_type: SubscriptionType,
    pub module: Option<i64>,
    pub course: Option<i64>,
}

/// Per-target status texts of one toggle
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToggleResult {
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponseDto {
    pub message: ToggleResult,
}

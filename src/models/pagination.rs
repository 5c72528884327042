use crate::error::app_error::AppError;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;

/// Page-based pagination for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct PaginationParams {
    /// Page number (1-indexed).
    pub page: i64,
    pub limit: i64,
}

impl PaginationParams {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    /// Build from optional query parameters, applying defaults and the limit cap.
    pub fn from_query(page: Option<i64>, limit: Option<i64>) -> Result<Self, AppError> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(AppError::BadRequest("page must be at least 1".to_string()));
        }

        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT);
        if limit < 1 {
            return Err(AppError::BadRequest("limit must be at least 1".to_string()));
        }

        Ok(Self {
            page,
            limit: limit.min(Self::MAX_LIMIT),
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Paginated response wrapper with metadata
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total_items: i64) -> Self {
        let total_pages = if params.limit > 0 { (total_items + params.limit - 1) / params.limit } else { 1 };

        Self {
            data,
            page: params.page,
            limit: params.limit,
            total_items,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_query_is_empty() {
        let params = PaginationParams::from_query(None, None).unwrap();
        assert_eq!(params, PaginationParams::default());
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn limit_is_capped() {
        let params = PaginationParams::from_query(Some(3), Some(1000)).unwrap();
        assert_eq!(params.limit, PaginationParams::MAX_LIMIT);
        assert_eq!(params.offset(), 2 * PaginationParams::MAX_LIMIT);
    }

    #[test]
    fn invalid_page_is_rejected() {
        assert!(PaginationParams::from_query(Some(0), None).is_err());
        assert!(PaginationParams::from_query(None, Some(0)).is_err());
    }

    #[test]
    fn total_pages_rounds_up() {
        let params = PaginationParams::from_query(Some(1), Some(10)).unwrap();
        let response = PaginatedResponse::new(vec![1, 2, 3], &params, 21);
        assert_eq!(response.total_pages, 3);
    }
}

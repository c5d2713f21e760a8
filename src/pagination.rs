use serde::Serialize;

use crate::config::Config;
use crate::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self { default_page_size: 20, max_page_size: 100 }
    }
}

impl From<&Config> for PageLimits {
    fn from(cfg: &Config) -> Self {
        Self { default_page_size: cfg.default_page_size, max_page_size: cfg.max_page_size }
    }
}

/// A validated, 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32, limits: &PageLimits) -> Result<Self, ApiError> {
        if page == 0 {
            return Err(ApiError::BadRequest("page must be a positive integer".into()));
        }
        if page_size == 0 || page_size > limits.max_page_size {
            return Err(ApiError::BadRequest(format!(
                "page_size must be between 1 and {}",
                limits.max_page_size
            )));
        }
        Ok(Self { page, page_size })
    }

    /// Parses raw query values. Missing or empty values take the defaults;
    /// anything else that is not a positive integer in range is rejected.
    pub fn parse(
        page: Option<&str>,
        page_size: Option<&str>,
        limits: &PageLimits,
    ) -> Result<Self, ApiError> {
        let page = parse_positive("page", page)?.unwrap_or(1);
        let page_size =
            parse_positive("page_size", page_size)?.unwrap_or(limits.default_page_size);
        Self::new(page, page_size, limits)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

fn parse_positive(name: &str, raw: Option<&str>) -> Result<Option<u32>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<u32>()
            .ok()
            .filter(|v| *v > 0)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("{name} must be a positive integer"))),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    pub fn compute(total_count: u64, req: PageRequest) -> Self {
        let total_pages = total_count.div_ceil(u64::from(req.page_size));
        Self {
            page: req.page,
            page_size: req.page_size,
            total_count,
            total_pages,
            has_next: u64::from(req.page) < total_pages,
            has_previous: req.page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub files: Vec<T>,
    pub pagination: Pagination,
}

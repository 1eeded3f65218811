use serde::Serialize;

use crate::error::{AppError, AppResult};

/// Default number of movies per search page
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Largest row offset a page may start at; keeps offsets valid as SQL `OFFSET`
const MAX_OFFSET: usize = i64::MAX as usize;

/// A zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn new(number: usize, size: usize) -> AppResult<Self> {
        if size < 1 {
            return Err(AppError::InvalidInput(format!(
                "Page size must be at least 1 but was {}",
                size
            )));
        }
        match number.checked_mul(size) {
            Some(offset) if offset <= MAX_OFFSET => Ok(Self { number, size }),
            _ => Err(AppError::InvalidInput(format!(
                "Page {} is out of range",
                number.saturating_add(1)
            ))),
        }
    }

    /// Converts a one-based page number, as used by the HTTP API
    pub fn from_one_based(page: Option<usize>, size: Option<usize>, default_size: usize) -> AppResult<Self> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(AppError::InvalidInput(
                "Page numbers start at 1".to_string(),
            ));
        }
        Self::new(page - 1, size.unwrap_or(default_size))
    }

    pub fn offset(&self) -> usize {
        self.number.saturating_mul(self.size)
    }

    /// Fails unless this page exists for `total` items
    ///
    /// Page 0 always exists, even when there is nothing to show.
    pub fn ensure_within(&self, total: usize) -> AppResult<()> {
        if self.number == 0 || self.number < page_count(total, self.size) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Page {} does not exist",
                self.number.saturating_add(1)
            )))
        }
    }

    /// Slice of `items` covered by this page; empty when past the end
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset().min(items.len());
        let end = start.saturating_add(self.size).min(items.len());
        &items[start..end]
    }

    /// Same page number pulled back into `[0, pages - 1]`
    pub fn clamped(&self, total: usize) -> Self {
        let last = page_count(total, self.size).saturating_sub(1);
        Self {
            number: self.number.min(last),
            size: self.size,
        }
    }
}

/// Number of pages needed for `total` items
pub fn page_count(total: usize, size: usize) -> usize {
    total.div_ceil(size)
}

/// One page of results plus the totals needed to render pagination
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResults<T> {
    pub movies: Vec<T>,
    pub hits: usize,
    /// Zero-based page number
    pub page: usize,
    pub pages: usize,
}

impl<T> SearchResults<T> {
    pub fn empty(page: usize) -> Self {
        Self {
            movies: Vec::new(),
            hits: 0,
            page,
            pages: 0,
        }
    }
}

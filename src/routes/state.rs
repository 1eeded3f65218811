use std::sync::Arc;

use crate::{repository::Repository, search::DEFAULT_PAGE_SIZE, services::SessionStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub sessions: SessionStore,
    /// Default search page size
    pub page_size: usize,
}

impl AppState {
    pub fn new(repository: Arc<dyn Repository>, sessions: SessionStore) -> Self {
        Self {
            repository,
            sessions,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn repo(&self) -> &dyn Repository {
        self.repository.as_ref()
    }
}

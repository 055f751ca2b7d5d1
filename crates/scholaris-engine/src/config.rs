//! Engine configuration.

use scholaris_core::error::ScholarisResult;
use scholaris_core::repository::Pagination;

use crate::error::EngineError;

/// Configuration for the session, class, student and promotion services.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Page size used when a listing asks for 0 items per page.
    pub default_page_size: u64,
    /// Upper bound on the page size of any listing.
    pub max_page_size: u64,
    /// Prefix of generated admission numbers (e.g. `P` → `P000042`).
    pub admission_number_prefix: String,
    /// Zero-padded width of the numeric part of generated admission numbers.
    pub admission_number_width: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 500,
            admission_number_prefix: "P".into(),
            admission_number_width: 6,
        }
    }
}

impl EngineConfig {
    /// Clamp a requested page size into `1..=max_page_size`.
    pub fn page_size(&self, requested: u64) -> u64 {
        match requested {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        }
    }

    /// Turn a 1-based page request into store pagination. Page 0 and
    /// pages whose offset overflows are rejected.
    pub fn pagination(&self, page: u64, page_size: u64) -> ScholarisResult<Pagination> {
        if page == 0 {
            return Err(EngineError::InvalidPage.into());
        }
        Pagination::page(page, self.page_size(page_size))
            .ok_or_else(|| EngineError::InvalidPage.into())
    }
}

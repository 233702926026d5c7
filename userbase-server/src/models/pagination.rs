//! Offset/limit pagination for user listings

use serde::Deserialize;

/// Maximum rows a single listing may return
pub const MAX_LIMIT: u32 = 100;

/// Default rows per listing when the caller gives no limit
const DEFAULT_LIMIT: u32 = 1;

/// Validated offset/limit pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u32,
}

impl PageRequest {
    /// Create a page request; limit is clamped to 1..=100.
    pub fn new(offset: u64, limit: u32) -> Self {
        Self {
            offset,
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Query parameters for pagination
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub offset: Option<u64>,
    pub limit: Option<u32>,
}

impl From<PaginationParams> for PageRequest {
    fn from(params: PaginationParams) -> Self {
        Self::new(
            params.offset.unwrap_or(0),
            params.limit.unwrap_or(DEFAULT_LIMIT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let page = PageRequest::from(PaginationParams::default());
        assert_eq!(page, PageRequest { offset: 0, limit: 1 });
    }

    #[test]
    fn clamps_limit() {
        assert_eq!(PageRequest::new(0, 0).limit, 1);
        assert_eq!(PageRequest::new(0, 999).limit, MAX_LIMIT);
        assert_eq!(PageRequest::new(5, 20).limit, 20);
    }

    #[test]
    fn keeps_offset() {
        let page = PageRequest::from(PaginationParams {
            offset: Some(40),
            limit: Some(20),
        });
        assert_eq!(page.offset, 40);
        assert_eq!(page.limit, 20);
    }
}

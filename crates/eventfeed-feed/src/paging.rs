//! Page arithmetic.
//!
//! Page `n` (1-based) covers sequence numbers
//! `(n - 1) * events_per_page + 1 ..= n * events_per_page`. Everything here is
//! pure and total for valid inputs.

use std::num::NonZeroU64;
use std::ops::RangeInclusive;

use crate::error::FeedError;

/// Number of events per page. Fixed per deployment, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSize(NonZeroU64);

impl PageSize {
    /// Default page size for deployments that do not configure one.
    pub const DEFAULT: PageSize = PageSize(match NonZeroU64::new(100) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Validates a configured page size.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidPageSize`] for zero.
    pub fn new(events_per_page: u64) -> Result<Self, FeedError> {
        NonZeroU64::new(events_per_page)
            .map(Self)
            .ok_or(FeedError::InvalidPageSize(events_per_page))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Number of pages in a feed of `event_count` events.
///
/// An empty feed still has one (empty) page, which is both head and tail.
pub fn total_pages(event_count: u64, page_size: PageSize) -> u64 {
    event_count.div_ceil(page_size.get()).max(1)
}

/// Whether a page read that returned `returned` events is complete.
pub fn is_complete(returned: usize, page_size: PageSize) -> bool {
    returned as u64 == page_size.get()
}

/// Inclusive range of sequence numbers covered by `page_number`.
///
/// `page_number` must be at least 1. Bounds saturate instead of overflowing
/// for absurdly large page numbers, which then simply match no events.
pub fn page_bounds(page_number: u64, page_size: PageSize) -> RangeInclusive<u64> {
    debug_assert!(page_number >= 1, "page numbers start at 1");
    let size = page_size.get();
    let first = page_number
        .saturating_sub(1)
        .saturating_mul(size)
        .saturating_add(1);
    let last = page_number.saturating_mul(size);
    first..=last
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: u64) -> PageSize {
        PageSize::new(n).expect("non-zero page size")
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert!(matches!(
            PageSize::new(0),
            Err(FeedError::InvalidPageSize(0))
        ));
    }

    #[test]
    fn empty_feed_has_one_page() {
        assert_eq!(total_pages(0, size(10)), 1);
        assert_eq!(total_pages(0, size(1)), 1);
    }

    #[test]
    fn total_pages_matches_ceiling_division() {
        for per_page in 1..=12u64 {
            for count in 0..=100u64 {
                let expected = std::cmp::max(1, (count + per_page - 1) / per_page);
                assert_eq!(
                    total_pages(count, size(per_page)),
                    expected,
                    "count={count} per_page={per_page}"
                );
            }
        }
    }

    #[test]
    fn partial_last_page_adds_a_page() {
        assert_eq!(total_pages(10, size(10)), 1);
        assert_eq!(total_pages(11, size(10)), 2);
        assert_eq!(total_pages(20, size(10)), 2);
        assert_eq!(total_pages(1001, size(100)), 11);
    }

    #[test]
    fn completeness_requires_a_full_page() {
        assert!(is_complete(10, size(10)));
        assert!(!is_complete(9, size(10)));
        assert!(!is_complete(0, size(10)));
    }

    #[test]
    fn bounds_cover_consecutive_ranges() {
        assert_eq!(page_bounds(1, size(10)), 1..=10);
        assert_eq!(page_bounds(2, size(10)), 11..=20);
        assert_eq!(page_bounds(3, size(1)), 3..=3);
    }

    #[test]
    fn bounds_saturate_for_huge_page_numbers() {
        let bounds = page_bounds(u64::MAX, size(10));
        assert_eq!(*bounds.end(), u64::MAX);
    }
}

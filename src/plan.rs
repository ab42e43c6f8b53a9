//! Batch planning.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::PageRange;

/// Default batch size; extraction services commonly cap scanned PDFs at 100 pages.
pub const DEFAULT_MAX_BATCH_PAGES: u32 = 100;

/// Ordered, non-overlapping page ranges covering a whole document.
///
/// Plans only come from [`plan`], so the ranges are always contiguous and
/// exhaustive; [`BatchPlan::check_covers`] re-verifies that before a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPlan {
    page_count: u32,
    max_batch_pages: u32,
    ranges: Vec<PageRange>,
}

impl BatchPlan {
    /// Planned ranges in order.
    pub fn ranges(&self) -> &[PageRange] {
        &self.ranges
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Always false; a plan has at least one batch.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Page count of the planned document.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Batch size limit the plan was built with.
    pub fn max_batch_pages(&self) -> u32 {
        self.max_batch_pages
    }

    /// Iterate over the ranges.
    pub fn iter(&self) -> std::slice::Iter<'_, PageRange> {
        self.ranges.iter()
    }

    /// Check that the ranges tile `[1, page_count]` in order, without gaps
    /// or overlaps.
    pub fn check_covers(&self, page_count: u32) -> Result<()> {
        if self.page_count != page_count {
            return Err(Error::InvalidPlan(format!(
                "plan covers {} pages but the document has {}",
                self.page_count, page_count
            )));
        }

        let mut next = 1u32;
        for range in &self.ranges {
            if range.start() != next {
                return Err(Error::InvalidPlan(format!(
                    "{} does not start at page {}",
                    range, next
                )));
            }
            if range.len() > self.max_batch_pages {
                return Err(Error::InvalidPlan(format!(
                    "{} is longer than {} pages",
                    range, self.max_batch_pages
                )));
            }
            next = range.end().saturating_add(1);
        }

        match self.ranges.last() {
            Some(last) if last.end() == page_count => Ok(()),
            Some(last) => Err(Error::InvalidPlan(format!(
                "plan stops at page {} of {}",
                last.end(),
                page_count
            ))),
            None => Err(Error::InvalidPlan("plan has no batches".to_string())),
        }
    }
}

impl<'a> IntoIterator for &'a BatchPlan {
    type Item = &'a PageRange;
    type IntoIter = std::slice::Iter<'a, PageRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

/// Split `[1, page_count]` into consecutive windows of at most `max_batch_pages`.
///
/// A document no longer than one window yields a single-batch plan, which
/// the orchestrator runs like any other.
///
/// # Example
///
/// ```
/// let plan = pdfbatch::plan(250, 100).unwrap();
/// let bounds: Vec<_> = plan.iter().map(|r| (r.start(), r.end())).collect();
/// assert_eq!(bounds, vec![(1, 100), (101, 200), (201, 250)]);
/// ```
pub fn plan(page_count: u32, max_batch_pages: u32) -> Result<BatchPlan> {
    if page_count == 0 {
        return Err(Error::InvalidPlan(
            "page count must be at least 1".to_string(),
        ));
    }
    if max_batch_pages == 0 {
        return Err(Error::InvalidPlan(
            "batch size must be at least 1 page".to_string(),
        ));
    }

    let batch_count = page_count.div_ceil(max_batch_pages);
    let mut ranges = Vec::with_capacity(batch_count as usize);
    let mut start = 1u32;
    while start <= page_count {
        let end = start
            .saturating_add(max_batch_pages - 1)
            .min(page_count);
        ranges.push(PageRange::new(start, end)?);
        if end == page_count {
            break;
        }
        start = end + 1;
    }

    log::debug!(
        "planned {} pages into {} batches of at most {}",
        page_count,
        ranges.len(),
        max_batch_pages
    );

    Ok(BatchPlan {
        page_count,
        max_batch_pages,
        ranges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(plan: &BatchPlan) -> Vec<(u32, u32)> {
        plan.iter().map(|r| (r.start(), r.end())).collect()
    }

    #[test]
    fn test_plan_250_by_100() {
        let plan = plan(250, 100).unwrap();
        assert_eq!(bounds(&plan), vec![(1, 100), (101, 200), (201, 250)]);
    }

    #[test]
    fn test_plan_exact_fit() {
        assert_eq!(bounds(&plan(100, 100).unwrap()), vec![(1, 100)]);
    }

    #[test]
    fn test_plan_single_page() {
        assert_eq!(bounds(&plan(1, 100).unwrap()), vec![(1, 1)]);
    }

    #[test]
    fn test_plan_batch_of_one() {
        assert_eq!(bounds(&plan(3, 1).unwrap()), vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_plan_rejects_zero() {
        assert!(matches!(plan(0, 100), Err(Error::InvalidPlan(_))));
        assert!(matches!(plan(10, 0), Err(Error::InvalidPlan(_))));
    }

    #[test]
    fn test_plan_huge_batch_size() {
        let plan = plan(u32::MAX, u32::MAX).unwrap();
        assert_eq!(bounds(&plan), vec![(1, u32::MAX)]);
    }

    #[test]
    fn test_plan_covers_document() {
        for page_count in 1..=120u32 {
            for max in [1u32, 2, 3, 7, 10, 50, 99, 100, 101, 200] {
                let plan = plan(page_count, max).unwrap();
                let ranges = plan.ranges();

                assert_eq!(ranges.len() as u32, page_count.div_ceil(max));
                assert_eq!(ranges.first().unwrap().start(), 1);
                assert_eq!(ranges.last().unwrap().end(), page_count);
                assert!(ranges.iter().all(|r| r.len() <= max));
                for pair in ranges.windows(2) {
                    assert_eq!(pair[0].end() + 1, pair[1].start());
                }
                let covered: u32 = ranges.iter().map(|r| r.len()).sum();
                assert_eq!(covered, page_count);
            }
        }
    }

    #[test]
    fn test_check_covers() {
        let plan = plan(250, 100).unwrap();
        assert!(plan.check_covers(250).is_ok());
        assert!(matches!(plan.check_covers(251), Err(Error::InvalidPlan(_))));
    }

    #[test]
    fn test_check_covers_rejects_gaps_and_short_plans() {
        let range = |start, end| PageRange::new(start, end).unwrap();
        let with_ranges = |ranges: Vec<PageRange>| BatchPlan {
            page_count: 5,
            max_batch_pages: 2,
            ranges,
        };

        let short = with_ranges(vec![range(1, 2)]);
        assert!(short.check_covers(5).unwrap_err().to_string().contains("stops at page 2"));

        let gap = with_ranges(vec![range(1, 2), range(4, 5)]);
        assert!(gap.check_covers(5).is_err());

        let overlap = with_ranges(vec![range(1, 2), range(2, 3), range(4, 5)]);
        assert!(overlap.check_covers(5).is_err());

        let oversized = with_ranges(vec![range(1, 3), range(4, 5)]);
        assert!(oversized.check_covers(5).is_err());

        assert!(with_ranges(Vec::new()).check_covers(5).is_err());
        assert!(with_ranges(vec![range(1, 2), range(3, 4), range(5, 5)])
            .check_covers(5)
            .is_ok());
    }

    #[test]
    fn test_plan_is_deterministic() {
        assert_eq!(plan(1234, 100).unwrap(), plan(1234, 100).unwrap());
    }
}

//! Inclusive page ranges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{Error, Result};

/// An inclusive, 1-indexed page range (`start <= end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPageRange")]
pub struct PageRange {
    start: u32,
    end: u32,
}

/// Unchecked wire form; deserialization goes through [`PageRange::new`].
#[derive(Deserialize)]
struct RawPageRange {
    start: u32,
    end: u32,
}

impl TryFrom<RawPageRange> for PageRange {
    type Error = Error;

    fn try_from(raw: RawPageRange) -> Result<Self> {
        PageRange::new(raw.start, raw.end)
    }
}

impl PageRange {
    /// Create a range, rejecting page 0 and reversed bounds.
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start == 0 {
            return Err(Error::InvalidPlan("pages are numbered from 1".to_string()));
        }
        if start > end {
            return Err(Error::InvalidPlan(format!(
                "range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// First page of the range.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last page of the range.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of pages covered.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Always false; a range covers at least one page.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Check if a page number falls inside the range.
    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }

    /// Page numbers covered by the range.
    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "page {}", self.start)
        } else {
            write!(f, "pages {}-{}", self.start, self.end)
        }
    }
}

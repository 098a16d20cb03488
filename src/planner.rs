//! Reorder planning.
//!
//! Turns a page range specification into a [`Permutation`] of 0-based source
//! page indices. Specifications come in three shapes:
//!
//! - typed values ([`PageRange::single`], [`PageRange::range`])
//! - page-range strings such as `"3-4,1"` ([`parse_page_ranges`])
//! - JSON such as `[{"singlePage": 3}, {"start": 1, "end": 2}]` ([`from_json`])

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One element of a page range specification. Page numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRange {
    /// A single page
    Single {
        /// Page number
        #[serde(rename = "singlePage")]
        page: u64,
    },
    /// Pages `start..=end` in ascending order
    Range {
        /// First page
        start: u64,
        /// Last page (inclusive)
        end: u64,
    },
}

impl PageRange {
    /// A single page.
    pub fn single(page: u64) -> Self {
        PageRange::Single { page }
    }

    /// An inclusive range.
    pub fn range(start: u64, end: u64) -> Self {
        PageRange::Range { start, end }
    }

    /// Append the 0-based indices this element contributes.
    fn contribute(&self, page_count: usize, out: &mut Vec<usize>) -> Result<()> {
        let out_of_bounds = |page: u64| Error::PageOutOfBounds { page, page_count };
        let last = page_count as u64;

        match *self {
            PageRange::Single { page } => {
                if page == 0 || page > last {
                    return Err(out_of_bounds(page));
                }
                out.push((page - 1) as usize);
            },
            PageRange::Range { start, end } => {
                if start > end {
                    return Err(Error::invalid_range(
                        self.to_string(),
                        "start is greater than end",
                    ));
                }
                if start == 0 {
                    return Err(out_of_bounds(0));
                }
                if end > last {
                    return Err(out_of_bounds(start.max(last + 1)));
                }
                out.extend((start - 1) as usize..end as usize);
            },
        }
        Ok(())
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRange::Single { page } => write!(f, "{}", page),
            PageRange::Range { start, end } => write!(f, "{}-{}", start, end),
        }
    }
}

impl FromStr for PageRange {
    type Err = Error;

    /// Parse `p` or `a-b`, ignoring whitespace.
    fn from_str(s: &str) -> Result<Self> {
        let number = |text: &str| {
            text.trim()
                .parse::<u64>()
                .map_err(|_| Error::invalid_range(s.trim(), format!("'{}' is not a page number", text.trim())))
        };

        let item = s.trim();
        if item.is_empty() {
            return Err(Error::invalid_range(s, "empty item"));
        }

        match item.split_once('-') {
            Some((start, end)) => Ok(PageRange::range(number(start)?, number(end)?)),
            None => Ok(PageRange::single(number(item)?)),
        }
    }
}

/// Ordered 0-based source page indices; the output has one page per entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Permutation(Vec<usize>);

impl Permutation {
    /// Wrap raw indices without validation.
    pub fn new(indices: Vec<usize>) -> Self {
        Permutation(indices)
    }

    /// `0..page_count`.
    pub fn identity(page_count: usize) -> Self {
        Permutation((0..page_count).collect())
    }

    /// Number of output pages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the permutation is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The indices.
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Iterate over the indices.
    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.0.iter()
    }

    /// Unwrap into the indices.
    pub fn into_vec(self) -> Vec<usize> {
        self.0
    }

    /// Whether this keeps every page in its original position.
    pub fn is_identity(&self, page_count: usize) -> bool {
        self.0.len() == page_count && self.0.iter().enumerate().all(|(i, &p)| i == p)
    }
}

impl<'a> IntoIterator for &'a Permutation {
    type Item = &'a usize;
    type IntoIter = std::slice::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Validate `ranges` against a document of `page_count` pages.
///
/// Elements are processed in order and the first error wins.
///
/// # Errors
///
/// - [`Error::EmptySpecification`] when `ranges` is empty
/// - [`Error::InvalidRange`] for a range whose start exceeds its end
/// - [`Error::PageOutOfBounds`] naming the first page outside `1..=page_count`
///
/// # Example
///
/// ```
/// use pdf_reorder::planner::{plan, PageRange};
///
/// let permutation = plan(4, &[PageRange::range(3, 4), PageRange::single(1)]).unwrap();
/// assert_eq!(permutation.as_slice(), &[2, 3, 0]);
/// ```
pub fn plan(page_count: usize, ranges: &[PageRange]) -> Result<Permutation> {
    if ranges.is_empty() {
        return Err(Error::EmptySpecification);
    }

    let mut indices = Vec::new();
    for range in ranges {
        range.contribute(page_count, &mut indices)?;
    }

    log::debug!(
        "Planned {} output pages from {} source pages",
        indices.len(),
        page_count
    );
    Ok(Permutation(indices))
}

/// Parse a comma-separated page-range string such as `"3-4,1"`.
///
/// # Errors
///
/// [`Error::EmptySpecification`] for an empty or blank string and
/// [`Error::InvalidRange`] for an empty item or non-numeric text.
pub fn parse_page_ranges(text: &str) -> Result<Vec<PageRange>> {
    if text.trim().is_empty() {
        return Err(Error::EmptySpecification);
    }
    text.split(',').map(str::parse).collect()
}

/// Parse a JSON array of `{"singlePage": p}` and `{"start": a, "end": b}` objects.
///
/// # Errors
///
/// [`Error::InvalidRange`] when the JSON does not have that shape.
pub fn from_json(json: &str) -> Result<Vec<PageRange>> {
    serde_json::from_str(json).map_err(|e| Error::invalid_range(json.trim(), e.to_string()))
}

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// 0-based position of a page in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(pub u32);

/// 1-based page number. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PageNumber(u32);

impl PageIndex {
    pub fn to_number(self) -> PageNumber {
        PageNumber(self.0.saturating_add(1))
    }
}

impl PageNumber {
    pub fn new(n: u32) -> Option<Self> {
        (n >= 1).then_some(PageNumber(n))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn to_index(self) -> PageIndex {
        PageIndex(self.0 - 1)
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed interval of page numbers, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    pub start: PageNumber,
    pub end: PageNumber,
}

impl PageRange {
    pub fn pages(&self) -> impl Iterator<Item = PageNumber> {
        (self.start.0..=self.end.0).map(PageNumber)
    }

    pub fn len(&self) -> u32 {
        self.end.0 - self.start.0 + 1
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Page ranges for the two halves of a split.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitRanges {
    pub selected: Vec<PageRange>,
    pub unselected: Vec<PageRange>,
}

/// Compute the ranges used to split a document.
///
/// Numbers outside `1..=total_pages` are dropped. An empty selection, or one
/// that covers every page, yields a single range over the whole document and
/// no unselected ranges.
pub fn build_ranges(selected: &[u32], unselected: &[u32], total_pages: u32) -> SplitRanges {
    if total_pages == 0 {
        return SplitRanges::default();
    }

    let selected = within_bounds(selected, total_pages);
    if selected.is_empty() || selected.len() == total_pages as usize {
        return SplitRanges {
            selected: vec![PageRange {
                start: PageNumber(1),
                end: PageNumber(total_pages),
            }],
            unselected: Vec::new(),
        };
    }

    let unselected = within_bounds(unselected, total_pages);
    SplitRanges {
        selected: merge_contiguous(selected),
        unselected: merge_contiguous(unselected),
    }
}

fn within_bounds(numbers: &[u32], total_pages: u32) -> BTreeSet<u32> {
    numbers
        .iter()
        .copied()
        .filter(|&n| n >= 1 && n <= total_pages)
        .collect()
}

/// Merge page numbers into the minimal ascending list of ranges. Zero is ignored.
pub fn merge_contiguous<I: IntoIterator<Item = u32>>(numbers: I) -> Vec<PageRange> {
    let sorted: BTreeSet<u32> = numbers.into_iter().filter(|&n| n >= 1).collect();

    let mut ranges: Vec<PageRange> = Vec::new();
    for n in sorted {
        match ranges.last_mut() {
            Some(last) if last.end.0 + 1 == n => last.end = PageNumber(n),
            _ => ranges.push(PageRange {
                start: PageNumber(n),
                end: PageNumber(n),
            }),
        }
    }
    ranges
}

/// Flatten ranges back into page numbers, in range order.
pub fn expand_ranges(ranges: &[PageRange]) -> Vec<u32> {
    ranges
        .iter()
        .flat_map(|r| r.pages())
        .map(PageNumber::get)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PageRef {
    Number(u32),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PageSpan {
    start: PageRef,
    end: Option<PageRef>,
}

impl PageSpan {
    /// Parse a span like "1-5", "9-6", "1-end" or "7"
    fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow!("Empty page range"));
        }

        if let Some(dash_pos) = s.find('-') {
            // "-5" is not a range
            if dash_pos == 0 {
                return Err(anyhow!("Invalid page range: {}", s));
            }

            Ok(PageSpan {
                start: parse_page_ref(&s[..dash_pos])?,
                end: Some(parse_page_ref(&s[dash_pos + 1..])?),
            })
        } else {
            Ok(PageSpan {
                start: parse_page_ref(s)?,
                end: None,
            })
        }
    }

    fn expand(&self, total_pages: u32) -> Result<Vec<PageNumber>> {
        let resolve = |r: &PageRef| match r {
            PageRef::Number(n) => *n,
            PageRef::End => total_pages,
        };
        let start = resolve(&self.start);
        let end = self.end.as_ref().map(resolve).unwrap_or(start);

        for page in [start, end] {
            if page == 0 {
                return Err(anyhow!("Page numbers must be >= 1"));
            }
            if page > total_pages {
                return Err(anyhow!(
                    "Page {} exceeds total pages {}",
                    page,
                    total_pages
                ));
            }
        }

        let pages: Vec<u32> = if start <= end {
            (start..=end).collect()
        } else {
            (end..=start).rev().collect()
        };
        Ok(pages.into_iter().map(PageNumber).collect())
    }
}

fn parse_page_ref(s: &str) -> Result<PageRef> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("end") {
        Ok(PageRef::End)
    } else {
        s.parse::<u32>()
            .map(PageRef::Number)
            .map_err(|_| anyhow!("Invalid page number: {}", s))
    }
}

/// Expand a page list like "1-5,10,15-end" into page numbers, in the order given.
pub fn parse_page_list(s: &str, total_pages: u32) -> Result<Vec<PageNumber>> {
    let mut pages = Vec::new();
    for part in s.split(',') {
        pages.extend(PageSpan::parse(part)?.expand(total_pages)?);
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> PageRange {
        PageRange {
            start: PageNumber(start),
            end: PageNumber(end),
        }
    }

    fn covered(ranges: &[PageRange]) -> BTreeSet<u32> {
        expand_ranges(ranges).into_iter().collect()
    }

    #[test]
    fn test_index_number_conversion() {
        assert_eq!(PageIndex(0).to_number().get(), 1);
        assert_eq!(PageNumber::new(5).unwrap().to_index(), PageIndex(4));
        assert_eq!(PageNumber::new(0), None);
    }

    #[test]
    fn test_contiguous_merge() {
        let ranges = build_ranges(&[1, 2, 3, 5, 6], &[4], 6);
        assert_eq!(ranges.selected, vec![range(1, 3), range(5, 6)]);
        assert_eq!(ranges.unselected, vec![range(4, 4)]);
    }

    #[test]
    fn test_empty_selection_collapses() {
        let ranges = build_ranges(&[], &[1, 2, 3], 3);
        assert_eq!(ranges.selected, vec![range(1, 3)]);
        assert!(ranges.unselected.is_empty());
    }

    #[test]
    fn test_full_selection_collapses() {
        let ranges = build_ranges(&[3, 1, 2, 2], &[], 3);
        assert_eq!(ranges.selected, vec![range(1, 3)]);
        assert!(ranges.unselected.is_empty());
    }

    #[test]
    fn test_out_of_bounds_dropped() {
        let ranges = build_ranges(&[0, 2, 9], &[1, 3, 4, 7], 4);
        assert_eq!(ranges.selected, vec![range(2, 2)]);
        assert_eq!(ranges.unselected, vec![range(1, 1), range(3, 4)]);

        // Only out-of-range numbers selected: same as an empty selection.
        let ranges = build_ranges(&[10, 11], &[1, 2], 2);
        assert_eq!(ranges.selected, vec![range(1, 2)]);
        assert!(ranges.unselected.is_empty());
    }

    #[test]
    fn test_zero_pages() {
        let ranges = build_ranges(&[1], &[2], 0);
        assert!(ranges.selected.is_empty());
        assert!(ranges.unselected.is_empty());
    }

    #[test]
    fn test_ranges_are_sorted_disjoint_and_cover_input() {
        let selected = [9, 3, 4, 12, 1, 10, 3, 15];
        let unselected = [2, 5, 6, 7, 8, 11, 13, 14, 0, 40];
        let ranges = build_ranges(&selected, &unselected, 15);

        for side in [&ranges.selected, &ranges.unselected] {
            for pair in side.windows(2) {
                assert!(pair[0].end.get() + 1 < pair[1].start.get());
            }
            for r in side.iter() {
                assert!(r.start <= r.end);
            }
        }

        assert_eq!(covered(&ranges.selected), within_bounds(&selected, 15));
        assert_eq!(covered(&ranges.unselected), within_bounds(&unselected, 15));
        assert_eq!(ranges, build_ranges(&selected, &unselected, 15));
    }

    #[test]
    fn test_range_display() {
        assert_eq!(range(4, 4).to_string(), "4");
        assert_eq!(range(1, 3).to_string(), "1-3");
        assert_eq!(range(1, 3).len(), 3);
    }

    #[test]
    fn test_parse_page_list() {
        let pages: Vec<u32> = parse_page_list("1-3,7,9-end", 10)
            .unwrap()
            .into_iter()
            .map(PageNumber::get)
            .collect();
        assert_eq!(pages, vec![1, 2, 3, 7, 9, 10]);
    }

    #[test]
    fn test_parse_reverse_span() {
        let pages: Vec<u32> = parse_page_list("5-3", 10)
            .unwrap()
            .into_iter()
            .map(PageNumber::get)
            .collect();
        assert_eq!(pages, vec![5, 4, 3]);
    }

    #[test]
    fn test_parse_rejects_bad_pages() {
        assert!(parse_page_list("0", 10).is_err());
        assert!(parse_page_list("15", 10).is_err());
        assert!(parse_page_list("-5", 10).is_err());
        assert!(parse_page_list("abc", 10).is_err());
    }
}

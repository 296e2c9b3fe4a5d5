//! Page selections such as `1,3,5-10`, `all`, `odd` or `even`.

use std::fmt;
use std::str::FromStr;

use crate::error::{PdfSmithError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageItem {
    Single(u32),
    Range(u32, u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    All,
    Odd,
    Even,
    Items(Vec<PageItem>),
}

/// A parsed page selection.
///
/// Parsing only checks syntax; bounds are checked against a document by
/// [`resolve`](Self::resolve). Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    text: String,
    selector: Selector,
}

impl PageSelection {
    /// Parse a selection.
    ///
    /// Accepts `all`, `odd`, `even` (any case), or a comma-separated list of
    /// pages and `start-end` ranges. Empty list entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PdfSmithError::InvalidPageRange`] for malformed entries or
    /// a selection with no entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdfsmith::split::PageSelection;
    ///
    /// let selection = PageSelection::parse("5-6, 1,3").unwrap();
    /// assert_eq!(selection.resolve(10).unwrap(), vec![1, 3, 5, 6]);
    /// assert_eq!(PageSelection::parse("even").unwrap().resolve(5).unwrap(), vec![2, 4]);
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let normalized = text.trim().to_lowercase();
        let invalid = |reason: String| PdfSmithError::invalid_page_range(text, reason);

        let selector = match normalized.as_str() {
            "all" => Selector::All,
            "odd" => Selector::Odd,
            "even" => Selector::Even,
            _ => {
                let mut items = Vec::new();
                for part in normalized.split(',').map(str::trim) {
                    if part.is_empty() {
                        continue;
                    }

                    if let Some((start, end)) = part.split_once('-') {
                        let start = parse_number(start)
                            .ok_or_else(|| invalid(format!("Invalid range: {part}")))?;
                        let end = parse_number(end)
                            .ok_or_else(|| invalid(format!("Invalid range: {part}")))?;
                        items.push(PageItem::Range(start, end));
                    } else {
                        let page = parse_number(part)
                            .ok_or_else(|| invalid(format!("Invalid page number: {part}")))?;
                        items.push(PageItem::Single(page));
                    }
                }

                if items.is_empty() {
                    return Err(invalid(format!("No pages specified: {}", text.trim())));
                }
                Selector::Items(items)
            }
        };

        Ok(Self {
            text: text.trim().to_string(),
            selector,
        })
    }

    /// The selection as typed.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Resolve against a document of `total` pages.
    ///
    /// Returns sorted, deduplicated 1-based page numbers.
    ///
    /// # Errors
    ///
    /// Returns [`PdfSmithError::InvalidPageRange`] if an entry falls outside
    /// `1..=total`, a range runs backwards, or nothing is selected.
    pub fn resolve(&self, total: u32) -> Result<Vec<u32>> {
        let invalid = |reason: String| PdfSmithError::invalid_page_range(&self.text, reason);

        let mut pages: Vec<u32> = match &self.selector {
            Selector::All => (1..=total).collect(),
            Selector::Odd => (1..=total).step_by(2).collect(),
            Selector::Even => (2..=total).step_by(2).collect(),
            Selector::Items(items) => {
                let mut pages = Vec::new();
                for item in items {
                    match *item {
                        PageItem::Single(page) => {
                            if page < 1 || page > total {
                                return Err(invalid(format!(
                                    "Invalid page: {page} (valid: 1-{total})"
                                )));
                            }
                            pages.push(page);
                        }
                        PageItem::Range(start, end) => {
                            if start < 1 || end > total || start > end {
                                return Err(invalid(format!(
                                    "Invalid range: {start}-{end} (valid: 1-{total})"
                                )));
                            }
                            pages.extend(start..=end);
                        }
                    }
                }
                pages
            }
        };

        pages.sort_unstable();
        pages.dedup();

        if pages.is_empty() {
            return Err(invalid("No pages selected (document has no pages)".to_string()));
        }
        Ok(pages)
    }
}

fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for PageSelection {
    type Err = PdfSmithError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

//! The `pagination` formatter.
//!
//! ```text
//! {query:recent-posts|pagination posts 10}
//! {.repeated section posts-page}…{.end}
//! {.section posts-next-page}<a href="?posts-page={@}">older</a>{.end}
//! ```
//!
//! The formatter writes nothing. It slices its input down to the current page
//! and publishes the slice and the navigation numbers into the render data,
//! so it must come before the repeated section that reads `<key>-page`.

use std::io::Write;

use crate::data::TemplateData;
use crate::error::FormatError;
use crate::format::split_args;
use crate::value::Value;

/// Data key (and request parameter) holding the current page.
pub fn page_key(key: &str) -> String {
    format!("{key}-page")
}

pub fn next_page_key(key: &str) -> String {
    format!("{key}-next-page")
}

pub fn prev_page_key(key: &str) -> String {
    format!("{key}-prev-page")
}

pub fn total_pages_key(key: &str) -> String {
    format!("{key}-total-pages")
}

/// Where one page falls within a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    pub total_pages: usize,
    /// Index of the first row on this page, clamped to the row count.
    pub offset: usize,
    /// Rows on this page; zero for a page past the end.
    pub len: usize,
}

impl Page {
    /// Locate page `requested` (1-based; anything below 1 means 1) of
    /// `total_rows` rows split into pages of `page_size`.
    pub fn compute(total_rows: usize, page_size: usize, requested: Option<i64>) -> Page {
        let page_size = page_size.max(1);
        let number = requested
            .filter(|&p| p >= 1)
            .and_then(|p| usize::try_from(p).ok())
            .unwrap_or(1);
        let total_pages = total_rows.div_ceil(page_size);
        let offset = (number - 1).saturating_mul(page_size).min(total_rows);
        let len = page_size.min(total_rows - offset);
        Page {
            number,
            total_pages,
            offset,
            len,
        }
    }

    pub fn prev(&self) -> Option<usize> {
        (self.number > 1).then(|| self.number - 1)
    }

    pub fn next(&self) -> Option<usize> {
        (self.number < self.total_pages).then(|| self.number + 1)
    }
}

struct PaginationArgs<'a> {
    key: &'a str,
    page_size: usize,
    current_page: Option<i64>,
}

impl<'a> PaginationArgs<'a> {
    fn parse(args: &'a str) -> Result<Self, FormatError> {
        let params = split_args(args);
        let (key, size) = match params.as_slice() {
            [key, size] | [key, size, _] => (*key, *size),
            _ => {
                return Err(FormatError::args(
                    "pagination takes a key, a page size and an optional current page",
                ))
            }
        };
        let page_size = match size.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(FormatError::args(format!(
                    "pagination page size {size:?} must be a positive integer"
                )))
            }
        };
        let current_page = match params.get(2) {
            Some(page) => Some(page.parse::<i64>().map_err(|_| {
                FormatError::args(format!("pagination current page {page:?} is not a number"))
            })?),
            None => None,
        };
        Ok(PaginationArgs {
            key,
            page_size,
            current_page,
        })
    }
}

/// `pagination key pageSize [currentPage]`.
pub fn pagination_formatter(
    _w: &mut dyn Write,
    args: &str,
    data: &mut TemplateData<'_>,
    values: &[Value],
) -> Result<(), FormatError> {
    let args = PaginationArgs::parse(args)?;
    let rows = match values.first() {
        Some(Value::List(rows)) => rows,
        Some(other) => {
            return Err(FormatError::value(format!(
                "pagination expects a list of rows, got a {}",
                other.kind()
            )))
        }
        None => return Ok(()),
    };

    let requested = args.current_page.or_else(|| {
        data.request_param(&page_key(args.key))
            .and_then(|p| p.trim().parse::<i64>().ok())
    });
    let page = Page::compute(rows.len(), args.page_size, requested);
    tracing::debug!(
        key = args.key,
        page = page.number,
        total_pages = page.total_pages,
        rows = page.len,
        "paginated"
    );

    data.insert(
        page_key(args.key),
        rows.slice(page.offset..page.offset + page.len),
    );
    data.insert(total_pages_key(args.key), page.total_pages as i64);
    match page.prev() {
        Some(prev) => data.insert(prev_page_key(args.key), prev as i64),
        None => {
            data.remove(&prev_page_key(args.key));
        }
    }
    match page.next() {
        Some(next) => data.insert(next_page_key(args.key), next as i64),
        None => {
            data.remove(&next_page_key(args.key));
        }
    }
    Ok(())
}

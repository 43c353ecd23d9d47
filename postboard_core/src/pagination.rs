//! Fixed-size, 1-indexed pages over an ordered query.
//!
//! Page selection is forgiving: a missing or garbled `page` parameter lands on
//! the first page and any out-of-range integer lands on the last one, so a
//! feed request never fails because of its page number.

use sea_orm::{ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, Select};
use serde::Serialize;

/// A parsed `page` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageNumber {
    /// Absent or not an integer.
    #[default]
    First,
    /// An integer, not yet checked against the page count.
    Requested(i64),
    /// An integer too large to represent; always past the end.
    Overflow,
}

impl PageNumber {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return PageNumber::First;
        };

        match raw.parse::<i64>() {
            Ok(n) => PageNumber::Requested(n),
            Err(_) if is_integer_literal(raw) => PageNumber::Overflow,
            Err(_) => PageNumber::First,
        }
    }

    /// Clamp to `1..=total_pages`.
    pub fn resolve(self, total_pages: u64) -> u64 {
        match self {
            PageNumber::First => 1,
            PageNumber::Requested(n) if n >= 1 && (n as u64) <= total_pages => n as u64,
            PageNumber::Requested(_) | PageNumber::Overflow => total_pages,
        }
    }
}

impl From<u64> for PageNumber {
    fn from(n: u64) -> Self {
        i64::try_from(n)
            .map(PageNumber::Requested)
            .unwrap_or(PageNumber::Overflow)
    }
}

fn is_integer_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `ceil(count / page_size)`, never less than one.
pub fn total_pages(count: u64, page_size: u64) -> u64 {
    count.div_ceil(page_size.max(1)).max(1)
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub total_pages: u64,
    pub total_count: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: u64, total_pages: u64, total_count: u64) -> Self {
        Self {
            items,
            number,
            total_pages,
            total_count,
            has_next: number < total_pages,
            has_prev: number > 1,
        }
    }

    /// The single page of an empty feed.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 1, 1, 0)
    }

    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            number: self.number,
            total_pages: self.total_pages,
            total_count: self.total_count,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

/// Run `select` one page at a time. The caller owns the ordering; it must be
/// total (ties broken by key) for pages to be stable across calls.
pub async fn paginate<E, C>(
    select: Select<E>,
    db: &C,
    page_size: u64,
    page: PageNumber,
) -> Result<Page<E::Model>, DbErr>
where
    E: EntityTrait,
    E::Model: Send + Sync + 'static,
    C: ConnectionTrait,
{
    let page_size = page_size.max(1);
    let paginator = select.paginate(db, page_size);

    let total_count = paginator.num_items().await?;
    let total_pages = total_pages(total_count, page_size);
    let number = page.resolve(total_pages);

    let items = paginator.fetch_page(number - 1).await?;

    Ok(Page::new(items, number, total_pages, total_count))
}

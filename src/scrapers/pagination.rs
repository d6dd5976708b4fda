use crate::error::{EtlError, Result};
use crate::models::PageBudget;
use once_cell::sync::Lazy;
use regex::Regex;

/// Listings shown on one index page
pub const PAGE_SIZE: u32 = 32;

/// Default number of pages per extraction pass
pub const DEFAULT_BATCH_SIZE: u32 = 100;

// "Liczba ogłoszeń: <!-- --><b>1 234</b>". Thousands groups are split by a
// single space, non-breaking space or thin space; anything after the number
// is not part of it.
static AD_COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"Liczba ogłoszeń:\s*(?:<!--\s*-->\s*)?(?:<b>\s*)?",
        r"(\d{1,3}(?:[ \x{a0}\x{2009}\x{202f}]\d{3})+|\d+)\b",
    ))
    .expect("ad count pattern is valid")
});

/// Read the advertisement count announced on an index page
pub fn find_ad_count(markup: &str) -> Result<u64> {
    let captures = AD_COUNT_RE.captures(markup).ok_or_else(|| {
        EtlError::Parse("could not find the number of ads on the index page".to_string())
    })?;

    let digits: String = captures[1].chars().filter(|c| c.is_ascii_digit()).collect();
    digits
        .parse::<u64>()
        .map_err(|e| EtlError::Parse(format!("invalid ad count '{}': {}", &captures[1], e)))
}

/// Number of index pages: `ceil(ad_count / 32)`
pub fn compute_page_count(markup: &str) -> Result<u32> {
    let ads = find_ad_count(markup)?;
    let pages = ads.div_ceil(u64::from(PAGE_SIZE));
    u32::try_from(pages).map_err(|_| EtlError::Parse(format!("page count {} out of range", pages)))
}

/// Split `[1, total_pages]` into consecutive inclusive intervals of at most
/// `batch_size` pages
pub fn plan_batches(total_pages: u32, batch_size: u32) -> Vec<PageBudget> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::new();
    let mut start = 1;

    while start <= total_pages {
        let end = start.saturating_add(batch_size - 1).min(total_pages);
        batches.push(PageBudget::new(start, end));
        if end == total_pages {
            break;
        }
        start = end + 1;
    }

    batches
}

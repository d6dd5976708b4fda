use crate::error::Result;
use crate::models::ListingRecord;
use crate::scrapers::types::{Headers, PageResponse, SearchFilter};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

/// Issues a single HTTP GET and hands back the raw markup.
///
/// Implementations must apply a request timeout and report it as a
/// transport error.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, headers: &Headers) -> Result<PageResponse>;
}

/// Supplies the identity headers for a run
pub trait HeaderProvider: Send + Sync {
    fn headers(&self) -> Result<Headers>;
}

/// Everything that depends on the classifieds site's markup and URL layout.
/// Swapping the site means swapping this, the engine stays untouched.
pub trait SourceAdapter: Send + Sync {
    /// Listing index URL for a filter and page, sorted most-recent-first
    fn listing_url(&self, filter: &SearchFilter, page: u32) -> String;

    /// Total number of index pages announced by the first page
    fn page_count(&self, markup: &str) -> Result<u32>;

    /// Raw listing nodes embedded in one page, in source order
    fn listings(&self, markup: &str) -> Result<Vec<Value>>;

    /// Flatten one raw listing node
    fn to_record(&self, node: &Value, scrape_date: NaiveDate) -> Result<ListingRecord>;

    /// Get the name of the source
    fn source_name(&self) -> &'static str;
}

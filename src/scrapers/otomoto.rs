use crate::error::Result;
use crate::models::ListingRecord;
use crate::scrapers::traits::SourceAdapter;
use crate::scrapers::types::SearchFilter;
use crate::scrapers::{embedded_state, normalizer, pagination};
use chrono::NaiveDate;
use serde_json::Value;
use url::Url;

const BASE_URL: &str = "https://www.otomoto.pl/osobowe";

/// Sort parameter the stop-date rule depends on: newest listings first
pub const SORT_PARAM: (&str, &str) = ("search[order]", "created_at_first:desc");

/// otomoto.pl passenger-car listings
#[derive(Debug, Clone)]
pub struct OtomotoAdapter {
    base_url: String,
}

impl OtomotoAdapter {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the adapter at another host, e.g. a local mirror
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for OtomotoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for OtomotoAdapter {
    /// One of four shapes: `/brand/model`, `/brand`, `/model` or the bare
    /// category, always with the sort and page parameters.
    fn listing_url(&self, filter: &SearchFilter, page: u32) -> String {
        let segments: Vec<&str> = [filter.brand.as_str(), filter.model.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();

        let mut url = match Url::parse(&self.base_url) {
            Ok(url) => url,
            Err(_) => {
                let mut raw = self.base_url.clone();
                for segment in &segments {
                    raw.push('/');
                    raw.push_str(segment);
                }
                return format!("{}?{}={}&page={}", raw, SORT_PARAM.0, SORT_PARAM.1, page);
            }
        };

        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.query_pairs_mut()
            .append_pair(SORT_PARAM.0, SORT_PARAM.1)
            .append_pair("page", &page.to_string());
        url.to_string()
    }

    fn page_count(&self, markup: &str) -> Result<u32> {
        pagination::compute_page_count(markup)
    }

    fn listings(&self, markup: &str) -> Result<Vec<Value>> {
        embedded_state::listing_edges(markup)
    }

    fn to_record(&self, node: &Value, scrape_date: NaiveDate) -> Result<ListingRecord> {
        normalizer::to_record(node, scrape_date)
    }

    fn source_name(&self) -> &'static str {
        "otomoto"
    }
}

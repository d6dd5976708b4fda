//! Paginated, date-bounded extraction.
//!
//! The engine walks the listing index page by page, most recent listings
//! first. In bounded mode the first listing created before the stop date
//! ends the whole run; everything collected up to that point is kept. A page
//! that fails to download or parse is logged and skipped, never fatal.

use crate::error::{EtlError, Result};
use crate::models::{ListingRecord, PageBudget, ResultTable};
use crate::scrapers::pagination::{self, DEFAULT_BATCH_SIZE};
use crate::scrapers::traits::{HeaderProvider, PageFetcher, SourceAdapter};
use crate::scrapers::types::{Headers, SearchFilter};
use chrono::{Days, Local, NaiveDate};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Randomized politeness delay: 1 to 5 units before each page fetch,
/// the index page included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub unit: Duration,
}

impl DelayPolicy {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn next_delay(&self) -> Duration {
        self.unit * fastrand::u32(1..=5)
    }

    async fn wait(&self) {
        let delay = self.next_delay();
        debug!("Waiting for {:?} before next page", delay);
        tokio::time::sleep(delay).await;
    }
}

/// Knobs of one extraction run
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Pages per extraction pass
    pub batch_size: u32,
    pub delay: Option<DelayPolicy>,
    /// Date the run considers "today"; the local date when unset
    pub today: Option<NaiveDate>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delay: None,
            today: None,
        }
    }
}

/// Why an extraction pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every planned page was visited
    Exhausted,
    /// A listing older than the stop date was reached
    StoppedByDate,
    /// The pass reached the end of its page budget
    StoppedByBudget,
}

/// Oldest creation date still in scope, `days_ago` days before `today`.
/// Negative `days_ago` disables the bound.
pub fn stop_date(days_ago: i64, today: NaiveDate) -> Option<NaiveDate> {
    let days = u64::try_from(days_ago).ok()?;
    Some(today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN))
}

/// Mutable state of one run
#[derive(Debug, Clone)]
pub struct ExtractionState {
    pub filter: SearchFilter,
    pub stop_date: Option<NaiveDate>,
    pub scrape_date: NaiveDate,
    /// Page currently being processed
    pub cursor: u32,
    pub table: ResultTable,
    pub forced_stop: bool,
    pub failed_pages: Vec<u32>,
}

impl ExtractionState {
    pub fn new(
        filter: SearchFilter,
        stop_date: Option<NaiveDate>,
        scrape_date: NaiveDate,
    ) -> Self {
        Self {
            filter,
            stop_date,
            scrape_date,
            cursor: 0,
            table: ResultTable::new(),
            forced_stop: false,
            failed_pages: Vec::new(),
        }
    }

    /// Strictly older than the stop date
    pub fn is_past_boundary(&self, record: &ListingRecord) -> bool {
        self.stop_date
            .map_or(false, |boundary| record.created_date < boundary)
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub table: ResultTable,
    pub pages_planned: u32,
    pub pages_visited: u32,
    pub failed_pages: Vec<u32>,
    pub forced_stop: bool,
    pub stop_reason: StopReason,
}

pub struct ExtractionEngine<F, A> {
    fetcher: F,
    adapter: A,
    identity: Box<dyn HeaderProvider>,
    options: EngineOptions,
}

impl<F: PageFetcher, A: SourceAdapter> ExtractionEngine<F, A> {
    pub fn new(fetcher: F, adapter: A, identity: impl HeaderProvider + 'static) -> Self {
        Self {
            fetcher,
            adapter,
            identity: Box::new(identity),
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Extract every in-scope listing for `filter`.
    ///
    /// Fails only when no page range can be established: identity headers,
    /// the index page fetch, or its ad count.
    pub async fn run(&self, filter: &SearchFilter, days_ago: i64) -> Result<ExtractionReport> {
        let headers = self.identity.headers()?;
        let today = self.options.today.unwrap_or_else(|| Local::now().date_naive());
        let mut state = ExtractionState::new(filter.clone(), stop_date(days_ago, today), today);

        info!(
            "Starting {} extraction for {} (stop date: {})",
            self.adapter.source_name(),
            filter.label(),
            state
                .stop_date
                .map_or_else(|| "none".to_string(), |d| d.to_string())
        );

        let index = self.fetch_page(filter, 1, &headers).await?;
        let total_pages = self.adapter.page_count(&index)?;
        let batches = pagination::plan_batches(total_pages, self.options.batch_size);
        info!("Found {} pages in {} batches", total_pages, batches.len());

        let mut prefetched = Some(index);
        let mut pages_visited = 0;
        let mut stop_reason = StopReason::Exhausted;

        for (i, budget) in batches.iter().enumerate() {
            if state.forced_stop {
                break;
            }
            let reason = self
                .extract_batch(&mut state, *budget, total_pages, &headers, prefetched.take())
                .await;
            pages_visited += state.cursor.saturating_sub(budget.start_page) + 1;

            stop_reason = match reason {
                StopReason::StoppedByBudget if i + 1 == batches.len() => StopReason::Exhausted,
                other => other,
            };
        }

        info!(
            "Extraction finished: {} listings from {} pages ({} failed, forced stop: {})",
            state.table.len(),
            pages_visited,
            state.failed_pages.len(),
            state.forced_stop
        );

        Ok(ExtractionReport {
            table: state.table,
            pages_planned: total_pages,
            pages_visited,
            failed_pages: state.failed_pages,
            forced_stop: state.forced_stop,
            stop_reason,
        })
    }

    /// Process one page budget. `prefetched` is the already downloaded body
    /// of page 1, if this budget starts there.
    pub async fn extract_batch(
        &self,
        state: &mut ExtractionState,
        budget: PageBudget,
        total_pages: u32,
        headers: &Headers,
        mut prefetched: Option<String>,
    ) -> StopReason {
        for page in budget.pages() {
            state.cursor = page;
            info!(
                "Extract data for: {}. Page number: {}/{}",
                state.filter.label(),
                page,
                total_pages
            );

            let body = match prefetched.take().filter(|_| page == 1) {
                Some(body) => body,
                None => match self.fetch_page(&state.filter, page, headers).await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("Page {} failed: {}", page, e);
                        state.failed_pages.push(page);
                        continue;
                    }
                },
            };

            match self.process_page(state, &body) {
                Ok(true) => return StopReason::StoppedByDate,
                Ok(false) => {}
                Err(e) => {
                    warn!("No car data on page {}: {}", page, e);
                    state.failed_pages.push(page);
                }
            }
        }

        StopReason::StoppedByBudget
    }

    async fn fetch_page(
        &self,
        filter: &SearchFilter,
        page: u32,
        headers: &Headers,
    ) -> Result<String> {
        if let Some(delay) = &self.options.delay {
            delay.wait().await;
        }

        let url = self.adapter.listing_url(filter, page);
        let response = self.fetcher.fetch(&url, headers).await?;
        if !response.is_success() {
            return Err(EtlError::Transport {
                url,
                reason: format!("unexpected status {}", response.status),
            });
        }
        Ok(response.body)
    }

    /// Append the page's in-scope listings. Returns true once a listing past
    /// the stop date is found.
    fn process_page(&self, state: &mut ExtractionState, body: &str) -> Result<bool> {
        let edges = self.adapter.listings(body)?;
        let before = state.table.len();

        for (idx, edge) in edges.iter().enumerate() {
            let record = match self.adapter.to_record(edge, state.scrape_date) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipped listing {} on page {}: {}", idx, state.cursor, e);
                    continue;
                }
            };

            if state.is_past_boundary(&record) {
                info!(
                    "Listing created {} is older than {}; stopping at page {}",
                    record.created_date,
                    state.stop_date.unwrap_or(NaiveDate::MIN),
                    state.cursor
                );
                state.forced_stop = true;
                return Ok(true);
            }
            state.table.push(record);
        }

        debug!(
            "Page {} added {} listings",
            state.cursor,
            state.table.len() - before
        );
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_stop_date_bounds() {
        let today = day(2024, 3, 1);
        assert_eq!(stop_date(0, today), Some(today));
        assert_eq!(stop_date(1, today), Some(day(2024, 2, 29)));
        assert_eq!(stop_date(-1, today), None);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let today = day(2024, 3, 10);
        let state = ExtractionState::new(SearchFilter::default(), stop_date(2, today), today);
        let mut record =
            crate::scrapers::normalizer::to_record(&serde_json::json!({}), today).unwrap();

        record.created_date = day(2024, 3, 8);
        assert!(!state.is_past_boundary(&record));
        record.created_date = day(2024, 3, 7);
        assert!(state.is_past_boundary(&record));
    }

    #[test]
    fn test_unbounded_never_past_boundary() {
        let today = day(2024, 3, 10);
        let state = ExtractionState::new(SearchFilter::default(), None, today);
        let record = crate::scrapers::normalizer::to_record(&serde_json::json!({}), today).unwrap();
        assert!(!state.is_past_boundary(&record));
    }

    #[test]
    fn test_delay_within_one_to_five_units() {
        let policy = DelayPolicy::new(Duration::from_millis(10));
        for _ in 0..50 {
            let d = policy.next_delay();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(50));
        }
    }
}

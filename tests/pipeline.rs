mod common;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{bare_page, listing, listing_page, StubFetcher};
use otomoto_etl::config::RunParams;
use otomoto_etl::error::{EtlError, Result};
use otomoto_etl::pipeline::EtlPipeline;
use otomoto_etl::scrapers::engine::EngineOptions;
use otomoto_etl::scrapers::{ExtractionEngine, OtomotoAdapter, StopReason, UserAgentPool};
use otomoto_etl::sink::{JsonLinesSink, LoadMode, Sink};
use otomoto_etl::transform::NormalizedTable;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn pipeline(fetcher: StubFetcher) -> EtlPipeline<StubFetcher, OtomotoAdapter> {
    let engine = ExtractionEngine::new(fetcher, OtomotoAdapter::new(), UserAgentPool::new())
        .with_options(EngineOptions {
            today: NaiveDate::from_ymd_opt(2024, 6, 10),
            ..EngineOptions::default()
        });
    EtlPipeline::new(engine)
}

/// Sink whose load always fails, recording whether it was closed
struct BrokenSink {
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Sink for BrokenSink {
    async fn load(&mut self, _table: &NormalizedTable, _mode: LoadMode) -> Result<usize> {
        Err(EtlError::Sink("disk full".to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn read_rows(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn test_daily_run_loads_normalized_rows() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("listings.jsonl");
    let fetcher = StubFetcher::new().page(
        1,
        listing_page(
            &[
                listing("Opel Astra", "2024-06-10", "opel", "2015"),
                listing("Opel Corsa", "2024-06-09", "opel", "2019"),
                listing("Opel Vectra", "2024-06-01", "opel", "2004"),
            ],
            Some(3),
        ),
    );

    let summary = pipeline(fetcher)
        .run(&RunParams::daily(), Box::new(JsonLinesSink::new(&out)))
        .await
        .unwrap();

    assert_eq!(summary.listings_extracted, 2);
    assert_eq!(summary.rows_loaded, 2);
    assert!(summary.forced_stop);
    assert_eq!(summary.stop_reason, StopReason::StoppedByDate);
    assert_eq!(summary.schema.extra, vec!["body_type".to_string()]);

    let rows = read_rows(&out);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["title"], "Opel Astra");
    assert_eq!(rows[0]["brand"], "opel");
    assert_eq!(rows[0]["car_age"], 9);
    assert_eq!(rows[0]["engine_capacity"], 1598.0);
    assert_eq!(rows[0]["scrape_date"], "2024-06-10");
    assert!(rows[0]["gearbox"].is_null());
    assert!(rows[0].get("make").is_none());
    assert!(rows[0].get("body_type").is_none());
}

#[tokio::test]
async fn test_append_twice_then_truncate() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("listings.jsonl");
    let page = || listing_page(&[listing("a", "2024-06-09", "bmw", "2020")], Some(1));

    let mut params = RunParams::full_backfill();
    for _ in 0..2 {
        pipeline(StubFetcher::new().page(1, page()))
            .run(&params, Box::new(JsonLinesSink::new(&out)))
            .await
            .unwrap();
    }
    assert_eq!(read_rows(&out).len(), 2);

    params.how_add = LoadMode::Truncate;
    pipeline(StubFetcher::new().page(1, page()))
        .run(&params, Box::new(JsonLinesSink::new(&out)))
        .await
        .unwrap();
    assert_eq!(read_rows(&out).len(), 1);
}

#[tokio::test]
async fn test_empty_extraction_leaves_table_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("listings.jsonl");
    std::fs::write(&out, "{\"title\":\"kept\"}\n").unwrap();

    let params = RunParams {
        how_add: LoadMode::Truncate,
        ..RunParams::full_backfill()
    };
    let summary = pipeline(StubFetcher::new().page(1, bare_page(Some(0))))
        .run(&params, Box::new(JsonLinesSink::new(&out)))
        .await
        .unwrap();

    assert_eq!(summary.rows_loaded, 0);
    assert_eq!(read_rows(&out).len(), 1);
}

#[tokio::test]
async fn test_fatal_extraction_error_fails_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("listings.jsonl");

    let err = pipeline(StubFetcher::new().page(1, bare_page(None)))
        .run(&RunParams::full_backfill(), Box::new(JsonLinesSink::new(&out)))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("number of ads"));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_sink_is_closed_when_load_fails() {
    let closed = Arc::new(AtomicBool::new(false));
    let sink = BrokenSink {
        closed: Arc::clone(&closed),
    };
    let fetcher = StubFetcher::new().page(
        1,
        listing_page(&[listing("a", "2024-06-09", "bmw", "2020")], Some(1)),
    );

    let err = pipeline(fetcher)
        .run(&RunParams::full_backfill(), Box::new(sink))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("disk full"));
    assert!(closed.load(Ordering::SeqCst));
}

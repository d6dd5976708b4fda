use crate::config::RunParams;
use crate::scrapers::engine::{ExtractionEngine, StopReason};
use crate::scrapers::traits::{PageFetcher, SourceAdapter};
use crate::sink::Sink;
use crate::transform::{SchemaNormalizer, SchemaReport};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// What a finished run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub listings_extracted: usize,
    pub rows_loaded: usize,
    pub pages_planned: u32,
    pub pages_visited: u32,
    pub failed_pages: Vec<u32>,
    pub forced_stop: bool,
    pub stop_reason: StopReason,
    pub schema: SchemaReport,
}

/// Extract, normalize, load
pub struct EtlPipeline<F, A> {
    engine: ExtractionEngine<F, A>,
    normalizer: SchemaNormalizer,
}

impl<F: PageFetcher, A: SourceAdapter> EtlPipeline<F, A> {
    pub fn new(engine: ExtractionEngine<F, A>) -> Self {
        Self {
            engine,
            normalizer: SchemaNormalizer::default(),
        }
    }

    /// Run once and hand the result to `sink`. Once extraction succeeds the
    /// sink is closed before returning, even when loading failed.
    pub async fn run(&self, params: &RunParams, mut sink: Box<dyn Sink>) -> Result<RunSummary> {
        let filter = params.filter();
        let report = self
            .engine
            .run(&filter, params.days_ago)
            .await
            .with_context(|| format!("extraction failed for {}", filter.label()))?;

        let (table, schema) = self.normalizer.normalize(&report.table);

        let loaded = if table.is_empty() {
            warn!("No listings extracted, nothing to load");
            Ok(0)
        } else {
            sink.load(&table, params.how_add).await
        };
        let closed = sink.close().await;

        let rows_loaded = loaded.context("failed to load listings")?;
        closed.context("failed to close sink")?;

        if !report.failed_pages.is_empty() {
            warn!(
                "{} pages yielded no data: {:?}",
                report.failed_pages.len(),
                report.failed_pages
            );
        }
        info!(
            "Run complete: {} listings extracted, {} rows loaded",
            report.table.len(),
            rows_loaded
        );

        Ok(RunSummary {
            listings_extracted: report.table.len(),
            rows_loaded,
            pages_planned: report.pages_planned,
            pages_visited: report.pages_visited,
            failed_pages: report.failed_pages,
            forced_stop: report.forced_stop,
            stop_reason: report.stop_reason,
            schema,
        })
    }
}

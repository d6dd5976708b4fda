use crate::error::{EtlError, Result};
use crate::scrapers::engine::{DelayPolicy, EngineOptions};
use crate::scrapers::pagination::DEFAULT_BATCH_SIZE;
use crate::scrapers::types::SearchFilter;
use crate::sink::LoadMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameters of one ETL run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunParams {
    pub brand: String,
    pub model: String,
    /// Only listings created within this many days; negative for a full backfill
    pub days_ago: i64,
    pub delay_scraping: bool,
    pub how_add: LoadMode,
}

impl RunParams {
    /// Every listing, no politeness delay
    pub fn full_backfill() -> Self {
        Self {
            brand: String::new(),
            model: String::new(),
            days_ago: -1,
            delay_scraping: false,
            how_add: LoadMode::Append,
        }
    }

    /// Listings added since yesterday, with delays between pages
    pub fn daily() -> Self {
        Self {
            days_ago: 1,
            delay_scraping: true,
            ..Self::full_backfill()
        }
    }

    pub fn filter(&self) -> SearchFilter {
        SearchFilter::new(self.brand.clone(), self.model.clone())
    }
}

/// Run parameters as they appear in a config file; all are required
#[derive(Debug, Deserialize)]
struct RawRunParams {
    brand: Option<String>,
    model: Option<String>,
    days_ago: Option<i64>,
    delay_scraping: Option<bool>,
    how_add: Option<String>,
}

fn required<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| {
        EtlError::Configuration(format!("missing required run parameter '{}'", name))
    })
}

impl TryFrom<RawRunParams> for RunParams {
    type Error = EtlError;

    fn try_from(raw: RawRunParams) -> Result<Self> {
        Ok(Self {
            brand: required(raw.brand, "brand")?.trim().to_string(),
            model: required(raw.model, "model")?.trim().to_string(),
            days_ago: required(raw.days_ago, "days_ago")?,
            delay_scraping: required(raw.delay_scraping, "delay_scraping")?,
            how_add: required(raw.how_add, "how_add")?.parse()?,
        })
    }
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_delay_unit_ms() -> u64 {
    1000
}

fn default_output() -> PathBuf {
    PathBuf::from("data/otomoto_listings.jsonl")
}

/// Engine and sink settings; every field has a default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// One unit of the 1-5 unit politeness delay
    #[serde(default = "default_delay_unit_ms")]
    pub delay_unit_ms: u64,
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            request_timeout_secs: default_timeout_secs(),
            delay_unit_ms: default_delay_unit_ms(),
            output: default_output(),
        }
    }
}

impl EngineSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn engine_options(&self, params: &RunParams) -> EngineOptions {
        EngineOptions {
            batch_size: self.batch_size,
            delay: params
                .delay_scraping
                .then(|| DelayPolicy::new(Duration::from_millis(self.delay_unit_ms))),
            today: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    run: Option<RawRunParams>,
    #[serde(default)]
    engine: Option<EngineSettings>,
}

/// Complete configuration of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub run: RunParams,
    pub engine: EngineSettings,
}

impl Config {
    pub fn new(run: RunParams) -> Self {
        Self {
            run,
            engine: EngineSettings::default(),
        }
    }

    /// Parse a JSON config: `{"run": {...}, "engine": {...}}`
    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: RawConfig = serde_json::from_str(raw)
            .map_err(|e| EtlError::Configuration(format!("invalid config: {}", e)))?;
        let run = parsed
            .run
            .ok_or_else(|| EtlError::Configuration("missing 'run' section".to_string()))?;

        let config = Self {
            run: RunParams::try_from(run)?,
            engine: parsed.engine.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Configuration(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.batch_size == 0 {
            return Err(EtlError::Configuration("batch_size must be at least 1".to_string()));
        }
        if self.engine.request_timeout_secs == 0 {
            return Err(EtlError::Configuration(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

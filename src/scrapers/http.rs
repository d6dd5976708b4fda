use crate::error::{EtlError, Result};
use crate::scrapers::traits::{HeaderProvider, PageFetcher};
use crate::scrapers::types::{Headers, PageResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DESKTOP_AGENTS: &[&str] = &[
    concat!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ),
    concat!(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ),
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    concat!(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    ),
    concat!(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 ",
        "(KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    ),
];

const MOBILE_AGENTS: &[&str] = &[
    concat!(
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 ",
        "(KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    ),
    concat!(
        "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
    ),
    concat!(
        "Mozilla/5.0 (Linux; Android 13; SM-S911B) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/122.0.0.0 Mobile Safari/537.36",
    ),
];

/// Picks a random desktop or mobile user agent per call
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl UserAgentPool {
    pub fn new() -> Self {
        Self::from_agents(DESKTOP_AGENTS.iter().chain(MOBILE_AGENTS).map(|s| s.to_string()))
    }

    pub fn from_agents(agents: impl IntoIterator<Item = String>) -> Self {
        Self {
            agents: agents.into_iter().filter(|a| !a.trim().is_empty()).collect(),
        }
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderProvider for UserAgentPool {
    fn headers(&self) -> Result<Headers> {
        if self.agents.is_empty() {
            return Err(EtlError::Identity("user agent pool is empty".to_string()));
        }
        let agent = &self.agents[fastrand::usize(..self.agents.len())];

        let mut headers = Headers::new();
        headers.insert("User-Agent".to_string(), agent.clone());
        headers.insert(
            "Accept-Language".to_string(),
            "pl-PL,pl;q=0.9,en;q=0.8".to_string(),
        );
        Ok(headers)
    }
}

/// reqwest-backed page fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EtlError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, headers: &Headers) -> Result<PageResponse> {
        debug!("Fetching URL: {}", url);

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let transport = |reason: String| EtlError::Transport {
            url: url.to_string(),
            reason,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                transport("request timed out".to_string())
            } else {
                transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Failed to fetch page: {}", status);
            return Err(transport(format!("unexpected status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport(format!("failed to read response body: {}", e)))?;

        debug!("Downloaded {} bytes of HTML", body.len());

        Ok(PageResponse {
            status: status.as_u16(),
            body,
        })
    }
}

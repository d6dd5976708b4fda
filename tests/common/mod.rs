#![allow(dead_code)]

use async_trait::async_trait;
use otomoto_etl::error::{EtlError, Result};
use otomoto_etl::scrapers::types::{Headers, PageResponse};
use otomoto_etl::scrapers::PageFetcher;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Serves canned pages keyed by the `page` query parameter
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<u32, PageResponse>,
    fetched: Mutex<Vec<u32>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32, body: String) -> Self {
        self.pages.insert(page, PageResponse { status: 200, body });
        self
    }

    pub fn status(mut self, page: u32, status: u16) -> Self {
        self.pages.insert(
            page,
            PageResponse {
                status,
                body: String::new(),
            },
        );
        self
    }

    pub fn fetched(&self) -> Vec<u32> {
        self.fetched.lock().unwrap().clone()
    }
}

fn page_number(url: &str) -> u32 {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
        })
        .unwrap_or(1)
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str, headers: &Headers) -> Result<PageResponse> {
        assert!(headers.contains_key("User-Agent"));
        let page = page_number(url);
        self.fetched.lock().unwrap().push(page);
        self.pages.get(&page).cloned().ok_or_else(|| EtlError::Transport {
            url: url.to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

/// An `advertSearch` edge created on `created` ("YYYY-MM-DD")
pub fn listing(title: &str, created: &str, make: &str, year: &str) -> Value {
    json!({
        "node": {
            "createdAt": format!("{}T09:30:00Z", created),
            "title": title,
            "shortDescription": "1.6 benzyna",
            "price": { "amount": { "units": 25000, "currencyCode": "PLN" } },
            "cepikVerified": true,
            "parameters": [
                { "key": "make", "value": make },
                { "key": "year", "value": year },
                { "key": "engine_capacity", "value": "1 598,00" },
                { "key": "body_type", "value": "sedan" }
            ]
        }
    })
}

fn search_blob(edges: &[Value]) -> Value {
    json!({ "data": json!({ "advertSearch": { "edges": edges } }).to_string() })
}

fn wrap(state: Value, ad_count: Option<u32>) -> String {
    let payload = json!({ "props": { "pageProps": { "urqlState": state } } });
    let count = ad_count
        .map(|n| format!("<p>Liczba ogłoszeń:<!-- --> <b>{}</b></p>", n))
        .unwrap_or_default();
    format!(
        concat!(
            r#"<html><head><script id="__NEXT_DATA__" type="application/json">"#,
            "{}</script></head><body>{}</body></html>",
        ),
        payload, count
    )
}

/// A listing page whose live data sits under the last cache key
pub fn listing_page(edges: &[Value], ad_count: Option<u32>) -> String {
    wrap(
        json!({
            "filters": { "data": json!({ "filters": [] }).to_string() },
            "search": search_blob(edges),
        }),
        ad_count,
    )
}

/// A listing page whose last cache key lacks listing data
pub fn first_key_page(edges: &[Value]) -> String {
    wrap(
        json!({
            "search": search_blob(edges),
            "tracking": { "data": json!({ "experiments": {} }).to_string() },
        }),
        None,
    )
}

/// A page without the embedded state element
pub fn bare_page(ad_count: Option<u32>) -> String {
    let count = ad_count
        .map(|n| format!("<p>Liczba ogłoszeń: {}</p>", n))
        .unwrap_or_default();
    format!("<html><body><h1>Nowy wygląd</h1>{}</body></html>", count)
}

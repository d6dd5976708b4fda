//! Recovery of the server-rendered state embedded in listing pages.
//!
//! Listing pages ship their data as a Next.js `__NEXT_DATA__` script. The
//! listings live under `props.pageProps.urqlState`, a map of opaque cache
//! keys whose blobs hold a JSON string with `advertSearch.edges`. Which key
//! carries the live search is not fixed: the last inserted key usually does,
//! the first one is the fallback. Picking the wrong key drops a page
//! silently, so every fallback is logged.

use crate::error::{EtlError, Result};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

/// Identifier of the script element carrying the embedded state
pub const STATE_ELEMENT_ID: &str = "__NEXT_DATA__";

fn state_selector() -> Selector {
    Selector::parse("script#__NEXT_DATA__").expect("state selector is valid")
}

/// The cache key that resolved to listing data, with its edges
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedKey {
    pub key: String,
    pub edges: Vec<Value>,
}

/// Parse the embedded state of a page.
///
/// Returns `None` when the element is missing or its text is not JSON,
/// which usually means the site layout changed.
pub fn extract_payload(markup: &str) -> Option<Value> {
    let document = Html::parse_document(markup);
    let element = document.select(&state_selector()).next()?;
    let text: String = element.text().collect();

    match serde_json::from_str(text.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Embedded state element is not valid JSON: {}", e);
            None
        }
    }
}

/// Keys of `props.pageProps.urqlState`, in insertion order
pub fn cache_keys(payload: &Value) -> Vec<String> {
    payload
        .pointer("/props/pageProps/urqlState")
        .and_then(Value::as_object)
        .map(|state| state.keys().cloned().collect())
        .unwrap_or_default()
}

/// Decode the listing edges stored under one cache key
pub fn edges_for_key(payload: &Value, key: &str) -> Result<Vec<Value>> {
    let entry = payload
        .pointer("/props/pageProps/urqlState")
        .and_then(|state| state.get(key))
        .ok_or_else(|| EtlError::DataFormat(format!("key '{}' not found in urqlState", key)))?;

    let data = entry
        .get("data")
        .ok_or_else(|| EtlError::DataFormat(format!("key '{}' has no data", key)))?;

    let decoded = match data {
        Value::String(raw) => serde_json::from_str::<Value>(raw).map_err(|e| {
            EtlError::DataFormat(format!("error decoding JSON data for key '{}': {}", key, e))
        })?,
        Value::Object(_) => data.clone(),
        _ => {
            return Err(EtlError::DataFormat(format!(
                "data for key '{}' is neither a JSON string nor an object",
                key
            )))
        }
    };

    match decoded.pointer("/advertSearch/edges") {
        Some(Value::Array(edges)) => Ok(edges.clone()),
        Some(_) => Err(EtlError::DataFormat(format!(
            "advertSearch.edges for key '{}' is not a list",
            key
        ))),
        None => Err(EtlError::DataFormat(format!(
            "key '{}' carries no advertSearch.edges",
            key
        ))),
    }
}

/// Find the cache key holding the listings: last key first, then first key.
pub fn resolve_data_key(payload: &Value) -> Result<ResolvedKey> {
    let keys = cache_keys(payload);
    let (first, last) = match (keys.first(), keys.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(EtlError::DataFormat(
                "urqlState is missing or empty".to_string(),
            ))
        }
    };

    let last_err = match edges_for_key(payload, last) {
        Ok(edges) => {
            debug!("Resolved listing data under last key '{}'", last);
            return Ok(ResolvedKey {
                key: last.clone(),
                edges,
            });
        }
        Err(e) => e,
    };

    if first == last {
        return Err(last_err);
    }

    warn!("Last key unusable ({}), falling back to first key '{}'", last_err, first);
    match edges_for_key(payload, first) {
        Ok(edges) => Ok(ResolvedKey {
            key: first.clone(),
            edges,
        }),
        Err(first_err) => Err(EtlError::DataFormat(format!(
            "no car data on page: last key failed ({}); first key failed ({})",
            last_err, first_err
        ))),
    }
}

/// Listing edges of a page, or a data format error if none can be recovered
pub fn listing_edges(markup: &str) -> Result<Vec<Value>> {
    let payload = extract_payload(markup).ok_or_else(|| {
        EtlError::DataFormat(format!(
            "no {} element found, the website structure may have changed",
            STATE_ELEMENT_ID
        ))
    })?;
    resolve_data_key(&payload).map(|resolved| resolved.edges)
}

use crate::error::{EtlError, Result};
use crate::models::{epoch_sentinel, ListingRecord};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Currency reported when the listing has none
pub const UNKNOWN_CURRENCY: &str = "UNKNOWN";

/// Parse the leading `YYYY-MM-DD` of a `createdAt` timestamp
pub fn parse_created_date(raw: Option<&str>) -> NaiveDate {
    raw.and_then(|s| s.get(0..10))
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .unwrap_or_else(epoch_sentinel)
}

fn object<'a>(parent: &'a Map<String, Value>, key: &str) -> Result<Option<&'a Map<String, Value>>> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(EtlError::ListingMapping(format!(
            "'{}' should be an object, got {}",
            key, other
        ))),
    }
}

fn text(parent: &Map<String, Value>, key: &str) -> Result<String> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(EtlError::ListingMapping(format!(
            "'{}' should be a string, got {}",
            key, other
        ))),
    }
}

fn price_units(amount: Option<&Map<String, Value>>) -> i64 {
    let Some(units) = amount.and_then(|a| a.get("units")) else {
        return 0;
    };
    match units {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Value::String(s) => s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .parse()
            .unwrap_or(0),
        _ => 0,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Flatten one `advertSearch` edge into a listing record.
///
/// Missing nested objects fall back to defaults. A structure of the wrong
/// shape is a `ListingMapping` error so the caller can skip the listing.
pub fn to_record(edge: &Value, scrape_date: NaiveDate) -> Result<ListingRecord> {
    let edge = edge
        .as_object()
        .ok_or_else(|| EtlError::ListingMapping(format!("edge is not an object: {}", edge)))?;
    let empty = Map::new();
    let node = object(edge, "node")?.unwrap_or(&empty);

    let created_date = parse_created_date(node.get("createdAt").and_then(Value::as_str));

    let amount = match object(node, "price")? {
        Some(price) => object(price, "amount")?,
        None => None,
    };
    let currency = amount
        .and_then(|a| a.get("currencyCode"))
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_CURRENCY)
        .to_string();

    let cepik_verified = match node.get("cepikVerified") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(EtlError::ListingMapping(format!(
                "'cepikVerified' should be a boolean, got {}",
                other
            )))
        }
    };

    let mut attributes = BTreeMap::new();
    match node.get("parameters") {
        None | Some(Value::Null) => {}
        Some(Value::Array(parameters)) => {
            for param in parameters {
                let Some(key) = param.get("key").and_then(Value::as_str) else {
                    continue;
                };
                if key.is_empty() {
                    continue;
                }
                if let Some(value) = param.get("value").and_then(scalar_to_string) {
                    attributes.insert(key.to_string(), value);
                }
            }
        }
        Some(other) => {
            return Err(EtlError::ListingMapping(format!(
                "'parameters' should be a list, got {}",
                other
            )))
        }
    }

    Ok(ListingRecord {
        scrape_date,
        created_date,
        title: text(node, "title")?,
        short_description: text(node, "shortDescription")?,
        price: price_units(amount),
        currency,
        cepik_verified,
        attributes,
    })
}

//! Reconciliation of extracted listings with the warehouse schema.
//!
//! Steps always run in this order: flatten, rename, coerce types, derive
//! `car_age`, fill missing and drop extra columns, emit in schema order.
//! Coercion never fails; a value that does not fit its column becomes null.

use crate::models::{Cell, ResultTable};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnKind {
    Date,
    #[serde(rename = "STRING")]
    Text,
    Integer,
    Float,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// Columns of the warehouse table, in output order
pub fn warehouse_schema() -> Vec<Column> {
    use ColumnKind::{Boolean, Date, Float, Integer, Text};
    [
        ("scrape_date", Date),
        ("created_date", Date),
        ("title", Text),
        ("short_description", Text),
        ("price", Integer),
        ("currency", Text),
        ("cepik_verified", Boolean),
        ("brand", Text),
        ("model", Text),
        ("version", Text),
        ("year", Integer),
        ("mileage", Float),
        ("fuel_type", Text),
        ("engine_capacity", Float),
        ("engine_power", Float),
        ("gearbox", Text),
        ("country_origin", Text),
        ("car_age", Integer),
    ]
    .into_iter()
    .map(|(name, kind)| Column::new(name, kind))
    .collect()
}

/// Source field names mapped to warehouse names
pub fn default_renames() -> Vec<(String, String)> {
    vec![("make".to_string(), "brand".to_string())]
}

/// A table with a uniform, typed column set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Value of `column` in row `row`
    pub fn value(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}

/// Differences between observed columns and the schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// Schema columns no record carried; filled with nulls
    pub missing: Vec<String>,
    /// Observed columns outside the schema; dropped
    pub extra: Vec<String>,
}

pub struct SchemaNormalizer {
    schema: Vec<Column>,
    renames: Vec<(String, String)>,
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self::new(warehouse_schema(), default_renames())
    }
}

impl SchemaNormalizer {
    pub fn new(schema: Vec<Column>, renames: Vec<(String, String)>) -> Self {
        Self { schema, renames }
    }

    fn rename<'a>(&'a self, name: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|(from, _)| from == name)
            .map(|(_, to)| to.as_str())
            .unwrap_or(name)
    }

    pub fn normalize(&self, table: &ResultTable) -> (NormalizedTable, SchemaReport) {
        let mut observed: Vec<String> = Vec::new();
        let mut flat_rows: Vec<BTreeMap<String, Cell>> = Vec::with_capacity(table.len());

        for record in table.records() {
            let mut row = BTreeMap::new();
            for (name, cell) in record.cells() {
                let name = self.rename(&name).to_string();
                if !observed.contains(&name) {
                    observed.push(name.clone());
                }
                row.insert(name, cell);
            }

            for column in &self.schema {
                if let Some(cell) = row.get_mut(&column.name) {
                    *cell = coerce(std::mem::replace(cell, Cell::Null), column.kind);
                }
            }

            let scrape_year = match row.get("scrape_date") {
                Some(Cell::Date(d)) => Some(i64::from(d.year())),
                _ => None,
            };
            let car_age = match (scrape_year, row.get("year")) {
                (Some(now), Some(Cell::Int(year))) => Cell::Int(now - year),
                _ => Cell::Null,
            };
            row.insert("car_age".to_string(), car_age);

            flat_rows.push(row);
        }
        if !table.is_empty() && !observed.iter().any(|c| c == "car_age") {
            observed.push("car_age".to_string());
        }

        let report = SchemaReport {
            missing: self
                .schema
                .iter()
                .filter(|c| !observed.contains(&c.name))
                .map(|c| c.name.clone())
                .collect(),
            extra: observed
                .iter()
                .filter(|name| !self.schema.iter().any(|c| &c.name == *name))
                .cloned()
                .collect(),
        };

        if !table.is_empty() {
            if !report.missing.is_empty() {
                warn!("Missing columns filled with nulls: {}", report.missing.join(", "));
            }
            if !report.extra.is_empty() {
                info!("Dropping columns outside the schema: {}", report.extra.join(", "));
            }
        }

        let rows = flat_rows
            .into_iter()
            .map(|mut row| {
                self.schema
                    .iter()
                    .map(|c| row.remove(&c.name).unwrap_or(Cell::Null))
                    .collect()
            })
            .collect();

        (
            NormalizedTable {
                columns: self.schema.clone(),
                rows,
            },
            report,
        )
    }
}

/// Strip whitespace (including thin and non-breaking spaces) and turn a
/// decimal comma into a dot: "1 598,00" -> "1598.00"
pub fn clean_numeric(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

fn parse_float(raw: &str) -> Option<f64> {
    clean_numeric(raw).parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Convert a cell to `kind`, yielding null when it does not fit
pub fn coerce(cell: Cell, kind: ColumnKind) -> Cell {
    match (kind, cell) {
        (_, Cell::Null) => Cell::Null,
        (ColumnKind::Text, Cell::Text(s)) => Cell::Text(s),
        (ColumnKind::Text, Cell::Date(d)) => Cell::Text(d.to_string()),
        (ColumnKind::Text, Cell::Int(i)) => Cell::Text(i.to_string()),
        (ColumnKind::Text, Cell::Float(f)) => Cell::Text(f.to_string()),
        (ColumnKind::Text, Cell::Bool(b)) => Cell::Text(b.to_string()),

        (ColumnKind::Integer, Cell::Int(i)) => Cell::Int(i),
        (ColumnKind::Integer, Cell::Float(f)) if f.fract() == 0.0 => Cell::Int(f as i64),
        (ColumnKind::Integer, Cell::Text(s)) => match parse_float(&s) {
            Some(f) if f.fract() == 0.0 => Cell::Int(f as i64),
            _ => Cell::Null,
        },

        (ColumnKind::Float, Cell::Float(f)) => Cell::Float(f),
        (ColumnKind::Float, Cell::Int(i)) => Cell::Float(i as f64),
        (ColumnKind::Float, Cell::Text(s)) => parse_float(&s).map_or(Cell::Null, Cell::Float),

        (ColumnKind::Boolean, Cell::Bool(b)) => Cell::Bool(b),
        (ColumnKind::Boolean, Cell::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Cell::Bool(true),
            "false" | "0" => Cell::Bool(false),
            _ => Cell::Null,
        },

        (ColumnKind::Date, Cell::Date(d)) => Cell::Date(d),
        (ColumnKind::Date, Cell::Text(s)) => s
            .get(0..10)
            .and_then(|day| chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
            .map_or(Cell::Null, Cell::Date),

        _ => Cell::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{epoch_sentinel, ListingRecord};
    use crate::scrapers::normalizer::to_record;
    use chrono::NaiveDate;
    use serde_json::json;

    fn scrape_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn listing(params: &[(&str, &str)]) -> ListingRecord {
        let parameters: Vec<_> = params
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v }))
            .collect();
        to_record(
            &json!({ "node": {
                "createdAt": "2024-05-31T10:00:00Z",
                "title": "Skoda Octavia",
                "price": { "amount": { "units": 45000, "currencyCode": "PLN" } },
                "parameters": parameters
            }}),
            scrape_day(),
        )
        .unwrap()
    }

    #[test]
    fn test_clean_numeric_artifacts() {
        assert_eq!(clean_numeric("1 598,00"), "1598.00");
        assert_eq!(clean_numeric("1\u{2009}998"), "1998");
        assert_eq!(coerce(Cell::from("1 598,00"), ColumnKind::Float), Cell::Float(1598.0));
        assert_eq!(coerce(Cell::from("150 KM"), ColumnKind::Float), Cell::Null);
        assert_eq!(coerce(Cell::from("2015"), ColumnKind::Integer), Cell::Int(2015));
        assert_eq!(coerce(Cell::from("20.5"), ColumnKind::Integer), Cell::Null);
        assert_eq!(coerce(Cell::from("nope"), ColumnKind::Boolean), Cell::Null);
    }

    #[test]
    fn test_normalize_renames_coerces_and_derives() {
        let mut table = ResultTable::new();
        table.push(listing(&[
            ("make", "skoda"),
            ("model", "octavia"),
            ("year", "2016"),
            ("mileage", "182 000"),
            ("engine_capacity", "1 968,00"),
            ("color", "black"),
        ]));

        let (normalized, report) = SchemaNormalizer::default().normalize(&table);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized.value(0, "brand"), Some(&Cell::from("skoda")));
        assert_eq!(normalized.value(0, "year"), Some(&Cell::Int(2016)));
        assert_eq!(normalized.value(0, "mileage"), Some(&Cell::Float(182000.0)));
        assert_eq!(normalized.value(0, "engine_capacity"), Some(&Cell::Float(1968.0)));
        assert_eq!(normalized.value(0, "car_age"), Some(&Cell::Int(8)));
        assert_eq!(normalized.column_index("make"), None);
        assert_eq!(normalized.column_index("color"), None);

        assert_eq!(report.extra, vec!["color".to_string()]);
        assert!(report.missing.contains(&"gearbox".to_string()));
        assert!(!report.missing.contains(&"car_age".to_string()));
    }

    #[test]
    fn test_fixed_columns_never_null_for_bare_nodes() {
        let mut table = ResultTable::new();
        table.push(to_record(&json!({}), scrape_day()).unwrap());
        table.push(to_record(&json!({ "node": {} }), scrape_day()).unwrap());

        let (normalized, _) = SchemaNormalizer::default().normalize(&table);
        for row in 0..normalized.len() {
            for column in crate::models::FIXED_COLUMNS {
                let cell = normalized.value(row, column).unwrap();
                assert!(!cell.is_null(), "{} is null", column);
            }
            assert_eq!(normalized.value(row, "created_date"), Some(&Cell::Date(epoch_sentinel())));
            assert_eq!(normalized.value(row, "currency"), Some(&Cell::from("UNKNOWN")));
            assert_eq!(normalized.value(row, "car_age"), Some(&Cell::Null));
        }
    }

    #[test]
    fn test_output_follows_schema_order() {
        let mut table = ResultTable::new();
        table.push(listing(&[("gearbox", "manual"), ("make", "skoda")]));
        let (normalized, _) = SchemaNormalizer::default().normalize(&table);
        let names: Vec<_> = normalized.columns.iter().map(|c| c.name.as_str()).collect();
        let expected: Vec<_> = warehouse_schema().into_iter().map(|c| c.name).collect();
        assert_eq!(names, expected);
        assert!(normalized.rows.iter().all(|r| r.len() == expected.len()));
    }

    #[test]
    fn test_row_order_preserved() {
        let mut table = ResultTable::new();
        for year in ["2010", "2011", "2012"] {
            table.push(listing(&[("year", year)]));
        }
        let (normalized, _) = SchemaNormalizer::default().normalize(&table);
        let years: Vec<_> = (0..3).map(|i| normalized.value(i, "year").cloned()).collect();
        assert_eq!(
            years,
            vec![Some(Cell::Int(2010)), Some(Cell::Int(2011)), Some(Cell::Int(2012))]
        );
    }
}

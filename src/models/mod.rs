use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Date used when a listing carries no usable creation date
pub fn epoch_sentinel() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
}

/// Names of the columns every listing record carries
pub const FIXED_COLUMNS: [&str; 7] = [
    "scrape_date",
    "created_date",
    "title",
    "short_description",
    "price",
    "currency",
    "cepik_verified",
];

/// A single scalar cell of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// One flattened vehicle listing.
///
/// The fixed columns are always present. Everything the source reports as a
/// per-listing parameter lands in `attributes` under the source's own key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub scrape_date: NaiveDate,
    pub created_date: NaiveDate,
    pub title: String,
    pub short_description: String,
    pub price: i64,
    pub currency: String,
    pub cepik_verified: bool,
    pub attributes: BTreeMap<String, String>,
}

impl ListingRecord {
    /// Look up a column by name, fixed columns first
    pub fn get(&self, column: &str) -> Option<Cell> {
        let cell = match column {
            "scrape_date" => Cell::Date(self.scrape_date),
            "created_date" => Cell::Date(self.created_date),
            "title" => Cell::Text(self.title.clone()),
            "short_description" => Cell::Text(self.short_description.clone()),
            "price" => Cell::Int(self.price),
            "currency" => Cell::Text(self.currency.clone()),
            "cepik_verified" => Cell::Bool(self.cepik_verified),
            other => return self.attributes.get(other).map(|v| Cell::Text(v.clone())),
        };
        Some(cell)
    }

    /// All columns of this record, fixed columns first
    pub fn cells(&self) -> Vec<(String, Cell)> {
        let mut cells: Vec<(String, Cell)> = FIXED_COLUMNS
            .iter()
            .filter_map(|name| self.get(name).map(|cell| (name.to_string(), cell)))
            .collect();
        cells.extend(
            self.attributes
                .iter()
                .map(|(k, v)| (k.clone(), Cell::Text(v.clone()))),
        );
        cells
    }
}

/// Ordered listings in page-then-listing order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    records: Vec<ListingRecord>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ListingRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }
}

/// Inclusive page interval processed as one extraction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBudget {
    pub start_page: u32,
    pub end_page: u32,
}

impl PageBudget {
    pub fn new(start_page: u32, end_page: u32) -> Self {
        Self {
            start_page,
            end_page,
        }
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.start_page..=self.end_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(attrs: &[(&str, &str)]) -> ListingRecord {
        ListingRecord {
            scrape_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            created_date: NaiveDate::from_ymd_opt(2024, 5, 9).unwrap(),
            title: "Opel Astra".to_string(),
            short_description: String::new(),
            price: 1000,
            currency: "PLN".to_string(),
            cepik_verified: true,
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_get_falls_back_to_attributes() {
        let r = record(&[("fuel_type", "diesel")]);
        assert_eq!(r.get("price"), Some(Cell::Int(1000)));
        assert_eq!(r.get("fuel_type"), Some(Cell::from("diesel")));
        assert_eq!(r.get("gearbox"), None);
    }
}

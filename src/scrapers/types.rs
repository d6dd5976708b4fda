use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request headers sent with every page fetch
pub type Headers = BTreeMap<String, String>;

/// Brand/model filter for the listing index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Car make, e.g. "opel". Empty means unfiltered.
    pub brand: String,
    /// Car model, e.g. "astra". Empty means unfiltered.
    pub model: String,
}

impl SearchFilter {
    pub fn new(brand: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            brand: brand.into().trim().to_string(),
            model: model.into().trim().to_string(),
        }
    }

    /// Human readable label used in log lines
    pub fn label(&self) -> String {
        match (self.brand.is_empty(), self.model.is_empty()) {
            (true, true) => "all makes".to_string(),
            (false, true) => self.brand.clone(),
            (true, false) => self.model.clone(),
            (false, false) => format!("{} {}", self.brand, self.model),
        }
    }
}

/// Raw result of one HTTP GET
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

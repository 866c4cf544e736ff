// Data structures shared by the cleaner and the dashboard

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Filter sentinel meaning "no constraint on this field".
pub const ALL: &str = "All";

// One row of the raw listing export. Every cell is optional; required columns
// are checked against the header before rows are read. Columns the cleaner
// has no use for are carried in `extra`, keyed by header.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub car: Option<String>,
    pub fuel_type: Option<String>,
    pub service: Option<String>,
    pub service_category: Option<String>,
    pub actual_price: Option<String>,
    pub discounted_price: Option<String>,
    pub time_taken: Option<String>,
    pub recommendation: Option<String>,
    pub extra: BTreeMap<String, String>,
}

/// One row of the cleaned dataset.
///
/// Deserializes from the cleaned CSV column names and serializes to camelCase
/// JSON for the API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServiceRecord {
    pub car: String,
    #[serde(rename(serialize = "fuelType", deserialize = "type"), default)]
    pub fuel_type: Option<String>,
    pub service: String,
    #[serde(rename(serialize = "serviceCategory", deserialize = "service category"))]
    pub service_category: u32,
    #[serde(rename(serialize = "actualPrice", deserialize = "actual price"))]
    pub actual_price: f64,
    #[serde(rename(serialize = "discountedPrice", deserialize = "discounted price"))]
    pub discounted_price: f64,
    #[serde(rename(serialize = "timeTaken", deserialize = "time taken"), default)]
    pub time_taken: Option<f64>,
    #[serde(rename(serialize = "warranty", deserialize = "Warranty"), default)]
    pub warranty: String,
    #[serde(rename(serialize = "interval", deserialize = "Interval"), default)]
    pub interval: String,
    #[serde(rename(serialize = "condition", deserialize = "Condition"), default)]
    pub condition: String,
    // Pass-through columns; filled from the header when reading the CSV
    #[serde(skip_deserializing)]
    pub extra: BTreeMap<String, String>,
}

/// The three slots a free-text recommendation is split into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Recommendation {
    pub warranty: String,
    pub interval: String,
    pub condition: String,
}

/// Code table for the `service category` column: code = index into the sorted
/// list of labels seen in one cleaning run.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CategoryEncoding {
    pub categories: Vec<String>,
}

impl CategoryEncoding {
    pub fn fit<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut categories: Vec<String> = labels.into_iter().map(str::to_string).collect();
        categories.sort();
        categories.dedup();
        Self { categories }
    }

    pub fn code(&self, label: &str) -> Option<u32> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(label))
            .ok()
            .map(|i| i as u32)
    }

    pub fn label(&self, code: u32) -> Option<&str> {
        self.categories.get(code as usize).map(String::as_str)
    }
}

/// A single select control value: either the "All" sentinel or a concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selection {
    #[default]
    All,
    Value(String),
}

impl Selection {
    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    // Query parameters: absent, empty, or "All" all mean no constraint
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some(v) if !v.trim().is_empty() => Selection::from(v.to_string()),
            _ => Selection::All,
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Value(v) => v == candidate,
        }
    }
}

impl From<String> for Selection {
    fn from(value: String) -> Self {
        if value == ALL {
            Selection::All
        } else {
            Selection::Value(value)
        }
    }
}

impl From<Selection> for String {
    fn from(selection: Selection) -> Self {
        selection.to_string()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str(ALL),
            Selection::Value(v) => f.write_str(v),
        }
    }
}

/// The three dashboard filters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSelection {
    pub car: Selection,
    pub fuel_type: Selection,
    pub service: Selection,
}

impl FilterSelection {
    pub fn new(car: Selection, fuel_type: Selection, service: Selection) -> Self {
        Self { car, fuel_type, service }
    }

    pub fn is_default(&self) -> bool {
        self.car.is_all() && self.fuel_type.is_all() && self.service.is_all()
    }
}

// Query string shape shared by the HTML page and the JSON API
#[derive(Debug, Deserialize, Default)]
pub struct FilterQuery {
    pub car: Option<String>,
    pub fuel: Option<String>,
    pub service: Option<String>,
}

impl FilterQuery {
    pub fn selection(&self) -> FilterSelection {
        FilterSelection::new(
            Selection::from_param(self.car.as_deref()),
            Selection::from_param(self.fuel.as_deref()),
            Selection::from_param(self.service.as_deref()),
        )
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentSearchEntry {
    pub timestamp: DateTime<Local>,
    pub car: String,
    pub fuel_type: String,
    pub service: String,
}

impl RecentSearchEntry {
    pub fn new(selection: &FilterSelection, timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            car: selection.car.to_string(),
            fuel_type: selection.fuel_type.to_string(),
            service: selection.service.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_parses_sentinel_and_blank_as_all() {
        assert_eq!(Selection::from_param(None), Selection::All);
        assert_eq!(Selection::from_param(Some("")), Selection::All);
        assert_eq!(Selection::from_param(Some("All")), Selection::All);
        assert_eq!(
            Selection::from_param(Some("swift")),
            Selection::Value("swift".to_string())
        );
    }

    #[test]
    fn selection_matching_is_case_sensitive() {
        let selection = Selection::Value("swift".to_string());
        assert!(selection.matches("swift"));
        assert!(!selection.matches("Swift"));
        assert!(Selection::All.matches("anything"));
    }

    #[test]
    fn category_encoding_uses_sorted_order() {
        let encoding = CategoryEncoding::fit(["Periodic", "Denting", "Periodic", "AC"]);
        assert_eq!(encoding.categories, vec!["AC", "Denting", "Periodic"]);
        assert_eq!(encoding.code("AC"), Some(0));
        assert_eq!(encoding.code("Periodic"), Some(2));
        assert_eq!(encoding.code("Tyres"), None);
        assert_eq!(encoding.label(1), Some("Denting"));
        assert_eq!(encoding.label(7), None);
    }

    #[test]
    fn filter_query_maps_to_selection() {
        let query = FilterQuery {
            car: Some("swift".to_string()),
            fuel: None,
            service: Some("All".to_string()),
        };
        let selection = query.selection();
        assert_eq!(selection.car, Selection::Value("swift".to_string()));
        assert!(selection.fuel_type.is_all());
        assert!(selection.service.is_all());
        assert!(!selection.is_default());
        assert!(FilterQuery::default().selection().is_default());
    }
}

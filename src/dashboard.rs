//! Dashboard logic over the cleaned dataset: filter options, filtering, price
//! lookups and the two detail views. Everything here is a pure function of the
//! dataset and the caller's selection; per-session state lives in `session`.

use crate::{
    dataset::Dataset,
    models::{FilterSelection, RecentSearchEntry, Selection, ServiceRecord, ALL},
};
use serde::Serialize;
use std::{collections::BTreeSet, fmt};

pub const EMPTY_HISTORY_MESSAGE: &str =
    "No recent searches yet. Use the filters to search for services.";
pub const NO_DATA: &str = "No data";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const RECENT_SEARCH_HEADERS: [&str; 4] = ["Timestamp", "Car Model", "Fuel Type", "Service"];

/// Values offered by the three select controls, "All" first.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub cars: Vec<String>,
    pub fuel_types: Vec<String>,
    pub services: Vec<String>,
}

fn with_all<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let distinct: BTreeSet<&str> = values.collect();
    std::iter::once(ALL)
        .chain(distinct)
        .map(str::to_string)
        .collect()
}

pub fn filter_options(dataset: &Dataset) -> FilterOptions {
    let records = &dataset.records;
    let fuel_types = if dataset.has_fuel_type {
        with_all(records.iter().filter_map(|r| r.fuel_type.as_deref()))
    } else {
        vec![ALL.to_string()]
    };
    FilterOptions {
        cars: with_all(records.iter().map(|r| r.car.as_str())),
        fuel_types,
        services: with_all(records.iter().map(|r| r.service.as_str())),
    }
}

/// Records matching every non-"All" selection exactly. The fuel-type selection
/// is ignored when the dataset has no fuel-type column.
pub fn filter_records<'a>(
    dataset: &'a Dataset,
    selection: &FilterSelection,
) -> Vec<&'a ServiceRecord> {
    dataset
        .records
        .iter()
        .filter(|r| selection.car.matches(&r.car))
        .filter(|r| {
            !dataset.has_fuel_type
                || match &selection.fuel_type {
                    Selection::All => true,
                    Selection::Value(v) => r.fuel_type.as_deref() == Some(v.as_str()),
                }
        })
        .filter(|r| selection.service.matches(&r.service))
        .collect()
}

/// Result of a price lookup for one service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PriceSummary {
    /// Mean prices across every car offering the service.
    Average { actual: f64, discounted: f64 },
    /// The single fixed listing of one car.
    Listing { actual: f64, discounted: f64 },
    NoData,
}

impl fmt::Display for PriceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSummary::Average { actual, discounted }
            | PriceSummary::Listing { actual, discounted } => {
                write!(f, "{} / {}", format_inr(*actual), format_inr(*discounted))
            }
            PriceSummary::NoData => f.write_str(NO_DATA),
        }
    }
}

/// Prices of `service_name` for the selected car.
///
/// With no car selected the answer is an aggregate over all cars (means).
/// With a car selected, per-car pricing is a single fixed listing, so the first
/// matching row is returned as-is rather than averaged.
pub fn get_service_prices(
    records: &[ServiceRecord],
    service_name: &str,
    selected_car: &Selection,
) -> PriceSummary {
    let matching: Vec<&ServiceRecord> = records
        .iter()
        .filter(|r| r.service == service_name)
        .filter(|r| selected_car.matches(&r.car))
        .collect();

    let Some(first) = matching.first() else {
        return PriceSummary::NoData;
    };

    match selected_car {
        Selection::All => {
            let n = matching.len() as f64;
            PriceSummary::Average {
                actual: matching.iter().map(|r| r.actual_price).sum::<f64>() / n,
                discounted: matching.iter().map(|r| r.discounted_price).sum::<f64>() / n,
            }
        }
        Selection::Value(_) => PriceSummary::Listing {
            actual: first.actual_price,
            discounted: first.discounted_price,
        },
    }
}

/// Formats an amount as rupees with thousands separators and two decimals,
/// e.g. `₹1,234.50`.
pub fn format_inr(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}₹{grouped}.{frac_part}")
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricCard {
    pub title: String,
    pub value: String,
    pub summary: PriceSummary,
}

pub fn metric_cards(
    records: &[ServiceRecord],
    services: &[String],
    selected_car: &Selection,
) -> Vec<MetricCard> {
    services
        .iter()
        .map(|service| {
            let summary = get_service_prices(records, service, selected_car);
            MetricCard {
                title: format!("{service} (Actual/Discounted)"),
                value: summary.to_string(),
                summary,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The two mutually exclusive detail views.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "view", content = "table", rename_all = "camelCase")]
pub enum DetailView {
    /// Shown while every filter is "All"; an empty table means no history yet.
    RecentSearches(Table),
    ServiceDetails(Table),
}

pub fn recent_searches_table(history: &[RecentSearchEntry]) -> Table {
    Table {
        headers: RECENT_SEARCH_HEADERS.iter().map(|h| h.to_string()).collect(),
        rows: history
            .iter()
            .map(|e| {
                vec![
                    e.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    e.car.clone(),
                    e.fuel_type.clone(),
                    e.service.clone(),
                ]
            })
            .collect(),
    }
}

pub fn service_details_table(dataset: &Dataset, records: &[&ServiceRecord]) -> Table {
    let mut headers = vec![
        "Car Model",
        "Service Category",
        "Actual Price",
        "Discounted Price",
        "Service Time",
        "Warranty",
        "Service Interval",
        "Condition",
    ];
    if dataset.has_fuel_type {
        headers.insert(1, "Fuel Type");
    }

    let rows = records
        .iter()
        .map(|r| {
            let mut row = vec![r.car.clone()];
            if dataset.has_fuel_type {
                row.push(r.fuel_type.clone().unwrap_or_default());
            }
            row.extend([
                dataset.category_label(r.service_category),
                format_inr(r.actual_price),
                format_inr(r.discounted_price),
                r.time_taken.map(|t| format!("{t:.1} h")).unwrap_or_default(),
                r.warranty.clone(),
                r.interval.clone(),
                r.condition.clone(),
            ]);
            row
        })
        .collect();

    Table {
        headers: headers.into_iter().map(str::to_string).collect(),
        rows,
    }
}

/// Everything the dashboard page shows for one selection.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub options: FilterOptions,
    pub selection: FilterSelection,
    pub cards: Vec<MetricCard>,
    pub detail: DetailView,
}

pub fn build_view(
    dataset: &Dataset,
    selection: &FilterSelection,
    history: &[RecentSearchEntry],
    featured_services: &[String],
) -> DashboardView {
    let detail = if selection.is_default() {
        DetailView::RecentSearches(recent_searches_table(history))
    } else {
        let filtered = filter_records(dataset, selection);
        tracing::debug!(matches = filtered.len(), ?selection, "Filtered service records");
        DetailView::ServiceDetails(service_details_table(dataset, &filtered))
    };

    DashboardView {
        options: filter_options(dataset),
        selection: selection.clone(),
        cards: metric_cards(&dataset.records, featured_services, &selection.car),
        detail,
    }
}

// Cleaning pipeline: raw listing export -> normalized, validated dataset

use crate::{
    dataset::{self, Dataset, FUEL_TYPE_COLUMN, RECOMMENDATION_COLUMNS},
    error::CleanError,
    models::{CategoryEncoding, RawRecord, Recommendation, ServiceRecord},
};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

static CURRENCY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Rs\.|₹|,").expect("currency pattern is valid"));
static FIRST_INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("integer pattern is valid"));

const RECOMMENDATION_DELIMITER: char = '•';
const WARRANTY_MARKER: &str = "Warranty";
const INTERVAL_MARKERS: [&str; 3] = ["Month", "Year", "Kms"];

const RECOMMENDATION_COLUMN: &str = "recommendation";

// Columns the raw export must carry; `type` is optional
const REQUIRED_COLUMNS: [&str; 7] = [
    "car",
    "service",
    "service category",
    "actual price",
    "discounted price",
    "time taken",
    RECOMMENDATION_COLUMN,
];

/// The raw export as read from disk: its header, the rows that could be read,
/// and how many could not.
#[derive(Debug, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
    pub unreadable: usize,
}

impl RawTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Header of the cleaned file: the raw columns in their original order
    /// without `recommendation`, then the columns split out of it.
    pub fn cleaned_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .headers
            .iter()
            .filter(|h| *h != RECOMMENDATION_COLUMN)
            .cloned()
            .collect();
        for column in RECOMMENDATION_COLUMNS {
            // A raw column of the same name is overwritten in place
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
        columns
    }

    fn record(&self, row: &csv::StringRecord) -> RawRecord {
        let cell = |name: &str| {
            self.headers
                .iter()
                .position(|h| h == name)
                .and_then(|i| row.get(i))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        // Short rows (flexible reader) leave trailing cells empty
        let extra = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| *h != RECOMMENDATION_COLUMN && !dataset::is_modelled_column(h))
            .map(|(i, h)| (h.clone(), row.get(i).unwrap_or_default().to_string()))
            .collect();

        RawRecord {
            car: cell("car"),
            fuel_type: cell(FUEL_TYPE_COLUMN),
            service: cell("service"),
            service_category: cell("service category"),
            actual_price: cell("actual price"),
            discounted_price: cell("discounted price"),
            time_taken: cell("time taken"),
            recommendation: cell(RECOMMENDATION_COLUMN),
            extra,
        }
    }
}

/// Counts collected while cleaning, logged at the end of a run.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleanReport {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub duplicates_removed: usize,
    pub durations_imputed: usize,
    pub invalid_prices_dropped: usize,
    pub rows_written: usize,
}

// A row after per-cell normalization, before category encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRow {
    pub car: String,
    pub fuel_type: Option<String>,
    pub service: String,
    pub service_category: String,
    pub actual_price: f64,
    pub discounted_price: f64,
    pub time_taken: Option<f64>,
    pub recommendation: Recommendation,
    pub extra: BTreeMap<String, String>,
}

// Floats compared bitwise so a row can be hashed as a whole
#[derive(Hash, PartialEq, Eq)]
struct RowKey {
    car: String,
    fuel_type: Option<String>,
    service: String,
    service_category: String,
    actual_price: u64,
    discounted_price: u64,
    time_taken: Option<u64>,
    recommendation: Recommendation,
    extra: BTreeMap<String, String>,
}

impl CleanRow {
    fn key(&self) -> RowKey {
        RowKey {
            car: self.car.clone(),
            fuel_type: self.fuel_type.clone(),
            service: self.service.clone(),
            service_category: self.service_category.clone(),
            actual_price: self.actual_price.to_bits(),
            discounted_price: self.discounted_price.to_bits(),
            time_taken: self.time_taken.map(f64::to_bits),
            recommendation: self.recommendation.clone(),
            extra: self.extra.clone(),
        }
    }

    fn encode(self, encoding: &CategoryEncoding) -> ServiceRecord {
        // Every label was seen while fitting, so the lookup cannot miss
        let service_category = encoding.code(&self.service_category).unwrap_or_default();
        ServiceRecord {
            car: self.car,
            fuel_type: self.fuel_type,
            service: self.service,
            service_category,
            actual_price: self.actual_price,
            discounted_price: self.discounted_price,
            time_taken: self.time_taken,
            warranty: self.recommendation.warranty,
            interval: self.recommendation.interval,
            condition: self.recommendation.condition,
            extra: self.extra,
        }
    }
}

/// Strips currency markers ("Rs.", the rupee sign, thousands separators) and
/// parses the remainder.
pub fn parse_price(column: &'static str, raw: Option<&str>) -> Result<f64, CleanError> {
    let raw = raw.ok_or(CleanError::MissingValue(column))?;
    let stripped = CURRENCY_RE.replace_all(raw, "");
    let value: f64 = stripped.trim().parse().map_err(|_| CleanError::InvalidPrice {
        column,
        value: raw.to_string(),
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(CleanError::InvalidPrice { column, value: raw.to_string() });
    }
    Ok(value)
}

/// Converts "2 days" / "3 hours" / "4 hrs" to hours. Anything else is missing.
pub fn parse_duration_hours(raw: Option<&str>) -> Option<f64> {
    let text = raw?.to_lowercase();
    let first_int = || {
        FIRST_INT_RE
            .find(&text)
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };
    if text.contains("day") {
        first_int().map(|days| days * 24.0)
    } else if text.contains("hour") || text.contains("hr") {
        first_int()
    } else {
        None
    }
}

/// Splits a bullet-separated recommendation into warranty, interval and
/// condition. Later segments overwrite earlier ones of the same kind.
pub fn parse_recommendation(raw: Option<&str>) -> Recommendation {
    let mut parsed = Recommendation::default();
    let Some(raw) = raw else {
        return parsed;
    };
    for item in raw.split(RECOMMENDATION_DELIMITER) {
        let item = item.trim().to_string();
        if item.contains(WARRANTY_MARKER) {
            parsed.warranty = item;
        } else if INTERVAL_MARKERS.iter().any(|m| item.contains(m)) {
            parsed.interval = item;
        } else {
            parsed.condition = item;
        }
    }
    parsed
}

pub fn normalize_car(raw: &str) -> String {
    raw.to_lowercase().replace('-', " ")
}

/// Normalizes the cells of one raw row. Only the price columns can fail the
/// row; every other malformed cell degrades to empty / missing.
pub fn normalize_row(raw: &RawRecord) -> Result<CleanRow, CleanError> {
    let actual_price = parse_price("actual price", raw.actual_price.as_deref())?;
    let discounted_price = parse_price("discounted price", raw.discounted_price.as_deref())?;

    Ok(CleanRow {
        car: normalize_car(raw.car.as_deref().unwrap_or_default()),
        fuel_type: raw.fuel_type.clone(),
        service: raw.service.clone().unwrap_or_default(),
        service_category: raw.service_category.clone().unwrap_or_default(),
        actual_price,
        discounted_price,
        time_taken: parse_duration_hours(raw.time_taken.as_deref()),
        recommendation: parse_recommendation(raw.recommendation.as_deref()),
        extra: raw.extra.clone(),
    })
}

/// Drops exact full-row duplicates, keeping first occurrences in order.
/// Returns the surviving rows and the number removed.
pub fn dedup_rows(rows: Vec<CleanRow>) -> (Vec<CleanRow>, usize) {
    let before = rows.len();
    let mut seen = HashSet::new();
    let kept: Vec<CleanRow> = rows.into_iter().filter(|row| seen.insert(row.key())).collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Fills missing durations with the mean of the whole column. Returns how many
/// cells were filled; nothing is filled when the column has no values at all.
pub fn impute_missing_durations(rows: &mut [CleanRow]) -> usize {
    let known: Vec<f64> = rows.iter().filter_map(|r| r.time_taken).collect();
    if known.is_empty() {
        return 0;
    }
    let mean = known.iter().sum::<f64>() / known.len() as f64;

    let mut filled = 0;
    for row in rows.iter_mut().filter(|r| r.time_taken.is_none()) {
        row.time_taken = Some(mean);
        filled += 1;
    }
    filled
}

/// Keeps rows whose discounted price does not exceed the actual price.
pub fn validate_prices(rows: Vec<CleanRow>) -> (Vec<CleanRow>, usize) {
    let before = rows.len();
    let kept: Vec<CleanRow> = rows
        .into_iter()
        .filter(|r| r.discounted_price <= r.actual_price)
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Runs the in-memory part of the pipeline over an already-read raw table.
pub fn clean_records(table: &RawTable) -> (Dataset, CleanReport) {
    let mut report = CleanReport {
        rows_read: table.rows.len() + table.unreadable,
        rows_skipped: table.unreadable,
        ..Default::default()
    };

    let mut rows = Vec::with_capacity(table.rows.len());
    for (index, raw) in table.rows.iter().enumerate() {
        match normalize_row(raw) {
            Ok(row) => rows.push(row),
            Err(e) => {
                tracing::warn!(row = index + 1, error = %e, "Skipping row");
                report.rows_skipped += 1;
            }
        }
    }

    let (rows, duplicates) = dedup_rows(rows);
    report.duplicates_removed = duplicates;

    let encoding = CategoryEncoding::fit(rows.iter().map(|r| r.service_category.as_str()));
    tracing::debug!(categories = ?encoding.categories, "Fitted service category codes");

    let mut rows = rows;
    report.durations_imputed = impute_missing_durations(&mut rows);

    let (rows, dropped) = validate_prices(rows);
    report.invalid_prices_dropped = dropped;

    let records: Vec<ServiceRecord> = rows.into_iter().map(|r| r.encode(&encoding)).collect();
    report.rows_written = records.len();

    let dataset = Dataset {
        records,
        has_fuel_type: table.has_column(FUEL_TYPE_COLUMN),
        columns: table.cleaned_columns(),
        categories: Some(encoding),
    };
    (dataset, report)
}

/// Reads the raw CSV at `input`, cleans it and writes the result to `output`
/// together with its category code table. The input file is never modified.
pub fn clean_dataset(input: &Path, output: &Path) -> Result<CleanReport> {
    tracing::info!("Cleaning {} -> {}", input.display(), output.display());

    let table = read_raw(input)
        .with_context(|| format!("Failed to read raw dataset {}", input.display()))?;

    let (dataset, report) = clean_records(&table);

    dataset::write_dataset(output, &dataset)
        .with_context(|| format!("Failed to write cleaned dataset {}", output.display()))?;

    tracing::info!(
        rows_read = report.rows_read,
        rows_skipped = report.rows_skipped,
        duplicates_removed = report.duplicates_removed,
        durations_imputed = report.durations_imputed,
        invalid_prices_dropped = report.invalid_prices_dropped,
        rows_written = report.rows_written,
        "Cleaning complete"
    );
    Ok(report)
}

// Only a missing file or a bad header fails the read. A row that cannot be
// decoded is logged and counted; rows of the wrong length are padded or cut.
fn read_raw(input: &Path) -> Result<RawTable, CleanError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(input)?;
    let mut table = RawTable {
        headers: reader.headers()?.iter().map(str::to_string).collect(),
        ..Default::default()
    };

    for column in REQUIRED_COLUMNS {
        if !table.has_column(column) {
            return Err(CleanError::MissingColumn(column));
        }
    }

    for (index, result) in reader.records().enumerate() {
        match result {
            Ok(row) => {
                let record = table.record(&row);
                table.rows.push(record);
            }
            Err(e) => {
                tracing::warn!(row = index + 1, error = %e, "Skipping unreadable row");
                table.unreadable += 1;
            }
        }
    }
    Ok(table)
}

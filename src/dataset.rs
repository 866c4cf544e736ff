// Reading and writing the cleaned dataset

use crate::models::{CategoryEncoding, ServiceRecord};
use anyhow::{Context, Result};
use cached::proc_macro::cached;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

pub const FUEL_TYPE_COLUMN: &str = "type";
/// Columns the cleaner derives from `recommendation`, appended after the raw ones.
pub const RECOMMENDATION_COLUMNS: [&str; 3] = ["Warranty", "Interval", "Condition"];

// Columns mapped onto `ServiceRecord` fields; every other column passes through
const MODELLED_COLUMNS: [&str; 10] = [
    "car",
    FUEL_TYPE_COLUMN,
    "service",
    "service category",
    "actual price",
    "discounted price",
    "time taken",
    "Warranty",
    "Interval",
    "Condition",
];

/// The cleaned dataset as held in memory. Never mutated once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub records: Vec<ServiceRecord>,
    // Whether the optional `type` (fuel type) column exists
    pub has_fuel_type: bool,
    // Header of the cleaned CSV in file order. Empty means the default layout.
    pub columns: Vec<String>,
    // Code table written next to the dataset by the cleaner, when available
    pub categories: Option<CategoryEncoding>,
}

impl Dataset {
    /// Display text for a category code: the label when the code table is
    /// known, otherwise the bare code.
    pub fn category_label(&self, code: u32) -> String {
        self.categories
            .as_ref()
            .and_then(|c| c.label(code))
            .map(str::to_string)
            .unwrap_or_else(|| code.to_string())
    }
}

pub fn categories_path(dataset_path: &Path) -> PathBuf {
    let mut name = dataset_path.as_os_str().to_owned();
    name.push(".categories.json");
    PathBuf::from(name)
}

pub fn is_modelled_column(column: &str) -> bool {
    MODELLED_COLUMNS.contains(&column)
}

/// Layout used for a dataset that carries no header of its own.
pub fn default_columns(has_fuel_type: bool) -> Vec<String> {
    let mut columns = vec![
        "car",
        "service",
        "service category",
        "actual price",
        "discounted price",
        "time taken",
    ];
    if has_fuel_type {
        columns.insert(1, FUEL_TYPE_COLUMN);
    }
    columns
        .into_iter()
        .chain(RECOMMENDATION_COLUMNS)
        .map(str::to_string)
        .collect()
}

fn cell(record: &ServiceRecord, column: &str) -> String {
    match column {
        "car" => record.car.clone(),
        FUEL_TYPE_COLUMN => record.fuel_type.clone().unwrap_or_default(),
        "service" => record.service.clone(),
        "service category" => record.service_category.to_string(),
        "actual price" => record.actual_price.to_string(),
        "discounted price" => record.discounted_price.to_string(),
        "time taken" => record.time_taken.map(|t| t.to_string()).unwrap_or_default(),
        "Warranty" => record.warranty.clone(),
        "Interval" => record.interval.clone(),
        "Condition" => record.condition.clone(),
        other => record.extra.get(other).cloned().unwrap_or_default(),
    }
}

fn pass_through(columns: &[String], row: &csv::StringRecord) -> BTreeMap<String, String> {
    columns
        .iter()
        .zip(row.iter())
        .filter(|(column, _)| !is_modelled_column(column))
        .map(|(column, value)| (column.clone(), value.to_string()))
        .collect()
}

/// Writes the dataset as CSV, plus the category code table as JSON when present.
pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;
    let columns = if dataset.columns.is_empty() {
        default_columns(dataset.has_fuel_type)
    } else {
        dataset.columns.clone()
    };
    writer.write_record(&columns)?;

    for record in &dataset.records {
        writer.write_record(columns.iter().map(|column| cell(record, column)))?;
    }
    writer.flush().context("Failed to flush CSV writer")?;

    if let Some(categories) = &dataset.categories {
        let sidecar = categories_path(path);
        let json = serde_json::to_string_pretty(categories)?;
        fs::write(&sidecar, json)
            .with_context(|| format!("Failed to write {}", sidecar.display()))?;
    }

    tracing::debug!("Wrote {} records to {}", dataset.records.len(), path.display());
    Ok(())
}

/// Reads a cleaned dataset from disk, uncached.
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open cleaned dataset {}", path.display()))?;
    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let columns: Vec<String> = headers.iter().map(str::to_string).collect();
    let has_fuel_type = columns.iter().any(|c| c == FUEL_TYPE_COLUMN);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("Failed to parse records in {}", path.display()))?;
        let mut record: ServiceRecord = row
            .deserialize(Some(&headers))
            .with_context(|| format!("Failed to parse records in {}", path.display()))?;
        record.extra = pass_through(&columns, &row);
        records.push(record);
    }

    let sidecar = categories_path(path);
    let categories = if sidecar.exists() {
        let text = fs::read_to_string(&sidecar)
            .with_context(|| format!("Failed to read {}", sidecar.display()))?;
        Some(
            serde_json::from_str::<CategoryEncoding>(&text)
                .with_context(|| format!("Failed to parse {}", sidecar.display()))?,
        )
    } else {
        tracing::debug!("No category code table at {}", sidecar.display());
        None
    };

    Ok(Dataset {
        records,
        has_fuel_type,
        columns,
        categories,
    })
}

/// Loads the cleaned dataset once per path for the lifetime of the process.
/// There is no reload: a changed file is picked up only after a restart.
#[cached(
    result = true,
    sync_writes = true,
    key = "PathBuf",
    convert = r#"{ path.to_path_buf() }"#
)]
pub fn load_dataset(path: &Path) -> Result<Arc<Dataset>, anyhow::Error> {
    tracing::info!("Loading cleaned dataset from {}", path.display());
    let dataset = read_dataset(path)?;
    tracing::info!(
        records = dataset.records.len(),
        has_fuel_type = dataset.has_fuel_type,
        "Dataset loaded"
    );
    Ok(Arc::new(dataset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(car: &str, fuel: Option<&str>, actual: f64, discounted: f64) -> ServiceRecord {
        ServiceRecord {
            car: car.to_string(),
            fuel_type: fuel.map(str::to_string),
            service: "Basic Service".to_string(),
            service_category: 1,
            actual_price: actual,
            discounted_price: discounted,
            time_taken: Some(4.5),
            warranty: "Warranty: 1 Month".to_string(),
            interval: "Every 5000 Kms, 3 Months".to_string(),
            condition: String::new(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn write_then_read_keeps_count_and_price_sums() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        let dataset = Dataset {
            records: vec![
                record("swift", Some("Petrol"), 2999.0, 2499.5),
                record("city", Some("Diesel"), 3999.99, 3499.0),
                record("i20", None, 1234.25, 1000.0),
            ],
            has_fuel_type: true,
            columns: default_columns(true),
            categories: Some(CategoryEncoding::fit(["A", "B"])),
        };
        write_dataset(&path, &dataset).unwrap();

        let loaded = read_dataset(&path).unwrap();
        assert_eq!(loaded.records.len(), dataset.records.len());
        let sum = |d: &Dataset| -> (f64, f64) {
            d.records
                .iter()
                .fold((0.0, 0.0), |(a, b), r| (a + r.actual_price, b + r.discounted_price))
        };
        assert_eq!(sum(&loaded), sum(&dataset));
        assert_eq!(loaded, dataset);
    }

    #[test]
    fn fuel_type_column_is_omitted_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        let dataset = Dataset {
            records: vec![record("swift", None, 10.0, 5.0)],
            has_fuel_type: false,
            ..Default::default()
        };
        write_dataset(&path, &dataset).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let header_line = text.lines().next().unwrap();
        assert!(!header_line.split(',').any(|c| c == "type"));
        assert!(!categories_path(&path).exists());

        let loaded = read_dataset(&path).unwrap();
        assert!(!loaded.has_fuel_type);
        assert_eq!(loaded.records[0].fuel_type, None);
        assert_eq!(loaded.category_label(1), "1");
    }

    #[test]
    fn unmodelled_columns_keep_their_position_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        let mut columns = default_columns(false);
        columns.insert(1, "workshop".to_string());
        let mut first = record("swift", None, 10.0, 5.0);
        first.extra.insert("workshop".to_string(), "Workshop A".to_string());
        let mut second = record("swift", None, 10.0, 5.0);
        second.extra.insert("workshop".to_string(), "Workshop B".to_string());
        let dataset = Dataset {
            records: vec![first, second],
            columns,
            ..Default::default()
        };
        write_dataset(&path, &dataset).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.lines().next().unwrap().starts_with("car,workshop,service,"));

        let loaded = read_dataset(&path).unwrap();
        assert_eq!(loaded, dataset);
        assert_eq!(loaded.records[1].extra["workshop"], "Workshop B");
    }

    #[test]
    fn load_is_cached_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.csv");
        let dataset = Dataset {
            records: vec![record("swift", None, 10.0, 5.0)],
            has_fuel_type: false,
            ..Default::default()
        };
        write_dataset(&path, &dataset).unwrap();

        let first = load_dataset(&path).unwrap();
        // Later changes on disk are not observed by this process
        fs::remove_file(&path).unwrap();
        let second = load_dataset(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn load_of_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dataset(&dir.path().join("nope.csv")).is_err());
    }
}

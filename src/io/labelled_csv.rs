//! Delimited-text reader for labelled feature tables.
use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use ndarray::Array2;

use crate::data_handling::Dataset;

/// Configuration for reading a labelled table.
#[derive(Debug, Clone)]
pub struct CsvReaderConfig {
    /// Field delimiter.
    pub delimiter: u8,
    /// Column holding the class label.
    pub label_column: String,
    /// Optional list of feature columns to load (in order).
    /// When `None`, every column except the label and `ignore_columns` is a feature.
    pub feature_columns: Option<Vec<String>>,
    /// Columns to skip when auto-selecting features (e.g. row identifiers).
    pub ignore_columns: Vec<String>,
}

impl Default for CsvReaderConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            label_column: "Class".to_string(),
            feature_columns: None,
            ignore_columns: vec!["id".to_string(), "row".to_string()],
        }
    }
}

/// Loaded table plus the feature column names, in matrix column order.
#[derive(Debug)]
pub struct LabelledTable {
    pub dataset: Dataset,
    pub feature_names: Vec<String>,
}

/// Read a comma-separated file whose label column is named `Class`.
pub fn read_labelled_csv<P: AsRef<Path>>(path: P) -> Result<LabelledTable> {
    read_labelled_csv_with_config(path, &CsvReaderConfig::default())
}

pub fn read_labelled_csv_with_config<P: AsRef<Path>>(
    path: P,
    config: &CsvReaderConfig,
) -> Result<LabelledTable> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("Failed to open table: {}", path.as_ref().display()))?;
    read_labelled_from_reader(reader, config)
}

/// Read from any `csv::Reader`, e.g. one built over an in-memory buffer.
pub fn read_labelled_from_reader<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    config: &CsvReaderConfig,
) -> Result<LabelledTable> {
    let headers = reader
        .headers()
        .context("Failed to read header row")?
        .clone();

    let label_idx = find_column(&headers, &config.label_column)
        .ok_or_else(|| anyhow!("Missing label column '{}'", config.label_column))?;

    let feature_indices = resolve_feature_indices(&headers, config, label_idx)?;
    if feature_indices.is_empty() {
        return Err(anyhow!("No feature columns detected in header"));
    }

    let mut features = Vec::new();
    let mut labels = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let label = record
            .get(label_idx)
            .ok_or_else(|| anyhow!("Missing label value at row {}", row_idx + 1))?
            .trim();
        if label.is_empty() {
            return Err(anyhow!("Empty label at row {}", row_idx + 1));
        }
        labels.push(label.to_string());

        for &idx in &feature_indices {
            let value = record
                .get(idx)
                .ok_or_else(|| anyhow!("Missing feature value at row {}", row_idx + 1))?;
            let parsed = value.trim().parse::<f32>().with_context(|| {
                format!(
                    "Invalid feature '{}' at row {}",
                    headers.get(idx).unwrap_or(""),
                    row_idx + 1
                )
            })?;
            features.push(parsed);
        }
    }

    let n_samples = labels.len();
    let n_features = feature_indices.len();
    let x = Array2::from_shape_vec((n_samples, n_features), features)
        .context("Failed to build feature matrix")?;

    let feature_names = feature_indices
        .iter()
        .map(|&idx| headers.get(idx).unwrap_or("").to_string())
        .collect();

    let dataset = Dataset::new(x, labels)?;
    log::debug!(
        "Loaded {} rows with {} features, class levels {:?}",
        n_samples,
        n_features,
        dataset.levels()
    );

    Ok(LabelledTable {
        dataset,
        feature_names,
    })
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn resolve_feature_indices(
    headers: &StringRecord,
    config: &CsvReaderConfig,
    label_idx: usize,
) -> Result<Vec<usize>> {
    if let Some(names) = &config.feature_columns {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = find_column(headers, name)
                .ok_or_else(|| anyhow!("Missing feature column '{}'", name))?;
            indices.push(idx);
        }
        return Ok(indices);
    }

    let ignore: HashSet<String> = config
        .ignore_columns
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .collect();

    Ok(headers
        .iter()
        .enumerate()
        .filter(|(idx, header)| {
            *idx != label_idx && !ignore.contains(&header.trim().to_ascii_lowercase())
        })
        .map(|(idx, _)| idx)
        .collect())
}

//! Dataset discovery and loading.
use crate::constants::LABEL_CANDIDATES;
use crate::errors::{Result, RiskError};
use crate::schema::{definition, fold_key, normalize_key, parse_finite, FeatureRow, FeatureType, FeatureValue};
use crate::trainer::TrainingTable;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Locate the training CSV under `<data_root>/train_validate`.
///
/// Tries the named file in `csv/` then in the base directory (adding `.csv`
/// when missing), then the first CSV found in either directory.
pub fn resolve_train_dataset_path<P: AsRef<Path>>(data_root: P, dataset_name: &str) -> Result<PathBuf> {
    let base = data_root.as_ref().join("train_validate");
    let csv_dir = base.join("csv");

    let candidates = if dataset_name.ends_with(".csv") {
        vec![csv_dir.join(dataset_name), base.join(dataset_name)]
    } else {
        let with_ext = format!("{}.csv", dataset_name);
        vec![
            csv_dir.join(&with_ext),
            base.join(&with_ext),
            csv_dir.join(dataset_name),
            base.join(dataset_name),
        ]
    };
    if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
        return Ok(found);
    }

    for dir in [&csv_dir, &base] {
        if let Some(first) = sorted_csv_files(dir).into_iter().next() {
            debug!("Dataset {} not found, using {}.", dataset_name, first.display());
            return Ok(first);
        }
    }
    Err(RiskError::DatasetNotFound(base.display().to_string()))
}

fn sorted_csv_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    files
}

/// Map a raw label cell to 0/1; anything else drops the row.
pub fn parse_label(raw: &str) -> Option<u8> {
    let value = raw.trim().to_lowercase();
    match value.as_str() {
        "1" | "fail" | "failed" | "true" | "yes" => Some(1),
        "0" | "pass" | "passed" | "false" | "no" => Some(0),
        _ => {
            let numeric = value.parse::<f64>().ok().filter(|v| v.is_finite())?.trunc();
            if numeric == 1.0 {
                Some(1)
            } else if numeric == 0.0 {
                Some(0)
            } else {
                None
            }
        }
    }
}

/// Read a CSV into full-width rows and labels.
pub fn load_training_data<P: AsRef<Path>>(path: P) -> Result<TrainingTable> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| RiskError::UnableToRead(format!("{}: {}", path.display(), e)))?;
    let headers = reader
        .headers()
        .map_err(|e| RiskError::UnableToRead(e.to_string()))?
        .clone();

    // Header position of every recognised feature, and of the label.
    let mut columns: Vec<(usize, &'static str)> = Vec::new();
    let mut label_column = None;
    for (i, header) in headers.iter().enumerate() {
        if let Some(key) = normalize_key(header) {
            columns.push((i, key));
            continue;
        }
        if label_column.is_none() && LABEL_CANDIDATES.contains(&fold_key(header).as_str()) {
            label_column = Some(i);
        }
    }
    let label_column = label_column.ok_or_else(|| RiskError::LabelColumnNotFound(LABEL_CANDIDATES.join("/")))?;

    let mut table = TrainingTable::default();
    let mut dropped = 0usize;
    for record in reader.records() {
        let record = record.map_err(|e| RiskError::UnableToRead(e.to_string()))?;
        let Some(label) = record.get(label_column).and_then(parse_label) else {
            dropped += 1;
            continue;
        };
        let mut row = FeatureRow::empty();
        for &(i, key) in &columns {
            let Some(cell) = record.get(i).map(str::trim).filter(|c| !c.is_empty()) else {
                continue;
            };
            let Some(def) = definition(key) else {
                continue;
            };
            let value = match def.feature_type {
                FeatureType::Numeric => parse_finite(cell).map_or(FeatureValue::Missing, FeatureValue::Numeric),
                FeatureType::Categorical => FeatureValue::Categorical(cell.to_string()),
            };
            row.set(key, value);
        }
        table.rows.push(row);
        table.labels.push(label);
    }
    info!(
        "Loaded {} rows from {} ({} dropped for unparsable labels).",
        table.len(),
        path.display(),
        dropped
    );
    Ok(table)
}

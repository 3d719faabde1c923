//! Preprocessor
//!
//! Fitted column-wise transformation of full-width feature rows into the dense
//! model matrix. Numeric columns are median-imputed then standardized, categorical
//! columns are mode-imputed then expanded into indicator columns. Statistics are
//! learned once, from the training split, and reused verbatim afterwards.
use crate::constants::{CATEGORICAL_PREFIX, CATEGORY_SEPARATOR, MISSING_CATEGORY, NUMERIC_PREFIX};
use crate::data::DenseMatrix;
use crate::errors::{Result, RiskError};
use crate::schema::{FeatureRow, FeatureType, FeatureValue, FEATURE_DEFINITIONS};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Fitted statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub key: String,
    /// Registry position of the key.
    pub index: usize,
    pub median: f64,
    pub mean: f64,
    pub scale: f64,
}

impl NumericColumn {
    fn transform(&self, value: &FeatureValue) -> f64 {
        let v = value.as_f64().unwrap_or(self.median);
        (v - self.mean) / self.scale
    }
}

/// Fitted statistics for one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub key: String,
    pub index: usize,
    pub mode: String,
    /// Sorted vocabulary observed at fit time.
    pub categories: Vec<String>,
}

impl CategoricalColumn {
    fn category_of(&self, value: &FeatureValue) -> String {
        match value {
            FeatureValue::Categorical(s) => s.clone(),
            FeatureValue::Numeric(v) => v.to_string(),
            FeatureValue::Missing => self.mode.clone(),
        }
    }

    fn transform_into(&self, value: &FeatureValue, out: &mut Vec<f64>) {
        let category = self.category_of(value);
        // Unknown categories leave the whole block at zero.
        out.extend(
            self.categories
                .iter()
                .map(|c| if *c == category { 1.0 } else { 0.0 }),
        );
    }
}

/// The fitted transformation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

impl Preprocessor {
    /// Learn imputation, scaling and vocabulary statistics from the fitting rows.
    pub fn fit(rows: &[FeatureRow]) -> Result<Self> {
        if rows.is_empty() {
            return Err(RiskError::InvalidParameter(
                "rows".to_string(),
                "at least one row".to_string(),
                "0".to_string(),
            ));
        }
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for (index, def) in FEATURE_DEFINITIONS.iter().enumerate() {
            match def.feature_type {
                FeatureType::Numeric => {
                    let observed: Vec<f64> = rows
                        .iter()
                        .filter_map(|r| r.value_at(index).as_f64())
                        .collect();
                    let median = median(&observed).unwrap_or(0.0);
                    let imputed: Vec<f64> = rows
                        .iter()
                        .map(|r| r.value_at(index).as_f64().unwrap_or(median))
                        .collect();
                    let (mean, std) = mean_std(&imputed);
                    numeric.push(NumericColumn {
                        key: def.key.to_string(),
                        index,
                        median,
                        mean,
                        scale: if std > 0.0 { std } else { 1.0 },
                    });
                }
                FeatureType::Categorical => {
                    let mut column = CategoricalColumn {
                        key: def.key.to_string(),
                        index,
                        mode: MISSING_CATEGORY.to_string(),
                        categories: Vec::new(),
                    };
                    let observed: Vec<String> = rows
                        .iter()
                        .map(|r| r.value_at(index))
                        .filter(|v| !v.is_missing())
                        .map(|v| column.category_of(v))
                        .collect();
                    if let Some(mode) = mode(&observed) {
                        column.mode = mode;
                    }
                    let mut categories: Vec<String> = rows
                        .iter()
                        .map(|r| column.category_of(r.value_at(index)))
                        .collect();
                    categories.sort();
                    categories.dedup();
                    column.categories = categories;
                    categorical.push(column);
                }
            }
        }
        Ok(Preprocessor { numeric, categorical })
    }

    /// Number of output columns.
    pub fn n_features_out(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
    }

    /// Transformed column names, numeric block first.
    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .numeric
            .iter()
            .map(|c| format!("{}{}", NUMERIC_PREFIX, c.key))
            .collect();
        for column in &self.categorical {
            for category in &column.categories {
                names.push(format!("{}{}{}{}", CATEGORICAL_PREFIX, column.key, CATEGORY_SEPARATOR, category));
            }
        }
        names
    }

    /// Transform one full-width row.
    pub fn transform_row(&self, row: &FeatureRow) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.n_features_out());
        for column in &self.numeric {
            out.push(column.transform(row.value_at(column.index)));
        }
        for column in &self.categorical {
            column.transform_into(row.value_at(column.index), &mut out);
        }
        out
    }

    /// Transform many rows into a dense matrix.
    pub fn transform(&self, rows: &[FeatureRow]) -> DenseMatrix {
        let mut matrix = DenseMatrix::with_cols(self.n_features_out());
        for row in rows {
            matrix.append_row(&self.transform_row(row));
        }
        matrix
    }
}

/// Map a transformed column name back onto its base feature key.
///
/// Categorical columns are `cat__<key>_<category>`; the key ends at the first
/// separator, so this is only exact while no registered key contains one.
pub fn base_feature(transformed_name: &str) -> &str {
    if let Some(rest) = transformed_name.strip_prefix(NUMERIC_PREFIX) {
        rest
    } else if let Some(rest) = transformed_name.strip_prefix(CATEGORICAL_PREFIX) {
        rest.split(CATEGORY_SEPARATOR).next().unwrap_or(rest)
    } else {
        transformed_name
    }
}

/// Sum per-column values into their base features, keeping first-seen order.
pub fn aggregate_by_base_feature<'a>(names: &'a [String], values: &[f64]) -> Vec<(&'a str, f64)> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut grouped: Vec<(&str, f64)> = Vec::new();
    for (name, value) in names.iter().zip(values) {
        let base = base_feature(name);
        match position.get(base) {
            Some(&i) => grouped[i].1 += value,
            None => {
                position.insert(base, grouped.len());
                grouped.push((base, *value));
            }
        }
    }
    grouped
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Most frequent value, the smallest one on ties.
fn mode(values: &[String]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(v, _)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{build_full_row, feature_keys};
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn row(v: Value) -> FeatureRow {
        let m: BTreeMap<String, Value> = serde_json::from_value(v).unwrap();
        build_full_row(&m)
    }

    fn fitted() -> Preprocessor {
        let rows = vec![
            row(json!({"age": 20, "gender": "male", "attendingFromHome": "yes"})),
            row(json!({"age": 30, "gender": "female", "attendingFromHome": "no"})),
            row(json!({"age": 40, "gender": "female"})),
            row(json!({"gender": "male"})),
        ];
        Preprocessor::fit(&rows).unwrap()
    }

    #[test]
    fn test_fit_statistics() {
        let p = fitted();
        let age = p.numeric.iter().find(|c| c.key == "age").unwrap();
        assert_eq!(age.median, 30.0);
        // Imputed column is [20, 30, 40, 30].
        assert_eq!(age.mean, 30.0);
        assert!((age.scale - 50.0_f64.sqrt()).abs() < 1e-12);

        let gender = p.categorical.iter().find(|c| c.key == "gender").unwrap();
        assert_eq!(gender.mode, "female");
        assert_eq!(gender.categories, vec!["female", "male"]);

        // A column never observed keeps its width.
        let logins = p.numeric.iter().find(|c| c.key == "logins").unwrap();
        assert_eq!(logins.median, 0.0);
        assert_eq!(logins.scale, 1.0);
        let ward = p.categorical.iter().find(|c| c.key == "uniConnectTargetWard").unwrap();
        assert_eq!(ward.categories, vec![MISSING_CATEGORY]);
    }

    #[test]
    fn test_mode_tie_takes_smallest() {
        let p = fitted();
        let home = p.categorical.iter().find(|c| c.key == "attendingFromHome").unwrap();
        assert_eq!(home.mode, "no");
        assert_eq!(home.categories, vec!["no", "yes"]);
    }

    #[test]
    fn test_transform_unknown_category_is_zero() {
        let p = fitted();
        let names = p.feature_names_out();
        let out = p.transform_row(&row(json!({"gender": "nonbinary"})));
        assert_eq!(out.len(), names.len());
        for (name, v) in names.iter().zip(&out) {
            if name.starts_with("cat__gender_") {
                assert_eq!(*v, 0.0);
            }
        }
    }

    #[test]
    fn test_transform_missing_imputes() {
        let p = fitted();
        let names = p.feature_names_out();
        let out = p.transform_row(&FeatureRow::empty());
        let age_idx = names.iter().position(|n| n == "num__age").unwrap();
        assert_eq!(out[age_idx], 0.0);
        let female = names.iter().position(|n| n == "cat__gender_female").unwrap();
        assert_eq!(out[female], 1.0);
    }

    #[test]
    fn test_feature_names_map_to_registry() {
        let p = fitted();
        let keys: Vec<&str> = feature_keys().collect();
        for name in p.feature_names_out() {
            assert!(keys.contains(&base_feature(&name)), "{}", name);
        }
    }

    #[test]
    fn test_base_feature() {
        assert_eq!(base_feature("num__age"), "age");
        assert_eq!(base_feature("cat__gender_female"), "gender");
        assert_eq!(base_feature("cat__attendingFromHome_not_sure"), "attendingFromHome");
        assert_eq!(base_feature("other"), "other");
    }

    #[test]
    fn test_registry_keys_have_no_separator() {
        for key in feature_keys() {
            assert!(!key.contains(CATEGORY_SEPARATOR), "{} would be split by base_feature", key);
        }
    }

    #[test]
    fn test_aggregate_by_base_feature() {
        let names: Vec<String> = ["num__age", "cat__gender_f", "cat__gender_m"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let grouped = aggregate_by_base_feature(&names, &[1.0, 0.5, -2.0]);
        assert_eq!(grouped, vec![("age", 1.0), ("gender", -1.5)]);
    }
}

//! Synthetic training data, used when no real dataset can be trained on.
use crate::constants::SYNTHETIC_ROWS;
use crate::schema::{FeatureRow, FeatureValue};
use crate::trainer::TrainingTable;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

const QUINTILE_KEYS: [&str; 8] = [
    "polar4Quintile",
    "polar3Quintile",
    "adultHe2001Quintile",
    "adultHe2011Quintile",
    "tundraMsoaQuintile",
    "tundraLsoaQuintile",
    "gapsGcseQuintile",
    "gapsGcseEthnicityQuintile",
];

enum Column {
    Choice(&'static [&'static str]),
    Normal(f64, f64),
    Integer(i64, i64),
}

/// Box-Muller draw from `N(mean, std)`.
fn normal(rng: &mut StdRng, mean: f64, std: f64) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    mean + std * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn columns() -> Vec<(&'static str, Column)> {
    let mut columns = vec![
        ("gender", Column::Choice(&["male", "female"])),
        ("age", Column::Normal(24.0, 4.0)),
        ("logins", Column::Integer(1, 120)),
        ("totalHoursInModuleArea", Column::Normal(35.0, 15.0)),
        ("percentOfAverageHours", Column::Normal(100.0, 25.0)),
        ("presence", Column::Normal(60.0, 15.0)),
        ("absence", Column::Normal(40.0, 12.0)),
        ("percentAttended", Column::Normal(72.0, 15.0)),
        ("attendingFromHome", Column::Choice(&["yes", "no"])),
        ("distanceToUniversityKm", Column::Normal(12.0, 8.0)),
    ];
    columns.extend(QUINTILE_KEYS.iter().map(|&k| (k, Column::Integer(1, 6))));
    columns.push(("uniConnectTargetWard", Column::Choice(&["yes", "no"])));
    columns
}

/// A fully populated table of `SYNTHETIC_ROWS` students, generated column by
/// column. A student fails when at least two of high absence, few logins and
/// low attendance hold.
pub fn synthetic_dataset(seed: u64) -> TrainingTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = vec![FeatureRow::empty(); SYNTHETIC_ROWS];
    for (key, column) in columns() {
        for row in rows.iter_mut() {
            let value = match &column {
                Column::Choice(options) => {
                    FeatureValue::Categorical(options.choose(&mut rng).copied().unwrap_or_default().to_string())
                }
                Column::Normal(mean, std) => FeatureValue::Numeric(normal(&mut rng, *mean, *std)),
                Column::Integer(low, high) => FeatureValue::Numeric(rng.gen_range(*low..*high) as f64),
            };
            row.set(key, value);
        }
    }

    let labels = rows
        .iter()
        .map(|row| {
            let value = |key: &str| row.get(key).and_then(FeatureValue::as_f64).unwrap_or(0.0);
            let signals = [
                value("absence") > 50.0,
                value("logins") < 15.0,
                value("percentAttended") < 60.0,
            ];
            u8::from(signals.iter().filter(|&&s| s).count() >= 2)
        })
        .collect();
    TrainingTable { rows, labels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FEATURE_DEFINITIONS;

    #[test]
    fn test_synthetic_dataset_is_complete() {
        let table = synthetic_dataset(42);
        assert_eq!(table.len(), SYNTHETIC_ROWS);
        assert_eq!(table.labels.len(), SYNTHETIC_ROWS);
        assert_eq!(columns().len(), FEATURE_DEFINITIONS.len());
        for row in &table.rows {
            assert!(row.iter().all(|(_, v)| !v.is_missing()));
            let q = row.get("polar4Quintile").and_then(FeatureValue::as_f64).unwrap();
            assert!((1.0..6.0).contains(&q));
        }
        assert_eq!(table.n_distinct_labels(), 2);
    }

    #[test]
    fn test_synthetic_dataset_is_seeded() {
        assert_eq!(synthetic_dataset(7), synthetic_dataset(7));
        assert_ne!(synthetic_dataset(7), synthetic_dataset(8));
    }

    #[test]
    fn test_normal_moments() {
        let mut rng = StdRng::seed_from_u64(0);
        let draws: Vec<f64> = (0..20_000).map(|_| normal(&mut rng, 10.0, 2.0)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!((mean - 10.0).abs() < 0.1);
        assert!((var.sqrt() - 2.0).abs() < 0.1);
    }
}

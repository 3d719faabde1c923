pub const GREEN_UPPER: f64 = 0.33;
pub const YELLOW_UPPER: f64 = 0.66;
pub const DECISION_THRESHOLD: f64 = 0.5;
pub const TOP_K_EXPLANATIONS: usize = 5;
pub const BACKGROUND_ROWS: usize = 200;
pub const VALIDATION_FRACTION: f64 = 0.2;
pub const FOREST_N_TREES: usize = 350;
pub const LOGISTIC_MAX_ITER: usize = 1500;
pub const LOGISTIC_C: f64 = 1.0;
pub const LOGISTIC_TOL: f64 = 1e-8;
pub const SYNTHETIC_ROWS: usize = 200;
pub const NUMERIC_PREFIX: &str = "num__";
pub const CATEGORICAL_PREFIX: &str = "cat__";
pub const CATEGORY_SEPARATOR: char = '_';
pub const MISSING_CATEGORY: &str = "missing";
pub const SYNTHETIC_DATASET_PATH: &str = "synthetic-fallback";
pub const ARTIFACT_FILE_NAME: &str = "model.json";
pub const LABEL_CANDIDATES: [&str; 6] = ["label", "fail_pass", "target", "result", "outcome", "fail"];

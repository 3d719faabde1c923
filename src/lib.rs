mod node;
mod shapley;

// Modules
pub mod api;
pub mod bundle;
pub mod config;
pub mod constants;
pub mod data;
pub mod dataset;
pub mod errors;
pub mod explain;
pub mod forest;
pub mod linear;
pub mod manager;
pub mod metric;
pub mod model;
pub mod preprocessor;
pub mod sampler;
pub mod schema;
pub mod synthetic;
pub mod trainer;
pub mod tree;
pub mod utils;
pub mod whatif;

// Individual classes, and functions
pub use bundle::{ArtifactBundle, ArtifactIO, PredictionResult, RiskBucket};
pub use config::ServiceConfig;
pub use data::DenseMatrix;
pub use errors::{Result, RiskError};
pub use manager::ModelManager;
pub use model::FittedModel;
pub use preprocessor::Preprocessor;
pub use schema::{FeatureRow, FeatureValue};
pub use trainer::{train_best_model, TrainingTable};

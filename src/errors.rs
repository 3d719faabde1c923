//! Errors
//!
//! Custom error types used throughout the `edurisk` crate.
use thiserror::Error;

/// Errors that can occur while training, loading or serving a risk model.
#[derive(Debug, Error)]
pub enum RiskError {
    /// None of the headers of the training table is a known label column.
    #[error("Could not detect label column. Expected one of: {0}.")]
    LabelColumnNotFound(String),
    /// No training dataset could be resolved on disk.
    #[error("No CSV dataset found in {0}.")]
    DatasetNotFound(String),
    /// The cleaned training labels contain a single class.
    #[error("Dataset label contains only one class.")]
    SingleClassLabel,
    /// A class has too few members to be stratified.
    #[error("Unable to stratify the split: {0}.")]
    InsufficientClassMembers(String),
    /// No candidate model could be fitted.
    #[error("Model selection failed: {0}.")]
    ModelSelectionFailure(String),
    /// Exact attributions could not be computed for this model and row.
    #[error("Attribution unavailable: {0}.")]
    AttributionUnavailable(String),
    /// The persisted artifact bundle could not be deserialized.
    #[error("Unable to load artifact bundle: {0}")]
    ArtifactLoadFailure(String),
    /// Unable to write to a file.
    #[error("Unable to write to file: {0}")]
    UnableToWrite(String),
    /// Unable to read from a file.
    #[error("Unable to read from file {0}")]
    UnableToRead(String),
    /// The request payload was rejected at the boundary.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
}

impl RiskError {
    /// True for errors caused by the caller's payload rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RiskError::InvalidRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;

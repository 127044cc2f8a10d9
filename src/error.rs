//! Error taxonomy for the flight feature pipeline.

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Caller supplied an invalid argument, such as a date range outside the
    /// supported years or an airport with no known coordinates.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Two options were requested together that cannot be honoured together.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// Input or cached data violates an invariant the pipeline relies on.
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Invalid input file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

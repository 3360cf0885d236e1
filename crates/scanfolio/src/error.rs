use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanfolioError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),

    #[error("Queue store error: {0}")]
    QueueStore(#[from] QueueStoreError),

    #[error("Result store error: {0}")]
    Store(#[from] StoreError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Analysis client setup failed: {0}")]
    AnalysisClient(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failure to turn one uploaded file (or one of its pages) into a canonical page image.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Failed to read source file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode canonical image: {0}")]
    Encode(String),

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Intake worker failed: {0}")]
    Worker(String),
}

#[derive(Error, Debug)]
pub enum QueueStoreError {
    #[error("Failed to read queue file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write queue file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Queue file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the versioned result store and the commands that write through it.
///
/// `Invariant` is a programmer error; the remaining variants reject a user command
/// that names something the current snapshot does not contain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Result set invariant violated: {0}")]
    Invariant(String),

    #[error("No page with number {0}")]
    PageNotFound(u32),

    #[error("No result with uuid '{0}'")]
    ResultNotFound(String),

    #[error("Page {0} is not flagged as a potential duplicate")]
    NotADuplicate(u32),

    #[error("No document group with id '{0}'")]
    GroupNotFound(String),

    #[error("Invalid merge: {0}")]
    InvalidMerge(String),

    #[error("No cached image for page {0}; it cannot be retried")]
    ImageUnavailable(u32),
}

pub type Result<T> = std::result::Result<T, ScanfolioError>;

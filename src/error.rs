use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for document composition
pub type Result<T> = std::result::Result<T, Error>;

/// Error types raised while loading, merging and validating API documents
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error in {}: {message}", file.display())]
    Parse { file: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("OpenAPI resource '{path}' not found. Expected resource name: '{resource}'")]
    ResourceNotFound { path: String, resource: String },

    #[error("OpenAPI resource '{0}' is empty")]
    EmptyResource(String),

    #[error("at least three common OpenAPI fragments are required (schemas, responses, security), found {0}")]
    InsufficientCommonFragments(usize),

    #[error("duplicate path '{path}' from {fragment}")]
    DuplicatePath { path: String, fragment: String },

    #[error("conflicting component '{section}.{key}'. Existing: {existing}, Incoming: {incoming}")]
    ConflictingComponent {
        section: String,
        key: String,
        existing: String,
        incoming: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("OpenAPI document has not been loaded yet")]
    DocumentNotLoaded,

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}

/// Aggregate lint failure carrying every message in the order it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub errors: Vec<String>,
}

impl ValidationError {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpenAPI validation failed. {}", self.errors.join(" | "))
    }
}

impl std::error::Error for ValidationError {}

//! Error types shared across the validation engine.

use thiserror::Error;

/// Failures raised by the graph layer.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Graph parse error at line {line}, column {column}: {message}")]
    ParseAt {
        line: u64,
        column: u64,
        message: String,
    },

    #[error("Graph parse error: {0}")]
    Parse(String),

    #[error("Query execution error: {0}")]
    QueryExecution(String),

    #[error("Graph storage error: {0}")]
    Storage(#[from] oxigraph::store::StorageError),

    #[error("Graph serialization error: {0}")]
    Serialization(String),
}

/// Failures raised by the schema catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Schema model already registered: {0}")]
    DuplicateModel(String),

    #[error("Schema model not found: {0}")]
    NotFound(String),

    #[error("Invalid schema model: {0}")]
    InvalidArgument(String),

    #[error("Schema model graph is invalid: {0}")]
    Graph(#[from] GraphError),

    #[error("Catalog initialization failed: {0}")]
    Bootstrap(String),
}

/// Failures raised while generating or extracting descriptions.
#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Unsupported description variant: {0}")]
    UnsupportedVariant(String),

    #[error("Incomplete description for {subject}: missing {field}")]
    IncompleteDescription { field: String, subject: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Failures of one domain operation. Each is reported to the caller as a
/// failed result, never as a transport error.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("{0}")]
    Rejected(String),
}

/// Failures raised by a [`crate::transport::Transport`].
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Queue not declared: {0}")]
    UnknownQueue(String),

    #[error("Queue already has a consumer: {0}")]
    AlreadyConsumed(String),

    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(u64),

    #[error("Transport connection closed")]
    Closed,

    #[error("Payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Failures raised while dispatching one inbound message.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to decode request payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode reply payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failures raised while loading or checking configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

use thiserror::Error;

/// Failures talking to a model backend. These abort the current request.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed backend response: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Failed to start blocking runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Failures resolving a tool-call intent into something executable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Could not find function to call: {0}")]
    NotFound(String),

    #[error("Error while decoding function arguments for '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Function '{0}' has no entrypoint")]
    MissingEntrypoint(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

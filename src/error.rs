//! Error types for the extension lifecycle manager.

/// Top-level error type for fetching, installing, binding and update checks.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// Non-2xx response or transport failure while downloading an archive or
    /// fetching release metadata.
    #[error("network error: {0}")]
    Network(String),

    /// Missing or unparsable `manifest.json`.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Archive could not be unpacked, or its expected root folder is absent.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// The session runtime rejected the extension load.
    #[error("session load error: {0}")]
    SessionLoad(String),

    /// Durable key-value state could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ExtensionError>;

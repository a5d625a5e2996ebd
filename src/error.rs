//! # Error Types
//!
//! Custom error types for the fuel link using `thiserror`.

use thiserror::Error;

/// Main error type for the fuel link
#[derive(Debug, Error)]
pub enum LinkError {
    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Frame codec errors
    #[error("Frame error: {0}")]
    Frame(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the fuel link
pub type Result<T> = std::result::Result<T, LinkError>;

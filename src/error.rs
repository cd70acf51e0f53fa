//! Error types and handling for the `Inkboard` dashboard service

use thiserror::Error;

/// Main error type for the `Inkboard` service
#[derive(Error, Debug)]
pub enum InkboardError {
    /// A required credential or identifier is missing. Raised before any
    /// network call is attempted; not recoverable within a refresh cycle.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A provider returned a non-success status or an undecodable payload.
    /// Recoverable at the orchestrator by omitting the section.
    #[error("Provider error: {message}")]
    Provider { message: String },

    /// A single record was malformed. Adapters substitute a safe default or
    /// drop the record instead of propagating this.
    #[error("Data anomaly: {message}")]
    Data { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl InkboardError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new provider error
    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a new data anomaly error
    pub fn data<S: Into<String>>(message: S) -> Self {
        Self::Data {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for InkboardError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider {
            message: err.to_string(),
        }
    }
}

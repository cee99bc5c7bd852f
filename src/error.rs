//! Error types and handling for the ingestion run

use std::fmt;

use thiserror::Error;

/// Main error type for the ingestion pipeline
#[derive(Error, Debug)]
pub enum IngestError {
    /// A required setting is absent or empty; aborts the run before any side effect
    #[error("Missing configuration: {setting} is missing or empty")]
    ConfigurationMissing { setting: String },

    /// A setting is present but unusable
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Token acquisition failed (HTTP status or malformed token payload)
    #[error("Authentication failed: {message}")]
    AuthFailure { message: String },

    /// Forecast request failed (non-success status or transport error)
    #[error("Forecast fetch failed: {message}")]
    FetchFailure { message: String },

    /// Blob upload or read-back failed
    #[error("Storage write failed: {message}")]
    StorageWriteFailure { message: String },
}

/// Stage of the per-coordinate pipeline an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Configuration,
    Auth,
    Fetch,
    Storage,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::Configuration => "configuration",
            FailureStage::Auth => "auth",
            FailureStage::Fetch => "fetch",
            FailureStage::Storage => "storage",
        };
        f.write_str(name)
    }
}

impl IngestError {
    /// Create a new missing-configuration error
    pub fn missing<S: Into<String>>(setting: S) -> Self {
        Self::ConfigurationMissing {
            setting: setting.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::AuthFailure {
            message: message.into(),
        }
    }

    /// Create a new fetch error
    pub fn fetch<S: Into<String>>(message: S) -> Self {
        Self::FetchFailure {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::StorageWriteFailure {
            message: message.into(),
        }
    }

    /// Pipeline stage this error was raised in
    #[must_use]
    pub fn stage(&self) -> FailureStage {
        match self {
            IngestError::ConfigurationMissing { .. } | IngestError::Config { .. } => {
                FailureStage::Configuration
            }
            IngestError::AuthFailure { .. } => FailureStage::Auth,
            IngestError::FetchFailure { .. } => FailureStage::Fetch,
            IngestError::StorageWriteFailure { .. } => FailureStage::Storage,
        }
    }

    /// Whether this error aborts the whole run instead of a single coordinate
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.stage() == FailureStage::Configuration
    }
}

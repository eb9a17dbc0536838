//! Client error types.

use thiserror::Error;
use vestige_core::TracingError;
use vestige_providers::{DirectoryError, ProviderError};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that end the program.
///
/// Failures while submitting a single work item are reported on the console
/// and never become a `ClientError`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Authentication or another call to the calendar service failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The calendar directory could not be built.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Console IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging could not be set up.
    #[error("failed to initialize logging: {0}")]
    Tracing(#[from] TracingError),
}

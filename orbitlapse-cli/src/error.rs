//! CLI error type.

use std::fmt;

use orbitlapse::config::ConfigError;
use orbitlapse::loader::LoaderError;
use orbitlapse::provider::{ProviderError, QueryError};

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file or option problem.
    Config(String),
    /// Invalid command-line arguments.
    InvalidArgument(String),
    /// Loader or storage failure.
    Loader(LoaderError),
    /// HTTP client could not be created.
    Provider(ProviderError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Loader(e) => write!(f, "{}", e),
            CliError::Provider(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        CliError::InvalidArgument(e.to_string())
    }
}

impl From<LoaderError> for CliError {
    fn from(e: LoaderError) -> Self {
        match e {
            LoaderError::Query(q) => q.into(),
            other => CliError::Loader(other),
        }
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::Provider(e)
    }
}

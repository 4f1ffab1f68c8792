//! CLI-specific error types
//!
//! All CLI errors are fatal: the process prints the error and exits 1.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::filter::FilterError;
use crate::geo::GeoError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration or schema file error
    ConfigError,
    /// I/O error (stdin/stdout, files)
    IoError,
    /// The stdin request is not the expected shape
    InvalidInput,
    /// Error raised by a library subsystem, carrying its own code
    Library(&'static str),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "ESGEO_CLI_CONFIG_ERROR",
            Self::IoError => "ESGEO_CLI_IO_ERROR",
            Self::InvalidInput => "ESGEO_CLI_INVALID_INPUT",
            Self::Library(code) => code,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidInput, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::invalid_input(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::new(CliErrorCode::Library(e.code()), e.to_string())
    }
}

impl From<FilterError> for CliError {
    fn from(e: FilterError) -> Self {
        Self::new(CliErrorCode::Library(e.code()), e.to_string())
    }
}

impl From<GeoError> for CliError {
    fn from(e: GeoError) -> Self {
        Self::new(CliErrorCode::Library(e.code()), e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_codes_pass_through() {
        let err: CliError = GeoError::InvalidBbox("1,2".into()).into();
        assert_eq!(err.code_str(), "ESGEO_BBOX_INVALID");

        let err: CliError = FilterError::configuration("q", "not an object").into();
        assert_eq!(err.code_str(), "ESGEO_FILTER_CONFIG");
        assert!(err.to_string().starts_with("ESGEO_FILTER_CONFIG: "));
    }

    #[test]
    fn test_json_error_is_invalid_input() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CliError = json_err.into();
        assert_eq!(err.code(), &CliErrorCode::InvalidInput);
    }
}

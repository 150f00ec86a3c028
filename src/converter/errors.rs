use std::path::PathBuf;
use thiserror::Error;

/// Error types for the page conversion pipeline
#[derive(Debug, Error)]
pub enum ConverterError {
    /// Input content related errors
    #[error("Input error: {0}")]
    Input(#[from] InputError),
    /// Element conversion errors that escaped local recovery
    #[error("Element conversion error: {0}")]
    Element(#[from] ElementError),
    /// File operation related errors
    #[error("File operation error: {0}")]
    FileOperation(#[from] FileOperationError),
    /// Page fetch related errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Errors raised for content that cannot be split at all
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Markdown content is empty")]
    EmptyContent,
    #[error("No level-1 headings found in Markdown content")]
    NoSections,
}

/// A single element could not be converted by its rule.
/// The converter recovers from these by falling back to pass-through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ElementError {
    #[error("Malformed <{tag}> element: {reason}")]
    MalformedElement { tag: String, reason: String },
}

/// File operation specific errors
#[derive(Debug, Error)]
pub enum FileOperationError {
    #[error("Failed to create directory {path:?}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write file {path:?}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read file {path:?}: {source}")]
    FileReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid file path: {0}")]
    InvalidPath(String),
    #[error("Checksum mismatch for {0:?} right after writing")]
    ChecksumMismatch(PathBuf),
}

/// Failures of the page fetch collaborator
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("HTTP request failed for: {0}")]
    RequestFailed(String),
    #[error("Request timeout after {seconds}s for: {url}")]
    Timeout { url: String, seconds: u64 },
    #[error("No page returned for: {0}")]
    NoPage(String),
}

/// Configuration specific errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("Configuration parse error: {0}")]
    ParseError(String),
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}

impl From<serde_yaml::Error> for ConverterError {
    fn from(err: serde_yaml::Error) -> Self {
        ConverterError::Configuration(ConfigurationError::ParseError(err.to_string()))
    }
}

impl From<url::ParseError> for ConverterError {
    fn from(err: url::ParseError) -> Self {
        ConverterError::Fetch(FetchError::InvalidUrl(err.to_string()))
    }
}

/// Result type alias for converter operations
pub type ConverterResult<T> = Result<T, ConverterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConverterError::Input(InputError::NoSections);
        assert!(error.to_string().contains("Input error"));
        assert!(error.to_string().contains("No level-1 headings"));
    }

    #[test]
    fn test_element_error_display() {
        let error = ElementError::MalformedElement {
            tag: "table".to_string(),
            reason: "no rows".to_string(),
        };
        assert_eq!(error.to_string(), "Malformed <table> element: no rows");
    }

    #[test]
    fn test_error_conversions() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let converted: ConverterError = parse_err.into();
        match converted {
            ConverterError::Fetch(FetchError::InvalidUrl(_)) => {}
            other => panic!("Expected FetchError::InvalidUrl, got {:?}", other),
        }

        let yaml_err = serde_yaml::from_str::<Vec<u32>>("{ not: [a list").unwrap_err();
        let converted: ConverterError = yaml_err.into();
        assert!(matches!(
            converted,
            ConverterError::Configuration(ConfigurationError::ParseError(_))
        ));
    }
}

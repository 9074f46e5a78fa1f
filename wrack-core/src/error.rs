//! Error types for the wrack system

use thiserror::Error;

/// Core error type for wrack operations
#[derive(Error, Debug)]
pub enum WrackError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database could not be reached at startup
    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),

    /// Key-value store could not be reached at startup
    #[error("Key-value store unavailable: {0}")]
    KeyValueUnavailable(String),

    /// Database query or transaction errors
    #[error("Database error: {0}")]
    Database(String),

    /// Key-value store operation errors
    #[error("Key-value store error: {0}")]
    KeyValue(String),

    /// Value not present in a controlled vocabulary table
    #[error("Unknown value '{value}' in {table}")]
    UnknownValue { value: String, table: String },

    /// Referenced object does not exist
    #[error("{kind} with ID {id} does not exist")]
    UnknownId { kind: String, id: i64 },

    /// Object already exists
    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Webserver bind address already taken
    #[error("Address {addr} is already in use (is another wrack webserver running?)")]
    AddrInUse { addr: String },

    /// EBI submission errors
    #[error("EBI submission error: {0}")]
    Ebi(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for wrack operations
pub type Result<T> = std::result::Result<T, WrackError>;

impl From<serde_json::Error> for WrackError {
    fn from(err: serde_json::Error) -> Self {
        WrackError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for WrackError {
    fn from(err: toml::de::Error) -> Self {
        WrackError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for WrackError {
    fn from(err: toml::ser::Error) -> Self {
        WrackError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_json_error_conversion() {
        // Create a serde_json error by trying to parse invalid JSON
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let wrack_err: WrackError = json_err.into();

        match wrack_err {
            WrackError::Serialization(msg) => {
                assert!(!msg.is_empty());
            }
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("not [ valid").unwrap_err();
        let wrack_err: WrackError = toml_err.into();

        match wrack_err {
            WrackError::Config(msg) => {
                assert!(!msg.is_empty());
            }
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let wrack_err: WrackError = io_err.into();

        match wrack_err {
            WrackError::Io(e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_display() {
        // Test Display implementation for various error types
        let err = WrackError::Config("missing section".to_string());
        assert_eq!(format!("{}", err), "Configuration error: missing section");

        let err = WrackError::UnknownValue {
            value: "raw_sff".to_string(),
            table: "filepath_type".to_string(),
        };
        assert_eq!(format!("{}", err), "Unknown value 'raw_sff' in filepath_type");

        let err = WrackError::UnknownId {
            kind: "Study".to_string(),
            id: 42,
        };
        assert_eq!(format!("{}", err), "Study with ID 42 does not exist");

        let err = WrackError::AddrInUse {
            addr: "127.0.0.1:21174".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Address 127.0.0.1:21174 is already in use (is another wrack webserver running?)"
        );

        let err = WrackError::DatabaseUnavailable("connection refused".to_string());
        assert_eq!(
            format!("{}", err),
            "Database unavailable: connection refused"
        );
    }
}

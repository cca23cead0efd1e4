//! Tests for error types

use ensayo::Error;

#[test]
fn test_validation_error() {
    let error = Error::Validation("must have at least 2 variants".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Experiment validation failed"));
    assert!(error_str.contains("at least 2 variants"));
}

#[test]
fn test_storage_error() {
    let error = Error::Storage("collection unavailable".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Storage error"));
    assert!(error_str.contains("collection unavailable"));
}

#[test]
fn test_serialization_error_conversion() {
    let serde_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let error: Error = serde_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("Serialization error"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
}

#[test]
fn test_error_debug() {
    let error = Error::Validation("bad".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("Validation"));
}

#[test]
fn test_result_type_alias() {
    #[allow(clippy::unnecessary_wraps)]
    fn returns_result() -> ensayo::Result<i32> {
        Ok(42)
    }

    let result = returns_result();
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), 42);
}

#[test]
fn test_result_type_alias_error() {
    fn returns_error() -> ensayo::Result<i32> {
        Err(Error::Validation("test error".to_string()))
    }

    let result = returns_error();
    assert!(result.is_err());
}

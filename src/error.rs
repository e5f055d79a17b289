use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Engine error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Entry name rejected before reaching the backend.
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// The backend refused or failed a request.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A realtime event or listing could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Filesystem watcher could not be started.
    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
        assert!(app_err.to_string().contains("file not found"));
    }

    #[test]
    fn invalid_path_error_display() {
        let err = AppError::InvalidPath("/nonexistent".into());
        assert_eq!(err.to_string(), "Invalid path: /nonexistent");
    }

    #[test]
    fn invalid_name_error_quotes_name() {
        let err = AppError::InvalidName("a/b".into());
        assert_eq!(err.to_string(), "Invalid name: \"a/b\"");
    }

    #[test]
    fn decode_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let app_err: AppError = json_err.into();
        assert!(matches!(app_err, AppError::Decode(_)));
    }
}

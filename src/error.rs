use thiserror::Error;

/// Result type for image store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by an image store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be contacted at all
    #[error("Image store unreachable: {0}")]
    Unreachable(String),

    /// The store has no record for this id
    #[error("No such image: {0}")]
    NotFound(String),

    /// The store answered, but the answer could not be decoded
    #[error("Malformed image record: {0}")]
    Malformed(String),

    /// The store tool ran but reported a failure of its own
    #[error("Image store command failed: {0}")]
    CommandFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error means the whole store is gone, rather than one record
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unreachable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unreachable_is_fatal() {
        assert!(StoreError::Unreachable("socket".to_string()).is_fatal());
        assert!(!StoreError::NotFound("abc".to_string()).is_fatal());
        assert!(!StoreError::Malformed("bad json".to_string()).is_fatal());
    }

    #[test]
    fn test_json_errors_become_malformed() {
        let err: StoreError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert!(matches!(err, StoreError::Malformed(_)));
    }
}

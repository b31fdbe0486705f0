//! Store error types.

use psytest_core::TestError;
use thiserror::Error;

/// Errors raised by document-store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document with this id exists in the collection.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// A document with this id already exists.
    #[error("duplicate document id: {collection}/{id}")]
    Duplicate { collection: String, id: String },

    /// The backend rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// Reading or writing a collection file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A collection file does not contain valid documents.
    #[error("corrupt collection '{collection}': {message}")]
    Corrupt { collection: String, message: String },
}

impl From<StoreError> for TestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => TestError::not_found("document", id),
            StoreError::Duplicate { .. } => TestError::Validation(err.to_string()),
            StoreError::AuthenticationFailed(msg) => TestError::Unauthorized(msg),
            StoreError::ApiError { status, .. } if (400..500).contains(&status) => {
                TestError::Validation(err.to_string())
            }
            StoreError::Corrupt { .. } => TestError::Validation(err.to_string()),
            StoreError::ApiError { .. }
            | StoreError::Timeout(_)
            | StoreError::NetworkError(_)
            | StoreError::Io(_) => TestError::Network(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_onto_engine_taxonomy() {
        let not_found: TestError = StoreError::NotFound {
            collection: "tests".into(),
            id: "t9".into(),
        }
        .into();
        assert!(matches!(not_found, TestError::NotFound { ref id, .. } if id == "t9"));

        let auth: TestError = StoreError::AuthenticationFailed("bad key".into()).into();
        assert!(auth.requires_redirect());

        let server: TestError = StoreError::ApiError {
            status: 503,
            message: "down".into(),
        }
        .into();
        assert!(matches!(server, TestError::Network(_)));

        let client: TestError = StoreError::ApiError {
            status: 422,
            message: "bad body".into(),
        }
        .into();
        assert!(matches!(client, TestError::Validation(_)));

        let timeout: TestError = StoreError::Timeout(10).into();
        assert!(timeout.to_string().contains("timed out after 10s"));
    }
}

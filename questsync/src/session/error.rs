//! Error types for download sessions and their collaborators.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Failure reported by a quest provider or the freshness index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("provider error: {0}")]
    Other(String),
}

/// Errors from [`DownloadSession`](super::DownloadSession).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// `download()` was called before `init()`.
    #[error("download session used before init")]
    NotConfigured,

    /// `init()` was called twice.
    #[error("download session already configured")]
    AlreadyConfigured,

    /// `download()` was called twice.
    #[error("download session already started")]
    AlreadyStarted,

    #[error("freshness index query failed: {0}")]
    Freshness(#[source] ProviderError),

    #[error("download of {quest_type} failed: {source}")]
    Provider {
        quest_type: String,
        #[source]
        source: ProviderError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = SessionError::Provider {
            quest_type: "AddRoadName".to_string(),
            source: ProviderError::Network("timeout".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "download of AddRoadName failed: network error: timeout"
        );
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let err = SessionError::Freshness(ProviderError::Storage("locked".to_string()));
        assert!(err.source().is_some());
        assert!(SessionError::NotConfigured.source().is_none());
    }
}

//! Errors raised at the collaborator boundary.
//!
//! Structural extraction never fails: malformed markup and unusable
//! candidates degrade to empty record sets. Only the fetch and
//! language-model collaborators (and malformed FFI input) produce an
//! [`Error`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Page retrieval failed (network error, non-success status, unreadable body)
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The requested retrieval method is not available in this build
    #[error("fetch method '{0}' is not supported")]
    UnsupportedFetchMethod(String),

    /// The language model call failed or returned an unusable payload
    #[error("language model request failed: {0}")]
    LanguageModel(String),

    /// Credentials for the language model are not configured
    #[error("environment variable {0} is not set")]
    MissingApiKey(&'static str),

    /// Caller supplied input that could not be interpreted
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

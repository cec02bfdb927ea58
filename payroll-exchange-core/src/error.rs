//! Error type shared by every exchange operation

/// Result type for exchange operations
pub type Result<T> = std::result::Result<T, ExchangeError>;

type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while importing or rewriting an exchange document.
///
/// Nothing in the core recovers from these locally: the first error aborts
/// the running operation and is handed back to the caller as is.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("Missing {kind} reference: {key}")]
    MissingReference { kind: String, key: String },

    #[error("Missing or invalid script file {path} in {owner}")]
    MissingScript { owner: String, path: String },

    #[error("File error ({path}): {message}")]
    File {
        path: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Duplicate lookup value in {lookup}: key {key}, range value {range}")]
    DuplicateLookupValue {
        lookup: String,
        key: String,
        range: String,
    },

    #[error("Cancellation target for case {case} at {created}: {matches} matching case changes")]
    CancellationTarget {
        case: String,
        created: String,
        matches: usize,
    },

    #[error("Case change {case} rejected: {issues}")]
    CaseChangeIssues { case: String, issues: String },

    #[error("Multiple tenants not supported for namespace change: {0}")]
    MultipleTenants(String),

    #[error("Invalid exchange document: {0}")]
    InvalidDocument(String),

    #[error("Remote store error: {message}")]
    Remote {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ExchangeError {
    pub fn missing(kind: impl std::fmt::Display, key: impl Into<String>) -> Self {
        ExchangeError::MissingReference {
            kind: kind.to_string(),
            key: key.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        ExchangeError::Remote {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a collaborator failure, keeping it as the root cause.
    pub fn remote_with(message: impl Into<String>, source: impl Into<Cause>) -> Self {
        ExchangeError::Remote {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        ExchangeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for ExchangeError {
    fn from(e: serde_yaml::Error) -> Self {
        ExchangeError::Serialization(e.to_string())
    }
}

//! Error types for the context oracle core library.

/// Top-level error enum for the context oracle core library.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Malformed symbol URI: {offending_text:?}")]
    Parse { offending_text: String },

    #[error("Embedding unavailable for {symbol}: {reason}")]
    EmbeddingUnavailable { symbol: String, reason: String },

    #[error("Rank computation error: {0}")]
    RankComputation(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OracleError {
    pub(crate) fn parse(offending_text: impl Into<String>) -> Self {
        OracleError::Parse {
            offending_text: offending_text.into(),
        }
    }

    pub(crate) fn unavailable(symbol: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        OracleError::EmbeddingUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures that only affect a single symbol and never abort an
    /// aggregation.
    pub fn is_localized(&self) -> bool {
        matches!(self, OracleError::EmbeddingUnavailable { .. })
    }
}

pub type OracleResult<T> = Result<T, OracleError>;

//! FILENAME: core/pivot-query/src/error.rs

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The request was superseded before it resolved.
    #[error("Request canceled")]
    Canceled,

    #[error("No data service attached")]
    MissingDataService,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl QueryError {
    /// True for the superseded-request sentinel, which callers drop silently.
    pub fn is_stale(&self) -> bool {
        matches!(self, QueryError::Canceled)
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

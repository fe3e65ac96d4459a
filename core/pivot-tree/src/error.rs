//! FILENAME: core/pivot-tree/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Empty path: a node path needs at least one value")]
    EmptyPath,

    #[error("Unknown path: {0}")]
    UnknownPath(String),

    #[error("Unknown column: no column leaf for path '{0}'")]
    UnknownColumn(String),

    #[error("Record carries {found} values but {expected} measures are declared")]
    ValueCount { expected: usize, found: usize },
}

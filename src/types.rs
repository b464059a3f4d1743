//! General type definitions

use std::fmt;

/// Order in which the canonical (owning) rank of a process is laid out over the grid.
///
/// - `ColumnMajor`: rank `r` sits at row `r % height`, column `r / height`.
/// - `RowMajor`: rank `r` sits at row `r / width`, column `r % width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GridOrder {
    /// Consecutive ranks fill a row before moving to the next one.
    RowMajor,
    /// Consecutive ranks fill a column before moving to the next one.
    #[default]
    ColumnMajor,
}

impl fmt::Display for GridOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridOrder::RowMajor => write!(f, "row-major"),
            GridOrder::ColumnMajor => write!(f, "column-major"),
        }
    }
}

/// Errors raised while building or querying a process grid.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// An argument was out of range or inconsistent with the grid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The grid has already been destroyed.
    #[error("Grid used after it was destroyed")]
    UseAfterFree,
    /// The calling process only views the grid and does not own a position in it.
    #[error("Process is not a member of the grid")]
    NotInGrid,
    /// A collective operation of the transport failed.
    #[error("Collective operation failed: {0}")]
    CollectiveFailure(String),
    /// The default grid was requested before it was initialized.
    #[error("Default grid has not been initialized")]
    NotInitialized,
}

/// Result type
pub type Result<T> = std::result::Result<T, GridError>;

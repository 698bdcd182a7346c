//! Error types for Quarry core.

use crate::recordset::Recordset;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Quarry core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] quarry_storage::StorageError),

    /// Value codec or coercion error.
    #[error("{0}")]
    Codec(#[from] quarry_codec::CodecError),

    /// SQL text could not be compiled.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset of the offending token.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// Misuse of the transaction API.
    #[error("{message}")]
    Transaction {
        /// Description of the protocol violation.
        message: String,
    },

    /// Expression evaluation or row pipeline failure.
    #[error("{message}")]
    Eval {
        /// Description of the failure.
        message: String,
    },

    /// Table does not exist.
    #[error("table {name} does not exist")]
    TableNotFound {
        /// Name of the table.
        name: String,
    },

    /// Table already exists.
    #[error("table {name} already exists")]
    TableExists {
        /// Name of the table.
        name: String,
    },

    /// Column does not exist in a table.
    #[error("column {column} does not exist in table {table}")]
    ColumnNotFound {
        /// Name of the table.
        table: String,
        /// Name of the column.
        column: String,
    },

    /// Identifier could not be resolved against the row in scope.
    #[error("unknown field {name}")]
    UnknownField {
        /// The unresolved name.
        name: String,
    },

    /// Database structures are inconsistent.
    #[error("database corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// `close` was called with a transaction still open.
    #[error("cannot close the database: open transaction")]
    OpenTransaction,

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,
}

impl CoreError {
    /// Creates a syntax error.
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// Creates a transaction protocol error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Creates an evaluation error.
    pub fn eval(message: impl Into<String>) -> Self {
        Self::Eval {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::TableNotFound { name: name.into() }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField { name: name.into() }
    }
}

/// Failure of [`crate::Database::execute`].
///
/// Carries the zero-based index of the failing statement and the
/// recordsets produced by the statements before it.
#[derive(Debug, Error)]
#[error("statement {index}: {source}")]
pub struct ExecuteError {
    /// Index of the failing statement within the list.
    pub index: usize,
    /// Recordsets produced before the failure.
    pub recordsets: Vec<Recordset>,
    /// The error.
    pub source: CoreError,
}

impl ExecuteError {
    pub(crate) fn new(index: usize, source: CoreError) -> Self {
        Self {
            index,
            recordsets: Vec::new(),
            source,
        }
    }
}

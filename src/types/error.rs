//! Error types for the ledger reconciler
//!
//! This module defines all error types that can occur while reading and
//! reconciling a ledger. Errors are designed to be descriptive and
//! user-friendly for CLI output.
//!
//! # Error Categories
//!
//! - **Structural errors**: missing file, missing required column, malformed
//!   CSV, output failure. These abort the whole run before anything is written.
//! - **Entry errors**: unparseable timestamp or quantity, unrecognized
//!   category. The entry is skipped, reported as a warning and counted in
//!   the run diagnostics; the rest of the ledger is still reconciled.

use thiserror::Error;

/// Main error type for the reconciler
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// The CSV structure itself could not be read
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// A required ledger column is absent
    ///
    /// Fatal: raised while reading the header, before any pairing occurs.
    #[error("Required column '{field}' not found. Columns present: {}", available.join(", "))]
    MissingRequiredField {
        /// Canonical name of the missing column
        field: String,
        /// Header cells that were found, after alias normalization
        available: Vec<String>,
    },

    /// Timestamp cell could not be parsed with the detected format
    ///
    /// The entry is excluded from processing and counted.
    #[error("Unparseable timestamp '{value}' at line {line}")]
    UnparseableTimestamp {
        /// Source line of the entry
        line: u64,
        /// Raw timestamp cell
        value: String,
    },

    /// Quantity cell is not a number in any supported locale
    ///
    /// The entry is excluded from processing and counted.
    #[error("Invalid quantity '{value}' at line {line}")]
    InvalidQuantity {
        /// Source line of the entry
        line: u64,
        /// Raw quantity cell
        value: String,
    },

    /// Category label the reconciler does not handle
    ///
    /// The entry never produces a transaction and is listed in diagnostics.
    #[error("Unrecognized category '{label}' at line {line}")]
    UnrecognizedCategory {
        /// Source line of the entry
        line: u64,
        /// Raw category label
        label: String,
    },

    /// Reconciled records could not be written
    #[error("Output error: {message}")]
    OutputError {
        /// Description of the failure
        message: String,
    },

    /// A concurrent ledger task panicked or was cancelled
    #[error("Ledger task failed: {message}")]
    TaskFailed {
        /// Description of the failure
        message: String,
    },
}

// Conversion from io::Error to ReconcileError
impl From<std::io::Error> for ReconcileError {
    fn from(error: std::io::Error) -> Self {
        ReconcileError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to ReconcileError
impl From<csv::Error> for ReconcileError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        ReconcileError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Conversion from csv_async::Error to ReconcileError
impl From<csv_async::Error> for ReconcileError {
    fn from(error: csv_async::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        ReconcileError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl ReconcileError {
    /// Create a FileNotFound error
    pub fn file_not_found(path: &std::path::Path) -> Self {
        ReconcileError::FileNotFound {
            path: path.display().to_string(),
        }
    }

    /// Create a MissingRequiredField error
    pub fn missing_required_field(field: &str, available: &[String]) -> Self {
        ReconcileError::MissingRequiredField {
            field: field.to_string(),
            available: available.to_vec(),
        }
    }

    /// Create an UnparseableTimestamp error
    pub fn unparseable_timestamp(line: u64, value: &str) -> Self {
        ReconcileError::UnparseableTimestamp {
            line,
            value: value.to_string(),
        }
    }

    /// Create an InvalidQuantity error
    pub fn invalid_quantity(line: u64, value: &str) -> Self {
        ReconcileError::InvalidQuantity {
            line,
            value: value.to_string(),
        }
    }

    /// Create an UnrecognizedCategory error
    pub fn unrecognized_category(line: u64, label: &str) -> Self {
        ReconcileError::UnrecognizedCategory {
            line,
            label: label.to_string(),
        }
    }

    /// Create an OutputError
    pub fn output(message: impl std::fmt::Display) -> Self {
        ReconcileError::OutputError {
            message: message.to_string(),
        }
    }

    /// Create a TaskFailed error
    pub fn task_failed(message: impl std::fmt::Display) -> Self {
        ReconcileError::TaskFailed {
            message: message.to_string(),
        }
    }
}

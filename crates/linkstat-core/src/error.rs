//! Error types and handling for linkstat-core operations.
//!
//! A single error enum covers every failure the processing pipeline can report.
//! Errors are categorized for logging and carry a recoverability hint so callers
//! can decide whether a retry is worthwhile.
//!
//! ## Error Categories
//!
//! - **Validation Errors**: Empty or over-limit requests, rejected before any state changes
//! - **Range Errors**: Report requests referencing numbers that were never assigned
//! - **Lookup Errors**: Missing index entries or pending ledger entries
//! - **Storage Errors**: Ledger files that cannot be read, decoded, or written
//! - **Report Errors**: Rendered reports that cannot be encoded as PDF
//! - **Lifecycle Errors**: Drain timeouts and operations attempted during shutdown
//!
//! ## Recovery Hints
//!
//! ```rust
//! use linkstat_core::Error;
//!
//! let err = Error::Timeout("2 persistence tasks still running".to_string());
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "timeout");
//! ```

use thiserror::Error;

/// The main error type for linkstat-core operations.
///
/// All fallible public functions in linkstat-core return `Result<T, Error>`.
/// I/O failures are never surfaced bare: ledger paths wrap them in
/// [`Error::Storage`] and config paths in [`Error::Config`], each naming the
/// file involved.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP client construction failed.
    ///
    /// Probe requests themselves never surface network errors: they classify as
    /// unavailable. This variant only appears when the client cannot be built.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request failed boundary validation.
    ///
    /// Raised for empty requests, requests above the size limit, and report
    /// requests containing a zero. No ledger or index state has been touched
    /// when this is returned.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Report request referenced a sequence number that has not been assigned yet.
    ///
    /// Checked against the index maximum before anything is recorded, so the
    /// request leaves no pending entry behind.
    #[error("Index out of range: requested {requested}, highest assigned is {max}")]
    IndexOutOfRange {
        /// The first offending number in the request.
        requested: u64,
        /// Highest sequence number assigned at the time of the check.
        max: u64,
    },

    /// Requested entry does not exist.
    ///
    /// ## Common Causes
    ///
    /// - An index lookup for a number that existed before a restart without replay
    /// - Dequeueing a pending entry that was already drained or removed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ledger storage operation failed.
    ///
    /// Covers unreadable, undecodable and unwritable ledger files. Recovery
    /// catches this and substitutes a descriptive placeholder instead of
    /// aborting.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A rendered report could not be encoded.
    ///
    /// Produced by the PDF writer; the report lines themselves are always
    /// available.
    #[error("Report error: {0}")]
    Report(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation exceeded its time bound.
    ///
    /// Returned by the shutdown drain when background persistence does not
    /// finish within the configured limit.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The service has stopped accepting new work.
    #[error("Service is shutting down")]
    ShuttingDown,
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Timeouts and connection failures are transient. Validation and range
    /// errors depend only on the request, so retrying it cannot succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Get the error category as a string identifier.
    ///
    /// Used as a structured field when errors are logged:
    ///
    /// ```rust
    /// use linkstat_core::Error;
    ///
    /// let err = Error::IndexOutOfRange { requested: 5, max: 1 };
    /// tracing::warn!(category = err.category(), "report rejected: {err}");
    /// ```
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Validation(_) => "validation",
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
            Self::Report(_) => "report",
            Self::Config(_) => "config",
            Self::Timeout(_) => "timeout",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

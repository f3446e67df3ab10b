//! Error types for Vecino operations.
//!
//! Provides rich error context for library consumers.

use std::fmt;

/// Main error type for Vecino operations.
///
/// Covers the three failure classes of the search engine: invalid
/// configuration (mismatched dimensions, out-of-range indices), operations
/// that a backend does not support (e.g. radius search), and overflow in
/// array-size arithmetic for very large inputs.
///
/// # Examples
///
/// ```
/// use vecino::error::VecinoError;
///
/// let err = VecinoError::Configuration {
///     message: "query has 3 dimensions, index has 5".to_string(),
/// };
/// assert!(err.to_string().contains("configuration"));
/// ```
#[derive(Debug)]
pub enum VecinoError {
    /// Invalid configuration: inconsistent dimensions, out-of-range
    /// observation index, or invalid parameter values.
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The requested operation is not implemented by this backend.
    UnsupportedOperation {
        /// Name of the unsupported operation.
        operation: String,
    },

    /// An array-size computation overflowed the native integer width.
    NumericOverflow {
        /// Description of the computation that overflowed.
        context: String,
    },
}

impl fmt::Display for VecinoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VecinoError::Configuration { message } => {
                write!(f, "invalid configuration: {message}")
            }
            VecinoError::UnsupportedOperation { operation } => {
                write!(f, "unsupported operation: {operation}")
            }
            VecinoError::NumericOverflow { context } => {
                write!(f, "numeric overflow: {context}")
            }
        }
    }
}

impl std::error::Error for VecinoError {}

impl VecinoError {
    /// Create a configuration error with a descriptive message.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error for the named operation.
    #[must_use]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
        }
    }

    /// Create a numeric-overflow error for the named computation.
    #[must_use]
    pub fn overflow(context: impl Into<String>) -> Self {
        Self::NumericOverflow {
            context: context.into(),
        }
    }

    /// Create a configuration error for an out-of-range observation index.
    #[must_use]
    pub fn index_out_of_bounds(index: usize, num_observations: usize) -> Self {
        Self::Configuration {
            message: format!(
                "observation index {index} out of bounds (num_observations={num_observations})"
            ),
        }
    }

    /// Create a configuration error for a query/index dimension mismatch.
    #[must_use]
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::Configuration {
            message: format!("dimension mismatch: expected {expected}, got {actual}"),
        }
    }
}

#[allow(clippy::cmp_owned)]
impl PartialEq<&str> for VecinoError {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, VecinoError>;

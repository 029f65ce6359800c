//! Error handling for gradient-infill
//!
//! Provides error types for the layers of the post-processor:
//! - G-Code errors (line-level parsing, always recovered by the parser)
//! - Configuration errors (gradient and target validation)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// G-Code error type
///
/// Represents a problem with a single G-Code line. The parser never lets one of
/// these abort a job: the offending line is kept verbatim instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// Invalid G-Code syntax
    #[error("Invalid syntax at line {line_number}: {reason}")]
    InvalidSyntax {
        /// The line number (1-based) where the syntax error occurred.
        line_number: usize,
        /// The reason for the syntax error.
        reason: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{param}' at line {line_number}: {reason}")]
    InvalidParameter {
        /// The line number (1-based) where the invalid parameter was found.
        line_number: usize,
        /// The parameter letter.
        param: char,
        /// The reason the parameter is invalid.
        reason: String,
    },

    /// The same axis word appears twice on one line
    #[error("Duplicate parameter '{param}' at line {line_number}")]
    DuplicateParameter {
        /// The line number (1-based) where the duplicate was found.
        line_number: usize,
        /// The duplicated parameter letter.
        param: char,
    },

    /// Syntax the rewriter refuses to touch (checksums, inline parenthesis comments)
    #[error("Unsupported syntax at line {line_number}: {reason}")]
    Unsupported {
        /// The line number (1-based) of the unsupported line.
        line_number: usize,
        /// What made the line unsupported.
        reason: String,
    },
}

impl GcodeError {
    /// Line number the error refers to
    pub fn line_number(&self) -> usize {
        match self {
            Self::InvalidSyntax { line_number, .. }
            | Self::InvalidParameter { line_number, .. }
            | Self::DuplicateParameter { line_number, .. }
            | Self::Unsupported { line_number, .. } => *line_number,
        }
    }
}

/// Configuration error type
///
/// Raised only when a caller asks for validation; the post-processor itself
/// applies whatever arithmetic the configuration implies.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Minimum flow is above maximum flow
    #[error("min_flow ({min_flow}) must not exceed max_flow ({max_flow})")]
    FlowRange {
        /// Configured minimum flow percentage.
        min_flow: f64,
        /// Configured maximum flow percentage.
        max_flow: f64,
    },

    /// A flow percentage is negative or not a number
    #[error("{field} must be a finite, non-negative percentage (got {value})")]
    InvalidFlow {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Gradient discretization must be at least one step
    #[error("gradient_discretization must be at least 1 (got {0})")]
    InvalidDiscretization(u32),

    /// A reinforcement target is geometrically invalid
    #[error("Invalid target #{index}: {reason}")]
    InvalidTarget {
        /// Position of the target in the target list.
        index: usize,
        /// The reason the target is invalid.
        reason: String,
    },
}

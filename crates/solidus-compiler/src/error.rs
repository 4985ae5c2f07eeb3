//! Errors raised when running a compiled sequence.

use thiserror::Error;

/// Errors from evaluating a sequence against caller-supplied parameters.
///
/// Malformed sequences are defects and panic instead.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The parameter matrix has the wrong number of rows.
    #[error("expected {expected} parameter rows, got {actual}")]
    ParameterCountMismatch {
        /// Parameters of the compiled expression.
        expected: usize,
        /// Rows supplied.
        actual: usize,
    },

    /// The parameter matrix has no columns.
    #[error("parameter batch is empty")]
    EmptyBatch,

    /// A Jacobian context was given more than one point.
    #[error("jacobian contexts evaluate one point at a time, got {columns} columns")]
    JacobianBatch {
        /// Columns supplied.
        columns: usize,
    },
}

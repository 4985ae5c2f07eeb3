//! Construction-time errors.

use thiserror::Error;

/// Errors raised when a node cannot be built from its operands.
///
/// These are reported by the constructor that received the bad operands and
/// are never deferred to compilation or execution.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ExprError {
    /// Operands that must have the same number of components do not.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Dimensions of the first operand.
        left: usize,
        /// Dimensions of the second operand.
        right: usize,
    },

    /// Operands are functions of different numbers of parameters, or an
    /// inner function's output does not match an outer function's input.
    #[error("parameter count mismatch: {left} vs {right}")]
    ParameterCountMismatch {
        /// Parameter count expected by the first operand.
        left: usize,
        /// Parameter count provided by the second operand.
        right: usize,
    },

    /// An operand that must be one-dimensional is not.
    #[error("expected a scalar operand, found {dimensions} components")]
    NotScalar {
        /// Dimensions of the offending operand.
        dimensions: usize,
    },

    /// A cross product operand is not three-dimensional.
    #[error("expected a three-dimensional operand, found {dimensions} components")]
    NotThreeDimensional {
        /// Dimensions of the offending operand.
        dimensions: usize,
    },

    /// A component range does not fit inside the operand.
    #[error("components {start}..{} out of range for {dimensions} components", .start + .count)]
    ComponentsOutOfRange {
        /// First requested component.
        start: usize,
        /// Number of requested components.
        count: usize,
        /// Dimensions of the operand.
        dimensions: usize,
    },

    /// A parameter index is not below the parameter count.
    #[error("parameter index {index} out of range for {parameters} parameters")]
    ParameterIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of parameters.
        parameters: usize,
    },

    /// Division by a constant zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A constant zero base raised to a negative constant exponent.
    #[error("zero raised to negative exponent {exponent}")]
    InvalidExponent {
        /// The exponent.
        exponent: f64,
    },

    /// An affine basis does not match its origin.
    #[error("linear basis is {rows}x{columns} but origin has {origin} components")]
    InvalidLinear {
        /// Basis rows.
        rows: usize,
        /// Basis columns.
        columns: usize,
        /// Origin length.
        origin: usize,
    },

    /// An elliptical basis does not match its origin or convention.
    #[error("elliptical basis is {rows}x{columns}; expected {origin}x{}", .parameters + 1)]
    InvalidElliptical {
        /// Basis rows.
        rows: usize,
        /// Basis columns.
        columns: usize,
        /// Origin length.
        origin: usize,
        /// Number of convention flags.
        parameters: usize,
    },

    /// A constant with no components.
    #[error("constant has no components")]
    EmptyConstant,

    /// A node with no output components or no parameters where at least one
    /// is required.
    #[error("zero-dimensional expression")]
    ZeroDimensions,
}

//! # solidus-compiler
//!
//! Lowers expression graphs into flat evaluation sequences and runs them.
//!
//! This crate provides:
//! - [`Compiler`]: walks a graph once, sharing repeated subexpressions and
//!   placing temporaries on a LIFO stack or a persistent heap
//! - [`EvaluationSequence`]: an immutable program for one expression's value
//!   or Jacobian, generic over the numeric domain
//! - [`EvaluationContext`]: the buffers for one run of a sequence
//! - [`evaluate_parallel`]: batch evaluation over the rayon thread pool
//!
//! ## Example
//!
//! ```
//! use solidus_compiler::compile;
//! use solidus_expr::ExprArena;
//! use solidus_matrix::Matrix;
//!
//! let mut arena = ExprArena::new();
//! let t = arena.parameter(0, 1).unwrap();
//! let s = arena.sin(t).unwrap();
//!
//! let sequence = compile::<f64>(&arena, s);
//! let points = Matrix::from_rows(&[vec![0.0, 0.5]]);
//! let values = sequence.evaluate(&points).unwrap();
//! assert!((values[(0, 1)] - 0.5f64.sin()).abs() < 1e-15);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod compiler;
pub mod context;
mod emit;
pub mod error;
pub mod kernels;
pub mod matrix_id;
pub mod operation;
pub mod parallel;
pub mod sequence;

mod proptests;
mod tests;

pub use compiler::{Compiler, ResourceBudget};
pub use context::EvaluationContext;
pub use error::EvalError;
pub use matrix_id::{MatrixId, Source};
pub use operation::{Columns, Kernel, Operation};
pub use parallel::{evaluate_parallel, ParallelConfig};
pub use sequence::{ConstantEntry, EvaluationSequence};

use solidus_domain::Scalar;
use solidus_expr::{ExprArena, ExprHandle};
use solidus_matrix::Matrix;

/// Compiles the value of `root` for domain `S`.
#[must_use]
pub fn compile<S: Scalar>(arena: &ExprArena, root: ExprHandle) -> EvaluationSequence<S> {
    Compiler::new(arena).compile(root)
}

/// Compiles the Jacobian of `root` for domain `S`.
#[must_use]
pub fn compile_jacobian<S: Scalar>(arena: &ExprArena, root: ExprHandle) -> EvaluationSequence<S> {
    Compiler::new(arena).compile_jacobian(root)
}

/// Compiles and evaluates `root` in one step.
///
/// # Errors
///
/// See [`EvaluationSequence::evaluate`].
pub fn evaluate<S: Scalar>(arena: &ExprArena, root: ExprHandle, parameters: &Matrix<S>) -> Result<Matrix<S>, EvalError> {
    compile(arena, root).evaluate(parameters)
}

/// Compiles and evaluates the Jacobian of `root` in one step.
///
/// # Errors
///
/// See [`EvaluationSequence::evaluate`].
pub fn evaluate_jacobian<S: Scalar>(
    arena: &ExprArena,
    root: ExprHandle,
    parameters: &Matrix<S>,
) -> Result<Matrix<S>, EvalError> {
    compile_jacobian(arena, root).evaluate(parameters)
}

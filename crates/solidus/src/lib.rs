//! # Solidus
//!
//! Parametric expressions for a geometric kernel, compiled into flat
//! evaluation sequences.
//!
//! Curves and surfaces are described as immutable expression graphs over a
//! parameter vector. A graph is compiled once per numeric domain and then
//! evaluated over batches of parameter points: exactly with `f64`, or
//! conservatively over parameter boxes with [`Interval`](domain::Interval).
//!
//! ## Features
//!
//! - **Arena-allocated graphs**: nodes addressed by 32-bit handles
//! - **Symbolic derivatives**: memoized per node and parameter
//! - **Deduplication**: merges independently built equal subgraphs
//! - **Sequence compiler**: shared subexpressions, LIFO temporaries
//! - **Batch evaluation**: sequential or across a rayon thread pool
//!
//! ## Quick Start
//!
//! ```rust
//! use solidus::prelude::*;
//!
//! let mut arena = ExprArena::new();
//! let circle = arena
//!     .elliptical(&Matrix::identity(2), &[0.0, 0.0], &[true])
//!     .unwrap();
//!
//! let points = Matrix::from_rows(&[vec![0.0, 1.0]]);
//! let values = evaluate::<f64>(&arena, circle, &points).unwrap();
//! assert!((values[(0, 1)] - 1.0f64.cos()).abs() < 1e-15);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub use solidus_compiler as compiler;
pub use solidus_domain as domain;
pub use solidus_expr as expr;
pub use solidus_matrix as matrix;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use solidus_compiler::{
        compile, compile_jacobian, evaluate, evaluate_jacobian, evaluate_parallel, EvalError,
        EvaluationContext, EvaluationSequence, ParallelConfig,
    };
    pub use solidus_domain::{Interval, Scalar};
    pub use solidus_expr::{DeduplicationCache, ExprArena, ExprError, ExprHandle};
    pub use solidus_matrix::Matrix;
}

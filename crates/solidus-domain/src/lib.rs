//! # solidus-domain
//!
//! Numeric domains for the Solidus parametric-expression compiler.
//!
//! This crate provides:
//! - The `Scalar` trait: arithmetic plus the closed set of elementary
//!   functions needed by expression evaluation
//! - `f64` as the exact domain
//! - `Interval` as the conservative bounds domain
//!
//! ## Domain Selection
//!
//! Expression graphs are domain-generic. The domain is chosen per compile
//! call, so the same graph can be evaluated at points (`f64`) or over boxes
//! of parameter space (`Interval`).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod interval;
pub mod traits;

mod proptests;

pub use interval::Interval;
pub use traits::Scalar;

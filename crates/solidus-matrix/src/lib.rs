//! # solidus-matrix
//!
//! Dense 2-D numeric buffers for the Solidus evaluation runtime.
//!
//! This crate provides:
//! - `Matrix`: an owned, column-major buffer
//! - `MatrixView` / `MatrixViewMut`: borrowed views with row-block slicing
//! - Broadcast views (column stride 0) so one stored column reads as a full
//!   batch of identical columns
//!
//! ## Layout
//!
//! Columns are contiguous. A batch of evaluation points is stored one point
//! per column, so a row block (a subset of components) of every point is a
//! strided view and never needs a copy.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod matrix;
pub mod view;

mod proptests;

pub use matrix::Matrix;
pub use view::{MatrixView, MatrixViewMut};

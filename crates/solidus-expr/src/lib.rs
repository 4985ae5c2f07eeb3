//! # solidus-expr
//!
//! Parametric expression graphs for the Solidus geometric kernel.
//!
//! This crate provides:
//! - Arena-allocated, immutable expression nodes addressed by 32-bit handles
//! - Shape-checked constructors with local simplification
//! - Memoized symbolic derivatives
//! - A structural deduplication pass that merges equal subgraphs
//!
//! ## Design Principles
//!
//! - **Closed operator set**: one enum covers every node kind, so every pass
//!   over the graph is an exhaustive match
//! - **Identity by handle**: caches key on handles, never on node contents
//! - **Explicit sharing**: equal subexpressions share a handle only after
//!   [`ExprArena::deduplicated`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod arena;
pub mod construct;
pub mod dedup;
pub mod derivative;
pub mod elliptical;
pub mod error;
pub mod expr;
pub mod handle;
pub mod point;

mod proptests;

pub use arena::ExprArena;
pub use dedup::DeduplicationCache;
pub use error::ExprError;
pub use expr::{Convention, Elementary, ExprNode, NodeData, Values};
pub use handle::ExprHandle;

//! Node handles.
//!
//! A handle is the identity of a node: the compiler's result caches and the
//! derivative memo table are keyed by it.

use std::fmt;

/// The identity of a node in an [`ExprArena`](crate::ExprArena).
///
/// Two handles are equal only if they name the same node instance. Nodes
/// that are merely structurally equal keep distinct handles until they pass
/// through [`ExprArena::deduplicated`](crate::ExprArena::deduplicated).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprHandle(u32);

impl ExprHandle {
    /// Returns the handle of the node stored at `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` does not fit in 32 bits.
    pub(crate) fn from_slot(slot: usize) -> Self {
        match u32::try_from(slot) {
            Ok(index) => Self(index),
            Err(_) => panic!("expression arena holds more than u32::MAX nodes"),
        }
    }

    /// Returns the arena slot of the node.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ExprHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self.0)
    }
}

impl fmt::Display for ExprHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

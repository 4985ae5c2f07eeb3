//! Arena storage for expression nodes.
//!
//! Nodes are stored contiguously and never mutated after allocation, so a
//! handle stays valid for the life of the arena and a finished arena can be
//! shared read-only across threads.

use std::fmt::Write;

use hashbrown::HashMap;

use crate::expr::{ExprNode, NodeData};
use crate::handle::ExprHandle;

/// The arena holding every node of an expression graph.
///
/// Unlike a hash-consing arena, allocation does not look for an existing
/// equal node: independently built subexpressions keep separate identities
/// until [`ExprArena::deduplicated`] merges them.
#[derive(Debug, Default)]
pub struct ExprArena {
    /// Storage for all nodes.
    nodes: Vec<NodeData>,
    /// Memoized derivatives, keyed by node and parameter index.
    pub(crate) derivatives: HashMap<(ExprHandle, usize), ExprHandle>,
}

impl ExprArena {
    /// Creates a new empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an arena with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            derivatives: HashMap::new(),
        }
    }

    /// Stores a node and returns its handle.
    pub(crate) fn alloc(&mut self, data: NodeData) -> ExprHandle {
        let handle = ExprHandle::from_slot(self.nodes.len());
        self.nodes.push(data);
        handle
    }

    /// Gets the node and shape at the given handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is invalid.
    #[must_use]
    pub fn get(&self, handle: ExprHandle) -> &NodeData {
        &self.nodes[handle.slot()]
    }

    /// Gets the operator at the given handle.
    #[must_use]
    pub fn node(&self, handle: ExprHandle) -> &ExprNode {
        &self.get(handle).node
    }

    /// Returns the number of output components of a node.
    #[must_use]
    pub fn dimensions(&self, handle: ExprHandle) -> usize {
        self.get(handle).dimensions
    }

    /// Returns the number of parameters of a node.
    #[must_use]
    pub fn parameters(&self, handle: ExprHandle) -> usize {
        self.get(handle).parameters
    }

    /// Returns the number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the values of a constant node.
    #[must_use]
    pub fn constant_values(&self, handle: ExprHandle) -> Option<&[f64]> {
        match self.node(handle) {
            ExprNode::Constant(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Returns the value of a one-component constant node.
    #[must_use]
    pub fn scalar_value(&self, handle: ExprHandle) -> Option<f64> {
        match self.constant_values(handle) {
            Some(&[value]) => Some(value),
            _ => None,
        }
    }

    /// Returns true if the node is a constant.
    #[must_use]
    pub fn is_constant(&self, handle: ExprHandle) -> bool {
        matches!(self.node(handle), ExprNode::Constant(_))
    }

    /// Returns true if the node is a constant whose components are all zero.
    #[must_use]
    pub fn is_zero(&self, handle: ExprHandle) -> bool {
        matches!(self.node(handle), ExprNode::Constant(values) if values.is_zero())
    }

    /// Tests two nodes for structural equality.
    ///
    /// Nodes are duplicates if they are the same instance, or have the same
    /// kind, shape and numeric payload and pairwise duplicate operands.
    #[must_use]
    pub fn is_duplicate_of(&self, a: ExprHandle, b: ExprHandle) -> bool {
        if a == b {
            return true;
        }
        let (first, second) = (self.get(a), self.get(b));
        if first.dimensions != second.dimensions || first.parameters != second.parameters {
            return false;
        }
        let placeholder = |_| ExprHandle::from_slot(0);
        if first.node.map_children(placeholder) != second.node.map_children(placeholder) {
            return false;
        }
        first
            .node
            .children()
            .iter()
            .zip(second.node.children().iter())
            .all(|(&x, &y)| self.is_duplicate_of(x, y))
    }

    /// Renders the subgraph below `handle` as an indented tree.
    ///
    /// Each line reads `R<parameters> -> R<dimensions> | #<index> | Kind`.
    /// Shared operands are printed once per reference.
    #[must_use]
    pub fn debug_tree(&self, handle: ExprHandle) -> String {
        let mut out = String::new();
        self.debug_into(&mut out, handle, 0);
        out
    }

    fn debug_into(&self, out: &mut String, handle: ExprHandle, indent: usize) {
        let data = self.get(handle);
        for _ in 0..indent {
            out.push_str("  ");
        }
        let _ = write!(
            out,
            "R{} -> R{} | {} | {}",
            data.parameters,
            data.dimensions,
            handle,
            data.node.kind_name()
        );
        match &data.node {
            ExprNode::Constant(values) => {
                let _ = write!(out, " {values:?}");
            }
            ExprNode::Parameter(index) => {
                let _ = write!(out, " {index}");
            }
            ExprNode::Components { start, count, .. } => {
                let _ = write!(out, " {start}..{}", start + count);
            }
            _ => {}
        }
        out.push('\n');
        for child in data.node.children() {
            self.debug_into(out, child, indent + 1);
        }
    }
}

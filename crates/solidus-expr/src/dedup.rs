//! Structural deduplication.
//!
//! Independently built subexpressions that compute the same thing get
//! distinct handles, which hides them from the compiler's identity-keyed
//! caches. A deduplication pass maps every node reachable from a root to a
//! canonical instance so that equal subgraphs share one handle.

use hashbrown::HashMap;
use log::debug;
use smallvec::SmallVec;

use crate::arena::ExprArena;
use crate::expr::NodeData;
use crate::handle::ExprHandle;

/// Canonical-instance table for one deduplication build.
///
/// The cache refers to handles of a single arena and should be dropped once
/// the graphs it canonicalized have been compiled.
#[derive(Debug, Default)]
pub struct DeduplicationCache {
    /// Structural fingerprint (kind, payload, shape, canonical operands)
    /// to canonical handle.
    canonical: HashMap<NodeData, ExprHandle>,
    /// Nodes already processed, mapped to their canonical handle.
    visited: HashMap<ExprHandle, ExprHandle>,
    /// Number of nodes replaced by a previously seen duplicate.
    collapsed: usize,
}

impl DeduplicationCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of canonical nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    /// Returns true if no node has been canonicalized yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    /// Returns the number of nodes that were collapsed onto a duplicate.
    #[must_use]
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }
}

impl ExprArena {
    /// Returns the canonical instance of `root`, rebuilding it on top of
    /// canonical operands where necessary.
    ///
    /// Rebuilt nodes keep their kind; no simplification is re-applied. The
    /// same cache can be reused across several roots so that they share
    /// subgraphs.
    pub fn deduplicated(&mut self, root: ExprHandle, cache: &mut DeduplicationCache) -> ExprHandle {
        let collapsed_before = cache.collapsed;
        let result = self.deduplicate_node(root, cache);
        debug!(
            "deduplicated {} -> {}: {} canonical nodes, {} collapsed",
            root,
            result,
            cache.canonical.len(),
            cache.collapsed - collapsed_before
        );
        result
    }

    fn deduplicate_node(&mut self, handle: ExprHandle, cache: &mut DeduplicationCache) -> ExprHandle {
        if let Some(&canonical) = cache.visited.get(&handle) {
            return canonical;
        }

        let data = self.get(handle).clone();
        let children = data.node.children();
        let canonical_children: SmallVec<[ExprHandle; 2]> = children
            .iter()
            .map(|&child| self.deduplicate_node(child, cache))
            .collect();
        let changed = canonical_children != children;

        let mut next = 0;
        let rebuilt = NodeData {
            node: data.node.map_children(|_| {
                let child = canonical_children[next];
                next += 1;
                child
            }),
            dimensions: data.dimensions,
            parameters: data.parameters,
        };

        let result = if let Some(&existing) = cache.canonical.get(&rebuilt) {
            cache.collapsed += 1;
            existing
        } else {
            let instance = if changed {
                self.alloc(rebuilt.clone())
            } else {
                handle
            };
            cache.canonical.insert(rebuilt, instance);
            instance
        };
        cache.visited.insert(handle, result);
        result
    }
}

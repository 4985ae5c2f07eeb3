//! Lowering of expression graphs into evaluation sequences.
//!
//! The compiler walks the graph from the root and emits one operation list.
//! Results that later nodes may read (values and Jacobians of non-trivial
//! nodes) live in heap slots and are cached per `(node, parameter buffer)`.
//! Intermediates needed only while emitting one node live in stack slots,
//! which are released in LIFO order when that node's [`StackFrame`] ends.
//!
//! A node with a single parent may write straight into its parent's buffer.
//! Nodes with several parents always go through the caches.

use std::mem;
use std::ops::{Deref, DerefMut};

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use solidus_domain::Scalar;
use solidus_expr::{ExprArena, ExprHandle, ExprNode};
use solidus_matrix::Matrix;

use crate::matrix_id::MatrixId;
use crate::operation::{Columns, Kernel, Operation};
use crate::sequence::{ConstantEntry, EvaluationSequence};

/// Peak memory and slot usage of a sequence.
///
/// Rows of `Batch`-column allocations scale with the batch size; the
/// `components` counters hold fixed-width allocations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceBudget {
    /// Peak rows of batch-wide stack temporaries.
    pub stack_rows: usize,
    /// Peak entries of fixed-width stack temporaries.
    pub stack_components: usize,
    /// Total rows of batch-wide heap buffers.
    pub heap_rows: usize,
    /// Total entries of fixed-width heap buffers.
    pub heap_components: usize,
    /// Highest slot number handed out.
    pub temporaries: usize,
}

/// Keys of the constant pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum PoolKey {
    /// Values of a constant node.
    Value(ExprHandle),
    /// Jacobian of a node whose Jacobian does not depend on the point.
    Jacobian(ExprHandle),
    /// Basis of an affine or elliptical map.
    Basis(ExprHandle),
    /// Origin of an affine or elliptical map.
    Origin(ExprHandle),
    /// Basis of one partial derivative of an elliptical map.
    EllipticalPartial(ExprHandle, usize),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct StackEntry {
    slot: u32,
    rows: usize,
    components: usize,
}

/// Builds one [`EvaluationSequence`] from an arena.
pub struct Compiler<'a, S: Scalar> {
    pub(crate) arena: &'a ExprArena,
    operations: Vec<Operation>,
    constants: Vec<ConstantEntry<S>>,
    pool: FxHashMap<PoolKey, MatrixId>,
    value_cache: FxHashMap<(ExprHandle, MatrixId), MatrixId>,
    jacobian_cache: FxHashMap<(ExprHandle, MatrixId), MatrixId>,
    /// Number of parent edges of each node reachable from the root.
    parents: FxHashMap<ExprHandle, usize>,
    /// Jacobian rules also read operand values, so no value is written
    /// in place.
    jacobian_pass: bool,
    available_slots: Vec<u32>,
    stack_entries: Vec<StackEntry>,
    stack_rows: usize,
    stack_components: usize,
    budget: ResourceBudget,
}

impl<'a, S: Scalar> Compiler<'a, S> {
    /// Creates a compiler reading from `arena`.
    #[must_use]
    pub fn new(arena: &'a ExprArena) -> Self {
        Self {
            arena,
            operations: Vec::new(),
            constants: Vec::new(),
            pool: FxHashMap::default(),
            value_cache: FxHashMap::default(),
            jacobian_cache: FxHashMap::default(),
            parents: FxHashMap::default(),
            jacobian_pass: false,
            available_slots: Vec::new(),
            stack_entries: Vec::new(),
            stack_rows: 0,
            stack_components: 0,
            budget: ResourceBudget::default(),
        }
    }

    /// Compiles the value of `root`.
    #[must_use]
    pub fn compile(mut self, root: ExprHandle) -> EvaluationSequence<S> {
        self.count_parents(root);
        self.evaluate_into(root, MatrixId::parameters(), MatrixId::result());
        self.finish(root, false)
    }

    /// Compiles the Jacobian of `root`.
    #[must_use]
    pub fn compile_jacobian(mut self, root: ExprHandle) -> EvaluationSequence<S> {
        self.count_parents(root);
        self.jacobian_pass = true;
        self.jacobian_into(root, MatrixId::parameters(), MatrixId::result());
        self.finish(root, true)
    }

    fn count_parents(&mut self, root: ExprHandle) {
        let arena = self.arena;
        let mut visited = FxHashSet::default();
        let mut pending = vec![root];
        while let Some(handle) = pending.pop() {
            if !visited.insert(handle) {
                continue;
            }
            for child in arena.node(handle).children() {
                *self.parents.entry(child).or_insert(0) += 1;
                pending.push(child);
            }
        }
    }

    fn is_shared(&self, handle: ExprHandle) -> bool {
        self.parents.get(&handle).is_some_and(|&count| count > 1)
    }

    fn finish(self, root: ExprHandle, jacobian: bool) -> EvaluationSequence<S> {
        debug_assert!(self.stack_entries.is_empty(), "unreleased stack temporaries");
        debug!(
            "compiled {} of {}: {} operations, {} constants, {:?}",
            if jacobian { "jacobian" } else { "value" },
            root,
            self.operations.len(),
            self.constants.len(),
            self.budget
        );
        EvaluationSequence::new(
            self.operations,
            self.budget,
            self.constants,
            self.arena.parameters(root),
            self.arena.dimensions(root),
            jacobian,
        )
    }

    // === Values ===

    /// Returns a buffer holding the value of `handle` at `parameters`,
    /// emitting its computation on first use.
    pub(crate) fn evaluate(&mut self, handle: ExprHandle, parameters: MatrixId) -> MatrixId {
        if let Some(id) = self.value_view(handle, parameters) {
            return id;
        }
        if let Some(&cached) = self.value_cache.get(&(handle, parameters)) {
            return cached;
        }
        let result = self.heap_allocate(self.arena.dimensions(handle), Columns::Batch);
        StackFrame::new(self).emit_value(handle, parameters, result);
        self.value_cache.insert((handle, parameters), result);
        result
    }

    /// Writes the value of `handle` at `parameters` into `target`.
    pub(crate) fn evaluate_into(&mut self, handle: ExprHandle, parameters: MatrixId, target: MatrixId) {
        if let Some(&cached) = self.value_cache.get(&(handle, parameters)) {
            self.assign(cached, target);
        } else if self.jacobian_pass || self.is_shared(handle) {
            let value = self.evaluate(handle, parameters);
            self.assign(value, target);
        } else {
            StackFrame::new(self).emit_value(handle, parameters, target);
        }
    }

    /// Returns the buffer of a zero-cost node's value without emitting a
    /// computation.
    pub(crate) fn value_view(&mut self, handle: ExprHandle, parameters: MatrixId) -> Option<MatrixId> {
        let arena = self.arena;
        match arena.node(handle) {
            ExprNode::Identity => Some(parameters),
            ExprNode::Parameter(index) => Some(parameters.block(*index, 1)),
            ExprNode::Constant(values) => Some(self.pooled(PoolKey::Value(handle), true, || {
                Matrix::from_column_slice(values.len(), 1, values.as_slice())
            })),
            ExprNode::Components {
                operand,
                start,
                count,
            } => Some(self.evaluate(*operand, parameters).block(*start, *count)),
            _ => None,
        }
    }

    // === Jacobians ===

    /// Returns a buffer holding the Jacobian of `handle` at `parameters`.
    pub(crate) fn jacobian(&mut self, handle: ExprHandle, parameters: MatrixId) -> MatrixId {
        if let Some(id) = self.jacobian_view(handle, parameters) {
            return id;
        }
        if let Some(&cached) = self.jacobian_cache.get(&(handle, parameters)) {
            return cached;
        }
        let (rows, columns) = (self.arena.dimensions(handle), self.arena.parameters(handle));
        let result = self.heap_allocate(rows, Columns::Fixed(columns));
        StackFrame::new(self).emit_jacobian(handle, parameters, result);
        self.jacobian_cache.insert((handle, parameters), result);
        result
    }

    /// Writes the Jacobian of `handle` at `parameters` into `target`.
    pub(crate) fn jacobian_into(&mut self, handle: ExprHandle, parameters: MatrixId, target: MatrixId) {
        if let Some(&cached) = self.jacobian_cache.get(&(handle, parameters)) {
            self.assign(cached, target);
        } else if self.is_shared(handle) {
            let jacobian = self.jacobian(handle, parameters);
            self.assign(jacobian, target);
        } else {
            StackFrame::new(self).emit_jacobian(handle, parameters, target);
        }
    }

    /// Returns the buffer of a Jacobian that is a constant or a block of
    /// another Jacobian.
    pub(crate) fn jacobian_view(&mut self, handle: ExprHandle, parameters: MatrixId) -> Option<MatrixId> {
        let arena = self.arena;
        let (rows, columns) = (arena.dimensions(handle), arena.parameters(handle));
        let key = PoolKey::Jacobian(handle);
        match arena.node(handle) {
            ExprNode::Constant(_) => Some(self.pooled(key, false, || Matrix::zeros(rows, columns))),
            ExprNode::Identity => Some(self.pooled(key, false, || Matrix::identity(columns))),
            ExprNode::Parameter(index) => Some(self.pooled(key, false, || {
                let mut row = Matrix::zeros(1, columns);
                row[(0, *index)] = 1.0;
                row
            })),
            ExprNode::Linear { basis, .. } => Some(self.pooled(key, false, || {
                Matrix::from_column_slice(rows, columns, basis.as_slice())
            })),
            ExprNode::Components {
                operand,
                start,
                count,
            } => Some(self.jacobian(*operand, parameters).block(*start, *count)),
            _ => None,
        }
    }

    // === Emission primitives ===

    /// Returns the pool entry for `key`, creating it from `build` once.
    pub(crate) fn pooled(&mut self, key: PoolKey, broadcast: bool, build: impl FnOnce() -> Matrix<f64>) -> MatrixId {
        if let Some(&id) = self.pool.get(&key) {
            return id;
        }
        let index = u32::try_from(self.constants.len()).unwrap_or_else(|_| panic!("constant pool overflow"));
        let id = MatrixId::constant(index);
        self.constants.push(ConstantEntry {
            matrix: build().map(S::from_f64),
            broadcast,
        });
        self.pool.insert(key, id);
        id
    }

    pub(crate) fn assign(&mut self, source: MatrixId, target: MatrixId) {
        self.operations.push(Operation::Assign { source, target });
    }

    pub(crate) fn compute(&mut self, kernel: Kernel, arguments: &[MatrixId], target: MatrixId) {
        self.operations.push(Operation::Compute {
            kernel,
            arguments: SmallVec::from_slice(arguments),
            target,
        });
    }

    fn next_slot(&mut self) -> u32 {
        if let Some(slot) = self.available_slots.pop() {
            return slot;
        }
        self.budget.temporaries += 1;
        u32::try_from(self.budget.temporaries).unwrap_or_else(|_| panic!("slot count overflow"))
    }

    /// Reserves a stack temporary scoped to the innermost [`StackFrame`].
    pub(crate) fn create_temporary(&mut self, rows: usize, columns: Columns) -> MatrixId {
        let slot = self.next_slot();
        let entry = match columns {
            Columns::Batch => StackEntry {
                slot,
                rows,
                components: 0,
            },
            Columns::Fixed(n) => StackEntry {
                slot,
                rows: 0,
                components: rows * n,
            },
        };
        self.stack_rows += entry.rows;
        self.stack_components += entry.components;
        self.budget.stack_rows = self.budget.stack_rows.max(self.stack_rows);
        self.budget.stack_components = self.budget.stack_components.max(self.stack_components);
        self.stack_entries.push(entry);
        trace!("stack m{slot}: {rows}x{columns}");
        self.operations.push(Operation::StackAllocate { slot, rows, columns });
        MatrixId::slot(slot)
    }

    /// Reserves a buffer that lives until the end of the sequence.
    pub(crate) fn heap_allocate(&mut self, rows: usize, columns: Columns) -> MatrixId {
        let slot = self.next_slot();
        match columns {
            Columns::Batch => self.budget.heap_rows += rows,
            Columns::Fixed(n) => self.budget.heap_components += rows * n,
        }
        trace!("heap m{slot}: {rows}x{columns}");
        self.operations.push(Operation::HeapAllocate { slot, rows, columns });
        MatrixId::slot(slot)
    }

    /// Releases `entries`, most recent first, and returns their slots to
    /// the free list.
    fn unwind(&mut self, entries: Vec<StackEntry>) {
        if entries.is_empty() {
            return;
        }
        let mut slots = SmallVec::with_capacity(entries.len());
        for entry in entries.into_iter().rev() {
            self.stack_rows -= entry.rows;
            self.stack_components -= entry.components;
            self.available_slots.push(entry.slot);
            slots.push(entry.slot);
        }
        self.operations.push(Operation::StackDeallocate { slots });
    }
}

/// A scope for stack temporaries.
///
/// Temporaries created through the frame are released when it drops, after
/// any temporaries of nested frames.
pub(crate) struct StackFrame<'c, 'a, S: Scalar> {
    compiler: &'c mut Compiler<'a, S>,
    saved: Vec<StackEntry>,
}

impl<'c, 'a, S: Scalar> StackFrame<'c, 'a, S> {
    pub(crate) fn new(compiler: &'c mut Compiler<'a, S>) -> Self {
        let saved = mem::take(&mut compiler.stack_entries);
        Self { compiler, saved }
    }
}

impl<'a, S: Scalar> Deref for StackFrame<'_, 'a, S> {
    type Target = Compiler<'a, S>;

    fn deref(&self) -> &Self::Target {
        self.compiler
    }
}

impl<S: Scalar> DerefMut for StackFrame<'_, '_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.compiler
    }
}

impl<S: Scalar> Drop for StackFrame<'_, '_, S> {
    fn drop(&mut self) {
        let created = mem::replace(&mut self.compiler.stack_entries, mem::take(&mut self.saved));
        self.compiler.unwind(created);
    }
}

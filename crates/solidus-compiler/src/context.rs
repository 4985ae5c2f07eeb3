//! Runtime state for executing an evaluation sequence.
//!
//! All temporaries live in one buffer: the stack region grows upward from
//! offset 0 and the heap region starts right after the stack's peak size.
//! The result is held separately so it can be handed to the caller.

use smallvec::SmallVec;
use solidus_domain::Scalar;
use solidus_matrix::{Matrix, MatrixView, MatrixViewMut};

use crate::error::EvalError;
use crate::kernels;
use crate::matrix_id::{MatrixId, Source};
use crate::operation::{Columns, Operation};
use crate::sequence::EvaluationSequence;

#[derive(Clone, Copy, Debug)]
struct Region {
    offset: usize,
    rows: usize,
    columns: usize,
}

impl Region {
    fn len(self) -> usize {
        self.rows * self.columns
    }

    fn end(self) -> usize {
        self.offset + self.len()
    }
}

/// Read-only state needed to resolve argument handles while the target
/// region is borrowed mutably.
struct Sources<'v, S> {
    parameters: &'v Matrix<S>,
    sequence: &'v EvaluationSequence<S>,
    slots: &'v [Option<Region>],
    below: &'v [S],
    above: &'v [S],
    above_offset: usize,
    batch: usize,
}

impl<'v, S: Scalar> Sources<'v, S> {
    fn view(&self, id: MatrixId) -> MatrixView<'v, S> {
        let whole = match id.source() {
            Source::Parameters => self.parameters.view(),
            Source::Constant(index) => {
                let entry = &self.sequence.constants()[index as usize];
                if entry.broadcast {
                    entry.matrix.broadcast(self.batch)
                } else {
                    entry.matrix.view()
                }
            }
            Source::Slot(0) => panic!("operations never read the result buffer"),
            Source::Slot(slot) => {
                let region = self.slots[slot as usize].unwrap_or_else(|| panic!("slot m{slot} is not allocated"));
                let data = if region.end() <= self.below.len() {
                    &self.below[region.offset..region.end()]
                } else if region.offset >= self.above_offset {
                    let start = region.offset - self.above_offset;
                    &self.above[start..start + region.len()]
                } else {
                    panic!("operation reads the slot it writes (m{slot})")
                };
                MatrixView::new(data, region.rows, region.columns, region.rows)
            }
        };
        match id.block_range() {
            Some((start, rows)) => whole.block_rows(start, rows),
            None => whole,
        }
    }
}

/// Buffers for one run of an [`EvaluationSequence`].
///
/// A context is created per parameter batch; independent contexts over the
/// same sequence can run on different threads.
pub struct EvaluationContext<'s, S: Scalar> {
    sequence: &'s EvaluationSequence<S>,
    parameters: &'s Matrix<S>,
    batch: usize,
    memory: Vec<S>,
    stack_top: usize,
    heap_top: usize,
    slots: Vec<Option<Region>>,
    result: Matrix<S>,
}

impl<'s, S: Scalar> EvaluationContext<'s, S> {
    /// Creates a context sized for `sequence` and the batch in `parameters`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter matrix does not have one row per
    /// parameter, has no columns, or has several columns for a Jacobian
    /// sequence.
    pub fn new(sequence: &'s EvaluationSequence<S>, parameters: &'s Matrix<S>) -> Result<Self, EvalError> {
        if parameters.rows() != sequence.parameter_count() {
            return Err(EvalError::ParameterCountMismatch {
                expected: sequence.parameter_count(),
                actual: parameters.rows(),
            });
        }
        let batch = parameters.columns();
        if batch == 0 {
            return Err(EvalError::EmptyBatch);
        }
        if sequence.is_jacobian() && batch != 1 {
            return Err(EvalError::JacobianBatch { columns: batch });
        }

        let budget = sequence.budget();
        let stack_size = budget.stack_rows * batch + budget.stack_components;
        let heap_size = budget.heap_rows * batch + budget.heap_components;
        let result_columns = if sequence.is_jacobian() {
            sequence.parameter_count()
        } else {
            batch
        };
        Ok(Self {
            sequence,
            parameters,
            batch,
            memory: vec![S::zero(); stack_size + heap_size],
            stack_top: 0,
            heap_top: stack_size,
            slots: vec![None; budget.temporaries + 1],
            result: Matrix::zeros(sequence.dimensions(), result_columns),
        })
    }

    /// Returns the number of parameter points in the batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch
    }

    fn resolve(&self, columns: Columns) -> usize {
        match columns {
            Columns::Batch => self.batch,
            Columns::Fixed(n) => n,
        }
    }

    /// Binds `slot` to a new region on top of the stack.
    ///
    /// # Panics
    ///
    /// Panics if the slot is in use or the stack would overflow its budget.
    pub fn stack_allocate(&mut self, slot: u32, rows: usize, columns: Columns) {
        let region = Region {
            offset: self.stack_top,
            rows,
            columns: self.resolve(columns),
        };
        let stack_end = self.memory.len() - self.heap_capacity();
        assert!(region.end() <= stack_end, "stack budget exceeded by m{slot}");
        self.bind(slot, region);
        self.stack_top = region.end();
    }

    /// Releases the stack region of `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not the top of the stack.
    pub fn stack_deallocate(&mut self, slot: u32) {
        let region = self.slots[slot as usize]
            .take()
            .unwrap_or_else(|| panic!("slot m{slot} is not allocated"));
        assert_eq!(region.end(), self.stack_top, "stack slot m{slot} released out of order");
        self.stack_top = region.offset;
    }

    /// Binds `slot` to a new heap region.
    ///
    /// # Panics
    ///
    /// Panics if the slot is in use or the heap would overflow its budget.
    pub fn heap_allocate(&mut self, slot: u32, rows: usize, columns: Columns) {
        let region = Region {
            offset: self.heap_top,
            rows,
            columns: self.resolve(columns),
        };
        assert!(region.end() <= self.memory.len(), "heap budget exceeded by m{slot}");
        self.bind(slot, region);
        self.heap_top = region.end();
    }

    fn heap_capacity(&self) -> usize {
        let budget = self.sequence.budget();
        budget.heap_rows * self.batch + budget.heap_components
    }

    fn bind(&mut self, slot: u32, region: Region) {
        assert_ne!(slot, 0, "slot 0 is the result");
        let entry = &mut self.slots[slot as usize];
        assert!(entry.is_none(), "slot m{slot} is already allocated");
        *entry = Some(region);
    }

    /// Returns a view of the buffer behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` refers to an unallocated slot.
    #[must_use]
    pub fn view(&self, id: MatrixId) -> MatrixView<'_, S> {
        if id.source() == Source::Slot(0) {
            let whole = self.result.view();
            return match id.block_range() {
                Some((start, rows)) => whole.block_rows(start, rows),
                None => whole,
            };
        }
        Sources {
            parameters: self.parameters,
            sequence: self.sequence,
            slots: &self.slots,
            below: &self.memory,
            above: &[],
            above_offset: self.memory.len(),
            batch: self.batch,
        }
        .view(id)
    }

    /// Runs every operation of the sequence.
    pub fn execute(&mut self) {
        let sequence = self.sequence;
        for op in sequence.operations() {
            self.apply(op);
        }
    }

    /// Runs one operation.
    ///
    /// # Panics
    ///
    /// Panics on malformed operations: unallocated or overlapping buffers,
    /// shape mismatches, or out-of-order stack releases.
    pub fn apply(&mut self, op: &Operation) {
        match op {
            &Operation::StackAllocate { slot, rows, columns } => self.stack_allocate(slot, rows, columns),
            Operation::StackDeallocate { slots } => {
                for &slot in slots {
                    self.stack_deallocate(slot);
                }
            }
            &Operation::HeapAllocate { slot, rows, columns } => self.heap_allocate(slot, rows, columns),
            Operation::Assign { source, target } => {
                self.write(*target, &[*source], |arguments, out| out.assign(&arguments[0]));
            }
            Operation::Compute {
                kernel,
                arguments,
                target,
            } => {
                self.write(*target, arguments, |views, out| kernels::execute(kernel, views, out));
            }
        }
    }

    /// Resolves `arguments` and `target`, then runs `f` on them.
    fn write(
        &mut self,
        target: MatrixId,
        arguments: &[MatrixId],
        f: impl FnOnce(&[MatrixView<'_, S>], &mut MatrixViewMut<'_, S>),
    ) {
        let batch = self.batch;
        let (region, below, destination, above) = match target.source() {
            Source::Slot(0) => {
                let region = Region {
                    offset: 0,
                    rows: self.result.rows(),
                    columns: self.result.columns(),
                };
                (region, &self.memory[..], None, &[][..])
            }
            Source::Slot(slot) => {
                let region = self.slots[slot as usize].unwrap_or_else(|| panic!("slot m{slot} is not allocated"));
                let (below, rest) = self.memory.split_at_mut(region.offset);
                let (destination, above) = rest.split_at_mut(region.len());
                (region, &*below, Some(destination), &*above)
            }
            source => panic!("operation writes read-only buffer {source:?}"),
        };
        let sources = Sources {
            parameters: self.parameters,
            sequence: self.sequence,
            slots: &self.slots,
            below,
            above,
            above_offset: region.end(),
            batch,
        };
        let views: SmallVec<[MatrixView<'_, S>; 4]> = arguments.iter().map(|&id| sources.view(id)).collect();

        let mut whole = match destination {
            Some(data) => MatrixViewMut::new(data, region.rows, region.columns, region.rows),
            None => self.result.view_mut(),
        };
        match target.block_range() {
            Some((start, rows)) => f(&views[..], &mut whole.block_rows_mut(start, rows)),
            None => f(&views[..], &mut whole),
        }
    }

    /// Returns the result buffer.
    #[must_use]
    pub fn result(&self) -> &Matrix<S> {
        &self.result
    }

    /// Consumes the context and returns the result.
    #[must_use]
    pub fn into_result(self) -> Matrix<S> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, compile_jacobian};
    use solidus_expr::ExprArena;

    fn normalized_plane() -> (EvaluationSequence<f64>, EvaluationSequence<f64>) {
        let mut arena = ExprArena::new();
        let x = arena.identity(2).unwrap();
        let n = arena.normalized(x);
        (compile(&arena, n), compile_jacobian(&arena, n))
    }

    #[test]
    fn test_step_by_step_matches_execute() {
        let (value, _) = normalized_plane();
        let params = Matrix::from_rows(&[vec![3.0, 0.0, 1.0], vec![4.0, 2.0, 1.0]]);

        let mut whole = EvaluationContext::new(&value, &params).unwrap();
        whole.execute();
        let mut stepped = EvaluationContext::new(&value, &params).unwrap();
        for op in value.operations() {
            stepped.apply(op);
        }
        assert_eq!(whole.result(), stepped.result());
        assert_eq!(whole.result()[(0, 0)], 0.6);
        assert_eq!(whole.result()[(1, 1)], 1.0);
    }

    #[test]
    #[should_panic(expected = "released out of order")]
    fn test_non_lifo_release_panics() {
        let (_, jacobian) = normalized_plane();
        let params = Matrix::from_column_slice(2, 1, &[1.0, 1.0]);
        let mut context = EvaluationContext::new(&jacobian, &params).unwrap();
        context.stack_allocate(2, 1, Columns::Batch);
        context.stack_allocate(3, 1, Columns::Fixed(2));
        context.stack_deallocate(2);
    }

    #[test]
    #[should_panic(expected = "stack budget exceeded")]
    fn test_stack_overflow_panics() {
        let (value, _) = normalized_plane();
        let params = Matrix::zeros(2, 4);
        let mut context = EvaluationContext::new(&value, &params).unwrap();
        context.stack_allocate(1, 2, Columns::Batch);
    }

    #[test]
    fn test_views_resolve_blocks() {
        let (value, _) = normalized_plane();
        let params = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let context = EvaluationContext::new(&value, &params).unwrap();
        let row = context.view(MatrixId::parameters().block(1, 1));
        assert_eq!((row.rows(), row.columns()), (1, 2));
        assert_eq!(row.get(0, 1), 4.0);
    }
}

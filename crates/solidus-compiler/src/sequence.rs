//! Compiled evaluation sequences.

use std::fmt;

use solidus_domain::Scalar;
use solidus_matrix::Matrix;

use crate::compiler::ResourceBudget;
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::operation::{Kernel, Operation};

/// A pooled constant.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantEntry<S> {
    /// The stored matrix.
    pub matrix: Matrix<S>,
    /// Whether the single column is repeated across the batch.
    pub broadcast: bool,
}

/// A flat, replayable program computing one expression's value or Jacobian.
///
/// Sequences own their constants and are immutable, so one sequence can
/// be shared by many threads, each with its own [`EvaluationContext`].
#[derive(Clone, Debug)]
pub struct EvaluationSequence<S> {
    operations: Vec<Operation>,
    budget: ResourceBudget,
    constants: Vec<ConstantEntry<S>>,
    parameters: usize,
    dimensions: usize,
    jacobian: bool,
}

impl<S: Scalar> EvaluationSequence<S> {
    pub(crate) fn new(
        operations: Vec<Operation>,
        budget: ResourceBudget,
        constants: Vec<ConstantEntry<S>>,
        parameters: usize,
        dimensions: usize,
        jacobian: bool,
    ) -> Self {
        Self {
            operations,
            budget,
            constants,
            parameters,
            dimensions,
            jacobian,
        }
    }

    /// Returns the operations in execution order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns the memory requirements.
    #[must_use]
    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    /// Returns the constant pool.
    #[must_use]
    pub fn constants(&self) -> &[ConstantEntry<S>] {
        &self.constants
    }

    /// Returns the number of parameters the sequence expects.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameters
    }

    /// Returns the number of components of the compiled expression.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Returns true if the sequence computes a Jacobian.
    #[must_use]
    pub fn is_jacobian(&self) -> bool {
        self.jacobian
    }

    /// Returns the number of `Compute` operations running `kernel`.
    #[must_use]
    pub fn count_kernel(&self, kernel: &Kernel) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Compute { kernel: k, .. } if k == kernel))
            .count()
    }

    /// Returns the number of stack and heap allocations.
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    Operation::StackAllocate { .. } | Operation::HeapAllocate { .. }
                )
            })
            .count()
    }

    /// Evaluates the sequence for a batch of parameter points, one per
    /// column.
    ///
    /// Value sequences return `dimensions x batch`. Jacobian sequences run
    /// once per point and return each `dimensions x parameters` Jacobian
    /// flattened column-major into one column.
    ///
    /// # Errors
    ///
    /// Returns an error if `parameters` has the wrong number of rows or no
    /// columns.
    pub fn evaluate(&self, parameters: &Matrix<S>) -> Result<Matrix<S>, EvalError> {
        if !self.jacobian {
            let mut context = EvaluationContext::new(self, parameters)?;
            context.execute();
            return Ok(context.into_result());
        }

        if parameters.rows() != self.parameters {
            return Err(EvalError::ParameterCountMismatch {
                expected: self.parameters,
                actual: parameters.rows(),
            });
        }
        if parameters.columns() == 0 {
            return Err(EvalError::EmptyBatch);
        }
        let mut output = Matrix::zeros(self.dimensions * self.parameters, parameters.columns());
        for j in 0..parameters.columns() {
            let point = Matrix::from_column_slice(self.parameters, 1, parameters.column(j));
            let mut context = EvaluationContext::new(self, &point)?;
            context.execute();
            output.column_mut(j).copy_from_slice(context.result().as_slice());
        }
        Ok(output)
    }
}

impl<S> fmt::Display for EvaluationSequence<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.operations {
            writeln!(f, "{op}")?;
        }
        Ok(())
    }
}

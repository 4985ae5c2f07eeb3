//! Batch evaluation across threads.
//!
//! A compiled sequence is immutable, so each rayon task evaluates a block
//! of parameter columns in its own [`EvaluationContext`](crate::EvaluationContext)
//! and the blocks are stitched back together in column order.

use log::debug;
use rayon::prelude::*;
use solidus_domain::Scalar;
use solidus_matrix::Matrix;

use crate::error::EvalError;
use crate::sequence::EvaluationSequence;

/// Configuration for parallel batch evaluation.
#[derive(Clone, Debug)]
pub struct ParallelConfig {
    /// Minimum batch size to enable parallelism.
    pub parallel_threshold: usize,
    /// Parameter columns per task.
    pub chunk_columns: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 1024,
            chunk_columns: 256,
        }
    }
}

/// Evaluates `sequence` over a large batch, splitting the columns across
/// the rayon thread pool.
///
/// The result is identical to [`EvaluationSequence::evaluate`].
///
/// # Errors
///
/// Returns the same errors as [`EvaluationSequence::evaluate`].
pub fn evaluate_parallel<S: Scalar>(
    sequence: &EvaluationSequence<S>,
    parameters: &Matrix<S>,
    config: &ParallelConfig,
) -> Result<Matrix<S>, EvalError> {
    let columns = parameters.columns();
    let chunk = config.chunk_columns.max(1);
    if columns < config.parallel_threshold || columns <= chunk {
        // Fall back to sequential for small batches
        return sequence.evaluate(parameters);
    }

    let rows = parameters.rows();
    let starts: Vec<usize> = (0..columns).step_by(chunk).collect();
    debug!("evaluating {columns} points in {} chunks", starts.len());
    let blocks = starts
        .par_iter()
        .map(|&start| {
            let end = (start + chunk).min(columns);
            let block = Matrix::from_column_slice(
                rows,
                end - start,
                &parameters.as_slice()[start * rows..end * rows],
            );
            sequence.evaluate(&block)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let output_rows = blocks.first().map_or(0, Matrix::rows);
    let mut data = Vec::with_capacity(output_rows * columns);
    for block in &blocks {
        data.extend_from_slice(block.as_slice());
    }
    Ok(Matrix::from_column_slice(output_rows, columns, &data))
}

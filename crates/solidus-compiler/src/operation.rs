//! The instruction set of an evaluation sequence.

use std::fmt;

use smallvec::SmallVec;
use solidus_expr::{Convention, Elementary};

use crate::matrix_id::MatrixId;

/// Column count of an allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Columns {
    /// One column per parameter point of the batch.
    Batch,
    /// A fixed number of columns, independent of the batch.
    Fixed(usize),
}

/// A numeric kernel.
///
/// Kernels are domain-agnostic descriptions; the runtime instantiates them
/// for the scalar type of the sequence. Arguments with a single column are
/// applied against every column of the target.
#[derive(Clone, Debug, PartialEq)]
pub enum Kernel {
    /// `-a`.
    Negate,
    /// `a + b`.
    Add,
    /// `a - b`.
    Subtract,
    /// Multiplies each column of `b` by the matching entry of the row `a`.
    ScaleColumns,
    /// Divides each column of `a` by the matching entry of the row `b`.
    DivideColumns,
    /// Column-wise dot product of `a` and `b`.
    ColumnDot,
    /// Column-wise cross product of two 3-row operands.
    ColumnCross,
    /// Column-wise Euclidean norm.
    ColumnNorm,
    /// Column-wise squared Euclidean norm.
    ColumnSquaredNorm,
    /// An elementary function applied entry-wise.
    Elementary(Elementary),
    /// The derivative of an elementary function, applied entry-wise.
    ElementaryDerivative(Elementary),
    /// `base ^ exponent`, entry-wise.
    Power,
    /// `base ^ n` for a fixed integer `n`.
    PowerInteger(i32),
    /// `exponent * base ^ (exponent - 1)`, the partial in the base.
    PowerBasePartial,
    /// `power * ln(base)` with arguments `[base, power]`, the partial in the
    /// exponent.
    PowerExponentPartial,
    /// `origin + basis * x` with arguments `[basis, origin, x]`.
    Affine,
    /// `origin + basis * local(x)` with arguments `[basis, origin, x]`.
    Elliptical {
        /// Sine/cosine choice per parameter.
        convention: Convention,
    },
    /// Jacobian of an elliptical map at one point, with arguments
    /// `[basis_0, .., basis_{n-1}, x]`; column `i` is `basis_i * local_i(x)`.
    EllipticalJacobian {
        /// Convention of each partial's basis.
        conventions: Vec<Convention>,
    },
    /// `a * b`.
    MatrixProduct,
    /// `a^T * b`.
    TransposeProduct,
}

impl Kernel {
    /// Returns a short name for listings.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Kernel::Negate => "neg",
            Kernel::Add => "add",
            Kernel::Subtract => "sub",
            Kernel::ScaleColumns => "scale",
            Kernel::DivideColumns => "div",
            Kernel::ColumnDot => "dot",
            Kernel::ColumnCross => "cross",
            Kernel::ColumnNorm => "norm",
            Kernel::ColumnSquaredNorm => "sqnorm",
            Kernel::Elementary(f) => f.name(),
            Kernel::ElementaryDerivative(_) => "dfn",
            Kernel::Power => "pow",
            Kernel::PowerInteger(_) => "powi",
            Kernel::PowerBasePartial => "dpow_base",
            Kernel::PowerExponentPartial => "dpow_exp",
            Kernel::Affine => "affine",
            Kernel::Elliptical { .. } => "elliptical",
            Kernel::EllipticalJacobian { .. } => "elliptical_jac",
            Kernel::MatrixProduct => "matmul",
            Kernel::TransposeProduct => "tmatmul",
        }
    }
}

/// One step of an evaluation sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Reserve a scoped temporary.
    StackAllocate {
        /// Slot bound to the temporary.
        slot: u32,
        /// Rows.
        rows: usize,
        /// Columns.
        columns: Columns,
    },
    /// Release temporaries, most recent first.
    StackDeallocate {
        /// Slots in the order they are released.
        slots: SmallVec<[u32; 4]>,
    },
    /// Reserve a buffer that lives until the sequence ends.
    HeapAllocate {
        /// Slot bound to the buffer.
        slot: u32,
        /// Rows.
        rows: usize,
        /// Columns.
        columns: Columns,
    },
    /// Copy `source` into `target`.
    Assign {
        /// Buffer read.
        source: MatrixId,
        /// Buffer written.
        target: MatrixId,
    },
    /// Run a kernel.
    Compute {
        /// The kernel.
        kernel: Kernel,
        /// Buffers read, in kernel order.
        arguments: SmallVec<[MatrixId; 3]>,
        /// Buffer written.
        target: MatrixId,
    },
}

impl fmt::Display for Columns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Columns::Batch => write!(f, "N"),
            Columns::Fixed(n) => write!(f, "{n}"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::StackAllocate {
                slot,
                rows,
                columns,
            } => write!(f, "salloc m{slot} {rows}x{columns}"),
            Operation::StackDeallocate { slots } => {
                write!(f, "sfree")?;
                for slot in slots {
                    write!(f, " m{slot}")?;
                }
                Ok(())
            }
            Operation::HeapAllocate {
                slot,
                rows,
                columns,
            } => write!(f, "halloc m{slot} {rows}x{columns}"),
            Operation::Assign { source, target } => write!(f, "{target} = {source}"),
            Operation::Compute {
                kernel,
                arguments,
                target,
            } => {
                write!(f, "{target} = {}(", kernel.name())?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_listing() {
        let op = Operation::Compute {
            kernel: Kernel::Add,
            arguments: smallvec![MatrixId::slot(1), MatrixId::parameters().block(0, 1)],
            target: MatrixId::result(),
        };
        assert_eq!(op.to_string(), "m0 = add(m1, p[0..1])");

        let op = Operation::StackAllocate {
            slot: 2,
            rows: 3,
            columns: Columns::Batch,
        };
        assert_eq!(op.to_string(), "salloc m2 3xN");
        let op = Operation::StackDeallocate {
            slots: smallvec![3, 2],
        };
        assert_eq!(op.to_string(), "sfree m3 m2");
    }

    #[test]
    fn test_kernel_names() {
        assert_eq!(Kernel::Elementary(Elementary::Sine).name(), "Sine");
        assert_eq!(Kernel::PowerInteger(2).name(), "powi");
    }
}

//! Per-node emission rules for the value and Jacobian passes.
//!
//! Rules run inside a fresh [`StackFrame`](crate::compiler::StackFrame):
//! temporaries they create are released right after the node is emitted.
//! Operand values and Jacobians are requested through the caching entry
//! points, so shared operands are computed once.

use solidus_domain::Scalar;
use solidus_expr::elliptical::derivative_basis;
use solidus_expr::{ExprHandle, ExprNode};
use solidus_matrix::Matrix;

use crate::compiler::{Compiler, PoolKey};
use crate::matrix_id::MatrixId;
use crate::operation::{Columns, Kernel};

/// Largest exponent magnitude lowered to repeated multiplication.
const MAX_INTEGER_EXPONENT: f64 = 64.0;

impl<S: Scalar> Compiler<'_, S> {
    /// Returns the integer value of a constant exponent, if it has one.
    fn integer_exponent(&self, exponent: ExprHandle) -> Option<i32> {
        let value = self.arena.scalar_value(exponent)?;
        if value.fract() == 0.0 && value.abs() <= MAX_INTEGER_EXPONENT {
            #[allow(clippy::cast_possible_truncation)]
            Some(value as i32)
        } else {
            None
        }
    }

    fn map_basis(&mut self, handle: ExprHandle, basis: &[f64], columns: usize) -> MatrixId {
        let rows = self.arena.dimensions(handle);
        self.pooled(PoolKey::Basis(handle), false, || {
            Matrix::from_column_slice(rows, columns, basis)
        })
    }

    fn map_origin(&mut self, handle: ExprHandle, origin: &[f64]) -> MatrixId {
        self.pooled(PoolKey::Origin(handle), true, || {
            Matrix::from_column_slice(origin.len(), 1, origin)
        })
    }

    /// Emits the computation of `handle`'s value at `parameters` into
    /// `target`.
    pub(crate) fn emit_value(&mut self, handle: ExprHandle, parameters: MatrixId, target: MatrixId) {
        if let Some(source) = self.value_view(handle, parameters) {
            self.assign(source, target);
            return;
        }

        let arena = self.arena;
        match arena.node(handle) {
            ExprNode::Linear { basis, origin } => {
                let columns = arena.parameters(handle);
                let basis = self.map_basis(handle, basis.as_slice(), columns);
                let origin = self.map_origin(handle, origin.as_slice());
                self.compute(Kernel::Affine, &[basis, origin, parameters], target);
            }
            ExprNode::Elliptical {
                basis,
                origin,
                convention,
            } => {
                let basis = self.map_basis(handle, basis.as_slice(), convention.len() + 1);
                let origin = self.map_origin(handle, origin.as_slice());
                let kernel = Kernel::Elliptical {
                    convention: convention.clone(),
                };
                self.compute(kernel, &[basis, origin, parameters], target);
            }
            &ExprNode::Composition { outer, inner } => {
                let inner_value = self.evaluate(inner, parameters);
                self.evaluate_into(outer, inner_value, target);
            }
            &ExprNode::Concatenation(a, b) => {
                let (first, second) = (arena.dimensions(a), arena.dimensions(b));
                self.evaluate_into(a, parameters, target.block(0, first));
                self.evaluate_into(b, parameters, target.block(first, second));
            }
            &ExprNode::Negation(x) => {
                let x = self.evaluate(x, parameters);
                self.compute(Kernel::Negate, &[x], target);
            }
            &ExprNode::Sum(a, b) => self.binary(Kernel::Add, a, b, parameters, target),
            &ExprNode::Difference(a, b) => self.binary(Kernel::Subtract, a, b, parameters, target),
            &ExprNode::Product {
                multiplier,
                multiplicand,
            } => {
                if multiplier == multiplicand {
                    let x = self.evaluate(multiplier, parameters);
                    self.compute(Kernel::PowerInteger(2), &[x], target);
                } else {
                    self.binary(Kernel::ScaleColumns, multiplier, multiplicand, parameters, target);
                }
            }
            &ExprNode::Quotient { dividend, divisor } => {
                self.binary(Kernel::DivideColumns, dividend, divisor, parameters, target);
            }
            &ExprNode::DotProduct(a, b) => self.binary(Kernel::ColumnDot, a, b, parameters, target),
            &ExprNode::CrossProduct(a, b) => self.binary(Kernel::ColumnCross, a, b, parameters, target),
            &ExprNode::Norm(x) => {
                let x = self.evaluate(x, parameters);
                self.compute(Kernel::ColumnNorm, &[x], target);
            }
            &ExprNode::SquaredNorm(x) => {
                let x = self.evaluate(x, parameters);
                self.compute(Kernel::ColumnSquaredNorm, &[x], target);
            }
            &ExprNode::Normalized(x) => {
                let x = self.evaluate(x, parameters);
                let length = self.create_temporary(1, Columns::Batch);
                self.compute(Kernel::ColumnNorm, &[x], length);
                self.compute(Kernel::DivideColumns, &[x, length], target);
            }
            &ExprNode::Function { function, operand } => {
                let x = self.evaluate(operand, parameters);
                self.compute(Kernel::Elementary(function), &[x], target);
            }
            &ExprNode::Power { base, exponent } => {
                if let Some(n) = self.integer_exponent(exponent) {
                    let x = self.evaluate(base, parameters);
                    self.compute(Kernel::PowerInteger(n), &[x], target);
                } else {
                    self.binary(Kernel::Power, base, exponent, parameters, target);
                }
            }
            ExprNode::Constant(_)
            | ExprNode::Identity
            | ExprNode::Parameter(_)
            | ExprNode::Components { .. } => unreachable!("zero-cost nodes resolve to views"),
        }
    }

    fn binary(&mut self, kernel: Kernel, a: ExprHandle, b: ExprHandle, parameters: MatrixId, target: MatrixId) {
        let a = self.evaluate(a, parameters);
        let b = self.evaluate(b, parameters);
        self.compute(kernel, &[a, b], target);
    }

    /// Emits the computation of `handle`'s Jacobian at `parameters` into
    /// `target`.
    ///
    /// Jacobians are laid out as `dimensions x parameters` and are computed
    /// for a single point.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn emit_jacobian(&mut self, handle: ExprHandle, parameters: MatrixId, target: MatrixId) {
        if let Some(source) = self.jacobian_view(handle, parameters) {
            self.assign(source, target);
            return;
        }

        let arena = self.arena;
        let rows = arena.dimensions(handle);
        let columns = arena.parameters(handle);
        let wide = |rows| (rows, Columns::Fixed(columns));
        match arena.node(handle) {
            ExprNode::Elliptical {
                basis, convention, ..
            } => {
                let mut arguments = Vec::with_capacity(columns + 1);
                let mut conventions = Vec::with_capacity(columns);
                for i in 0..columns {
                    let (partial, flipped) = derivative_basis(basis.as_slice(), rows, convention, i);
                    let id = self.pooled(PoolKey::EllipticalPartial(handle, i), false, || {
                        Matrix::from_column_slice(rows, columns + 1, &partial)
                    });
                    arguments.push(id);
                    conventions.push(flipped);
                }
                arguments.push(parameters);
                self.compute(Kernel::EllipticalJacobian { conventions }, &arguments, target);
            }
            &ExprNode::Composition { outer, inner } => {
                let inner_value = self.evaluate(inner, parameters);
                let outer_jacobian = self.jacobian(outer, inner_value);
                let inner_jacobian = self.jacobian(inner, parameters);
                self.compute(Kernel::MatrixProduct, &[outer_jacobian, inner_jacobian], target);
            }
            &ExprNode::Concatenation(a, b) => {
                let (first, second) = (arena.dimensions(a), arena.dimensions(b));
                self.jacobian_into(a, parameters, target.block(0, first));
                self.jacobian_into(b, parameters, target.block(first, second));
            }
            &ExprNode::Negation(x) => {
                let jx = self.jacobian(x, parameters);
                self.compute(Kernel::Negate, &[jx], target);
            }
            &ExprNode::Sum(a, b) => {
                let (ja, jb) = (self.jacobian(a, parameters), self.jacobian(b, parameters));
                self.compute(Kernel::Add, &[ja, jb], target);
            }
            &ExprNode::Difference(a, b) => {
                let (ja, jb) = (self.jacobian(a, parameters), self.jacobian(b, parameters));
                self.compute(Kernel::Subtract, &[ja, jb], target);
            }
            &ExprNode::Product {
                multiplier,
                multiplicand,
            } => {
                let s = self.evaluate(multiplier, parameters);
                if arena.is_constant(multiplier) {
                    let jv = self.jacobian(multiplicand, parameters);
                    self.compute(Kernel::ScaleColumns, &[s, jv], target);
                } else if multiplier == multiplicand {
                    // d(s^2) = 2 s ds
                    let js = self.jacobian(multiplier, parameters);
                    let (r, c) = wide(1);
                    let half = self.create_temporary(r, c);
                    self.compute(Kernel::ScaleColumns, &[s, js], half);
                    self.compute(Kernel::Add, &[half, half], target);
                } else {
                    let js = self.jacobian(multiplier, parameters);
                    let v = self.evaluate(multiplicand, parameters);
                    let jv = self.jacobian(multiplicand, parameters);
                    let (r, c) = wide(rows);
                    let first = self.create_temporary(r, c);
                    self.compute(Kernel::ScaleColumns, &[s, jv], first);
                    let second = self.create_temporary(r, c);
                    self.compute(Kernel::MatrixProduct, &[v, js], second);
                    self.compute(Kernel::Add, &[first, second], target);
                }
            }
            &ExprNode::Quotient { dividend, divisor } => {
                let s = self.evaluate(divisor, parameters);
                let q = self.evaluate(handle, parameters);
                let jx = self.jacobian(dividend, parameters);
                let js = self.jacobian(divisor, parameters);
                let (r, c) = wide(rows);
                let scaled = self.create_temporary(r, c);
                self.compute(Kernel::DivideColumns, &[jx, s], scaled);
                let outer = self.create_temporary(r, c);
                self.compute(Kernel::MatrixProduct, &[q, js], outer);
                let correction = self.create_temporary(r, c);
                self.compute(Kernel::DivideColumns, &[outer, s], correction);
                self.compute(Kernel::Subtract, &[scaled, correction], target);
            }
            &ExprNode::DotProduct(a, b) => {
                let (va, vb) = (self.evaluate(a, parameters), self.evaluate(b, parameters));
                let (ja, jb) = (self.jacobian(a, parameters), self.jacobian(b, parameters));
                let (r, c) = wide(1);
                let first = self.create_temporary(r, c);
                self.compute(Kernel::TransposeProduct, &[va, jb], first);
                let second = self.create_temporary(r, c);
                self.compute(Kernel::TransposeProduct, &[vb, ja], second);
                self.compute(Kernel::Add, &[first, second], target);
            }
            &ExprNode::CrossProduct(a, b) => {
                let (va, vb) = (self.evaluate(a, parameters), self.evaluate(b, parameters));
                let (ja, jb) = (self.jacobian(a, parameters), self.jacobian(b, parameters));
                let (r, c) = wide(3);
                let first = self.create_temporary(r, c);
                self.compute(Kernel::ColumnCross, &[va, jb], first);
                let second = self.create_temporary(r, c);
                self.compute(Kernel::ColumnCross, &[ja, vb], second);
                self.compute(Kernel::Add, &[first, second], target);
            }
            &ExprNode::Norm(x) => {
                let vx = self.evaluate(x, parameters);
                let jx = self.jacobian(x, parameters);
                let length = self.evaluate(handle, parameters);
                let (r, c) = wide(1);
                let projected = self.create_temporary(r, c);
                self.compute(Kernel::TransposeProduct, &[vx, jx], projected);
                self.compute(Kernel::DivideColumns, &[projected, length], target);
            }
            &ExprNode::SquaredNorm(x) => {
                let vx = self.evaluate(x, parameters);
                let jx = self.jacobian(x, parameters);
                let (r, c) = wide(1);
                let half = self.create_temporary(r, c);
                self.compute(Kernel::TransposeProduct, &[vx, jx], half);
                self.compute(Kernel::Add, &[half, half], target);
            }
            &ExprNode::Normalized(x) => {
                let unit = self.evaluate(handle, parameters);
                let vx = self.evaluate(x, parameters);
                let jx = self.jacobian(x, parameters);
                let length = self.create_temporary(1, Columns::Batch);
                self.compute(Kernel::ColumnNorm, &[vx], length);
                let (r, c) = wide(1);
                let along = self.create_temporary(r, c);
                self.compute(Kernel::TransposeProduct, &[unit, jx], along);
                let (r, c) = wide(rows);
                let radial = self.create_temporary(r, c);
                self.compute(Kernel::MatrixProduct, &[unit, along], radial);
                let tangential = self.create_temporary(r, c);
                self.compute(Kernel::Subtract, &[jx, radial], tangential);
                self.compute(Kernel::DivideColumns, &[tangential, length], target);
            }
            &ExprNode::Function { function, operand } => {
                let x = self.evaluate(operand, parameters);
                let jx = self.jacobian(operand, parameters);
                let slope = self.create_temporary(1, Columns::Batch);
                self.compute(Kernel::ElementaryDerivative(function), &[x], slope);
                self.compute(Kernel::ScaleColumns, &[slope, jx], target);
            }
            &ExprNode::Power { base, exponent } => {
                let b = self.evaluate(base, parameters);
                let e = self.evaluate(exponent, parameters);
                let jb = self.jacobian(base, parameters);
                let base_partial = self.create_temporary(1, Columns::Batch);
                self.compute(Kernel::PowerBasePartial, &[b, e], base_partial);
                if arena.is_constant(exponent) {
                    self.compute(Kernel::ScaleColumns, &[base_partial, jb], target);
                } else {
                    let power = self.evaluate(handle, parameters);
                    let je = self.jacobian(exponent, parameters);
                    let exponent_partial = self.create_temporary(1, Columns::Batch);
                    self.compute(Kernel::PowerExponentPartial, &[b, power], exponent_partial);
                    let (r, c) = wide(1);
                    let first = self.create_temporary(r, c);
                    self.compute(Kernel::ScaleColumns, &[base_partial, jb], first);
                    let second = self.create_temporary(r, c);
                    self.compute(Kernel::ScaleColumns, &[exponent_partial, je], second);
                    self.compute(Kernel::Add, &[first, second], target);
                }
            }
            ExprNode::Constant(_)
            | ExprNode::Identity
            | ExprNode::Parameter(_)
            | ExprNode::Linear { .. }
            | ExprNode::Components { .. } => unreachable!("constant and block Jacobians resolve to views"),
        }
    }
}

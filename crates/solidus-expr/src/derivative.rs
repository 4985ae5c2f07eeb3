//! Symbolic differentiation.
//!
//! Derivatives are built from the same constructors as any other node, so
//! they inherit constant folding and the zero/one identities. Results are
//! memoized per `(node, parameter index)`: asking twice returns the same
//! handle.

use crate::arena::ExprArena;
use crate::elliptical;
use crate::error::ExprError;
use crate::expr::{Elementary, ExprNode, NodeData, Values};
use crate::handle::ExprHandle;

impl ExprArena {
    /// Returns the partial derivative of a node with respect to parameter `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::ParameterIndexOutOfRange`] if `index` is not below
    /// the node's parameter count.
    pub fn derivative(&mut self, handle: ExprHandle, index: usize) -> Result<ExprHandle, ExprError> {
        let parameters = self.parameters(handle);
        if index >= parameters {
            return Err(ExprError::ParameterIndexOutOfRange { index, parameters });
        }
        if let Some(&cached) = self.derivatives.get(&(handle, index)) {
            return Ok(cached);
        }
        let result = self.derivative_uncached(handle, index)?;
        self.derivatives.insert((handle, index), result);
        Ok(result)
    }

    fn derivative_uncached(&mut self, handle: ExprHandle, i: usize) -> Result<ExprHandle, ExprError> {
        let NodeData {
            node,
            dimensions,
            parameters,
        } = self.get(handle).clone();
        match node {
            ExprNode::Constant(_) => Ok(self.zero(dimensions, parameters)),
            ExprNode::Identity => {
                let mut unit = vec![0.0; parameters];
                unit[i] = 1.0;
                self.constant(&unit, parameters)
            }
            ExprNode::Parameter(j) => {
                Ok(self.scalar_constant(if i == j { 1.0 } else { 0.0 }, parameters))
            }
            ExprNode::Linear { basis, .. } => {
                let column = &basis.as_slice()[i * dimensions..(i + 1) * dimensions];
                self.constant(column, parameters)
            }
            ExprNode::Elliptical {
                basis, convention, ..
            } => {
                let (basis, convention) =
                    elliptical::derivative_basis(basis.as_slice(), dimensions, &convention, i);
                let origin = Values::from_slice(&vec![0.0; dimensions]);
                Ok(self.elliptical_node(Values::from_slice(&basis), origin, convention))
            }
            ExprNode::Components {
                operand,
                start,
                count,
            } => {
                let d = self.derivative(operand, i)?;
                self.components(d, start, count)
            }
            ExprNode::Composition { outer, inner } => {
                // Chain rule, one term per component of the inner function
                let inner_derivative = self.derivative(inner, i)?;
                let mut result = self.zero(dimensions, parameters);
                for j in 0..self.dimensions(inner) {
                    let outer_partial = self.derivative(outer, j)?;
                    let composed = self.compose(outer_partial, inner)?;
                    let factor = self.component(inner_derivative, j)?;
                    let term = self.product(factor, composed)?;
                    result = self.sum(result, term)?;
                }
                Ok(result)
            }
            ExprNode::Concatenation(a, b) => {
                let (da, db) = (self.derivative(a, i)?, self.derivative(b, i)?);
                self.concatenate(da, db)
            }
            ExprNode::Negation(x) => {
                let dx = self.derivative(x, i)?;
                Ok(self.negate(dx))
            }
            ExprNode::Sum(a, b) => {
                let (da, db) = (self.derivative(a, i)?, self.derivative(b, i)?);
                self.sum(da, db)
            }
            ExprNode::Difference(a, b) => {
                let (da, db) = (self.derivative(a, i)?, self.derivative(b, i)?);
                self.difference(da, db)
            }
            ExprNode::Product {
                multiplier,
                multiplicand,
            } => {
                let ds = self.derivative(multiplier, i)?;
                let dv = self.derivative(multiplicand, i)?;
                let first = self.product(ds, multiplicand)?;
                let second = self.product(multiplier, dv)?;
                self.sum(first, second)
            }
            ExprNode::Quotient { dividend, divisor } => {
                let dx = self.derivative(dividend, i)?;
                let ds = self.derivative(divisor, i)?;
                let first = self.product(divisor, dx)?;
                let second = self.product(ds, dividend)?;
                let numerator = self.difference(first, second)?;
                let denominator = self.product(divisor, divisor)?;
                self.quotient(numerator, denominator)
            }
            ExprNode::DotProduct(a, b) => {
                let (da, db) = (self.derivative(a, i)?, self.derivative(b, i)?);
                let first = self.dot(da, b)?;
                let second = self.dot(a, db)?;
                self.sum(first, second)
            }
            ExprNode::CrossProduct(a, b) => {
                let (da, db) = (self.derivative(a, i)?, self.derivative(b, i)?);
                let first = self.cross(da, b)?;
                let second = self.cross(a, db)?;
                self.sum(first, second)
            }
            ExprNode::Norm(x) => {
                let dx = self.derivative(x, i)?;
                let direction = self.normalized(x);
                self.dot(direction, dx)
            }
            ExprNode::Normalized(x) => {
                // (dx - n (n . dx)) / |x|
                let dx = self.derivative(x, i)?;
                let along = self.dot(handle, dx)?;
                let projection = self.product(along, handle)?;
                let tangential = self.difference(dx, projection)?;
                let length = self.norm(x);
                self.quotient(tangential, length)
            }
            ExprNode::SquaredNorm(x) => {
                let dx = self.derivative(x, i)?;
                let half = self.dot(x, dx)?;
                Ok(self.scaled(half, 2.0))
            }
            ExprNode::Function { function, operand } => {
                let dx = self.derivative(operand, i)?;
                if self.is_zero(dx) {
                    return Ok(dx);
                }
                self.function_derivative(handle, function, operand, dx)
            }
            ExprNode::Power { base, exponent } => {
                let db = self.derivative(base, i)?;
                if let Some(e) = self.scalar_value(exponent) {
                    let reduced = self.pow_scalar(base, e - 1.0)?;
                    let factor = self.scaled(reduced, e);
                    return self.product(factor, db);
                }
                // b^e (e' ln b + e b' / b)
                let de = self.derivative(exponent, i)?;
                let log_base = self.ln(base)?;
                let first = self.product(de, log_base)?;
                let scaled_db = self.product(exponent, db)?;
                let second = self.quotient(scaled_db, base)?;
                let inner = self.sum(first, second)?;
                self.product(handle, inner)
            }
        }
    }

    /// Builds `f'(x) * dx` for an elementwise function node `handle = f(x)`.
    fn function_derivative(
        &mut self,
        handle: ExprHandle,
        function: Elementary,
        x: ExprHandle,
        dx: ExprHandle,
    ) -> Result<ExprHandle, ExprError> {
        let parameters = self.parameters(x);
        match function {
            Elementary::Sine => {
                let cos = self.cos(x)?;
                self.product(cos, dx)
            }
            Elementary::Cosine => {
                let sin = self.sin(x)?;
                let neg = self.negate(sin);
                self.product(neg, dx)
            }
            Elementary::Tangent => {
                let squared = self.product(handle, handle)?;
                let secant_squared = self.add_scalar(squared, 1.0)?;
                self.product(secant_squared, dx)
            }
            Elementary::Arcsine | Elementary::Arccosine => {
                let one = self.scalar_constant(1.0, parameters);
                let squared = self.product(x, x)?;
                let difference = self.difference(one, squared)?;
                let root = self.sqrt(difference)?;
                let result = self.quotient(dx, root)?;
                if function == Elementary::Arccosine {
                    Ok(self.negate(result))
                } else {
                    Ok(result)
                }
            }
            Elementary::Exponential => self.product(handle, dx),
            Elementary::Logarithm => self.quotient(dx, x),
            Elementary::SquareRoot => {
                let half = self.scaled(dx, 0.5);
                self.quotient(half, handle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use solidus_matrix::Matrix;

    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12 * (1.0 + expected.abs()),
            "{actual} != {expected}"
        );
    }

    #[test]
    fn test_memoized_identity() {
        let mut arena = ExprArena::new();
        let t = arena.parameter(0, 1).unwrap();
        let s = arena.sin(t).unwrap();
        let e = arena.exp(s).unwrap();
        let d1 = arena.derivative(e, 0).unwrap();
        let len = arena.len();
        let d2 = arena.derivative(e, 0).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(arena.len(), len);
    }

    #[test]
    fn test_out_of_range_index() {
        let mut arena = ExprArena::new();
        let x = arena.identity(2).unwrap();
        assert_eq!(
            arena.derivative(x, 2),
            Err(ExprError::ParameterIndexOutOfRange {
                index: 2,
                parameters: 2
            })
        );
    }

    #[test]
    fn test_leaf_derivatives() {
        let mut arena = ExprArena::new();
        let x = arena.identity(3).unwrap();
        let dx = arena.derivative(x, 1).unwrap();
        assert_eq!(arena.constant_values(dx), Some(&[0.0, 1.0, 0.0][..]));

        let u = arena.parameter(0, 2).unwrap();
        let du = arena.derivative(u, 1).unwrap();
        assert!(arena.is_zero(du));

        let basis = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let plane = arena.linear(&basis, &[5.0, 6.0]).unwrap();
        let dv = arena.derivative(plane, 1).unwrap();
        assert_eq!(arena.constant_values(dv), Some(&[2.0, 4.0][..]));
    }

    #[test]
    fn test_chain_rule_exp_sin() {
        let mut arena = ExprArena::new();
        let t = arena.parameter(0, 1).unwrap();
        let s = arena.sin(t).unwrap();
        let h = arena.exp(s).unwrap();
        let d = arena.derivative(h, 0).unwrap();
        let value = arena.evaluate_point(d, &[2.0])[0];
        assert_close(value, 2.0f64.sin().exp() * 2.0f64.cos());
    }

    #[test]
    fn test_composition_chain_rule() {
        let mut arena = ExprArena::new();
        let t = arena.parameter(0, 1).unwrap();
        let s = arena.sin(t).unwrap();
        let g = arena.exp(t).unwrap();
        let h = arena.compose(g, s).unwrap();
        assert!(matches!(arena.node(h), ExprNode::Composition { .. }));

        let d = arena.derivative(h, 0).unwrap();
        let value = arena.evaluate_point(d, &[2.0])[0];
        assert_close(value, 2.0f64.sin().exp() * 2.0f64.cos());
    }

    #[test]
    fn test_circle_derivative() {
        let mut arena = ExprArena::new();
        let basis = Matrix::identity(2);
        let circle = arena.elliptical(&basis, &[1.0, 1.0], &[true]).unwrap();
        let d = arena.derivative(circle, 0).unwrap();
        let value = arena.evaluate_point(d, &[0.7]);
        assert_close(value[0], -0.7f64.sin());
        assert_close(value[1], 0.7f64.cos());

        let dd = arena.derivative(d, 0).unwrap();
        let value = arena.evaluate_point(dd, &[0.7]);
        assert_close(value[0], -0.7f64.cos());
        assert_close(value[1], -0.7f64.sin());
    }

    #[test]
    fn test_norm_and_normalized() {
        let mut arena = ExprArena::new();
        let u = arena.parameter(0, 1).unwrap();
        let one = arena.scalar_constant(1.0, 1);
        let v = arena.concatenate(u, one).unwrap();
        let n = arena.norm(v);
        let dn = arena.derivative(n, 0).unwrap();
        // d/du sqrt(u^2 + 1) = u / sqrt(u^2 + 1)
        let value = arena.evaluate_point(dn, &[3.0])[0];
        assert_close(value, 3.0 / 10.0f64.sqrt());

        let unit = arena.normalized(v);
        let du = arena.derivative(unit, 0).unwrap();
        let value = arena.evaluate_point(du, &[0.0]);
        assert_close(value[0], 1.0);
        assert_close(value[1], 0.0);
    }

    #[test]
    fn test_power_rules() {
        let mut arena = ExprArena::new();
        let t = arena.parameter(0, 1).unwrap();
        let cube = arena.pow_scalar(t, 3.0).unwrap();
        let d = arena.derivative(cube, 0).unwrap();
        assert_close(arena.evaluate_point(d, &[2.0])[0], 12.0);

        // t^t
        let tt = arena.pow(t, t).unwrap();
        let d = arena.derivative(tt, 0).unwrap();
        let x = 1.5f64;
        assert_close(arena.evaluate_point(d, &[x])[0], x.powf(x) * (x.ln() + 1.0));
    }

    #[test]
    fn test_quotient_rule() {
        let mut arena = ExprArena::new();
        let t = arena.parameter(0, 1).unwrap();
        let s = arena.sin(t).unwrap();
        let q = arena.quotient(s, t).unwrap();
        let d = arena.derivative(q, 0).unwrap();
        let x = 0.8f64;
        assert_close(
            arena.evaluate_point(d, &[x])[0],
            (x * x.cos() - x.sin()) / (x * x),
        );
    }

    #[test]
    fn test_independent_function_is_zero() {
        let mut arena = ExprArena::new();
        let u = arena.parameter(0, 2).unwrap();
        let s = arena.sin(u).unwrap();
        let d = arena.derivative(s, 1).unwrap();
        assert!(arena.is_zero(d));
    }
}

//! Direct evaluation of a node at a single parameter point.
//!
//! Walks the graph recursively without caching. Used for constant folding
//! and as a reference when checking compiled sequences.

use crate::arena::ExprArena;
use crate::elliptical;
use crate::expr::ExprNode;
use crate::handle::ExprHandle;

/// Multiplies a column-major `rows x (x.len())` matrix by `x` and adds `origin`.
fn affine(basis: &[f64], origin: &[f64], x: &[f64]) -> Vec<f64> {
    let rows = origin.len();
    let mut out = origin.to_vec();
    for (j, &xj) in x.iter().enumerate() {
        for (i, v) in out.iter_mut().enumerate() {
            *v += basis[j * rows + i] * xj;
        }
    }
    out
}

impl ExprArena {
    /// Evaluates a node at one parameter point.
    ///
    /// # Panics
    ///
    /// Panics if `point` does not have one entry per parameter.
    #[must_use]
    pub fn evaluate_point(&self, handle: ExprHandle, point: &[f64]) -> Vec<f64> {
        let data = self.get(handle);
        assert_eq!(point.len(), data.parameters, "point has wrong number of parameters");
        self.evaluate_node(&data.node, point)
    }

    pub(crate) fn evaluate_node(&self, node: &ExprNode, point: &[f64]) -> Vec<f64> {
        let eval = |h: ExprHandle| self.evaluate_point(h, point);
        let scalar = |h: ExprHandle| self.evaluate_point(h, point)[0];
        match node {
            ExprNode::Constant(values) => values.as_slice().to_vec(),
            ExprNode::Identity => point.to_vec(),
            ExprNode::Parameter(index) => vec![point[*index]],
            ExprNode::Linear { basis, origin } => {
                affine(basis.as_slice(), origin.as_slice(), point)
            }
            ExprNode::Elliptical {
                basis,
                origin,
                convention,
            } => {
                let mut local = vec![0.0; convention.len() + 1];
                elliptical::local_coordinates(convention, point, &mut local);
                affine(basis.as_slice(), origin.as_slice(), &local)
            }
            ExprNode::Components {
                operand,
                start,
                count,
            } => eval(*operand)[*start..start + count].to_vec(),
            ExprNode::Composition { outer, inner } => {
                let inner_value = eval(*inner);
                self.evaluate_point(*outer, &inner_value)
            }
            ExprNode::Concatenation(a, b) => {
                let mut out = eval(*a);
                out.extend(eval(*b));
                out
            }
            ExprNode::Negation(x) => eval(*x).into_iter().map(|v| -v).collect(),
            ExprNode::Sum(a, b) => zip_with(&eval(*a), &eval(*b), |x, y| x + y),
            ExprNode::Difference(a, b) => zip_with(&eval(*a), &eval(*b), |x, y| x - y),
            ExprNode::Product {
                multiplier,
                multiplicand,
            } => {
                let s = scalar(*multiplier);
                eval(*multiplicand).into_iter().map(|v| s * v).collect()
            }
            ExprNode::Quotient { dividend, divisor } => {
                let s = scalar(*divisor);
                eval(*dividend).into_iter().map(|v| v / s).collect()
            }
            ExprNode::DotProduct(a, b) => {
                vec![eval(*a).iter().zip(eval(*b).iter()).map(|(x, y)| x * y).sum()]
            }
            ExprNode::CrossProduct(a, b) => {
                let (u, v) = (eval(*a), eval(*b));
                vec![
                    u[1] * v[2] - u[2] * v[1],
                    u[2] * v[0] - u[0] * v[2],
                    u[0] * v[1] - u[1] * v[0],
                ]
            }
            ExprNode::Norm(x) => vec![squared_norm(&eval(*x)).sqrt()],
            ExprNode::Normalized(x) => {
                let v = eval(*x);
                let n = squared_norm(&v).sqrt();
                v.into_iter().map(|c| c / n).collect()
            }
            ExprNode::SquaredNorm(x) => vec![squared_norm(&eval(*x))],
            ExprNode::Function { function, operand } => vec![function.apply(scalar(*operand))],
            ExprNode::Power { base, exponent } => {
                vec![scalar(*base).powf(scalar(*exponent))]
            }
        }
    }
}

fn zip_with(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
}

fn squared_norm(v: &[f64]) -> f64 {
    v.iter().map(|c| c * c).sum()
}

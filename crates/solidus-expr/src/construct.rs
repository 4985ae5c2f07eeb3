//! Node constructors.
//!
//! Every constructor validates operand shapes and applies a small set of
//! local simplifications before allocating: constant folding, additive and
//! multiplicative identities, and re-association of structural nodes.

use solidus_matrix::Matrix;

use crate::arena::ExprArena;
use crate::error::ExprError;
use crate::expr::{Convention, Elementary, ExprNode, NodeData, Values};
use crate::handle::ExprHandle;

impl ExprArena {
    // === Internal helpers ===

    /// Allocates a node, folding it to a constant when every operand is one.
    fn finish(&mut self, node: ExprNode, dimensions: usize, parameters: usize) -> ExprHandle {
        let children = node.children();
        if !children.is_empty() && children.iter().all(|&c| self.is_constant(c)) {
            let point = vec![0.0; parameters];
            let values = self.evaluate_node(&node, &point);
            return self.alloc(NodeData {
                node: ExprNode::Constant(Values::from_slice(&values)),
                dimensions,
                parameters,
            });
        }
        self.alloc(NodeData {
            node,
            dimensions,
            parameters,
        })
    }

    fn check_parameters(&self, a: ExprHandle, b: ExprHandle) -> Result<usize, ExprError> {
        let (left, right) = (self.parameters(a), self.parameters(b));
        if left == right {
            Ok(left)
        } else {
            Err(ExprError::ParameterCountMismatch { left, right })
        }
    }

    fn check_scalar(&self, handle: ExprHandle) -> Result<(), ExprError> {
        match self.dimensions(handle) {
            1 => Ok(()),
            dimensions => Err(ExprError::NotScalar { dimensions }),
        }
    }

    /// Repeats a scalar operand `dimensions` times.
    fn broadcast(&mut self, scalar: ExprHandle, dimensions: usize) -> Result<ExprHandle, ExprError> {
        let ones = Matrix::constant(dimensions, 1, 1.0);
        self.transformed(&ones, scalar)
    }

    /// Brings a pair of operands to a common dimension, broadcasting a scalar.
    fn align(&mut self, a: ExprHandle, b: ExprHandle) -> Result<(ExprHandle, ExprHandle), ExprError> {
        match (self.dimensions(a), self.dimensions(b)) {
            (left, right) if left == right => Ok((a, b)),
            (1, right) => Ok((self.broadcast(a, right)?, b)),
            (left, 1) => Ok((a, self.broadcast(b, left)?)),
            (left, right) => Err(ExprError::DimensionMismatch { left, right }),
        }
    }

    // === Leaves ===

    /// Creates a constant column vector.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::EmptyConstant`] if `values` is empty.
    pub fn constant(&mut self, values: &[f64], parameters: usize) -> Result<ExprHandle, ExprError> {
        if values.is_empty() {
            return Err(ExprError::EmptyConstant);
        }
        Ok(self.alloc(NodeData {
            node: ExprNode::Constant(Values::from_slice(values)),
            dimensions: values.len(),
            parameters,
        }))
    }

    /// Creates a one-component constant.
    pub fn scalar_constant(&mut self, value: f64, parameters: usize) -> ExprHandle {
        self.alloc(NodeData {
            node: ExprNode::Constant(Values::from_slice(&[value])),
            dimensions: 1,
            parameters,
        })
    }

    /// Creates a constant zero vector.
    ///
    /// # Panics
    ///
    /// Panics if `dimensions` is zero.
    pub fn zero(&mut self, dimensions: usize, parameters: usize) -> ExprHandle {
        assert!(dimensions > 0, "zero-dimensional constant");
        self.alloc(NodeData {
            node: ExprNode::Constant(Values::from_slice(&vec![0.0; dimensions])),
            dimensions,
            parameters,
        })
    }

    /// Creates the identity function of `n` parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::ZeroDimensions`] if `n` is zero.
    pub fn identity(&mut self, n: usize) -> Result<ExprHandle, ExprError> {
        if n == 0 {
            return Err(ExprError::ZeroDimensions);
        }
        Ok(self.alloc(NodeData {
            node: ExprNode::Identity,
            dimensions: n,
            parameters: n,
        }))
    }

    /// Creates the scalar function returning parameter `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::ParameterIndexOutOfRange`] if `index >= parameters`.
    pub fn parameter(&mut self, index: usize, parameters: usize) -> Result<ExprHandle, ExprError> {
        if index >= parameters {
            return Err(ExprError::ParameterIndexOutOfRange { index, parameters });
        }
        Ok(self.alloc(NodeData {
            node: ExprNode::Parameter(index),
            dimensions: 1,
            parameters,
        }))
    }

    /// Creates the affine map `origin + basis * p`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::InvalidLinear`] if the basis has no columns or
    /// its row count differs from the origin's length.
    pub fn linear(&mut self, basis: &Matrix<f64>, origin: &[f64]) -> Result<ExprHandle, ExprError> {
        if origin.is_empty() || basis.rows() != origin.len() || basis.columns() == 0 {
            return Err(ExprError::InvalidLinear {
                rows: basis.rows(),
                columns: basis.columns(),
                origin: origin.len(),
            });
        }
        Ok(self.alloc(NodeData {
            node: ExprNode::Linear {
                basis: Values::from_slice(basis.as_slice()),
                origin: Values::from_slice(origin),
            },
            dimensions: origin.len(),
            parameters: basis.columns(),
        }))
    }

    /// Creates the elliptical map `origin + basis * local(p)`.
    ///
    /// The basis has one more column than there are parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::InvalidElliptical`] on inconsistent shapes.
    pub fn elliptical(
        &mut self,
        basis: &Matrix<f64>,
        origin: &[f64],
        convention: &[bool],
    ) -> Result<ExprHandle, ExprError> {
        if convention.is_empty()
            || origin.is_empty()
            || basis.rows() != origin.len()
            || basis.columns() != convention.len() + 1
        {
            return Err(ExprError::InvalidElliptical {
                rows: basis.rows(),
                columns: basis.columns(),
                origin: origin.len(),
                parameters: convention.len(),
            });
        }
        Ok(self.elliptical_node(
            Values::from_slice(basis.as_slice()),
            Values::from_slice(origin),
            convention.iter().copied().collect(),
        ))
    }

    pub(crate) fn elliptical_node(
        &mut self,
        basis: Values,
        origin: Values,
        convention: Convention,
    ) -> ExprHandle {
        let dimensions = origin.len();
        let parameters = convention.len();
        self.alloc(NodeData {
            node: ExprNode::Elliptical {
                basis,
                origin,
                convention,
            },
            dimensions,
            parameters,
        })
    }

    // === Structural ===

    /// Selects components `start..start + count` of `operand`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::ComponentsOutOfRange`] if the range is empty or
    /// does not fit.
    pub fn components(
        &mut self,
        operand: ExprHandle,
        start: usize,
        count: usize,
    ) -> Result<ExprHandle, ExprError> {
        let dimensions = self.dimensions(operand);
        if count == 0 || start + count > dimensions {
            return Err(ExprError::ComponentsOutOfRange {
                start,
                count,
                dimensions,
            });
        }
        if count == dimensions {
            return Ok(operand);
        }
        let parameters = self.parameters(operand);
        match self.node(operand) {
            ExprNode::Constant(values) => {
                let selected = values.as_slice()[start..start + count].to_vec();
                return self.constant(&selected, parameters);
            }
            &ExprNode::Components {
                operand: inner,
                start: offset,
                ..
            } => return self.components(inner, offset + start, count),
            &ExprNode::Concatenation(a, b) => {
                let split = self.dimensions(a);
                if start + count <= split {
                    return self.components(a, start, count);
                }
                if start >= split {
                    return self.components(b, start - split, count);
                }
            }
            _ => {}
        }
        Ok(self.finish(
            ExprNode::Components {
                operand,
                start,
                count,
            },
            count,
            parameters,
        ))
    }

    /// Selects a single component of `operand`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::ComponentsOutOfRange`] if `index` is out of range.
    pub fn component(&mut self, operand: ExprHandle, index: usize) -> Result<ExprHandle, ExprError> {
        self.components(operand, index, 1)
    }

    /// Creates `outer(inner(p))`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::ParameterCountMismatch`] if `outer` does not take
    /// as many parameters as `inner` has components.
    pub fn compose(&mut self, outer: ExprHandle, inner: ExprHandle) -> Result<ExprHandle, ExprError> {
        let (expected, provided) = (self.parameters(outer), self.dimensions(inner));
        if expected != provided {
            return Err(ExprError::ParameterCountMismatch {
                left: expected,
                right: provided,
            });
        }
        let parameters = self.parameters(inner);
        match self.node(outer) {
            ExprNode::Identity => return Ok(inner),
            ExprNode::Constant(values) => {
                let values = values.clone();
                return self.constant(values.as_slice(), parameters);
            }
            &ExprNode::Parameter(index) => return self.component(inner, index),
            &ExprNode::Composition {
                outer: first,
                inner: second,
            } => {
                let rest = self.compose(second, inner)?;
                return self.compose(first, rest);
            }
            _ => {}
        }
        match self.node(inner) {
            ExprNode::Identity => return Ok(outer),
            ExprNode::Constant(values) => {
                let point = values.as_slice().to_vec();
                let folded = self.evaluate_point(outer, &point);
                return self.constant(&folded, parameters);
            }
            _ => {}
        }
        let dimensions = self.dimensions(outer);
        Ok(self.finish(ExprNode::Composition { outer, inner }, dimensions, parameters))
    }

    /// Stacks the components of `a` on top of those of `b`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::ParameterCountMismatch`] if the operands take
    /// different parameters.
    pub fn concatenate(&mut self, a: ExprHandle, b: ExprHandle) -> Result<ExprHandle, ExprError> {
        let parameters = self.check_parameters(a, b)?;
        let dimensions = self.dimensions(a) + self.dimensions(b);
        Ok(self.finish(ExprNode::Concatenation(a, b), dimensions, parameters))
    }

    // === Arithmetic ===

    /// Creates `-x`.
    pub fn negate(&mut self, x: ExprHandle) -> ExprHandle {
        if let &ExprNode::Negation(inner) = self.node(x) {
            return inner;
        }
        let data = self.get(x);
        let (dimensions, parameters) = (data.dimensions, data.parameters);
        self.finish(ExprNode::Negation(x), dimensions, parameters)
    }

    /// Creates `a + b`. A scalar operand is broadcast to the other's dimension.
    ///
    /// # Errors
    ///
    /// Returns an error on mismatched dimensions or parameter counts.
    pub fn sum(&mut self, a: ExprHandle, b: ExprHandle) -> Result<ExprHandle, ExprError> {
        let parameters = self.check_parameters(a, b)?;
        let (a, b) = self.align(a, b)?;
        if self.is_zero(b) {
            return Ok(a);
        }
        if self.is_zero(a) {
            return Ok(b);
        }
        let dimensions = self.dimensions(a);
        Ok(self.finish(ExprNode::Sum(a, b), dimensions, parameters))
    }

    /// Creates `a - b`. A scalar operand is broadcast to the other's dimension.
    ///
    /// # Errors
    ///
    /// Returns an error on mismatched dimensions or parameter counts.
    pub fn difference(&mut self, a: ExprHandle, b: ExprHandle) -> Result<ExprHandle, ExprError> {
        let parameters = self.check_parameters(a, b)?;
        let (a, b) = self.align(a, b)?;
        let dimensions = self.dimensions(a);
        if a == b {
            return Ok(self.zero(dimensions, parameters));
        }
        if self.is_zero(b) {
            return Ok(a);
        }
        if self.is_zero(a) {
            return Ok(self.negate(b));
        }
        Ok(self.finish(ExprNode::Difference(a, b), dimensions, parameters))
    }

    /// Creates `a * b` where at least one operand is a scalar.
    ///
    /// The scalar becomes the multiplier; when both are scalars a constant
    /// operand is preferred as the multiplier.
    ///
    /// # Errors
    ///
    /// Returns an error if neither operand is a scalar or the parameter
    /// counts differ.
    pub fn product(&mut self, a: ExprHandle, b: ExprHandle) -> Result<ExprHandle, ExprError> {
        let parameters = self.check_parameters(a, b)?;
        let (multiplier, multiplicand) = match (self.dimensions(a), self.dimensions(b)) {
            (1, 1) if !self.is_constant(a) && self.is_constant(b) => (b, a),
            (1, _) => (a, b),
            (_, 1) => (b, a),
            (dimensions, _) => return Err(ExprError::NotScalar { dimensions }),
        };
        if let Some(scale) = self.scalar_value(multiplier) {
            return Ok(self.scaled(multiplicand, scale));
        }
        if self.is_zero(multiplicand) {
            return Ok(multiplicand);
        }
        let dimensions = self.dimensions(multiplicand);
        Ok(self.finish(
            ExprNode::Product {
                multiplier,
                multiplicand,
            },
            dimensions,
            parameters,
        ))
    }

    /// Creates `x / s` for a scalar `s`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotScalar`] if the divisor is not a scalar and
    /// [`ExprError::DivisionByZero`] if it is the constant zero.
    pub fn quotient(&mut self, x: ExprHandle, divisor: ExprHandle) -> Result<ExprHandle, ExprError> {
        let parameters = self.check_parameters(x, divisor)?;
        self.check_scalar(divisor)?;
        if let Some(value) = self.scalar_value(divisor) {
            if value == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            return Ok(self.scaled(x, 1.0 / value));
        }
        if self.is_zero(x) {
            return Ok(x);
        }
        let dimensions = self.dimensions(x);
        Ok(self.finish(
            ExprNode::Quotient {
                dividend: x,
                divisor,
            },
            dimensions,
            parameters,
        ))
    }

    // === Vector ===

    /// Creates the dot product `a . b`.
    ///
    /// # Errors
    ///
    /// Returns an error on mismatched dimensions or parameter counts.
    pub fn dot(&mut self, a: ExprHandle, b: ExprHandle) -> Result<ExprHandle, ExprError> {
        let parameters = self.check_parameters(a, b)?;
        let (left, right) = (self.dimensions(a), self.dimensions(b));
        if left != right {
            return Err(ExprError::DimensionMismatch { left, right });
        }
        if left == 1 {
            return self.product(a, b);
        }
        if self.is_zero(a) || self.is_zero(b) {
            return Ok(self.zero(1, parameters));
        }
        Ok(self.finish(ExprNode::DotProduct(a, b), 1, parameters))
    }

    /// Creates the cross product `a x b` of two 3-vectors.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotThreeDimensional`] or a parameter mismatch.
    pub fn cross(&mut self, a: ExprHandle, b: ExprHandle) -> Result<ExprHandle, ExprError> {
        let parameters = self.check_parameters(a, b)?;
        for operand in [a, b] {
            let dimensions = self.dimensions(operand);
            if dimensions != 3 {
                return Err(ExprError::NotThreeDimensional { dimensions });
            }
        }
        if self.is_zero(a) || self.is_zero(b) {
            return Ok(self.zero(3, parameters));
        }
        Ok(self.finish(ExprNode::CrossProduct(a, b), 3, parameters))
    }

    /// Creates the Euclidean norm `|x|`.
    pub fn norm(&mut self, x: ExprHandle) -> ExprHandle {
        let parameters = self.parameters(x);
        self.finish(ExprNode::Norm(x), 1, parameters)
    }

    /// Creates the unit vector `x / |x|`.
    pub fn normalized(&mut self, x: ExprHandle) -> ExprHandle {
        if matches!(self.node(x), ExprNode::Normalized(_)) {
            return x;
        }
        let data = self.get(x);
        let (dimensions, parameters) = (data.dimensions, data.parameters);
        self.finish(ExprNode::Normalized(x), dimensions, parameters)
    }

    /// Creates `x . x`.
    pub fn squared_norm(&mut self, x: ExprHandle) -> ExprHandle {
        let parameters = self.parameters(x);
        self.finish(ExprNode::SquaredNorm(x), 1, parameters)
    }

    // === Functions ===

    /// Applies an elementwise function to a scalar operand.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotScalar`] if the operand is not a scalar.
    pub fn function(&mut self, function: Elementary, x: ExprHandle) -> Result<ExprHandle, ExprError> {
        self.check_scalar(x)?;
        let parameters = self.parameters(x);
        Ok(self.finish(ExprNode::Function { function, operand: x }, 1, parameters))
    }

    /// Creates `sin(x)`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotScalar`] if the operand is not a scalar.
    pub fn sin(&mut self, x: ExprHandle) -> Result<ExprHandle, ExprError> {
        self.function(Elementary::Sine, x)
    }

    /// Creates `cos(x)`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotScalar`] if the operand is not a scalar.
    pub fn cos(&mut self, x: ExprHandle) -> Result<ExprHandle, ExprError> {
        self.function(Elementary::Cosine, x)
    }

    /// Creates `tan(x)`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotScalar`] if the operand is not a scalar.
    pub fn tan(&mut self, x: ExprHandle) -> Result<ExprHandle, ExprError> {
        self.function(Elementary::Tangent, x)
    }

    /// Creates `asin(x)`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotScalar`] if the operand is not a scalar.
    pub fn asin(&mut self, x: ExprHandle) -> Result<ExprHandle, ExprError> {
        self.function(Elementary::Arcsine, x)
    }

    /// Creates `acos(x)`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotScalar`] if the operand is not a scalar.
    pub fn acos(&mut self, x: ExprHandle) -> Result<ExprHandle, ExprError> {
        self.function(Elementary::Arccosine, x)
    }

    /// Creates `exp(x)`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotScalar`] if the operand is not a scalar.
    pub fn exp(&mut self, x: ExprHandle) -> Result<ExprHandle, ExprError> {
        self.function(Elementary::Exponential, x)
    }

    /// Creates `ln(x)`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotScalar`] if the operand is not a scalar.
    pub fn ln(&mut self, x: ExprHandle) -> Result<ExprHandle, ExprError> {
        self.function(Elementary::Logarithm, x)
    }

    /// Creates `sqrt(x)`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NotScalar`] if the operand is not a scalar.
    pub fn sqrt(&mut self, x: ExprHandle) -> Result<ExprHandle, ExprError> {
        self.function(Elementary::SquareRoot, x)
    }

    /// Creates `base ^ exponent` for scalar operands.
    ///
    /// # Errors
    ///
    /// Returns an error on non-scalar operands, mismatched parameters, or a
    /// constant zero base with a constant negative exponent.
    pub fn pow(&mut self, base: ExprHandle, exponent: ExprHandle) -> Result<ExprHandle, ExprError> {
        let parameters = self.check_parameters(base, exponent)?;
        self.check_scalar(base)?;
        self.check_scalar(exponent)?;
        match (self.scalar_value(base), self.scalar_value(exponent)) {
            (Some(b), Some(e)) if b == 0.0 && e < 0.0 => {
                return Err(ExprError::InvalidExponent { exponent: e });
            }
            (_, Some(e)) if e == 1.0 => return Ok(base),
            (_, Some(e)) if e == 0.0 => return Ok(self.scalar_constant(1.0, parameters)),
            _ => {}
        }
        Ok(self.finish(ExprNode::Power { base, exponent }, 1, parameters))
    }

    /// Creates `base ^ exponent` for a constant exponent.
    ///
    /// # Errors
    ///
    /// See [`ExprArena::pow`].
    pub fn pow_scalar(&mut self, base: ExprHandle, exponent: f64) -> Result<ExprHandle, ExprError> {
        let parameters = self.parameters(base);
        let exponent = self.scalar_constant(exponent, parameters);
        self.pow(base, exponent)
    }

    // === Scalar helpers ===

    /// Creates `scale * x`.
    pub fn scaled(&mut self, x: ExprHandle, scale: f64) -> ExprHandle {
        let data = self.get(x);
        let (dimensions, parameters) = (data.dimensions, data.parameters);
        if scale == 0.0 {
            return self.zero(dimensions, parameters);
        }
        if scale == 1.0 {
            return x;
        }
        if scale == -1.0 {
            return self.negate(x);
        }
        if self.is_zero(x) {
            return x;
        }
        let multiplier = self.scalar_constant(scale, parameters);
        self.finish(
            ExprNode::Product {
                multiplier,
                multiplicand: x,
            },
            dimensions,
            parameters,
        )
    }

    /// Creates `x + offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::DimensionMismatch`] if `offset` does not have one
    /// entry per component of `x`.
    pub fn translated(&mut self, x: ExprHandle, offset: &[f64]) -> Result<ExprHandle, ExprError> {
        let data = self.get(x);
        let (dimensions, parameters) = (data.dimensions, data.parameters);
        if offset.len() != dimensions {
            return Err(ExprError::DimensionMismatch {
                left: dimensions,
                right: offset.len(),
            });
        }
        let offset = self.constant(offset, parameters)?;
        self.sum(x, offset)
    }

    /// Adds `value` to every component of `x`.
    ///
    /// # Errors
    ///
    /// Never fails for a valid handle; see [`ExprArena::translated`].
    pub fn add_scalar(&mut self, x: ExprHandle, value: f64) -> Result<ExprHandle, ExprError> {
        let offset = vec![value; self.dimensions(x)];
        self.translated(x, &offset)
    }

    /// Creates `matrix * x` for a constant matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::DimensionMismatch`] if the matrix does not have
    /// one column per component of `x`.
    pub fn transformed(&mut self, matrix: &Matrix<f64>, x: ExprHandle) -> Result<ExprHandle, ExprError> {
        let dimensions = self.dimensions(x);
        if matrix.columns() != dimensions {
            return Err(ExprError::DimensionMismatch {
                left: matrix.columns(),
                right: dimensions,
            });
        }
        if matrix.rows() == matrix.columns() && *matrix == Matrix::identity(dimensions) {
            return Ok(x);
        }
        let origin = vec![0.0; matrix.rows()];
        let map = self.linear(matrix, &origin)?;
        self.compose(map, x)
    }
}

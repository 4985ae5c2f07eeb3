//! Expression node types.
//!
//! This module defines the closed operator set stored in the arena. Every
//! node is a pure function from an `n`-component parameter vector to an
//! `m`-component result vector; the shape lives in [`NodeData`].

use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::handle::ExprHandle;

/// Numeric payload of a node: constant values, affine bases and origins.
///
/// Equality and hashing are bitwise, with `-0.0` identified with `0.0`, so
/// payloads can serve as keys of the deduplication table.
#[derive(Clone, Default)]
pub struct Values(SmallVec<[f64; 4]>);

impl Values {
    /// Creates a payload from a slice.
    #[must_use]
    pub fn from_slice(values: &[f64]) -> Self {
        Self(SmallVec::from_slice(values))
    }

    /// Returns the payload as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if every entry is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }

    fn key(value: f64) -> u64 {
        if value == 0.0 {
            0
        } else {
            value.to_bits()
        }
    }
}

impl PartialEq for Values {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(&a, &b)| Self::key(a) == Self::key(b))
    }
}

impl Eq for Values {}

impl Hash for Values {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for &v in &self.0 {
            Self::key(v).hash(state);
        }
    }
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl From<&[f64]> for Values {
    fn from(values: &[f64]) -> Self {
        Self::from_slice(values)
    }
}

/// Elementwise functions of a scalar operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Elementary {
    /// `sin(x)`
    Sine,
    /// `cos(x)`
    Cosine,
    /// `tan(x)`
    Tangent,
    /// `asin(x)`
    Arcsine,
    /// `acos(x)`
    Arccosine,
    /// `exp(x)`
    Exponential,
    /// `ln(x)`
    Logarithm,
    /// `sqrt(x)`
    SquareRoot,
}

impl Elementary {
    /// Applies the function to a plain number.
    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Elementary::Sine => x.sin(),
            Elementary::Cosine => x.cos(),
            Elementary::Tangent => x.tan(),
            Elementary::Arcsine => x.asin(),
            Elementary::Arccosine => x.acos(),
            Elementary::Exponential => x.exp(),
            Elementary::Logarithm => x.ln(),
            Elementary::SquareRoot => x.sqrt(),
        }
    }

    /// Returns the display name of the node kind.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Elementary::Sine => "Sine",
            Elementary::Cosine => "Cosine",
            Elementary::Tangent => "Tangent",
            Elementary::Arcsine => "Arcsine",
            Elementary::Arccosine => "Arccosine",
            Elementary::Exponential => "Exponential",
            Elementary::Logarithm => "Logarithm",
            Elementary::SquareRoot => "SquareRoot",
        }
    }
}

/// Per-parameter flags of an elliptical map.
pub type Convention = SmallVec<[bool; 4]>;

/// An expression node stored in the arena.
///
/// Shapes are validated by the arena constructors; a node that exists
/// always has consistent operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprNode {
    // === Leaves ===
    /// A constant column vector, independent of the parameters.
    Constant(Values),

    /// The parameter vector itself.
    Identity,

    /// A single parameter.
    Parameter(usize),

    /// `origin + basis * p`, with `basis` stored column-major.
    Linear {
        /// Basis matrix (dimensions x parameters), column-major.
        basis: Values,
        /// Translation.
        origin: Values,
    },

    /// `origin + basis * local(p)` where `local` is built from sines and
    /// cosines of the parameters.
    Elliptical {
        /// Basis matrix (dimensions x (parameters + 1)), column-major.
        basis: Values,
        /// Translation.
        origin: Values,
        /// Whether parameter `i` contributes a cosine (true) or a sine
        /// (false) to local coordinate `i`.
        convention: Convention,
    },

    // === Structural ===
    /// Contiguous range of the operand's components.
    Components {
        /// The operand.
        operand: ExprHandle,
        /// Index of the first component.
        start: usize,
        /// Number of components.
        count: usize,
    },

    /// `outer(inner(p))`.
    Composition {
        /// Function applied last.
        outer: ExprHandle,
        /// Function applied to the parameters.
        inner: ExprHandle,
    },

    /// Components of the first operand followed by those of the second.
    Concatenation(ExprHandle, ExprHandle),

    // === Arithmetic ===
    /// `-x`
    Negation(ExprHandle),

    /// `a + b`
    Sum(ExprHandle, ExprHandle),

    /// `a - b`
    Difference(ExprHandle, ExprHandle),

    /// `s * v` for a scalar `s`.
    Product {
        /// The scalar factor.
        multiplier: ExprHandle,
        /// The (possibly vector) factor.
        multiplicand: ExprHandle,
    },

    /// `v / s` for a scalar `s`.
    Quotient {
        /// The (possibly vector) dividend.
        dividend: ExprHandle,
        /// The scalar divisor.
        divisor: ExprHandle,
    },

    // === Vector ===
    /// `a . b`
    DotProduct(ExprHandle, ExprHandle),

    /// `a x b` for 3-vectors.
    CrossProduct(ExprHandle, ExprHandle),

    /// `|x|`
    Norm(ExprHandle),

    /// `x / |x|`
    Normalized(ExprHandle),

    /// `x . x`
    SquaredNorm(ExprHandle),

    // === Functions ===
    /// Elementwise function of a scalar operand.
    Function {
        /// The function.
        function: Elementary,
        /// The scalar operand.
        operand: ExprHandle,
    },

    /// `base ^ exponent` for scalars.
    Power {
        /// The base.
        base: ExprHandle,
        /// The exponent.
        exponent: ExprHandle,
    },
}

impl ExprNode {
    /// Returns true if this node has no operands.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            ExprNode::Constant(_)
                | ExprNode::Identity
                | ExprNode::Parameter(_)
                | ExprNode::Linear { .. }
                | ExprNode::Elliptical { .. }
        )
    }

    /// Returns true if the compiler can serve this node's value as a view
    /// of an existing buffer.
    #[must_use]
    pub fn is_zero_cost(&self) -> bool {
        matches!(
            self,
            ExprNode::Constant(_)
                | ExprNode::Identity
                | ExprNode::Parameter(_)
                | ExprNode::Components { .. }
        )
    }

    /// Returns the operands of this node.
    #[must_use]
    pub fn children(&self) -> SmallVec<[ExprHandle; 2]> {
        match self {
            ExprNode::Constant(_)
            | ExprNode::Identity
            | ExprNode::Parameter(_)
            | ExprNode::Linear { .. }
            | ExprNode::Elliptical { .. } => SmallVec::new(),
            ExprNode::Components { operand, .. }
            | ExprNode::Negation(operand)
            | ExprNode::Norm(operand)
            | ExprNode::Normalized(operand)
            | ExprNode::SquaredNorm(operand)
            | ExprNode::Function { operand, .. } => smallvec::smallvec![*operand],
            ExprNode::Composition { outer, inner } => smallvec::smallvec![*outer, *inner],
            ExprNode::Concatenation(a, b)
            | ExprNode::Sum(a, b)
            | ExprNode::Difference(a, b)
            | ExprNode::DotProduct(a, b)
            | ExprNode::CrossProduct(a, b) => smallvec::smallvec![*a, *b],
            ExprNode::Product {
                multiplier,
                multiplicand,
            } => smallvec::smallvec![*multiplier, *multiplicand],
            ExprNode::Quotient { dividend, divisor } => smallvec::smallvec![*dividend, *divisor],
            ExprNode::Power { base, exponent } => smallvec::smallvec![*base, *exponent],
        }
    }

    /// Returns a copy of this node with every operand replaced by `f(operand)`.
    #[must_use]
    pub fn map_children(&self, mut f: impl FnMut(ExprHandle) -> ExprHandle) -> ExprNode {
        match self {
            ExprNode::Constant(_)
            | ExprNode::Identity
            | ExprNode::Parameter(_)
            | ExprNode::Linear { .. }
            | ExprNode::Elliptical { .. } => self.clone(),
            ExprNode::Components {
                operand,
                start,
                count,
            } => ExprNode::Components {
                operand: f(*operand),
                start: *start,
                count: *count,
            },
            ExprNode::Composition { outer, inner } => {
                let outer = f(*outer);
                ExprNode::Composition {
                    outer,
                    inner: f(*inner),
                }
            }
            ExprNode::Concatenation(a, b) => {
                let a = f(*a);
                ExprNode::Concatenation(a, f(*b))
            }
            ExprNode::Negation(x) => ExprNode::Negation(f(*x)),
            ExprNode::Sum(a, b) => {
                let a = f(*a);
                ExprNode::Sum(a, f(*b))
            }
            ExprNode::Difference(a, b) => {
                let a = f(*a);
                ExprNode::Difference(a, f(*b))
            }
            ExprNode::Product {
                multiplier,
                multiplicand,
            } => {
                let multiplier = f(*multiplier);
                ExprNode::Product {
                    multiplier,
                    multiplicand: f(*multiplicand),
                }
            }
            ExprNode::Quotient { dividend, divisor } => {
                let dividend = f(*dividend);
                ExprNode::Quotient {
                    dividend,
                    divisor: f(*divisor),
                }
            }
            ExprNode::DotProduct(a, b) => {
                let a = f(*a);
                ExprNode::DotProduct(a, f(*b))
            }
            ExprNode::CrossProduct(a, b) => {
                let a = f(*a);
                ExprNode::CrossProduct(a, f(*b))
            }
            ExprNode::Norm(x) => ExprNode::Norm(f(*x)),
            ExprNode::Normalized(x) => ExprNode::Normalized(f(*x)),
            ExprNode::SquaredNorm(x) => ExprNode::SquaredNorm(f(*x)),
            ExprNode::Function { function, operand } => ExprNode::Function {
                function: *function,
                operand: f(*operand),
            },
            ExprNode::Power { base, exponent } => {
                let base = f(*base);
                ExprNode::Power {
                    base,
                    exponent: f(*exponent),
                }
            }
        }
    }

    /// Returns the name of this node's kind.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExprNode::Constant(_) => "Constant",
            ExprNode::Identity => "Identity",
            ExprNode::Parameter(_) => "Parameter",
            ExprNode::Linear { .. } => "Linear",
            ExprNode::Elliptical { .. } => "Elliptical",
            ExprNode::Components { .. } => "Components",
            ExprNode::Composition { .. } => "Composition",
            ExprNode::Concatenation(..) => "Concatenation",
            ExprNode::Negation(_) => "Negation",
            ExprNode::Sum(..) => "Sum",
            ExprNode::Difference(..) => "Difference",
            ExprNode::Product { .. } => "Product",
            ExprNode::Quotient { .. } => "Quotient",
            ExprNode::DotProduct(..) => "DotProduct",
            ExprNode::CrossProduct(..) => "CrossProduct",
            ExprNode::Norm(_) => "Norm",
            ExprNode::Normalized(_) => "Normalized",
            ExprNode::SquaredNorm(_) => "SquaredNorm",
            ExprNode::Function { function, .. } => function.name(),
            ExprNode::Power { .. } => "Power",
        }
    }
}

/// A node together with its shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeData {
    /// The operator and its operands.
    pub node: ExprNode,
    /// Number of output components.
    pub dimensions: usize,
    /// Number of input parameters.
    pub parameters: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashSet;

    #[test]
    fn test_values_signed_zero() {
        let a = Values::from_slice(&[0.0, 1.0]);
        let b = Values::from_slice(&[-0.0, 1.0]);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(Values::from_slice(&[0.0, -0.0]).is_zero());
    }

    #[test]
    fn test_children_and_map() {
        let a = ExprHandle::from_slot(1);
        let b = ExprHandle::from_slot(2);
        let node = ExprNode::Sum(a, b);
        assert_eq!(node.children().as_slice(), &[a, b]);

        let shifted = node.map_children(|h| ExprHandle::from_slot(h.slot() + 10));
        assert_eq!(shifted, ExprNode::Sum(ExprHandle::from_slot(11), ExprHandle::from_slot(12)));
        assert!(ExprNode::Identity.is_leaf());
        assert!(ExprNode::Parameter(0).is_zero_cost());
        assert!(!node.is_zero_cost());
    }

    #[test]
    fn test_kind_names() {
        let x = ExprHandle::from_slot(0);
        let node = ExprNode::Function {
            function: Elementary::Arcsine,
            operand: x,
        };
        assert_eq!(node.kind_name(), "Arcsine");
        assert_eq!(ExprNode::Norm(x).kind_name(), "Norm");
    }
}

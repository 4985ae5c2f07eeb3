//! The numeric domain trait.
//!
//! Every kernel the compiler emits is written once against `Scalar` and
//! instantiated for each concrete domain.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::{One, Zero};

/// A numeric domain that expression kernels can operate over.
///
/// # Laws
///
/// - Arithmetic follows the usual field laws up to rounding
/// - For a bounds domain, every operation must be *inclusion monotone*:
///   if `x ⊆ X` then `f(x) ⊆ f(X)`
/// - `from_f64(v)` must contain `v`
pub trait Scalar:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Lifts a plain number into the domain.
    fn from_f64(value: f64) -> Self;

    /// Computes `self * self`.
    ///
    /// Bounds domains override this to exploit the dependency between
    /// the two factors.
    fn sqr(self) -> Self {
        self * self
    }

    /// Square root.
    fn sqrt(self) -> Self;

    /// Sine.
    fn sin(self) -> Self;

    /// Cosine.
    fn cos(self) -> Self;

    /// Tangent.
    fn tan(self) -> Self;

    /// Inverse sine.
    fn asin(self) -> Self;

    /// Inverse cosine.
    fn acos(self) -> Self;

    /// Natural exponential.
    fn exp(self) -> Self;

    /// Natural logarithm.
    fn ln(self) -> Self;

    /// Absolute value.
    fn abs(self) -> Self;

    /// Raises to an integer power.
    fn powi(self, exponent: i32) -> Self;

    /// Raises to a power from the same domain.
    fn powf(self, exponent: Self) -> Self;
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn tan(self) -> Self {
        f64::tan(self)
    }

    fn asin(self) -> Self {
        f64::asin(self)
    }

    fn acos(self) -> Self {
        f64::acos(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn ln(self) -> Self {
        f64::ln(self)
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn powi(self, exponent: i32) -> Self {
        f64::powi(self, exponent)
    }

    fn powf(self, exponent: Self) -> Self {
        f64::powf(self, exponent)
    }
}

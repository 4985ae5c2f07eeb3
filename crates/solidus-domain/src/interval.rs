//! Closed-interval bounds domain.
//!
//! An `Interval` encloses every value a quantity can take over a region of
//! parameter space. All operations are inclusion monotone, so evaluating an
//! expression over an interval box yields bounds that contain every
//! point evaluation inside that box.
//!
//! Elementary functions use monotone-piece extensions: each function is
//! evaluated at the endpoints, interior extrema are detected analytically,
//! and the result is padded outward to absorb libm rounding error.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::{One, Zero};

use crate::traits::Scalar;

/// Number of ulps each transcendental bound is pushed outward.
const ULP_PADDING: usize = 2;

/// Relative slack used when locating periodic extrema.
const PERIOD_SLACK: f64 = 1e-9;

/// A closed interval `[lower, upper]` of real numbers.
///
/// The empty interval is represented with NaN bounds and propagates through
/// every operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    lower: f64,
    upper: f64,
}

impl Interval {
    /// Creates the interval `[lower, upper]`.
    ///
    /// # Panics
    ///
    /// Panics if `lower > upper` or either bound is NaN.
    #[must_use]
    pub fn new(lower: f64, upper: f64) -> Self {
        assert!(lower <= upper, "invalid interval bounds [{lower}, {upper}]");
        Self { lower, upper }
    }

    /// Creates the degenerate interval `[value, value]`.
    #[must_use]
    pub const fn singleton(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    /// The interval covering the whole real line.
    #[must_use]
    pub const fn whole() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    /// The empty interval.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            lower: f64::NAN,
            upper: f64::NAN,
        }
    }

    /// Smallest interval containing both `a` and `b`, in either order.
    #[must_use]
    pub fn hull(a: f64, b: f64) -> Self {
        Self {
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    /// Returns the lower bound.
    #[must_use]
    pub const fn lower(&self) -> f64 {
        self.lower
    }

    /// Returns the upper bound.
    #[must_use]
    pub const fn upper(&self) -> f64 {
        self.upper
    }

    /// Returns true if this is the empty interval.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lower.is_nan() || self.upper.is_nan()
    }

    /// Returns `upper - lower`.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Returns the midpoint.
    #[must_use]
    pub fn midpoint(&self) -> f64 {
        self.lower + 0.5 * (self.upper - self.lower)
    }

    /// Returns true if `value` lies within the interval.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Returns true if `other` lies entirely within this interval.
    ///
    /// The empty interval is contained in every interval.
    #[must_use]
    pub fn contains_interval(&self, other: &Interval) -> bool {
        other.is_empty() || (self.lower <= other.lower && other.upper <= self.upper)
    }

    /// Intersection of two intervals, possibly empty.
    #[must_use]
    pub fn intersection(&self, other: &Interval) -> Interval {
        let lower = self.lower.max(other.lower);
        let upper = self.upper.min(other.upper);
        if self.is_empty() || other.is_empty() || lower > upper {
            Interval::empty()
        } else {
            Interval { lower, upper }
        }
    }

    /// Builds `[lower, upper]` padded outward by `ULP_PADDING` ulps.
    fn outward(lower: f64, upper: f64) -> Interval {
        let mut lower = lower;
        let mut upper = upper;
        for _ in 0..ULP_PADDING {
            lower = next_down(lower);
            upper = next_up(upper);
        }
        Interval { lower, upper }
    }

    /// Clamps both bounds into `[floor, ceiling]`.
    fn clamped(self, floor: f64, ceiling: f64) -> Interval {
        Interval {
            lower: self.lower.max(floor),
            upper: self.upper.min(ceiling),
        }
    }

    /// Returns true if some `phase + k * period` lies in the interval.
    ///
    /// Errs towards `true` near the boundaries.
    fn encloses_periodic(&self, phase: f64, period: f64) -> bool {
        let k = ((self.lower - phase) / period - PERIOD_SLACK).ceil();
        let point = phase + k * period;
        point <= self.upper + PERIOD_SLACK * period * (1.0 + k.abs())
    }

    /// Absolute value.
    #[must_use]
    pub fn abs(self) -> Interval {
        if self.is_empty() || self.lower >= 0.0 {
            self
        } else if self.upper <= 0.0 {
            -self
        } else {
            Interval {
                lower: 0.0,
                upper: (-self.lower).max(self.upper),
            }
        }
    }

    /// Square, tight even when the interval straddles zero.
    #[must_use]
    pub fn sqr(self) -> Interval {
        let magnitude = self.abs();
        Interval {
            lower: magnitude.lower * magnitude.lower,
            upper: magnitude.upper * magnitude.upper,
        }
    }

    /// Square root. Negative parts of the interval are discarded.
    #[must_use]
    pub fn sqrt(self) -> Interval {
        if self.is_empty() || self.upper < 0.0 {
            return Interval::empty();
        }
        Interval::outward(self.lower.max(0.0).sqrt(), self.upper.sqrt()).clamped(0.0, f64::INFINITY)
    }

    /// Sine.
    #[must_use]
    pub fn sin(self) -> Interval {
        if self.is_empty() {
            return self;
        }
        if !(self.width() < TAU) {
            return Interval::new(-1.0, 1.0);
        }
        let a = self.lower.sin();
        let b = self.upper.sin();
        let mut lower = a.min(b);
        let mut upper = a.max(b);
        if self.encloses_periodic(FRAC_PI_2, TAU) {
            upper = 1.0;
        }
        if self.encloses_periodic(-FRAC_PI_2, TAU) {
            lower = -1.0;
        }
        Interval::outward(lower, upper).clamped(-1.0, 1.0)
    }

    /// Cosine.
    #[must_use]
    pub fn cos(self) -> Interval {
        if self.is_empty() {
            return self;
        }
        if !(self.width() < TAU) {
            return Interval::new(-1.0, 1.0);
        }
        let a = self.lower.cos();
        let b = self.upper.cos();
        let mut lower = a.min(b);
        let mut upper = a.max(b);
        if self.encloses_periodic(0.0, TAU) {
            upper = 1.0;
        }
        if self.encloses_periodic(PI, TAU) {
            lower = -1.0;
        }
        Interval::outward(lower, upper).clamped(-1.0, 1.0)
    }

    /// Tangent. Returns the whole line if a pole is enclosed.
    #[must_use]
    pub fn tan(self) -> Interval {
        if self.is_empty() {
            return self;
        }
        if !(self.width() < PI) || self.encloses_periodic(FRAC_PI_2, PI) {
            return Interval::whole();
        }
        Interval::outward(self.lower.tan(), self.upper.tan())
    }

    /// Inverse sine over the part of the interval inside `[-1, 1]`.
    #[must_use]
    pub fn asin(self) -> Interval {
        let domain = self.intersection(&Interval::new(-1.0, 1.0));
        if domain.is_empty() {
            return domain;
        }
        Interval::outward(domain.lower.asin(), domain.upper.asin()).clamped(-FRAC_PI_2, FRAC_PI_2)
    }

    /// Inverse cosine over the part of the interval inside `[-1, 1]`.
    #[must_use]
    pub fn acos(self) -> Interval {
        let domain = self.intersection(&Interval::new(-1.0, 1.0));
        if domain.is_empty() {
            return domain;
        }
        Interval::outward(domain.upper.acos(), domain.lower.acos()).clamped(0.0, PI)
    }

    /// Natural exponential.
    #[must_use]
    pub fn exp(self) -> Interval {
        if self.is_empty() {
            return self;
        }
        Interval::outward(self.lower.exp(), self.upper.exp()).clamped(0.0, f64::INFINITY)
    }

    /// Natural logarithm over the positive part of the interval.
    #[must_use]
    pub fn ln(self) -> Interval {
        if self.is_empty() || self.upper < 0.0 {
            return Interval::empty();
        }
        let lower = if self.lower <= 0.0 {
            f64::NEG_INFINITY
        } else {
            self.lower.ln()
        };
        Interval::outward(lower, self.upper.ln())
    }

    /// Integer power.
    #[must_use]
    pub fn powi(self, exponent: i32) -> Interval {
        if self.is_empty() {
            return self;
        }
        match exponent {
            0 => Interval::one(),
            1 => self,
            2 => self.sqr(),
            n if n < 0 => Interval::one() / self.powi(-n),
            n if n % 2 == 0 => {
                let magnitude = self.abs();
                Interval::outward(magnitude.lower.powi(n), magnitude.upper.powi(n))
                    .clamped(0.0, f64::INFINITY)
            }
            n => Interval::outward(self.lower.powi(n), self.upper.powi(n)),
        }
    }

    /// General power `self^exponent`, defined for positive bases.
    #[must_use]
    pub fn powf(self, exponent: Interval) -> Interval {
        if exponent.lower == exponent.upper && exponent.lower.fract() == 0.0 {
            #[allow(clippy::cast_possible_truncation)]
            let integer = exponent.lower as i32;
            if f64::from(integer) == exponent.lower {
                return self.powi(integer);
            }
        }
        (exponent * self.ln()).exp()
    }
}

/// Multiplies two bounds, treating `0 * inf` as zero.
fn mul_bound(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        0.0
    } else {
        a * b
    }
}

/// Divides two bounds, treating `0 / x` as zero.
fn div_bound(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        0.0
    } else {
        a / b
    }
}

/// Smallest double strictly greater than `x`.
fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Largest double strictly less than `x`.
fn next_down(x: f64) -> f64 {
    -next_up(-x)
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Interval) -> Interval {
        Interval {
            lower: self.lower + rhs.lower,
            upper: self.upper + rhs.upper,
        }
    }
}

impl Sub for Interval {
    type Output = Interval;

    fn sub(self, rhs: Interval) -> Interval {
        Interval {
            lower: self.lower - rhs.upper,
            upper: self.upper - rhs.lower,
        }
    }
}

impl Neg for Interval {
    type Output = Interval;

    fn neg(self) -> Interval {
        Interval {
            lower: -self.upper,
            upper: -self.lower,
        }
    }
}

impl Mul for Interval {
    type Output = Interval;

    fn mul(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::empty();
        }
        let products = [
            mul_bound(self.lower, rhs.lower),
            mul_bound(self.lower, rhs.upper),
            mul_bound(self.upper, rhs.lower),
            mul_bound(self.upper, rhs.upper),
        ];
        Interval {
            lower: products.iter().copied().fold(f64::INFINITY, f64::min),
            upper: products.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

impl Div for Interval {
    type Output = Interval;

    fn div(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::empty();
        }
        if rhs.contains(0.0) {
            return Interval::whole();
        }
        let quotients = [
            div_bound(self.lower, rhs.lower),
            div_bound(self.lower, rhs.upper),
            div_bound(self.upper, rhs.lower),
            div_bound(self.upper, rhs.upper),
        ];
        Interval {
            lower: quotients.iter().copied().fold(f64::INFINITY, f64::min),
            upper: quotients.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

impl Zero for Interval {
    fn zero() -> Self {
        Interval::singleton(0.0)
    }

    fn is_zero(&self) -> bool {
        self.lower == 0.0 && self.upper == 0.0
    }
}

impl One for Interval {
    fn one() -> Self {
        Interval::singleton(1.0)
    }
}

impl From<f64> for Interval {
    fn from(value: f64) -> Self {
        Interval::singleton(value)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[empty]")
        } else {
            write!(f, "[{}, {}]", self.lower, self.upper)
        }
    }
}

impl Scalar for Interval {
    fn from_f64(value: f64) -> Self {
        Interval::singleton(value)
    }

    fn sqr(self) -> Self {
        Interval::sqr(self)
    }

    fn sqrt(self) -> Self {
        Interval::sqrt(self)
    }

    fn sin(self) -> Self {
        Interval::sin(self)
    }

    fn cos(self) -> Self {
        Interval::cos(self)
    }

    fn tan(self) -> Self {
        Interval::tan(self)
    }

    fn asin(self) -> Self {
        Interval::asin(self)
    }

    fn acos(self) -> Self {
        Interval::acos(self)
    }

    fn exp(self) -> Self {
        Interval::exp(self)
    }

    fn ln(self) -> Self {
        Interval::ln(self)
    }

    fn abs(self) -> Self {
        Interval::abs(self)
    }

    fn powi(self, exponent: i32) -> Self {
        Interval::powi(self, exponent)
    }

    fn powf(self, exponent: Self) -> Self {
        Interval::powf(self, exponent)
    }
}

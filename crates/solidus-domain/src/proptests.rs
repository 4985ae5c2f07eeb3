//! Property-based tests for interval inclusion.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::{Interval, Scalar};

    // Strategy for (interval, point inside it)
    fn interval_and_point(range: std::ops::Range<f64>) -> impl Strategy<Value = (Interval, f64)> {
        (range, 0.0f64..4.0, 0.0f64..=1.0).prop_map(|(lower, width, t)| {
            let upper = lower + width;
            let point = (lower + t * width).min(upper);
            (Interval::new(lower, upper), point)
        })
    }

    fn check_unary(f: fn(f64) -> f64, g: fn(Interval) -> Interval, x: Interval, p: f64) -> bool {
        let value = f(p);
        value.is_nan() || g(x).contains(value)
    }

    proptest! {
        #[test]
        fn sin_contains_point((x, p) in interval_and_point(-20.0..20.0)) {
            prop_assert!(check_unary(f64::sin, Interval::sin, x, p));
        }

        #[test]
        fn cos_contains_point((x, p) in interval_and_point(-20.0..20.0)) {
            prop_assert!(check_unary(f64::cos, Interval::cos, x, p));
        }

        #[test]
        fn tan_contains_point((x, p) in interval_and_point(-3.0..3.0)) {
            prop_assert!(check_unary(f64::tan, Interval::tan, x, p));
        }

        #[test]
        fn exp_contains_point((x, p) in interval_and_point(-10.0..10.0)) {
            prop_assert!(check_unary(f64::exp, Interval::exp, x, p));
        }

        #[test]
        fn ln_contains_point((x, p) in interval_and_point(0.001..50.0)) {
            prop_assert!(check_unary(f64::ln, Interval::ln, x, p));
        }

        #[test]
        fn sqrt_contains_point((x, p) in interval_and_point(0.0..50.0)) {
            prop_assert!(check_unary(f64::sqrt, Interval::sqrt, x, p));
        }

        #[test]
        fn asin_acos_contain_point(lower in -1.0f64..1.0, t in 0.0f64..=1.0, s in 0.0f64..=1.0) {
            let upper = lower + t * (1.0 - lower);
            let x = Interval::new(lower, upper);
            let p = (lower + s * (upper - lower)).min(upper);
            prop_assert!(x.asin().contains(p.asin()));
            prop_assert!(x.acos().contains(p.acos()));
        }

        #[test]
        fn mul_contains_product(
            (x, p) in interval_and_point(-10.0..10.0),
            (y, q) in interval_and_point(-10.0..10.0),
        ) {
            prop_assert!((x * y).contains(p * q));
            prop_assert!((x + y).contains(p + q));
            prop_assert!((x - y).contains(p - q));
        }

        #[test]
        fn div_contains_quotient(
            (x, p) in interval_and_point(-10.0..10.0),
            (y, q) in interval_and_point(0.5..10.0),
        ) {
            prop_assert!((x / y).contains(p / q));
        }

        #[test]
        fn powi_contains_power((x, p) in interval_and_point(-3.0..3.0), n in -3i32..5) {
            let value = p.powi(n);
            prop_assume!(value.is_finite());
            prop_assert!(x.powi(n).contains(value));
        }

        #[test]
        fn sqr_tighter_than_mul(x in interval_and_point(-5.0..5.0).prop_map(|(x, _)| x)) {
            prop_assert!((x * x).contains_interval(&x.sqr()));
        }

        #[test]
        fn scalar_sqr_matches_inherent(x in interval_and_point(-5.0..5.0).prop_map(|(x, _)| x)) {
            prop_assert_eq!(Scalar::sqr(x), x.sqr());
        }
    }
}

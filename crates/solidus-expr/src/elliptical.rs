//! Sine/cosine parameterizations shared by evaluation and differentiation.
//!
//! An elliptical map with `n` parameters builds `n + 1` local coordinates,
//! starting from ones: parameter `i` multiplies local coordinate `i` by one
//! trigonometric factor and every later coordinate by the other. With a
//! single parameter and convention `true` this yields `(cos t, sin t)`.

use solidus_domain::Scalar;

use crate::expr::Convention;

/// Computes the local coordinates of an elliptical map.
///
/// # Panics
///
/// Panics if `local` does not have one more entry than `convention`.
pub fn local_coordinates<S: Scalar>(convention: &[bool], parameters: &[S], local: &mut [S]) {
    assert_eq!(local.len(), convention.len() + 1, "local coordinate count");
    local.fill(S::one());
    for (i, (&cosine_first, &t)) in convention.iter().zip(parameters).enumerate() {
        let (cos, sin) = (t.cos(), t.sin());
        let (head, tail) = if cosine_first { (cos, sin) } else { (sin, cos) };
        local[i] = local[i] * head;
        for v in &mut local[i + 1..] {
            *v = *v * tail;
        }
    }
}

/// Returns the basis and convention of the partial derivative of an
/// elliptical map with respect to parameter `index`.
///
/// Columns before `index` do not depend on the parameter and are zeroed.
/// The remaining columns switch between sine and cosine, which flips the
/// convention flag and negates whichever columns turned a sine into a
/// cosine's derivative.
#[must_use]
pub fn derivative_basis(
    basis: &[f64],
    dimensions: usize,
    convention: &[bool],
    index: usize,
) -> (Vec<f64>, Convention) {
    let columns = convention.len() + 1;
    debug_assert_eq!(basis.len(), dimensions * columns);
    let mut out = basis.to_vec();
    out[..index * dimensions].fill(0.0);
    let negated = if convention[index] {
        index..index + 1
    } else {
        index + 1..columns
    };
    for v in &mut out[negated.start * dimensions..negated.end * dimensions] {
        *v = -*v;
    }
    let mut flipped: Convention = convention.iter().copied().collect();
    flipped[index] = !flipped[index];
    (out, flipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_coordinates() {
        let mut local = [0.0; 2];
        local_coordinates(&[true], &[0.3], &mut local);
        assert!((local[0] - 0.3f64.cos()).abs() < 1e-15);
        assert!((local[1] - 0.3f64.sin()).abs() < 1e-15);
    }

    #[test]
    fn test_sphere_coordinates() {
        // Longitude then latitude
        let (u, v) = (0.4f64, 1.1f64);
        let mut local = [0.0; 3];
        local_coordinates(&[true, true], &[u, v], &mut local);
        assert!((local[0] - u.cos()).abs() < 1e-15);
        assert!((local[1] - u.sin() * v.cos()).abs() < 1e-15);
        assert!((local[2] - u.sin() * v.sin()).abs() < 1e-15);
    }

    #[test]
    fn test_derivative_basis_matches_finite_difference() {
        let basis = [1.0, 0.5, 0.0, 2.0, 0.0, 1.0, -1.0, 0.3, 0.7];
        let convention = [true, false];
        let point = [0.7, -0.4];
        let h = 1e-6;
        for index in 0..2 {
            let (db, dc) = derivative_basis(&basis, 3, &convention, index);
            let mut local = [0.0; 3];
            local_coordinates(&dc, &point, &mut local);
            let analytic: Vec<f64> = (0..3)
                .map(|r| (0..3).map(|c| db[c * 3 + r] * local[c]).sum())
                .collect();

            let value = |p: &[f64]| -> Vec<f64> {
                let mut l = [0.0; 3];
                local_coordinates(&convention, p, &mut l);
                (0..3)
                    .map(|r| (0..3).map(|c| basis[c * 3 + r] * l[c]).sum())
                    .collect()
            };
            let mut plus = point;
            plus[index] += h;
            let mut minus = point;
            minus[index] -= h;
            let (fp, fm) = (value(&plus), value(&minus));
            for r in 0..3 {
                let numeric = (fp[r] - fm[r]) / (2.0 * h);
                assert!((numeric - analytic[r]).abs() < 1e-6, "index {index} row {r}");
            }
        }
    }
}

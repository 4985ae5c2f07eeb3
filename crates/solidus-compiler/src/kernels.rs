//! Kernel implementations, generic over the numeric domain.
//!
//! Every kernel writes all entries of its target. Arguments with one column
//! are reused for every target column.

use smallvec::SmallVec;
use solidus_domain::Scalar;
use solidus_expr::elliptical::local_coordinates;
use solidus_expr::Elementary;
use solidus_matrix::{MatrixView, MatrixViewMut};

use crate::operation::Kernel;

/// Applies an elementary function in domain `S`.
pub fn apply_elementary<S: Scalar>(function: Elementary, x: S) -> S {
    match function {
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

/// Evaluates the derivative of an elementary function in domain `S`.
pub fn elementary_derivative<S: Scalar>(function: Elementary, x: S) -> S {
    match function {
        Elementary::Sine => x.cos(),
        Elementary::Cosine => -x.sin(),
        Elementary::Tangent => S::one() + x.tan().sqr(),
        Elementary::Arcsine => S::one() / (S::one() - x.sqr()).sqrt(),
        Elementary::Arccosine => -(S::one() / (S::one() - x.sqr()).sqrt()),
        Elementary::Exponential => x.exp(),
        Elementary::Logarithm => S::one() / x,
        Elementary::SquareRoot => S::from_f64(0.5) / x.sqrt(),
    }
}

fn map_unary<S: Scalar>(a: &MatrixView<'_, S>, target: &mut MatrixViewMut<'_, S>, f: impl Fn(S) -> S) {
    for j in 0..target.columns() {
        let source = a.broadcast_column(j);
        for (out, &x) in target.column_mut(j).iter_mut().zip(source) {
            *out = f(x);
        }
    }
}

fn map_binary<S: Scalar>(
    a: &MatrixView<'_, S>,
    b: &MatrixView<'_, S>,
    target: &mut MatrixViewMut<'_, S>,
    f: impl Fn(S, S) -> S,
) {
    for j in 0..target.columns() {
        let (x, y) = (a.broadcast_column(j), b.broadcast_column(j));
        for (i, out) in target.column_mut(j).iter_mut().enumerate() {
            *out = f(x[i], y[i]);
        }
    }
}

/// Applies a per-column reduction producing one row.
fn reduce_columns<S: Scalar>(
    a: &MatrixView<'_, S>,
    target: &mut MatrixViewMut<'_, S>,
    f: impl Fn(&[S]) -> S,
) {
    for j in 0..target.columns() {
        target.column_mut(j)[0] = f(a.broadcast_column(j));
    }
}

fn squared_norm<S: Scalar>(column: &[S]) -> S {
    column.iter().fold(S::zero(), |acc, &x| acc + x.sqr())
}

/// Computes `origin + basis * x` into `out`.
fn affine_column<S: Scalar>(basis: &MatrixView<'_, S>, origin: &[S], x: &[S], out: &mut [S]) {
    out.copy_from_slice(origin);
    for (l, &xl) in x.iter().enumerate() {
        for (i, v) in out.iter_mut().enumerate() {
            *v = *v + basis.get(i, l) * xl;
        }
    }
}

fn argument<'v, 'a, S>(kernel: &Kernel, arguments: &'v [MatrixView<'a, S>], index: usize) -> &'v MatrixView<'a, S> {
    arguments
        .get(index)
        .unwrap_or_else(|| panic!("{} expects argument {index}", kernel.name()))
}

/// Runs `kernel` on `arguments`, writing `target`.
///
/// # Panics
///
/// Panics if the argument count or shapes do not fit the kernel.
pub fn execute<S: Scalar>(kernel: &Kernel, arguments: &[MatrixView<'_, S>], target: &mut MatrixViewMut<'_, S>) {
    let arg = |index| argument(kernel, arguments, index);
    match kernel {
        Kernel::Negate => map_unary(arg(0), target, |x| -x),
        Kernel::Add => map_binary(arg(0), arg(1), target, |x, y| x + y),
        Kernel::Subtract => map_binary(arg(0), arg(1), target, |x, y| x - y),
        Kernel::ScaleColumns => {
            let (scale, values) = (arg(0), arg(1));
            for j in 0..target.columns() {
                let s = scale.broadcast_column(j)[0];
                let source = values.broadcast_column(j);
                for (out, &x) in target.column_mut(j).iter_mut().zip(source) {
                    *out = s * x;
                }
            }
        }
        Kernel::DivideColumns => {
            let (values, divisor) = (arg(0), arg(1));
            for j in 0..target.columns() {
                let s = divisor.broadcast_column(j)[0];
                let source = values.broadcast_column(j);
                for (out, &x) in target.column_mut(j).iter_mut().zip(source) {
                    *out = x / s;
                }
            }
        }
        Kernel::ColumnDot => {
            let (a, b) = (arg(0), arg(1));
            for j in 0..target.columns() {
                let (x, y) = (a.broadcast_column(j), b.broadcast_column(j));
                target.column_mut(j)[0] = x
                    .iter()
                    .zip(y)
                    .fold(S::zero(), |acc, (&u, &v)| acc + u * v);
            }
        }
        Kernel::ColumnCross => {
            let (a, b) = (arg(0), arg(1));
            for j in 0..target.columns() {
                let (u, v) = (a.broadcast_column(j), b.broadcast_column(j));
                let out = target.column_mut(j);
                out[0] = u[1] * v[2] - u[2] * v[1];
                out[1] = u[2] * v[0] - u[0] * v[2];
                out[2] = u[0] * v[1] - u[1] * v[0];
            }
        }
        Kernel::ColumnNorm => reduce_columns(arg(0), target, |c| squared_norm(c).sqrt()),
        Kernel::ColumnSquaredNorm => reduce_columns(arg(0), target, squared_norm),
        Kernel::Elementary(function) => {
            map_unary(arg(0), target, |x| apply_elementary(*function, x));
        }
        Kernel::ElementaryDerivative(function) => {
            map_unary(arg(0), target, |x| elementary_derivative(*function, x));
        }
        Kernel::Power => map_binary(arg(0), arg(1), target, S::powf),
        Kernel::PowerInteger(n) => map_unary(arg(0), target, |x| x.powi(*n)),
        Kernel::PowerBasePartial => map_binary(arg(0), arg(1), target, |b, e| {
            e * b.powf(e - S::one())
        }),
        Kernel::PowerExponentPartial => map_binary(arg(0), arg(1), target, |b, p| p * b.ln()),
        Kernel::Affine => {
            let (basis, origin, x) = (arg(0), arg(1), arg(2));
            for j in 0..target.columns() {
                affine_column(basis, origin.broadcast_column(j), x.broadcast_column(j), target.column_mut(j));
            }
        }
        Kernel::Elliptical { convention } => {
            let (basis, origin, x) = (arg(0), arg(1), arg(2));
            let mut local: SmallVec<[S; 4]> = SmallVec::from_elem(S::zero(), convention.len() + 1);
            for j in 0..target.columns() {
                local_coordinates(convention, x.broadcast_column(j), &mut local);
                affine_column(basis, origin.broadcast_column(j), &local, target.column_mut(j));
            }
        }
        Kernel::EllipticalJacobian { conventions } => {
            let point = arg(conventions.len()).column(0);
            let zero: SmallVec<[S; 4]> = SmallVec::from_elem(S::zero(), target.rows());
            for (i, convention) in conventions.iter().enumerate() {
                let mut local: SmallVec<[S; 4]> = SmallVec::from_elem(S::zero(), convention.len() + 1);
                local_coordinates(convention, point, &mut local);
                affine_column(arg(i), &zero, &local, target.column_mut(i));
            }
        }
        Kernel::MatrixProduct => {
            let (a, b) = (arg(0), arg(1));
            for j in 0..target.columns() {
                let column = b.broadcast_column(j);
                for i in 0..target.rows() {
                    let value = column
                        .iter()
                        .enumerate()
                        .fold(S::zero(), |acc, (l, &y)| acc + a.get(i, l) * y);
                    target.set(i, j, value);
                }
            }
        }
        Kernel::TransposeProduct => {
            let (a, b) = (arg(0), arg(1));
            for j in 0..target.columns() {
                let column = b.broadcast_column(j);
                for i in 0..target.rows() {
                    let value = a
                        .column(i)
                        .iter()
                        .zip(column)
                        .fold(S::zero(), |acc, (&x, &y)| acc + x * y);
                    target.set(i, j, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_domain::Interval;
    use solidus_matrix::Matrix;

    fn run(kernel: &Kernel, arguments: &[&Matrix<f64>], rows: usize, columns: usize) -> Matrix<f64> {
        let views: Vec<_> = arguments.iter().map(|m| m.view()).collect();
        let mut out = Matrix::zeros(rows, columns);
        execute(kernel, &views, &mut out.view_mut());
        out
    }

    #[test]
    fn test_scale_broadcasts_row() {
        let s = Matrix::from_rows(&[vec![2.0, 3.0]]);
        let v = Matrix::from_rows(&[vec![1.0], vec![4.0]]);
        let out = run(&Kernel::ScaleColumns, &[&s, &v], 2, 2);
        assert_eq!(out, Matrix::from_rows(&[vec![2.0, 3.0], vec![8.0, 12.0]]));
    }

    #[test]
    fn test_matrix_products() {
        let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        let x = Matrix::from_rows(&[vec![1.0], vec![1.0]]);
        let out = run(&Kernel::MatrixProduct, &[&a, &x], 3, 1);
        assert_eq!(out.as_slice(), &[3.0, 7.0, 11.0]);

        let y = Matrix::from_rows(&[vec![1.0], vec![0.0], vec![1.0]]);
        let out = run(&Kernel::TransposeProduct, &[&a, &y], 2, 1);
        assert_eq!(out.as_slice(), &[6.0, 8.0]);
    }

    #[test]
    fn test_cross_and_norm() {
        let x = Matrix::from_column_slice(3, 1, &[1.0, 0.0, 0.0]);
        let y = Matrix::from_column_slice(3, 1, &[0.0, 1.0, 0.0]);
        let out = run(&Kernel::ColumnCross, &[&x, &y], 3, 1);
        assert_eq!(out.as_slice(), &[0.0, 0.0, 1.0]);

        let v = Matrix::from_column_slice(2, 2, &[3.0, 4.0, 6.0, 8.0]);
        let out = run(&Kernel::ColumnNorm, &[&v], 1, 2);
        assert_eq!(out.as_slice(), &[5.0, 10.0]);
    }

    #[test]
    fn test_affine_with_broadcast_origin() {
        let basis = Matrix::from_rows(&[vec![2.0], vec![0.0]]);
        let origin = Matrix::from_column_slice(2, 1, &[1.0, 1.0]);
        let x = Matrix::from_rows(&[vec![1.0, 2.0, 3.0]]);
        let views = [basis.view(), origin.broadcast(3), x.view()];
        let mut out = Matrix::zeros(2, 3);
        execute(&Kernel::Affine, &views, &mut out.view_mut());
        assert_eq!(out.as_slice(), &[3.0, 1.0, 5.0, 1.0, 7.0, 1.0]);
    }

    #[test]
    fn test_elementary_derivatives() {
        let x = 0.3;
        let h = 1e-6;
        for f in [
            Elementary::Sine,
            Elementary::Cosine,
            Elementary::Tangent,
            Elementary::Arcsine,
            Elementary::Arccosine,
            Elementary::Exponential,
            Elementary::Logarithm,
            Elementary::SquareRoot,
        ] {
            let numeric = (f.apply(x + h) - f.apply(x - h)) / (2.0 * h);
            let exact: f64 = elementary_derivative(f, x);
            assert!((numeric - exact).abs() < 1e-6, "{f:?}: {numeric} vs {exact}");
        }
    }

    #[test]
    fn test_interval_square() {
        let x = Matrix::from_column_slice(1, 1, &[Interval::new(-1.0, 2.0)]);
        let views = [x.view()];
        let mut out = Matrix::from_column_slice(1, 1, &[Interval::from_f64(0.0)]);
        execute(&Kernel::PowerInteger(2), &views, &mut out.view_mut());
        let result = out.column(0)[0];
        assert!(result.contains(0.0) && result.contains(4.0));
    }
}

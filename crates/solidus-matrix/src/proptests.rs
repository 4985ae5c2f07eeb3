//! Property-based tests for matrix views.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::Matrix;

    fn arb_matrix() -> impl Strategy<Value = Matrix<f64>> {
        (1usize..6, 1usize..5).prop_flat_map(|(rows, columns)| {
            proptest::collection::vec(-100.0f64..100.0, rows * columns)
                .prop_map(move |data| Matrix::from_column_slice(rows, columns, &data))
        })
    }

    proptest! {
        #[test]
        fn block_rows_reads_parent(m in arb_matrix(), a in 0usize..6, b in 0usize..6) {
            let start = a % m.rows();
            let count = b % (m.rows() - start + 1);
            let block = m.view().block_rows(start, count);
            for j in 0..m.columns() {
                for i in 0..count {
                    prop_assert_eq!(block.get(i, j), m[(start + i, j)]);
                }
            }
        }

        #[test]
        fn assign_then_read(m in arb_matrix()) {
            let mut target: Matrix<f64> = Matrix::zeros(m.rows(), m.columns());
            target.view_mut().assign(&m.view());
            prop_assert_eq!(target.view().to_matrix(), m);
        }
    }
}

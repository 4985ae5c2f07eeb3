//! Owned column-major matrix storage.

use std::ops::{Index, IndexMut};

use num_traits::{One, Zero};

use crate::view::{MatrixView, MatrixViewMut};

/// Dense matrix stored in column-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<S> {
    /// Matrix entries, one column after another.
    data: Vec<S>,
    /// Number of rows.
    rows: usize,
    /// Number of columns.
    columns: usize,
}

impl<S: Copy> Matrix<S> {
    /// Creates a matrix with every entry set to `value`.
    #[must_use]
    pub fn constant(rows: usize, columns: usize, value: S) -> Self {
        Self {
            data: vec![value; rows * columns],
            rows,
            columns,
        }
    }

    /// Creates a matrix from column-major data.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != rows * columns`.
    #[must_use]
    pub fn from_column_slice(rows: usize, columns: usize, data: &[S]) -> Self {
        assert_eq!(data.len(), rows * columns, "data does not match {rows}x{columns}");
        Self {
            data: data.to_vec(),
            rows,
            columns,
        }
    }

    /// Creates a matrix from a list of columns.
    ///
    /// # Panics
    ///
    /// Panics if the columns have different lengths.
    #[must_use]
    pub fn from_columns(columns: &[Vec<S>]) -> Self {
        let rows = columns.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows * columns.len());
        for column in columns {
            assert_eq!(column.len(), rows, "ragged columns");
            data.extend_from_slice(column);
        }
        Self {
            data,
            rows,
            columns: columns.len(),
        }
    }

    /// Creates a matrix from a list of rows.
    ///
    /// # Panics
    ///
    /// Panics if the rows have different lengths.
    #[must_use]
    pub fn from_rows(rows: &[Vec<S>]) -> Self {
        let num_rows = rows.len();
        let num_columns = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(num_rows * num_columns);
        for column in 0..num_columns {
            for row in rows {
                assert_eq!(row.len(), num_columns, "ragged rows");
                data.push(row[column]);
            }
        }
        Self {
            data,
            rows: num_rows,
            columns: num_columns,
        }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Returns the entry at (row, column), if in bounds.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> Option<S> {
        if row < self.rows && column < self.columns {
            Some(self.data[column * self.rows + row])
        } else {
            None
        }
    }

    /// Returns a slice of the specified column.
    #[must_use]
    pub fn column(&self, column: usize) -> &[S] {
        let start = column * self.rows;
        &self.data[start..start + self.rows]
    }

    /// Returns a mutable slice of the specified column.
    pub fn column_mut(&mut self, column: usize) -> &mut [S] {
        let start = column * self.rows;
        &mut self.data[start..start + self.rows]
    }

    /// Returns the raw column-major data.
    #[must_use]
    pub fn as_slice(&self) -> &[S] {
        &self.data
    }

    /// Returns a read-only view of the whole matrix.
    #[must_use]
    pub fn view(&self) -> MatrixView<'_, S> {
        MatrixView::new(&self.data, self.rows, self.columns, self.rows)
    }

    /// Returns a view that repeats this matrix's single column `columns` times.
    ///
    /// # Panics
    ///
    /// Panics if the matrix has more than one column.
    #[must_use]
    pub fn broadcast(&self, columns: usize) -> MatrixView<'_, S> {
        assert!(self.columns <= 1, "only column vectors can be broadcast");
        MatrixView::new(&self.data, self.rows, columns, 0)
    }

    /// Returns a mutable view of the whole matrix.
    pub fn view_mut(&mut self) -> MatrixViewMut<'_, S> {
        let rows = self.rows;
        let columns = self.columns;
        MatrixViewMut::new(&mut self.data, rows, columns, rows)
    }

    /// Applies `f` to every entry, producing a matrix of the same shape.
    #[must_use]
    pub fn map<T, F: Fn(S) -> T>(&self, f: F) -> Matrix<T> {
        Matrix {
            data: self.data.iter().map(|&v| f(v)).collect(),
            rows: self.rows,
            columns: self.columns,
        }
    }
}

impl<S: Copy + Zero> Matrix<S> {
    /// Creates a new matrix filled with zeros.
    #[must_use]
    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self::constant(rows, columns, S::zero())
    }

    /// Returns true if every entry is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(Zero::is_zero)
    }
}

impl<S: Copy + Zero + One> Matrix<S> {
    /// Creates an identity matrix.
    #[must_use]
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = S::one();
        }
        m
    }
}

impl<S> Index<(usize, usize)> for Matrix<S> {
    type Output = S;

    fn index(&self, (row, column): (usize, usize)) -> &S {
        assert!(row < self.rows && column < self.columns, "index out of bounds");
        &self.data[column * self.rows + row]
    }
}

impl<S> IndexMut<(usize, usize)> for Matrix<S> {
    fn index_mut(&mut self, (row, column): (usize, usize)) -> &mut S {
        assert!(row < self.rows && column < self.columns, "index out of bounds");
        &mut self.data[column * self.rows + row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_major_layout() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(m.rows(), 2);
        assert_eq!(m.columns(), 3);
        assert_eq!(m.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(m.column(1), &[2.0, 5.0]);
        assert_eq!(m[(1, 2)], 6.0);
        assert_eq!(m.get(2, 0), None);
    }

    #[test]
    fn test_identity() {
        let i: Matrix<f64> = Matrix::identity(3);
        assert_eq!(i[(1, 1)], 1.0);
        assert_eq!(i[(0, 1)], 0.0);
        assert_eq!((i.rows(), i.columns()), (3, 3));
    }

    #[test]
    fn test_broadcast_view() {
        let c = Matrix::from_column_slice(2, 1, &[7.0, 8.0]);
        let view = c.broadcast(4);
        assert_eq!(view.columns(), 4);
        assert_eq!(view.get(1, 3), 8.0);
    }

    #[test]
    fn test_map() {
        let m = Matrix::from_column_slice(1, 2, &[1.0_f64, 4.0]);
        let s = m.map(f64::sqrt);
        assert_eq!(s.as_slice(), &[1.0, 2.0]);
        assert!(Matrix::<f64>::zeros(2, 2).is_zero());
    }
}

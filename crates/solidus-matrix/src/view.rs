//! Borrowed matrix views.
//!
//! A view is a window onto column-major storage described by a shape and a
//! column stride. Row blocks share the parent's stride, so views of views
//! compose without copying. A column stride of zero repeats one stored
//! column across every column of the view.

/// A read-only view onto column-major storage.
#[derive(Clone, Copy, Debug)]
pub struct MatrixView<'a, S> {
    data: &'a [S],
    rows: usize,
    columns: usize,
    column_stride: usize,
}

/// Length of backing storage needed by a view of the given shape.
fn required_len(rows: usize, columns: usize, column_stride: usize) -> usize {
    if rows == 0 || columns == 0 {
        0
    } else {
        (columns - 1) * column_stride + rows
    }
}

impl<'a, S: Copy> MatrixView<'a, S> {
    /// Creates a view over `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data` is too short for the requested shape.
    #[must_use]
    pub fn new(data: &'a [S], rows: usize, columns: usize, column_stride: usize) -> Self {
        assert!(
            data.len() >= required_len(rows, columns, column_stride),
            "view {rows}x{columns} (stride {column_stride}) exceeds {} entries",
            data.len()
        );
        Self {
            data,
            rows,
            columns,
            column_stride,
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

    /// Returns true if every column reads the same storage.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.column_stride == 0 && self.columns > 1
    }

    /// Returns the entry at (row, column).
    ///
    /// # Panics
    ///
    /// Panics if out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> S {
        assert!(row < self.rows && column < self.columns, "index out of bounds");
        self.data[column * self.column_stride + row]
    }

    /// Returns a slice of the specified column.
    #[must_use]
    pub fn column(&self, column: usize) -> &'a [S] {
        assert!(column < self.columns, "column {column} out of bounds");
        let start = column * self.column_stride;
        &self.data[start..start + self.rows]
    }

    /// Returns column `column`, or column 0 if the view has one column.
    ///
    /// Lets a single vector act against every column of a batch.
    #[must_use]
    pub fn broadcast_column(&self, column: usize) -> &'a [S] {
        if self.columns == 1 {
            self.column(0)
        } else {
            self.column(column)
        }
    }

    /// Returns the view restricted to rows `start..start + count`.
    ///
    /// # Panics
    ///
    /// Panics if the block exceeds the view.
    #[must_use]
    pub fn block_rows(&self, start: usize, count: usize) -> MatrixView<'a, S> {
        assert!(start + count <= self.rows, "row block out of bounds");
        let data = if count == 0 || self.columns == 0 {
            &self.data[..0]
        } else {
            &self.data[start..]
        };
        MatrixView::new(data, count, self.columns, self.column_stride)
    }

    /// Copies the view into an owned matrix.
    #[must_use]
    pub fn to_matrix(&self) -> crate::Matrix<S> {
        let mut data = Vec::with_capacity(self.rows * self.columns);
        for column in 0..self.columns {
            data.extend_from_slice(self.column(column));
        }
        crate::Matrix::from_column_slice(self.rows, self.columns, &data)
    }
}

/// A mutable view onto column-major storage.
#[derive(Debug)]
pub struct MatrixViewMut<'a, S> {
    data: &'a mut [S],
    rows: usize,
    columns: usize,
    column_stride: usize,
}

impl<'a, S: Copy> MatrixViewMut<'a, S> {
    /// Creates a mutable view over `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data` is too short for the requested shape or the stride
    /// would make columns overlap.
    pub fn new(data: &'a mut [S], rows: usize, columns: usize, column_stride: usize) -> Self {
        assert!(
            columns <= 1 || column_stride >= rows,
            "mutable views cannot overlap columns"
        );
        assert!(
            data.len() >= required_len(rows, columns, column_stride),
            "view {rows}x{columns} (stride {column_stride}) exceeds {} entries",
            data.len()
        );
        Self {
            data,
            rows,
            columns,
            column_stride,
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

    /// Returns the entry at (row, column).
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> S {
        assert!(row < self.rows && column < self.columns, "index out of bounds");
        self.data[column * self.column_stride + row]
    }

    /// Sets the entry at (row, column).
    pub fn set(&mut self, row: usize, column: usize, value: S) {
        assert!(row < self.rows && column < self.columns, "index out of bounds");
        self.data[column * self.column_stride + row] = value;
    }

    /// Returns a mutable slice of the specified column.
    pub fn column_mut(&mut self, column: usize) -> &mut [S] {
        assert!(column < self.columns, "column {column} out of bounds");
        let start = column * self.column_stride;
        &mut self.data[start..start + self.rows]
    }

    /// Reborrows as a read-only view.
    #[must_use]
    pub fn as_view(&self) -> MatrixView<'_, S> {
        MatrixView::new(self.data, self.rows, self.columns, self.column_stride)
    }

    /// Reborrows rows `start..start + count` mutably.
    ///
    /// # Panics
    ///
    /// Panics if the block exceeds the view.
    pub fn block_rows_mut(&mut self, start: usize, count: usize) -> MatrixViewMut<'_, S> {
        assert!(start + count <= self.rows, "row block out of bounds");
        let data = if count == 0 || self.columns == 0 {
            &mut self.data[..0]
        } else {
            &mut self.data[start..]
        };
        MatrixViewMut::new(data, count, self.columns, self.column_stride)
    }

    /// Copies `source` into this view.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ.
    pub fn assign(&mut self, source: &MatrixView<'_, S>) {
        assert_eq!(
            (self.rows, self.columns),
            (source.rows(), source.columns()),
            "assignment shape mismatch"
        );
        for column in 0..self.columns {
            self.column_mut(column).copy_from_slice(source.column(column));
        }
    }

    /// Sets every entry to `value`.
    pub fn fill(&mut self, value: S) {
        for column in 0..self.columns {
            self.column_mut(column).fill(value);
        }
    }
}

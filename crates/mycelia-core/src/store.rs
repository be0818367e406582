//! Growable columnar storage backing every per-cell attribute.
//!
//! Logical indices handed out by `append` stay valid across reallocation;
//! only [`GrowVec::batch_remove`] invalidates them, and the only caller of
//! that is colony membership compaction during fragmentation.

use serde::{Deserialize, Serialize};

/// Append-only 1-D column with amortized O(1) doubling growth.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GrowVec<T> {
    data: Vec<T>,
}

impl<T: Copy + Default> GrowVec<T> {
    /// Create an empty column.
    #[must_use]
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create a column with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of populated slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true when nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a value, returning its stable logical index.
    pub fn append(&mut self, value: T) -> usize {
        let index = self.data.len();
        self.data.push(value);
        index
    }

    /// Value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> T {
        self.data[index]
    }

    /// Overwrite the value at `index`.
    pub fn set(&mut self, index: usize, value: T) {
        self.data[index] = value;
    }

    /// The populated prefix.
    #[must_use]
    pub fn active(&self) -> &[T] {
        &self.data
    }

    /// Mutable view of the populated prefix.
    #[must_use]
    pub fn active_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Compact out the given logical positions, shifting trailing elements
    /// left. Every index cached by a caller that references a removed slot
    /// (or any slot after it) is invalidated.
    pub fn batch_remove(&mut self, slots: &[usize]) {
        if slots.is_empty() {
            return;
        }
        let mut doomed = vec![false; self.data.len()];
        for &slot in slots {
            assert!(slot < self.data.len(), "batch_remove slot out of bounds");
            doomed[slot] = true;
        }
        let mut write = 0;
        for read in 0..self.data.len() {
            if doomed[read] {
                continue;
            }
            if write != read {
                self.data[write] = self.data[read];
            }
            write += 1;
        }
        self.data.truncate(write);
    }
}

impl GrowVec<f64> {
    /// Sum over the populated prefix.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

/// Append-only row-major 2-D column block (cells as rows).
///
/// Rows are appended as agents are created; columns are added as events or
/// conditions are defined. Slicing one row is contiguous.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GrowMatrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Copy + Default> GrowMatrix<T> {
    /// Create an empty matrix with `cols` columns.
    #[must_use]
    pub fn new(cols: usize) -> Self {
        Self {
            data: Vec::new(),
            rows: 0,
            cols,
        }
    }

    /// Number of populated rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Current column count.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Append a row, returning its stable logical index.
    pub fn append_row(&mut self, row: &[T]) -> usize {
        assert_eq!(row.len(), self.cols, "row width mismatch");
        let index = self.rows;
        self.data.extend_from_slice(row);
        self.rows += 1;
        index
    }

    /// Append a zero-filled row, returning its stable logical index.
    pub fn append_zero_row(&mut self) -> usize {
        let index = self.rows;
        self.data.resize(self.data.len() + self.cols, T::default());
        self.rows += 1;
        index
    }

    /// Extend the width by one zero-filled column, preserving existing values.
    pub fn add_column(&mut self) {
        let old_cols = self.cols;
        self.cols += 1;
        let mut widened = Vec::with_capacity(self.rows * self.cols);
        for row in 0..self.rows {
            widened.extend_from_slice(&self.data[row * old_cols..(row + 1) * old_cols]);
            widened.push(T::default());
        }
        self.data = widened;
    }

    /// Value at `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> T {
        debug_assert!(row < self.rows && col < self.cols);
        self.data[row * self.cols + col]
    }

    /// Overwrite the value at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        debug_assert!(row < self.rows && col < self.cols);
        self.data[row * self.cols + col] = value;
    }

    /// Contiguous view of one row.
    #[must_use]
    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Mutable contiguous view of one row.
    #[must_use]
    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Flat row-major view of the populated region.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.data
    }

    /// Mutable flat row-major view of the populated region.
    #[must_use]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Fill one column with a scalar across all populated rows.
    pub fn fill_column(&mut self, col: usize, value: T) {
        debug_assert!(col < self.cols);
        for row in 0..self.rows {
            self.data[row * self.cols + col] = value;
        }
    }
}

impl GrowMatrix<f64> {
    /// Sum over the populated region.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

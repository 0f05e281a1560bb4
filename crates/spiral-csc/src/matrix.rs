// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::ops;
use crate::report::{CscError, CscResult};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Dense column-major matrix of `f64` values.
///
/// Every algorithm in this crate works column by column (one feature or one
/// position vector per column), so columns are stored contiguously and are
/// exposed as plain slices.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> CscResult<Self> {
        Self::from_column_major(rows, cols, vec![0.0; rows * cols])
    }

    /// Create a matrix from column-major data. The vector must hold exactly
    /// `rows * cols` values.
    pub fn from_column_major(rows: usize, cols: usize, data: Vec<f64>) -> CscResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(CscError::InvalidDimensions { rows, cols });
        }
        let expected = rows * cols;
        if data.len() != expected {
            return Err(CscError::DataLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Create a matrix from equally long columns.
    pub fn from_columns<C: AsRef<[f64]>>(columns: &[C]) -> CscResult<Self> {
        let cols = columns.len();
        let rows = columns.first().map(|c| c.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows * cols);
        for column in columns {
            let column = column.as_ref();
            if column.len() != rows {
                return Err(CscError::DataLength {
                    expected: rows,
                    got: column.len(),
                });
            }
            data.extend_from_slice(column);
        }
        Self::from_column_major(rows, cols, data)
    }

    /// Wrap a single vector as an `len × 1` matrix.
    pub fn column_vector(values: &[f64]) -> CscResult<Self> {
        Self::from_column_major(values.len(), 1, values.to_vec())
    }

    /// Construct a matrix by evaluating `f(row, col)` for every entry.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> CscResult<Self>
    where
        F: FnMut(usize, usize) -> f64,
    {
        if rows == 0 || cols == 0 {
            return Err(CscError::InvalidDimensions { rows, cols });
        }
        let mut data = Vec::with_capacity(rows * cols);
        for c in 0..cols {
            for r in 0..rows {
                data.push(f(r, c));
            }
        }
        Self::from_column_major(rows, cols, data)
    }

    /// Sample every entry independently from `N(mean, std²)` using `rng`.
    ///
    /// A zero standard deviation is accepted and yields a constant matrix.
    pub fn random_normal<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        mean: f64,
        std: f64,
        rng: &mut R,
    ) -> CscResult<Self> {
        if !mean.is_finite() || !std.is_finite() || std < 0.0 {
            return Err(CscError::invalid(
                "std",
                format!("normal draws need a finite mean and std >= 0 (mean={mean}, std={std})"),
            ));
        }
        Self::from_fn(rows, cols, |_, _| {
            let sample: f64 = StandardNormal.sample(&mut *rng);
            mean + std * sample
        })
    }

    /// Returns the `(rows, cols)` pair.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Column-major backing storage.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_column_major(self) -> Vec<f64> {
        self.data
    }

    /// Entry at `(row, col)`; `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[col * self.rows + row])
    }

    /// Borrow column `col`.
    ///
    /// # Panics
    /// Panics when `col >= self.cols()`.
    pub fn column(&self, col: usize) -> &[f64] {
        let start = col * self.rows;
        &self.data[start..start + self.rows]
    }

    /// Mutably borrow column `col`.
    ///
    /// # Panics
    /// Panics when `col >= self.cols()`.
    pub fn column_mut(&mut self, col: usize) -> &mut [f64] {
        let start = col * self.rows;
        &mut self.data[start..start + self.rows]
    }

    pub fn columns(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.rows)
    }

    pub fn columns_mut(&mut self) -> std::slice::ChunksExactMut<'_, f64> {
        self.data.chunks_exact_mut(self.rows)
    }

    /// Returns a new matrix with every entry scaled by `value`.
    pub fn scale(&self, value: f64) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|a| a * value).collect(),
        }
    }

    /// Element-wise addition.
    pub fn add(&self, other: &Matrix) -> CscResult<Matrix> {
        self.ensure_same_shape(other)?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| a + b)
                .collect(),
        })
    }

    /// `self += scale * other`.
    pub fn add_scaled(&mut self, other: &Matrix, scale: f64) -> CscResult<()> {
        self.ensure_same_shape(other)?;
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += scale * b;
        }
        Ok(())
    }

    /// Clamp every entry at zero (`self[i] = max(self[i], 0)`).
    pub fn clamp_non_negative(&mut self) {
        ops::clamp_non_negative(&mut self.data);
    }

    /// Sum of absolute values over all entries.
    pub fn l1_norm(&self) -> f64 {
        ops::l1_norm(&self.data)
    }

    /// Squared Frobenius norm.
    pub fn squared_l2_norm(&self) -> f64 {
        ops::sum_squares(&self.data)
    }

    /// L1 norm of every column.
    pub fn column_l1_norms(&self) -> Vec<f64> {
        self.columns().map(ops::l1_norm).collect()
    }

    /// Euclidean norm of every column.
    pub fn column_l2_norms(&self) -> Vec<f64> {
        self.columns().map(|c| ops::sum_squares(c).sqrt()).collect()
    }

    /// Number of entries different from zero.
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|v| **v != 0.0).count()
    }

    pub fn is_finite(&self) -> bool {
        ops::all_finite(&self.data)
    }

    fn ensure_same_shape(&self, other: &Matrix) -> CscResult<()> {
        if self.shape() != other.shape() {
            return Err(CscError::ShapeMismatch {
                left: self.shape(),
                right: other.shape(),
            });
        }
        Ok(())
    }
}

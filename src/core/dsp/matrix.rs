// src/core/dsp/matrix.rs
//
// Dense row-major matrix used by the transforms and the statistical model.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::error::{FindSimilarError, Result};

/// Dense `rows x cols` matrix stored in one contiguous row-major buffer
#[derive(Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Zero-filled matrix
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Wrap a row-major buffer
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(FindSimilarError::InvalidMatrix(format!(
                "buffer of {} values cannot hold {}x{}",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from nested rows; every row must have the same length
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(FindSimilarError::InvalidMatrix(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn column(&self, c: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self[(r, c)]).collect()
    }

    pub fn set_column(&mut self, c: usize, values: &[f64]) {
        for (r, &v) in values.iter().enumerate().take(self.rows) {
            self[(r, c)] = v;
        }
    }

    /// Copy of the first `rows` rows
    pub fn top_rows(&self, rows: usize) -> Matrix {
        let rows = rows.min(self.rows);
        Matrix {
            rows,
            cols: self.cols,
            data: self.data[..rows * self.cols].to_vec(),
        }
    }

    /// Copy of the rows in `start..start + count`
    pub fn row_range(&self, start: usize, count: usize) -> Matrix {
        let start = start.min(self.rows);
        let end = (start + count).min(self.rows);
        Matrix {
            rows: end - start,
            cols: self.cols,
            data: self.data[start * self.cols..end * self.cols].to_vec(),
        }
    }

    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::new(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out[(c, r)] = self[(r, c)];
            }
        }
        out
    }

    pub fn multiply(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(FindSimilarError::InvalidMatrix(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut out = Matrix::new(self.rows, other.cols);
        for i in 0..self.rows {
            let lhs = self.row(i);
            let dst = &mut out.data[i * other.cols..(i + 1) * other.cols];
            for (k, &a) in lhs.iter().enumerate() {
                if a == 0.0 {
                    continue;
                }
                for (d, &b) in dst.iter_mut().zip(other.row(k)) {
                    *d += a * b;
                }
            }
        }
        Ok(out)
    }

    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Largest absolute element-wise difference
    pub fn max_abs_diff(&self, other: &Matrix) -> f64 {
        if self.rows != other.rows || self.cols != other.cols {
            return f64::INFINITY;
        }
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Mean of every row across its columns
    pub fn row_means(&self) -> Vec<f64> {
        if self.cols == 0 {
            return vec![0.0; self.rows];
        }
        (0..self.rows)
            .map(|r| self.row(r).iter().sum::<f64>() / self.cols as f64)
            .collect()
    }

    /// Covariance between rows, treating every column as one observation.
    ///
    /// Uses the unbiased `1 / (cols - 1)` factor, so at least two columns are needed.
    pub fn row_covariance(&self, means: &[f64]) -> Result<Matrix> {
        if self.cols < 2 {
            return Err(FindSimilarError::InvalidMatrix(format!(
                "covariance needs at least 2 observations, got {}",
                self.cols
            )));
        }
        if means.len() != self.rows {
            return Err(FindSimilarError::DimensionMismatch {
                expected: self.rows,
                found: means.len(),
            });
        }

        let centered: Vec<Vec<f64>> = (0..self.rows)
            .map(|r| self.row(r).iter().map(|v| v - means[r]).collect())
            .collect();

        let factor = 1.0 / (self.cols - 1) as f64;
        let mut cov = Matrix::new(self.rows, self.rows);
        for i in 0..self.rows {
            for j in i..self.rows {
                let sum: f64 = centered[i]
                    .iter()
                    .zip(&centered[j])
                    .map(|(a, b)| a * b)
                    .sum();
                cov[(i, j)] = sum * factor;
                cov[(j, i)] = sum * factor;
            }
        }
        Ok(cov)
    }

    /// Gauss-Jordan inverse with partial pivoting.
    ///
    /// A pivot smaller than `1e-12` times the largest diagonal magnitude counts
    /// as singular, as does any non-finite result.
    pub fn inverse(&self) -> Result<Matrix> {
        let n = self.rows;
        if n != self.cols {
            return Err(FindSimilarError::InvalidMatrix(format!(
                "cannot invert non-square {}x{} matrix",
                self.rows, self.cols
            )));
        }

        let scale = (0..n).map(|i| self[(i, i)].abs()).fold(0.0, f64::max);
        let tolerance = if scale > 0.0 { scale * 1e-12 } else { f64::MIN_POSITIVE };
        let singular = || FindSimilarError::SingularCovariance { dimension: n };

        let mut a = self.clone();
        let mut inv = Matrix::identity(n);

        for col in 0..n {
            let mut pivot = col;
            for r in col + 1..n {
                if a[(r, col)].abs() > a[(pivot, col)].abs() {
                    pivot = r;
                }
            }
            if a[(pivot, col)].abs() <= tolerance || !a[(pivot, col)].is_finite() {
                return Err(singular());
            }
            if pivot != col {
                a.swap_rows(pivot, col);
                inv.swap_rows(pivot, col);
            }

            let p = a[(col, col)];
            for c in 0..n {
                a[(col, c)] /= p;
                inv[(col, c)] /= p;
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = a[(r, col)];
                if factor == 0.0 {
                    continue;
                }
                for c in 0..n {
                    a[(r, c)] -= factor * a[(col, c)];
                    inv[(r, c)] -= factor * inv[(col, c)];
                }
            }
        }

        if !inv.is_finite() {
            return Err(singular());
        }
        Ok(inv)
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for c in 0..self.cols {
            self.data.swap(a * self.cols + c, b * self.cols + c);
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        assert!(r < self.rows && c < self.cols, "index ({}, {}) out of bounds", r, c);
        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        assert!(r < self.rows && c < self.cols, "index ({}, {}) out of bounds", r, c);
        &mut self.data[r * self.cols + c]
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix {}x{}", self.rows, self.cols)?;
        for r in 0..self.rows.min(16) {
            let row: Vec<String> = self.row(r).iter().take(16).map(|v| format!("{:9.3}", v)).collect();
            writeln!(f, "  [{}]", row.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_and_transpose() {
        let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        let at = a.transpose();
        assert_eq!(at.rows(), 2);
        assert_eq!(at[(1, 2)], 6.0);

        let p = at.multiply(&a).unwrap();
        assert_eq!(p[(0, 0)], 35.0);
        assert_eq!(p[(0, 1)], 44.0);
        assert_eq!(p[(1, 1)], 56.0);
        assert!(a.multiply(&a).is_err());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
        assert!(Matrix::from_vec(2, 2, vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_row_means_and_covariance() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0, 3.0, 4.0], vec![2.0, 4.0, 6.0, 8.0]]).unwrap();
        let means = m.row_means();
        assert!((means[0] - 2.5).abs() < 1e-12);
        assert!((means[1] - 5.0).abs() < 1e-12);

        let cov = m.row_covariance(&means).unwrap();
        // var([1,2,3,4]) with 1/(n-1) = 5/3
        assert!((cov[(0, 0)] - 5.0 / 3.0).abs() < 1e-12);
        assert!((cov[(0, 1)] - 10.0 / 3.0).abs() < 1e-12);
        assert!((cov[(1, 0)] - cov[(0, 1)]).abs() < 1e-12);
    }

    #[test]
    fn test_covariance_needs_two_columns() {
        let m = Matrix::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
        assert!(m.row_covariance(&m.row_means()).is_err());
    }

    #[test]
    fn test_inverse() {
        let m = Matrix::from_rows(&[
            vec![4.0, 7.0, 2.0],
            vec![3.0, 6.0, 1.0],
            vec![2.0, 5.0, 3.0],
        ])
        .unwrap();
        let inv = m.inverse().unwrap();
        let id = m.multiply(&inv).unwrap();
        assert!(id.max_abs_diff(&Matrix::identity(3)) < 1e-10);
    }

    #[test]
    fn test_inverse_needs_pivoting() {
        let m = Matrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let inv = m.inverse().unwrap();
        assert!(inv.max_abs_diff(&m) < 1e-12);
    }

    #[test]
    fn test_singular_inverse() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        match m.inverse() {
            Err(FindSimilarError::SingularCovariance { dimension }) => assert_eq!(dimension, 2),
            other => panic!("expected singular covariance, got {:?}", other),
        }
        assert!(Matrix::new(3, 3).inverse().is_err());
    }
}

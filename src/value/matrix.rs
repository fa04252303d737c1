// src/value/matrix.rs

use std::fmt;
use std::sync::Arc;

/// Single-channel `f32` image, row-major.
///
/// Pixel data sits behind an `Arc`, so cloning a matrix out of the pool is
/// cheap and a published matrix can never be mutated in place.
#[derive(Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Arc<[f32]>,
}

impl Matrix {
    /// Wrap `data` as a `rows × cols` matrix.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, String> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(format!(
                "matrix of {rows}x{cols} needs {} elements, got {}",
                rows.saturating_mul(cols),
                data.len()
            ));
        }
        Ok(Self {
            rows,
            cols,
            data: data.into(),
        })
    }

    pub fn filled(rows: usize, cols: usize, value: f32) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols].into(),
        }
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self {
            rows,
            cols,
            data: data.into(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn at(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Arithmetic mean of all pixels; `None` for an empty matrix.
    pub fn mean(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        let sum: f64 = self.data.iter().map(|&v| v as f64).sum();
        Some(sum / self.data.len() as f64)
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_checks_dimensions() {
        assert!(Matrix::from_vec(2, 2, vec![0.0; 4]).is_ok());
        let err = Matrix::from_vec(2, 3, vec![0.0; 4]).unwrap_err();
        assert!(err.contains("2x3"));
    }

    #[test]
    fn indexing_is_row_major() {
        let m = Matrix::from_fn(2, 3, |r, c| (r * 10 + c) as f32);
        assert_eq!(m.at(1, 2), Some(12.0));
        assert_eq!(m.row(1), &[10.0, 11.0, 12.0]);
        assert_eq!(m.at(2, 0), None);
    }

    #[test]
    fn clones_share_pixel_storage() {
        let m = Matrix::filled(4, 4, 1.0);
        let copy = m.clone();
        assert!(std::ptr::eq(m.data().as_ptr(), copy.data().as_ptr()));
        assert_eq!(m.mean(), Some(1.0));
    }
}

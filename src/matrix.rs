//! Column-major dense matrix, the fundamental unit of vector storage.
//!
//! A matrix of shape `(rows = D, cols = N)` holds N vectors of dimension D in
//! one contiguous buffer. Column `i` is the i-th vector and is addressable as
//! a contiguous `&[T]` of length D (the column stride equals D).

use crate::error::{Result, SearchError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Element type of a feature vector.
///
/// Distance arithmetic is carried out in `f32` regardless of the storage
/// type, so every element type must convert losslessly into `f32`.
pub trait Feature:
    Copy + Default + PartialEq + Send + Sync + Serialize + DeserializeOwned + std::fmt::Debug + 'static
{
    fn to_f32(self) -> f32;
}

impl Feature for f32 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }
}

impl Feature for u8 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

/// Column-major 2-D buffer of numeric scalars.
///
/// Invariant: `data.len() == rows * cols`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColMajorMatrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> ColMajorMatrix<T> {
    /// Create a zero-filled matrix of the given shape.
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::default(); rows * cols],
        }
    }

    /// Wrap a flat column-major buffer.
    pub fn from_flat(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(SearchError::InvalidParameter(format!(
                "buffer length {} does not match shape {}x{}",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from column slices. All columns must share one length.
    pub fn from_columns(columns: &[Vec<T>]) -> Result<Self> {
        let rows = columns.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows * columns.len());
        for col in columns {
            if col.len() != rows {
                return Err(SearchError::DimensionMismatch {
                    expected: rows,
                    actual: col.len(),
                });
            }
            data.extend_from_slice(col);
        }
        Ok(Self {
            rows,
            cols: columns.len(),
            data,
        })
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn num_cols(&self) -> usize {
        self.cols
    }

    /// Borrow column `i` as a contiguous span of `num_rows` elements.
    #[inline]
    pub fn column(&self, i: usize) -> &[T] {
        &self.data[i * self.rows..(i + 1) * self.rows]
    }

    #[inline]
    pub fn column_mut(&mut self, i: usize) -> &mut [T] {
        &mut self.data[i * self.rows..(i + 1) * self.rows]
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[col * self.rows + row]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[col * self.rows + row] = value;
    }

    /// The raw column-major buffer.
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Copy column `src` of `other` into column `dst` of `self`.
    pub fn copy_column_from(&mut self, dst: usize, other: &Self, src: usize) {
        let rows = self.rows;
        self.column_mut(dst)[..rows].copy_from_slice(other.column(src));
    }

    /// Keep only the first `max_cols` columns, dropping the rest.
    pub fn truncate_cols(&mut self, max_cols: usize) {
        if max_cols < self.cols {
            self.data.truncate(self.rows * max_cols);
            self.cols = max_cols;
        }
    }
}

/// Capability interface over anything that stores fixed-dimension vectors.
///
/// Query kernels are generic over this trait and dispatch once at the entry
/// point; the inner loops are monomorphized.
pub trait VectorArray<T: Feature> {
    fn dimension(&self) -> usize;
    fn num_vectors(&self) -> usize;
    fn vector(&self, i: usize) -> &[T];
}

impl<T: Feature> VectorArray<T> for ColMajorMatrix<T> {
    #[inline]
    fn dimension(&self) -> usize {
        self.rows
    }

    #[inline]
    fn num_vectors(&self) -> usize {
        self.cols
    }

    #[inline]
    fn vector(&self, i: usize) -> &[T] {
        self.column(i)
    }
}

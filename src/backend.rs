//! Runtime adapters that execute plans on concrete tensors
//!
//! A backend needs exactly three capabilities: transpose, reshape and tile.
//! [`DenseBackend`] is a reference implementation over a row-major
//! [`DenseTensor`].

use thiserror::Error;

use crate::error::CompileError;
use crate::ops::{checked_product, ReshapeDim};

/// Executes shape operations against a tensor type `T`
pub trait Backend<T> {
    type Error;

    fn transpose(&self, x: T, perm: &[usize]) -> Result<T, Self::Error>;

    fn reshape(&self, x: T, shape: &[ReshapeDim]) -> Result<T, Self::Error>;

    fn tile(&self, x: T, multiples: &[usize]) -> Result<T, Self::Error>;
}

/// Errors from the reference backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    #[error("Shape {shape:?} holds {expected} elements, got {got}")]
    DataLength {
        shape: Vec<usize>,
        expected: usize,
        got: usize,
    },

    #[error("Permutation {perm:?} is invalid for rank {rank}")]
    InvalidPermutation { perm: Vec<usize>, rank: usize },

    #[error("Cannot reshape {from} elements into {to}")]
    InvalidReshape { from: usize, to: String },

    #[error("Tile multiples {multiples:?} do not fit a tensor of rank {rank}")]
    InvalidTile { multiples: Vec<usize>, rank: usize },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// A row-major n-dimensional array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseTensor<E> {
    shape: Vec<usize>,
    data: Vec<E>,
}

impl<E> DenseTensor<E> {
    pub fn new(shape: Vec<usize>, data: Vec<E>) -> Result<Self, TensorError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TensorError::DataLength {
                shape,
                expected,
                got: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Build a tensor whose element at each flat (row-major) position is `f(position)`
    pub fn from_fn(shape: Vec<usize>, f: impl FnMut(usize) -> E) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: (0..len).map(f).collect(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[E] {
        &self.data
    }

    pub fn into_data(self) -> Vec<E> {
        self.data
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Element at a multi-dimensional index
    pub fn get(&self, index: &[usize]) -> Option<&E> {
        if index.len() != self.shape.len() || index.iter().zip(&self.shape).any(|(i, d)| i >= d) {
            return None;
        }
        self.data.get(ravel(index, &self.shape))
    }
}

impl DenseTensor<usize> {
    /// Tensor holding `0, 1, 2, ...` in row-major order
    pub fn iota(shape: Vec<usize>) -> Self {
        Self::from_fn(shape, |i| i)
    }
}

impl<E: Clone> DenseTensor<E> {
    /// Compile `equation` against this tensor's shape and apply it
    pub fn einshape(&self, equation: &str, sizes: &[(&str, usize)]) -> Result<Self, TensorError> {
        let plan = crate::compile(equation, self.shape.clone(), sizes)?;
        plan.execute(&DenseBackend, self.clone())
    }
}

fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

fn ravel(index: &[usize], shape: &[usize]) -> usize {
    index.iter().zip(strides(shape)).map(|(i, s)| i * s).sum()
}

fn unravel(mut flat: usize, shape: &[usize], out: &mut [usize]) {
    for axis in (0..shape.len()).rev() {
        out[axis] = flat % shape[axis];
        flat /= shape[axis];
    }
}

/// Reference backend over [`DenseTensor`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseBackend;

impl<E: Clone> Backend<DenseTensor<E>> for DenseBackend {
    type Error = TensorError;

    fn transpose(&self, x: DenseTensor<E>, perm: &[usize]) -> Result<DenseTensor<E>, TensorError> {
        let rank = x.rank();
        let mut seen = vec![false; rank];
        let valid = perm.len() == rank
            && perm
                .iter()
                .all(|&axis| axis < rank && !std::mem::replace(&mut seen[axis], true));
        if !valid {
            return Err(TensorError::InvalidPermutation {
                perm: perm.to_vec(),
                rank,
            });
        }

        let shape: Vec<usize> = perm.iter().map(|&axis| x.shape[axis]).collect();
        let source_strides = strides(&x.shape);
        let mut index = vec![0; rank];
        let data = (0..x.data.len())
            .map(|flat| {
                unravel(flat, &shape, &mut index);
                let source: usize = index
                    .iter()
                    .zip(perm)
                    .map(|(&i, &axis)| i * source_strides[axis])
                    .sum();
                x.data[source].clone()
            })
            .collect();
        Ok(DenseTensor { shape, data })
    }

    fn reshape(&self, x: DenseTensor<E>, shape: &[ReshapeDim]) -> Result<DenseTensor<E>, TensorError> {
        let total = x.data.len();
        let invalid = || TensorError::InvalidReshape {
            from: total,
            to: format!(
                "[{}]",
                shape.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ),
        };

        let fixed = checked_product(shape.iter().map(|dim| match dim {
            ReshapeDim::Fixed(size) => Some(*size),
            ReshapeDim::Infer => Some(1),
        }))
        .ok_or_else(invalid)?;
        let inferred = match shape.iter().filter(|dim| **dim == ReshapeDim::Infer).count() {
            0 => None,
            1 if fixed > 0 && total % fixed == 0 => Some(total / fixed),
            _ => return Err(invalid()),
        };

        let resolved: Vec<usize> = shape
            .iter()
            .map(|dim| match dim {
                ReshapeDim::Fixed(size) => *size,
                ReshapeDim::Infer => inferred.unwrap_or(0),
            })
            .collect();
        if checked_product(resolved.iter().copied().map(Some)) != Some(total) {
            return Err(invalid());
        }
        Ok(DenseTensor {
            shape: resolved,
            data: x.data,
        })
    }

    fn tile(&self, x: DenseTensor<E>, multiples: &[usize]) -> Result<DenseTensor<E>, TensorError> {
        if multiples.len() != x.rank() {
            return Err(TensorError::InvalidTile {
                multiples: multiples.to_vec(),
                rank: x.rank(),
            });
        }

        let shape: Vec<Option<usize>> = x
            .shape
            .iter()
            .zip(multiples)
            .map(|(d, m)| d.checked_mul(*m))
            .collect();
        let len = checked_product(shape.iter().copied()).ok_or_else(|| TensorError::InvalidTile {
            multiples: multiples.to_vec(),
            rank: x.rank(),
        })?;
        let shape: Vec<usize> = shape.into_iter().flatten().collect();
        let mut index = vec![0; shape.len()];
        let data = (0..len)
            .map(|flat| {
                unravel(flat, &shape, &mut index);
                for (i, d) in index.iter_mut().zip(&x.shape) {
                    *i %= d;
                }
                x.data[ravel(&index, &x.shape)].clone()
            })
            .collect();
        Ok(DenseTensor { shape, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transpose_matrix() {
        // [[7, 2, 4], [1, -3, 5]] -> [[7, 1], [2, -3], [4, 5]]
        let x = DenseTensor::new(vec![2, 3], vec![7, 2, 4, 1, -3, 5]).unwrap();
        let y = DenseBackend.transpose(x, &[1, 0]).unwrap();
        assert_eq!(y.shape(), &[3, 2]);
        assert_eq!(y.data(), &[7, 1, 2, -3, 4, 5]);
    }

    #[test]
    fn test_transpose_rank_three() {
        let x = DenseTensor::iota(vec![2, 3, 4]);
        let y = DenseBackend.transpose(x.clone(), &[2, 0, 1]).unwrap();
        assert_eq!(y.shape(), &[4, 2, 3]);
        for a in 0..2 {
            for b in 0..3 {
                for c in 0..4 {
                    assert_eq!(y.get(&[c, a, b]), x.get(&[a, b, c]));
                }
            }
        }
    }

    #[test]
    fn test_reshape_with_inferred_dim() {
        let x = DenseTensor::iota(vec![6]);
        let y = DenseBackend
            .reshape(x, &[ReshapeDim::Infer, ReshapeDim::Fixed(3)])
            .unwrap();
        assert_eq!(y.shape(), &[2, 3]);
        assert_eq!(y.data(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_reshape_rejects_wrong_count() {
        let x = DenseTensor::iota(vec![6]);
        let result = DenseBackend.reshape(x, &[ReshapeDim::Fixed(4)]);
        assert!(matches!(result, Err(TensorError::InvalidReshape { from: 6, .. })));
    }

    #[test]
    fn test_tile_repeats_values() {
        // [3, 5] tiled along a new trailing axis of size 3.
        let x = DenseTensor::new(vec![2, 1], vec![3, 5]).unwrap();
        let y = DenseBackend.tile(x, &[1, 3]).unwrap();
        assert_eq!(y.shape(), &[2, 3]);
        assert_eq!(y.data(), &[3, 3, 3, 5, 5, 5]);

        let x = DenseTensor::new(vec![1, 2], vec![3, 5]).unwrap();
        let y = DenseBackend.tile(x, &[3, 1]).unwrap();
        assert_eq!(y.data(), &[3, 5, 3, 5, 3, 5]);
    }

    #[test]
    fn test_oversized_tile_is_rejected() {
        let x = DenseTensor::iota(vec![2]);
        assert!(matches!(
            DenseBackend.tile(x, &[usize::MAX]),
            Err(TensorError::InvalidTile { .. })
        ));
    }

    #[test]
    fn test_invalid_permutation() {
        let x = DenseTensor::iota(vec![2, 2]);
        assert!(matches!(
            DenseBackend.transpose(x, &[0, 0]),
            Err(TensorError::InvalidPermutation { .. })
        ));
    }

    #[test]
    fn test_data_length_checked() {
        assert!(matches!(
            DenseTensor::new(vec![2, 2], vec![1, 2, 3]),
            Err(TensorError::DataLength { expected: 4, got: 3, .. })
        ));
    }
}

//! Tensor model shared by readers, stores and communicators

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Tensor shape (per-axis extents, row-major)
pub type Shape = Vec<usize>;

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    U8,
    I8,
    I16,
    U16,
    F16,
    BF16,
    I32,
    U32,
    F32,
    F64,
    I64,
    U64,
}

impl DType {
    /// Size of one element in bytes
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::I16 | DType::U16 | DType::F16 | DType::BF16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::U8 => "u8",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::U16 => "u16",
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::I32 => "i32",
            DType::U32 => "u32",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I64 => "i64",
            DType::U64 => "u64",
        };
        f.write_str(name)
    }
}

/// Dense row-major tensor with little-endian element storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    dtype: DType,
    shape: Shape,
    data: Bytes,
}

impl Tensor {
    /// Create a tensor, checking the buffer length against the shape
    pub fn new(dtype: DType, shape: Shape, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let expected = shape.iter().product::<usize>() * dtype.size_in_bytes();
        if data.len() != expected {
            return Err(Error::InvalidTensor {
                message: format!(
                    "{} tensor of shape {:?} needs {} bytes, got {}",
                    dtype,
                    shape,
                    expected,
                    data.len()
                ),
            });
        }
        Ok(Self { dtype, shape, data })
    }

    /// Build an f32 tensor from values
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DType::F32, shape, data)
    }

    /// Build an f64 tensor from values
    pub fn from_f64(shape: Shape, values: &[f64]) -> Result<Self> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DType::F64, shape, data)
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Raw little-endian element bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Decode f32 values
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        if self.dtype != DType::F32 {
            return Err(Error::UnsupportedDtype {
                dtype: self.dtype.to_string(),
            });
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Decode f32 or f64 values widened to f64
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        match self.dtype {
            DType::F32 => Ok(self.to_f32_vec()?.into_iter().map(f64::from).collect()),
            DType::F64 => Ok(self
                .data
                .chunks_exact(8)
                .map(|c| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(c);
                    f64::from_le_bytes(buf)
                })
                .collect()),
            other => Err(Error::UnsupportedDtype {
                dtype: other.to_string(),
            }),
        }
    }

    /// Same dtype and shape, new f64 values narrowed back to the tensor dtype
    pub fn with_f64_values(&self, values: &[f64]) -> Result<Self> {
        if values.len() != self.numel() {
            return Err(Error::InvalidTensor {
                message: format!("expected {} values, got {}", self.numel(), values.len()),
            });
        }
        match self.dtype {
            DType::F32 => {
                let narrowed: Vec<f32> = values.iter().map(|&v| v as f32).collect();
                Self::from_f32(self.shape.clone(), &narrowed)
            }
            DType::F64 => Self::from_f64(self.shape.clone(), values),
            other => Err(Error::UnsupportedDtype {
                dtype: other.to_string(),
            }),
        }
    }

    /// Reorder axes so that output axis `d` is input axis `axes[d]`
    pub fn permute(&self, axes: &[usize]) -> Result<Self> {
        let rank = self.rank();
        let mut seen = vec![false; rank];
        if axes.len() != rank
            || axes
                .iter()
                .any(|&a| a >= rank || std::mem::replace(&mut seen[a], true))
        {
            return Err(Error::InvalidTensor {
                message: format!("{:?} is not a permutation of {} axes", axes, rank),
            });
        }

        let new_shape: Shape = axes.iter().map(|&a| self.shape[a]).collect();
        let src_strides = row_major_strides(&self.shape);
        let elem = self.dtype.size_in_bytes();
        let numel = self.numel();

        let mut out = Vec::with_capacity(self.data.len());
        let mut index = vec![0usize; rank];
        for _ in 0..numel {
            let offset: usize = index
                .iter()
                .zip(axes)
                .map(|(&i, &a)| i * src_strides[a])
                .sum::<usize>()
                * elem;
            out.extend_from_slice(&self.data[offset..offset + elem]);

            // advance the output index, last axis fastest
            for d in (0..rank).rev() {
                index[d] += 1;
                if index[d] < new_shape[d] {
                    break;
                }
                index[d] = 0;
            }
        }

        Self::new(self.dtype, new_shape, out)
    }
}

/// Element strides of a row-major layout
pub fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

use half::f16;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// A tensor backed by CPU storage.
///
/// Holds contiguous, row-major data of a single dtype with an associated
/// shape. Arithmetic lives on `ComputeBackend` implementations.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Shape,
}

impl Tensor {
    /// Create a tensor from existing storage and a shape.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if `storage.len() != shape.numel()`.
    pub fn from_storage(storage: CpuStorage, shape: Shape) -> Result<Self> {
        if storage.len() != shape.numel() {
            return Err(TensorError::LengthMismatch {
                len: storage.len(),
                dims: shape.dims().to_vec(),
                numel: shape.numel(),
            });
        }
        Ok(Tensor { storage, shape })
    }

    pub fn from_f16(data: Vec<f16>, shape: Shape) -> Result<Self> {
        Self::from_storage(CpuStorage::F16(data), shape)
    }

    pub fn from_f32(data: Vec<f32>, shape: Shape) -> Result<Self> {
        Self::from_storage(CpuStorage::F32(data), shape)
    }

    pub fn from_f64(data: Vec<f64>, shape: Shape) -> Result<Self> {
        Self::from_storage(CpuStorage::F64(data), shape)
    }

    pub fn from_i32(data: Vec<i32>, shape: Shape) -> Result<Self> {
        Self::from_storage(CpuStorage::I32(data), shape)
    }

    pub fn from_i64(data: Vec<i64>, shape: Shape) -> Result<Self> {
        Self::from_storage(CpuStorage::I64(data), shape)
    }

    pub fn from_bool(data: Vec<bool>, shape: Shape) -> Result<Self> {
        Self::from_storage(CpuStorage::Bool(data), shape)
    }

    /// Create a zero-filled tensor with the given dtype and shape.
    pub fn zeros(dtype: DType, shape: Shape) -> Self {
        Tensor {
            storage: CpuStorage::zeros(dtype, shape.numel()),
            shape,
        }
    }

    /// Create a tensor filled with ones with the given dtype and shape.
    pub fn ones(dtype: DType, shape: Shape) -> Self {
        Tensor {
            storage: CpuStorage::ones(dtype, shape.numel()),
            shape,
        }
    }

    /// Create a reproducible pseudo-random tensor.
    ///
    /// Floats are drawn uniformly from [-1, 1), integers from [-10, 10),
    /// bools with probability 1/2. The same seed always yields the same data.
    pub fn rand(dtype: DType, shape: Shape, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = shape.numel();
        let storage = match dtype {
            DType::F16 => CpuStorage::F16(
                (0..n)
                    .map(|_| f16::from_f32(rng.gen_range(-1.0f32..1.0)))
                    .collect(),
            ),
            DType::F32 => CpuStorage::F32((0..n).map(|_| rng.gen_range(-1.0f32..1.0)).collect()),
            DType::F64 => CpuStorage::F64((0..n).map(|_| rng.gen_range(-1.0f64..1.0)).collect()),
            DType::I32 => CpuStorage::I32((0..n).map(|_| rng.gen_range(-10i32..10)).collect()),
            DType::I64 => CpuStorage::I64((0..n).map(|_| rng.gen_range(-10i64..10)).collect()),
            DType::Bool => CpuStorage::Bool((0..n).map(|_| rng.gen::<bool>()).collect()),
        };
        Tensor { storage, shape }
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.storage.len()
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }

    /// Returns the data as an f32 slice, or `None` for other dtypes.
    pub fn as_f32(&self) -> Option<&[f32]> {
        self.storage.as_f32_slice()
    }

    /// Returns true if every element equals `value` (bools compare as 0/1).
    pub fn all_equal_to(&self, value: i64) -> bool {
        match &self.storage {
            CpuStorage::F16(v) => v.iter().all(|x| x.to_f64() == value as f64),
            CpuStorage::F32(v) => v.iter().all(|&x| x as f64 == value as f64),
            CpuStorage::F64(v) => v.iter().all(|&x| x == value as f64),
            CpuStorage::I32(v) => v.iter().all(|&x| x as i64 == value),
            CpuStorage::I64(v) => v.iter().all(|&x| x == value),
            CpuStorage::Bool(v) => v.iter().all(|&x| x as i64 == value),
        }
    }
}

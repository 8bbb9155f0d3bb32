use half::f16;

use crate::dtype::DType;

/// CPU-side tensor storage, one contiguous vector per dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuStorage {
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

impl CpuStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::F16(v) => v.len(),
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F64(v) => v.len(),
            CpuStorage::I32(v) => v.len(),
            CpuStorage::I64(v) => v.len(),
            CpuStorage::Bool(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            CpuStorage::F16(_) => DType::F16,
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F64(_) => DType::F64,
            CpuStorage::I32(_) => DType::I32,
            CpuStorage::I64(_) => DType::I64,
            CpuStorage::Bool(_) => DType::Bool,
        }
    }

    /// Create zero-filled (or all-false) storage for the given dtype and element count.
    pub fn zeros(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::F16 => CpuStorage::F16(vec![f16::ZERO; n]),
            DType::F32 => CpuStorage::F32(vec![0.0; n]),
            DType::F64 => CpuStorage::F64(vec![0.0; n]),
            DType::I32 => CpuStorage::I32(vec![0; n]),
            DType::I64 => CpuStorage::I64(vec![0; n]),
            DType::Bool => CpuStorage::Bool(vec![false; n]),
        }
    }

    /// Create storage filled with the multiplicative identity (`true` for bool).
    pub fn ones(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::F16 => CpuStorage::F16(vec![f16::ONE; n]),
            DType::F32 => CpuStorage::F32(vec![1.0; n]),
            DType::F64 => CpuStorage::F64(vec![1.0; n]),
            DType::I32 => CpuStorage::I32(vec![1; n]),
            DType::I64 => CpuStorage::I64(vec![1; n]),
            DType::Bool => CpuStorage::Bool(vec![true; n]),
        }
    }

    /// Returns the data as an f32 slice, or `None` for any other dtype.
    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        match self {
            CpuStorage::F32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Widens floating-point data to f64. `None` for non-float storage.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            CpuStorage::F16(v) => Some(v.iter().map(|x| x.to_f64()).collect()),
            CpuStorage::F32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            CpuStorage::F64(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Widens integer and bool data to i64. `None` for float storage.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            CpuStorage::I32(v) => Some(v.iter().map(|&x| x as i64).collect()),
            CpuStorage::I64(v) => Some(v.clone()),
            CpuStorage::Bool(v) => Some(v.iter().map(|&x| x as i64).collect()),
            _ => None,
        }
    }

    /// Renders element `i` for diagnostics.
    pub fn element_to_string(&self, i: usize) -> Option<String> {
        match self {
            CpuStorage::F16(v) => v.get(i).map(|x| x.to_string()),
            CpuStorage::F32(v) => v.get(i).map(|x| x.to_string()),
            CpuStorage::F64(v) => v.get(i).map(|x| x.to_string()),
            CpuStorage::I32(v) => v.get(i).map(|x| x.to_string()),
            CpuStorage::I64(v) => v.get(i).map(|x| x.to_string()),
            CpuStorage::Bool(v) => v.get(i).map(|x| x.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_every_dtype() {
        for dtype in DType::ALL {
            let s = CpuStorage::zeros(dtype, 5);
            assert_eq!(s.len(), 5);
            assert_eq!(s.dtype(), dtype);
        }
    }

    #[test]
    fn test_ones() {
        let s = CpuStorage::ones(DType::I32, 3);
        assert_eq!(s, CpuStorage::I32(vec![1, 1, 1]));
        let b = CpuStorage::ones(DType::Bool, 2);
        assert_eq!(b, CpuStorage::Bool(vec![true, true]));
    }

    #[test]
    fn test_widening() {
        let h = CpuStorage::F16(vec![f16::from_f32(0.5)]);
        assert_eq!(h.to_f64_vec(), Some(vec![0.5]));
        assert!(h.to_i64_vec().is_none());

        let b = CpuStorage::Bool(vec![true, false]);
        assert_eq!(b.to_i64_vec(), Some(vec![1, 0]));
        assert!(b.to_f64_vec().is_none());
    }

    #[test]
    fn test_empty() {
        let s = CpuStorage::F32(vec![]);
        assert!(s.is_empty());
        assert_eq!(s.as_f32_slice(), Some(&[][..]));
        assert!(CpuStorage::I64(vec![]).as_f32_slice().is_none());
    }

    #[test]
    fn test_element_to_string() {
        let s = CpuStorage::I64(vec![7, -2]);
        assert_eq!(s.element_to_string(1).as_deref(), Some("-2"));
        assert!(s.element_to_string(2).is_none());
    }
}

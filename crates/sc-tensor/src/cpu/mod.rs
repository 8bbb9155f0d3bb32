use half::f16;

use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;
use crate::tensor::Tensor;

/// Pure-Rust CPU compute backend.
///
/// Implements all operations with straightforward loops optimized for
/// correctness rather than peak performance. Serves as the reference
/// execution path that compiled programs are compared against.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Arithmetic shared by every numeric element type. Integers wrap on overflow.
trait Element: Copy + PartialOrd {
    const ZERO: Self;
    fn plus(self, other: Self) -> Self;
    fn minus(self, other: Self) -> Self;
    fn times(self, other: Self) -> Self;
    fn negate(self) -> Self;
}

macro_rules! float_element {
    ($t:ty, $zero:expr) => {
        impl Element for $t {
            const ZERO: Self = $zero;
            fn plus(self, other: Self) -> Self {
                self + other
            }
            fn minus(self, other: Self) -> Self {
                self - other
            }
            fn times(self, other: Self) -> Self {
                self * other
            }
            fn negate(self) -> Self {
                -self
            }
        }
    };
}

macro_rules! int_element {
    ($t:ty) => {
        impl Element for $t {
            const ZERO: Self = 0;
            fn plus(self, other: Self) -> Self {
                self.wrapping_add(other)
            }
            fn minus(self, other: Self) -> Self {
                self.wrapping_sub(other)
            }
            fn times(self, other: Self) -> Self {
                self.wrapping_mul(other)
            }
            fn negate(self) -> Self {
                self.wrapping_neg()
            }
        }
    };
}

float_element!(f16, f16::ZERO);
float_element!(f32, 0.0);
float_element!(f64, 0.0);
int_element!(i32);
int_element!(i64);

fn zip_with<T: Copy>(a: &[T], b: &[T], f: impl Fn(T, T) -> T) -> Vec<T> {
    a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect()
}

fn relu_of<T: Element>(x: T) -> T {
    if x > T::ZERO {
        x
    } else {
        T::ZERO
    }
}

fn matmul_of<T: Element>(a: &[T], b: &[T], m: usize, k: usize, n: usize) -> Vec<T> {
    let mut c = vec![T::ZERO; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = T::ZERO;
            for p in 0..k {
                sum = sum.plus(a[i * k + p].times(b[p * n + j]));
            }
            c[i * n + j] = sum;
        }
    }
    c
}

/// Applies an `Element` method to each numeric variant pair; bool pairs go
/// through `$bool`, which returns `Option<Vec<bool>>` (`None` = unsupported).
macro_rules! numeric_binary {
    ($op:expr, $a:expr, $b:expr, $method:ident, $bool:expr) => {
        match ($a.storage(), $b.storage()) {
            (CpuStorage::F16(x), CpuStorage::F16(y)) => {
                CpuStorage::F16(zip_with(x, y, Element::$method))
            }
            (CpuStorage::F32(x), CpuStorage::F32(y)) => {
                CpuStorage::F32(zip_with(x, y, Element::$method))
            }
            (CpuStorage::F64(x), CpuStorage::F64(y)) => {
                CpuStorage::F64(zip_with(x, y, Element::$method))
            }
            (CpuStorage::I32(x), CpuStorage::I32(y)) => {
                CpuStorage::I32(zip_with(x, y, Element::$method))
            }
            (CpuStorage::I64(x), CpuStorage::I64(y)) => {
                CpuStorage::I64(zip_with(x, y, Element::$method))
            }
            (CpuStorage::Bool(x), CpuStorage::Bool(y)) => match $bool(x.as_slice(), y.as_slice()) {
                Some(v) => CpuStorage::Bool(v),
                None => return Err(unsupported($op, $a)),
            },
            _ => return Err(dtype_mismatch($a, $b)),
        }
    };
}

macro_rules! numeric_unary {
    ($op:expr, $a:expr, $f:expr) => {
        match $a.storage() {
            CpuStorage::F16(x) => CpuStorage::F16(x.iter().map(|&v| $f(v)).collect()),
            CpuStorage::F32(x) => CpuStorage::F32(x.iter().map(|&v| $f(v)).collect()),
            CpuStorage::F64(x) => CpuStorage::F64(x.iter().map(|&v| $f(v)).collect()),
            CpuStorage::I32(x) => CpuStorage::I32(x.iter().map(|&v| $f(v)).collect()),
            CpuStorage::I64(x) => CpuStorage::I64(x.iter().map(|&v| $f(v)).collect()),
            CpuStorage::Bool(_) => return Err(unsupported($op, $a)),
        }
    };
}

fn unsupported(op: &str, a: &Tensor) -> TensorError {
    TensorError::UnsupportedDType(format!("{op} is not defined for {}", a.dtype()))
}

fn dtype_mismatch(a: &Tensor, b: &Tensor) -> TensorError {
    TensorError::DTypeMismatch {
        expected: a.dtype().to_string(),
        got: b.dtype().to_string(),
    }
}

fn check_elementwise(a: &Tensor, b: &Tensor) -> Result<()> {
    if a.dtype() != b.dtype() {
        return Err(dtype_mismatch(a, b));
    }
    if a.shape() != b.shape() {
        return Err(TensorError::ShapeMismatch {
            expected: a.shape().dims().to_vec(),
            got: b.shape().dims().to_vec(),
        });
    }
    Ok(())
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn add(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        check_elementwise(a, b)?;
        let storage = numeric_binary!("add", a, b, plus, |x: &[bool], y: &[bool]| {
            Some(zip_with(x, y, |p, q| p || q))
        });
        Tensor::from_storage(storage, a.shape().clone())
    }

    fn sub(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        check_elementwise(a, b)?;
        let no_bool = |_: &[bool], _: &[bool]| -> Option<Vec<bool>> { None };
        let storage = numeric_binary!("sub", a, b, minus, no_bool);
        Tensor::from_storage(storage, a.shape().clone())
    }

    fn mul(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        check_elementwise(a, b)?;
        let storage = numeric_binary!("mul", a, b, times, |x: &[bool], y: &[bool]| {
            Some(zip_with(x, y, |p, q| p && q))
        });
        Tensor::from_storage(storage, a.shape().clone())
    }

    fn neg(&self, a: &Tensor) -> Result<Tensor> {
        let storage = numeric_unary!("neg", a, Element::negate);
        Tensor::from_storage(storage, a.shape().clone())
    }

    fn relu(&self, a: &Tensor) -> Result<Tensor> {
        let storage = numeric_unary!("relu", a, relu_of);
        Tensor::from_storage(storage, a.shape().clone())
    }

    fn matmul(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        if a.shape().ndim() != 2 || b.shape().ndim() != 2 {
            return Err(TensorError::Other("matmul requires 2D tensors".to_string()));
        }
        if a.dtype() != b.dtype() {
            return Err(dtype_mismatch(a, b));
        }

        let m = a.shape().dim(0);
        let k = a.shape().dim(1);
        let k2 = b.shape().dim(0);
        let n = b.shape().dim(1);

        if k != k2 {
            return Err(TensorError::MatmulMismatch { m, k, k2, n });
        }

        let storage = match (a.storage(), b.storage()) {
            (CpuStorage::F16(x), CpuStorage::F16(y)) => CpuStorage::F16(matmul_of(x, y, m, k, n)),
            (CpuStorage::F32(x), CpuStorage::F32(y)) => CpuStorage::F32(matmul_of(x, y, m, k, n)),
            (CpuStorage::F64(x), CpuStorage::F64(y)) => CpuStorage::F64(matmul_of(x, y, m, k, n)),
            (CpuStorage::I32(x), CpuStorage::I32(y)) => CpuStorage::I32(matmul_of(x, y, m, k, n)),
            (CpuStorage::I64(x), CpuStorage::I64(y)) => CpuStorage::I64(matmul_of(x, y, m, k, n)),
            _ => return Err(unsupported("matmul", a)),
        };
        Tensor::from_storage(storage, Shape::new(vec![m, n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use approx::assert_relative_eq;

    fn backend() -> CpuBackend {
        CpuBackend::new()
    }

    fn f32s(data: &[f32], dims: &[usize]) -> Tensor {
        Tensor::from_f32(data.to_vec(), Shape::from(dims)).unwrap()
    }

    #[test]
    fn test_matmul_identity() {
        let b = backend();
        // 2x2 identity @ [1,2;3,4]
        let a = f32s(&[1.0, 0.0, 0.0, 1.0], &[2, 2]);
        let x = f32s(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let c = b.matmul(&a, &x).unwrap();
        assert_eq!(c.as_f32().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_matmul_rectangular_i64() {
        let b = backend();
        // [1,2,3] @ [1;2;3] = [14]
        let a = Tensor::from_i64(vec![1, 2, 3], Shape::new(vec![1, 3])).unwrap();
        let x = Tensor::from_i64(vec![1, 2, 3], Shape::new(vec![3, 1])).unwrap();
        let c = b.matmul(&a, &x).unwrap();
        assert_eq!(c.shape().dims(), &[1, 1]);
        assert_eq!(c.storage(), &CpuStorage::I64(vec![14]));
    }

    #[test]
    fn test_matmul_dimension_mismatch() {
        let b = backend();
        let a = f32s(&[1.0, 2.0, 3.0], &[1, 3]);
        let x = f32s(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        assert!(matches!(
            b.matmul(&a, &x),
            Err(TensorError::MatmulMismatch { k: 3, k2: 2, .. })
        ));
    }

    #[test]
    fn test_add_sub_mul() {
        let b = backend();
        let x = f32s(&[1.0, 2.0], &[2]);
        let y = f32s(&[3.0, 4.0], &[2]);
        assert_eq!(b.add(&x, &y).unwrap().as_f32().unwrap(), &[4.0, 6.0]);
        assert_eq!(b.sub(&x, &y).unwrap().as_f32().unwrap(), &[-2.0, -2.0]);
        assert_eq!(b.mul(&x, &y).unwrap().as_f32().unwrap(), &[3.0, 8.0]);
    }

    #[test]
    fn test_f16_add() {
        let b = backend();
        let x = Tensor::from_f16(vec![f16::from_f32(0.5); 3], Shape::new(vec![3])).unwrap();
        let r = b.add(&x, &x).unwrap();
        assert_eq!(r.dtype(), DType::F16);
        for v in r.storage().to_f64_vec().unwrap() {
            assert_relative_eq!(v, 1.0);
        }
    }

    #[test]
    fn test_integer_overflow_wraps() {
        let b = backend();
        let x = Tensor::from_i32(vec![i32::MAX], Shape::new(vec![1])).unwrap();
        let one = Tensor::from_i32(vec![1], Shape::new(vec![1])).unwrap();
        assert_eq!(b.add(&x, &one).unwrap().storage(), &CpuStorage::I32(vec![i32::MIN]));
    }

    #[test]
    fn test_bool_logic() {
        let b = backend();
        let x = Tensor::from_bool(vec![true, false], Shape::new(vec![2])).unwrap();
        let y = Tensor::from_bool(vec![true, true], Shape::new(vec![2])).unwrap();
        assert_eq!(b.add(&x, &y).unwrap().storage(), &CpuStorage::Bool(vec![true, true]));
        assert_eq!(b.mul(&x, &y).unwrap().storage(), &CpuStorage::Bool(vec![true, false]));
        assert!(matches!(b.sub(&x, &y), Err(TensorError::UnsupportedDType(_))));
        assert!(matches!(b.neg(&x), Err(TensorError::UnsupportedDType(_))));
    }

    #[test]
    fn test_neg_relu() {
        let b = backend();
        let x = Tensor::from_f64(vec![-1.5, 0.0, 2.0], Shape::new(vec![3])).unwrap();
        assert_eq!(b.neg(&x).unwrap().storage(), &CpuStorage::F64(vec![1.5, -0.0, -2.0]));
        assert_eq!(b.relu(&x).unwrap().storage(), &CpuStorage::F64(vec![0.0, 0.0, 2.0]));
    }

    #[test]
    fn test_add_shape_mismatch() {
        let b = backend();
        let x = f32s(&[1.0], &[1]);
        let y = f32s(&[1.0, 2.0], &[2]);
        assert!(matches!(b.add(&x, &y), Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_add_dtype_mismatch() {
        let b = backend();
        let x = f32s(&[1.0], &[1]);
        let y = Tensor::from_f64(vec![1.0], Shape::new(vec![1])).unwrap();
        assert!(matches!(b.add(&x, &y), Err(TensorError::DTypeMismatch { .. })));
    }
}

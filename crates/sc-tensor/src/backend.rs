use std::fmt::Debug;

use crate::error::Result;
use crate::tensor::Tensor;

/// Trait for pluggable compute backends.
///
/// Both operands of a binary op must share a dtype. Element-wise ops require
/// identical shapes (no broadcasting). Every op returns a freshly allocated
/// tensor and never mutates its inputs.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu").
    fn name(&self) -> &str;

    /// Element-wise addition: result[i] = a[i] + b[i]. Logical or for bool.
    fn add(&self, a: &Tensor, b: &Tensor) -> Result<Tensor>;

    /// Element-wise subtraction: result[i] = a[i] - b[i].
    fn sub(&self, a: &Tensor, b: &Tensor) -> Result<Tensor>;

    /// Element-wise multiplication: result[i] = a[i] * b[i]. Logical and for bool.
    fn mul(&self, a: &Tensor, b: &Tensor) -> Result<Tensor>;

    /// Element-wise negation.
    fn neg(&self, a: &Tensor) -> Result<Tensor>;

    /// Element-wise max(x, 0).
    fn relu(&self, a: &Tensor) -> Result<Tensor>;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: shape [m, k]
    /// - `b`: shape [k, n]
    /// - Returns: shape [m, n]
    fn matmul(&self, a: &Tensor, b: &Tensor) -> Result<Tensor>;
}

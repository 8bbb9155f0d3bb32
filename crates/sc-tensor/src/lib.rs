//! `sc-tensor` - Tensor library with pluggable compute backends for stagecheck.
//!
//! This crate provides:
//! - A `Tensor` type backed by typed CPU storage
//! - A `ComputeBackend` trait for pluggable compute
//! - A reference `CpuBackend` implementation
//! - Shape utilities
//! - Data type definitions (F16, F32, F64, I32, I64, Bool)

pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use storage::CpuStorage;
pub use tensor::Tensor;

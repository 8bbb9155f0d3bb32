//! Op graph shared by the eager builder, the tracer and compiled programs.

use std::fmt;

use sc_tensor::{ComputeBackend, DType, Shape, Tensor, TensorError};

use crate::error::{CompileError, Result};

/// Identifier of a node, equal to its position in the owning node list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Metadata about a tensor, known before any data is materialized.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorMeta {
    pub shape: Shape,
    pub dtype: DType,
}

impl TensorMeta {
    pub fn new(dims: &[usize], dtype: DType) -> Self {
        TensorMeta {
            shape: Shape::from(dims),
            dtype,
        }
    }

    pub fn of(tensor: &Tensor) -> Self {
        TensorMeta {
            shape: tensor.shape().clone(),
            dtype: tensor.dtype(),
        }
    }
}

impl fmt::Display for TensorMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.dtype, self.shape)
    }
}

/// The operations a computation can be expressed in.
#[derive(Clone, Debug, PartialEq)]
pub enum OpKind {
    /// Positional program argument.
    Input(usize),
    /// Literal tensor embedded in the computation.
    Constant(Tensor),
    Add,
    Sub,
    Mul,
    Neg,
    Relu,
    MatMul,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Input(_) => "input",
            OpKind::Constant(_) => "constant",
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Neg => "neg",
            OpKind::Relu => "relu",
            OpKind::MatMul => "matmul",
        }
    }

    /// Number of operands the op consumes.
    pub fn arity(&self) -> usize {
        match self {
            OpKind::Input(_) | OpKind::Constant(_) => 0,
            OpKind::Neg | OpKind::Relu => 1,
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::MatMul => 2,
        }
    }

    /// True for ops computed from operands (everything but inputs and constants).
    pub fn is_compute(&self) -> bool {
        self.arity() > 0
    }
}

/// A node in a traced program.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub op: OpKind,
    pub inputs: Vec<NodeId>,
    pub meta: TensorMeta,
}

fn check_arity(op: &OpKind, got: usize) -> Result<()> {
    if op.arity() != got {
        return Err(CompileError::Arity {
            op: op.name().to_string(),
            expected: op.arity(),
            got,
        });
    }
    Ok(())
}

/// Infers the output metadata of a compute op from its operand metadata.
///
/// Mirrors the checks `CpuBackend` performs at run time, so a program that
/// traces cleanly never fails for shape or dtype reasons on execution.
pub fn infer_meta(op: &OpKind, inputs: &[&TensorMeta]) -> Result<TensorMeta> {
    check_arity(op, inputs.len())?;
    match op {
        OpKind::Input(_) => Err(CompileError::Trace(
            "input metadata comes from the static shape descriptor".to_string(),
        )),
        OpKind::Constant(t) => Ok(TensorMeta::of(t)),
        OpKind::Add | OpKind::Sub | OpKind::Mul => {
            let (a, b) = (inputs[0], inputs[1]);
            if a.dtype != b.dtype {
                return Err(TensorError::DTypeMismatch {
                    expected: a.dtype.to_string(),
                    got: b.dtype.to_string(),
                }
                .into());
            }
            if a.shape != b.shape {
                return Err(TensorError::ShapeMismatch {
                    expected: a.shape.dims().to_vec(),
                    got: b.shape.dims().to_vec(),
                }
                .into());
            }
            if matches!(op, OpKind::Sub) && a.dtype == DType::Bool {
                let msg = "sub is not defined for bool".to_string();
                return Err(TensorError::UnsupportedDType(msg).into());
            }
            Ok(a.clone())
        }
        OpKind::Neg | OpKind::Relu => {
            let a = inputs[0];
            if a.dtype == DType::Bool {
                let msg = format!("{} is not defined for bool", op.name());
                return Err(TensorError::UnsupportedDType(msg).into());
            }
            Ok(a.clone())
        }
        OpKind::MatMul => {
            let (a, b) = (inputs[0], inputs[1]);
            if a.shape.ndim() != 2 || b.shape.ndim() != 2 {
                return Err(TensorError::Other("matmul requires 2D tensors".to_string()).into());
            }
            if a.dtype != b.dtype {
                return Err(TensorError::DTypeMismatch {
                    expected: a.dtype.to_string(),
                    got: b.dtype.to_string(),
                }
                .into());
            }
            if a.dtype == DType::Bool {
                let msg = "matmul is not defined for bool".to_string();
                return Err(TensorError::UnsupportedDType(msg).into());
            }
            let (m, k, k2, n) = (a.shape.dim(0), a.shape.dim(1), b.shape.dim(0), b.shape.dim(1));
            if k != k2 {
                return Err(TensorError::MatmulMismatch { m, k, k2, n }.into());
            }
            Ok(TensorMeta::new(&[m, n], a.dtype))
        }
    }
}

/// Evaluates a compute op on concrete operands.
pub fn eval_op(backend: &dyn ComputeBackend, op: &OpKind, inputs: &[&Tensor]) -> Result<Tensor> {
    check_arity(op, inputs.len())?;
    let out = match op {
        OpKind::Input(_) => {
            return Err(CompileError::Trace("inputs are bound, not evaluated".to_string()));
        }
        OpKind::Constant(t) => t.clone(),
        OpKind::Add => backend.add(inputs[0], inputs[1])?,
        OpKind::Sub => backend.sub(inputs[0], inputs[1])?,
        OpKind::Mul => backend.mul(inputs[0], inputs[1])?,
        OpKind::Neg => backend.neg(inputs[0])?,
        OpKind::Relu => backend.relu(inputs[0])?,
        OpKind::MatMul => backend.matmul(inputs[0], inputs[1])?,
    };
    Ok(out)
}

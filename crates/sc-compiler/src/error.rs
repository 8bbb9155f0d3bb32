use thiserror::Error;

use crate::graph::TensorMeta;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("tensor error: {0}")]
    Tensor(#[from] sc_tensor::TensorError),
    #[error("node {0} does not exist")]
    UnknownNode(usize),
    #[error("{op} expects {expected} operand(s), got {got}")]
    Arity {
        op: String,
        expected: usize,
        got: usize,
    },
    #[error("shape check failed at node {node}: recorded {recorded}, inferred {inferred}")]
    ShapeCheck {
        node: usize,
        recorded: TensorMeta,
        inferred: TensorMeta,
    },
    #[error("input {index}: program expects {expected}, got {got}")]
    InputMismatch {
        index: usize,
        expected: String,
        got: String,
    },
    #[error("stage config key '{key}': expected {expected}, got {got}")]
    ConfigType {
        key: String,
        expected: String,
        got: String,
    },
    #[error("trace error: {0}")]
    Trace(String),
}

pub type Result<T> = std::result::Result<T, CompileError>;

use sc_tensor::{ComputeBackend, Tensor};

use crate::error::{CompileError, Result};
use crate::graph::{eval_op, infer_meta, Node, NodeId, OpKind, TensorMeta};
use crate::program::Program;

/// The interface computations are written against.
///
/// Implemented both by the eager evaluator and by the tracer, so one
/// `compute` body yields the reference result and the compiled program.
pub trait OpBuilder {
    /// Embed a literal tensor.
    fn constant(&mut self, tensor: Tensor) -> Result<NodeId>;

    /// Apply a compute op to previously produced nodes.
    fn apply(&mut self, op: OpKind, inputs: &[NodeId]) -> Result<NodeId>;

    fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply(OpKind::Add, &[a, b])
    }

    fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply(OpKind::Sub, &[a, b])
    }

    fn mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply(OpKind::Mul, &[a, b])
    }

    fn neg(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply(OpKind::Neg, &[a])
    }

    fn relu(&mut self, a: NodeId) -> Result<NodeId> {
        self.apply(OpKind::Relu, &[a])
    }

    fn matmul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.apply(OpKind::MatMul, &[a, b])
    }
}

/// Evaluates every op as soon as it is applied.
pub struct EagerBuilder<'a> {
    backend: &'a dyn ComputeBackend,
    values: Vec<Tensor>,
    n_inputs: usize,
}

impl<'a> EagerBuilder<'a> {
    /// Bind `inputs` as nodes `0..inputs.len()`.
    pub fn new(backend: &'a dyn ComputeBackend, inputs: Vec<Tensor>) -> Self {
        let n_inputs = inputs.len();
        EagerBuilder {
            backend,
            values: inputs,
            n_inputs,
        }
    }

    /// Node ids of the bound inputs, in order.
    pub fn inputs(&self) -> Vec<NodeId> {
        (0..self.n_inputs).map(NodeId).collect()
    }

    /// Returns the materialized values of `ids`.
    pub fn take(&self, ids: &[NodeId]) -> Result<Vec<Tensor>> {
        ids.iter().map(|&id| self.value(id).cloned()).collect()
    }

    fn value(&self, id: NodeId) -> Result<&Tensor> {
        self.values
            .get(id.index())
            .ok_or(CompileError::UnknownNode(id.index()))
    }
}

impl OpBuilder for EagerBuilder<'_> {
    fn constant(&mut self, tensor: Tensor) -> Result<NodeId> {
        self.values.push(tensor);
        Ok(NodeId(self.values.len() - 1))
    }

    fn apply(&mut self, op: OpKind, inputs: &[NodeId]) -> Result<NodeId> {
        let operands = inputs
            .iter()
            .map(|&id| self.value(id))
            .collect::<Result<Vec<_>>>()?;
        let out = eval_op(self.backend, &op, &operands)?;
        self.values.push(out);
        Ok(NodeId(self.values.len() - 1))
    }
}

/// Records ops into a static program instead of evaluating them.
pub struct Tracer {
    nodes: Vec<Node>,
    n_inputs: usize,
}

impl Tracer {
    /// Start a trace whose arguments have the given static metadata.
    pub fn new(static_shapes: &[TensorMeta]) -> Self {
        let nodes = static_shapes
            .iter()
            .enumerate()
            .map(|(i, meta)| Node {
                op: OpKind::Input(i),
                inputs: Vec::new(),
                meta: meta.clone(),
            })
            .collect();
        Tracer {
            nodes,
            n_inputs: static_shapes.len(),
        }
    }

    pub fn inputs(&self) -> Vec<NodeId> {
        (0..self.n_inputs).map(NodeId).collect()
    }

    /// Close the trace, marking `outputs` as the program results.
    pub fn finish(self, outputs: Vec<NodeId>) -> Result<Program> {
        Program::new(self.nodes, outputs)
    }

    fn meta(&self, id: NodeId) -> Result<&TensorMeta> {
        self.nodes
            .get(id.index())
            .map(|n| &n.meta)
            .ok_or(CompileError::UnknownNode(id.index()))
    }
}

impl OpBuilder for Tracer {
    fn constant(&mut self, tensor: Tensor) -> Result<NodeId> {
        let meta = TensorMeta::of(&tensor);
        self.nodes.push(Node {
            op: OpKind::Constant(tensor),
            inputs: Vec::new(),
            meta,
        });
        Ok(NodeId(self.nodes.len() - 1))
    }

    fn apply(&mut self, op: OpKind, inputs: &[NodeId]) -> Result<NodeId> {
        if !op.is_compute() {
            return Err(CompileError::Trace(format!("{} cannot be applied", op.name())));
        }
        let metas = inputs
            .iter()
            .map(|&id| self.meta(id))
            .collect::<Result<Vec<_>>>()?;
        let meta = infer_meta(&op, &metas)?;
        self.nodes.push(Node {
            op,
            inputs: inputs.to_vec(),
            meta,
        });
        Ok(NodeId(self.nodes.len() - 1))
    }
}

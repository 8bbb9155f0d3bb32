use std::fmt;

use sc_tensor::{ComputeBackend, Tensor};

use crate::error::{CompileError, Result};
use crate::graph::{eval_op, Node, NodeId, OpKind, TensorMeta};

/// A static, topologically ordered program produced by tracing.
///
/// Every node only refers to nodes that precede it, and each `Input(i)`
/// appears exactly once for `i` in `0..n_inputs`.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    nodes: Vec<Node>,
    outputs: Vec<NodeId>,
}

impl Program {
    /// Validates ordering and input numbering, then wraps the node list.
    pub fn new(nodes: Vec<Node>, outputs: Vec<NodeId>) -> Result<Self> {
        let mut seen_inputs = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            if let Some(bad) = node.inputs.iter().find(|id| id.index() >= i) {
                return Err(CompileError::UnknownNode(bad.index()));
            }
            if let OpKind::Input(k) = node.op {
                seen_inputs.push(k);
            }
        }
        seen_inputs.sort_unstable();
        if seen_inputs.iter().enumerate().any(|(i, &k)| i != k) {
            return Err(CompileError::Trace(format!(
                "program inputs must be numbered 0..n, found {seen_inputs:?}"
            )));
        }
        if let Some(bad) = outputs.iter().find(|id| id.index() >= nodes.len()) {
            return Err(CompileError::UnknownNode(bad.index()));
        }
        Ok(Program { nodes, outputs })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Static metadata of the program arguments, in argument order.
    pub fn input_metas(&self) -> Vec<TensorMeta> {
        let mut inputs: Vec<(usize, &TensorMeta)> = self
            .nodes
            .iter()
            .filter_map(|n| match n.op {
                OpKind::Input(k) => Some((k, &n.meta)),
                _ => None,
            })
            .collect();
        inputs.sort_by_key(|(k, _)| *k);
        inputs.into_iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn output_metas(&self) -> Vec<TensorMeta> {
        self.outputs
            .iter()
            .map(|id| self.nodes[id.index()].meta.clone())
            .collect()
    }

    /// Number of compute nodes (inputs and constants excluded).
    pub fn num_ops(&self) -> usize {
        self.nodes.iter().filter(|n| n.op.is_compute()).count()
    }

    /// Execute the program on `backend`.
    ///
    /// Arguments must match the static metadata the program was traced with.
    pub fn run(&self, backend: &dyn ComputeBackend, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let expected = self.input_metas();
        if expected.len() != inputs.len() {
            return Err(CompileError::InputMismatch {
                index: inputs.len().min(expected.len()),
                expected: format!("{} argument(s)", expected.len()),
                got: format!("{} argument(s)", inputs.len()),
            });
        }
        for (index, (meta, tensor)) in expected.iter().zip(inputs).enumerate() {
            let got = TensorMeta::of(tensor);
            if *meta != got {
                return Err(CompileError::InputMismatch {
                    index,
                    expected: meta.to_string(),
                    got: got.to_string(),
                });
            }
        }

        let mut values: Vec<Tensor> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let value = match &node.op {
                OpKind::Input(k) => inputs[*k].clone(),
                OpKind::Constant(t) => t.clone(),
                op => {
                    let operands: Vec<&Tensor> =
                        node.inputs.iter().map(|id| &values[id.index()]).collect();
                    eval_op(backend, op, &operands)?
                }
            };
            values.push(value);
        }
        Ok(self
            .outputs
            .iter()
            .map(|id| values[id.index()].clone())
            .collect())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            write!(f, "%{i} = {}", node.op.name())?;
            match &node.op {
                OpKind::Input(k) => write!(f, " #{k}")?,
                OpKind::Constant(_) => {}
                _ => {
                    for (j, id) in node.inputs.iter().enumerate() {
                        write!(f, "{}{id}", if j == 0 { " " } else { ", " })?;
                    }
                }
            }
            writeln!(f, " : {}", node.meta)?;
        }
        write!(f, "return")?;
        for (j, id) in self.outputs.iter().enumerate() {
            write!(f, "{}{id}", if j == 0 { " " } else { ", " })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{OpBuilder, Tracer};
    use sc_tensor::{CpuBackend, DType, Shape};

    fn relu_sum() -> Program {
        let meta = TensorMeta::new(&[2], DType::I64);
        let mut t = Tracer::new(&[meta.clone(), meta]);
        let ids = t.inputs();
        let s = t.add(ids[0], ids[1]).unwrap();
        let r = t.relu(s).unwrap();
        t.finish(vec![r]).unwrap()
    }

    #[test]
    fn test_run() {
        let program = relu_sum();
        let a = Tensor::from_i64(vec![1, -5], Shape::new(vec![2])).unwrap();
        let b = Tensor::from_i64(vec![2, 1], Shape::new(vec![2])).unwrap();
        let out = program.run(&CpuBackend::new(), &[a, b]).unwrap();
        assert_eq!(out, vec![Tensor::from_i64(vec![3, 0], Shape::new(vec![2])).unwrap()]);
        assert_eq!(program.num_ops(), 2);
    }

    #[test]
    fn test_run_rejects_wrong_inputs() {
        let program = relu_sum();
        let a = Tensor::from_i64(vec![1, -5], Shape::new(vec![2])).unwrap();
        let wrong = Tensor::from_i32(vec![1, 2], Shape::new(vec![2])).unwrap();
        let err = program.run(&CpuBackend::new(), &[a.clone(), wrong]).unwrap_err();
        assert!(matches!(err, CompileError::InputMismatch { index: 1, .. }));
        let err = program.run(&CpuBackend::new(), &[a]).unwrap_err();
        assert!(matches!(err, CompileError::InputMismatch { .. }));
    }

    #[test]
    fn test_new_rejects_forward_reference() {
        let meta = TensorMeta::new(&[1], DType::F32);
        let nodes = vec![Node {
            op: OpKind::Neg,
            inputs: vec![NodeId(0)],
            meta,
        }];
        assert!(Program::new(nodes, vec![NodeId(0)]).is_err());
    }

    #[test]
    fn test_display() {
        let text = relu_sum().to_string();
        assert!(text.contains("%2 = add %0, %1 : i64[2]"), "{text}");
        assert!(text.ends_with("return %3"), "{text}");
    }
}

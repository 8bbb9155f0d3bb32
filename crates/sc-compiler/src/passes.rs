//! Program-to-program rewrites, each gated by a stage configuration key.
//!
//! Rewrites walk the node list in order and build a fresh one, keeping a
//! `remap` table from old ids to new ids. A node that becomes an alias of an
//! earlier node maps to that node and is not copied.

use tracing::trace;

use crate::error::{CompileError, Result};
use crate::graph::{infer_meta, Node, NodeId, OpKind, TensorMeta};
use crate::program::Program;

enum Rewrite {
    /// Copy the node with remapped operands.
    Keep,
    /// Replace all uses with an existing (new-numbering) node.
    Alias(NodeId),
    /// Remove the node. Only valid when nothing live refers to it.
    Drop,
    /// Emit these nodes instead; the last one replaces the original.
    /// Operand ids refer to the new numbering; `Pending(i)` points at the
    /// i-th node of this same replacement.
    Expand(Vec<(OpKind, Vec<Operand>, TensorMeta)>),
}

#[derive(Clone, Copy)]
enum Operand {
    Existing(NodeId),
    Pending(usize),
}

fn rewrite(
    program: &Program,
    mut f: impl FnMut(&[Node], &Node, &[NodeId]) -> Rewrite,
) -> Result<Program> {
    let mut nodes: Vec<Node> = Vec::with_capacity(program.nodes().len());
    let mut remap: Vec<NodeId> = Vec::with_capacity(program.nodes().len());
    for node in program.nodes() {
        let inputs: Vec<NodeId> = node.inputs.iter().map(|id| remap[id.index()]).collect();
        match f(&nodes, node, &inputs) {
            Rewrite::Keep => {
                nodes.push(Node {
                    op: node.op.clone(),
                    inputs,
                    meta: node.meta.clone(),
                });
                remap.push(NodeId(nodes.len() - 1));
            }
            Rewrite::Alias(id) => remap.push(id),
            // Only read by other dropped nodes.
            Rewrite::Drop => remap.push(NodeId(usize::MAX)),
            Rewrite::Expand(replacement) => {
                let base = nodes.len();
                for (op, operands, meta) in replacement {
                    let inputs = operands
                        .into_iter()
                        .map(|o| match o {
                            Operand::Existing(id) => id,
                            Operand::Pending(i) => NodeId(base + i),
                        })
                        .collect();
                    nodes.push(Node { op, inputs, meta });
                }
                remap.push(NodeId(nodes.len() - 1));
            }
        }
    }
    let outputs = program.outputs().iter().map(|id| remap[id.index()]).collect();
    Program::new(nodes, outputs)
}

fn is_constant(nodes: &[Node], id: NodeId, value: i64) -> bool {
    matches!(&nodes[id.index()].op, OpKind::Constant(t) if t.all_equal_to(value))
}

/// Applies `x+0`, `0+x`, `x-0`, `x*1`, `1*x` and `--x` identities.
///
/// Only elementwise ops are touched, so an alias always has the same
/// metadata as the node it replaces.
pub fn simplify(program: &Program) -> Result<Program> {
    let mut folded = 0usize;
    let out = rewrite(program, |nodes, node, inputs| {
        let alias = match (&node.op, inputs) {
            (OpKind::Add, [a, b]) if is_constant(nodes, *b, 0) => Some(*a),
            (OpKind::Add, [a, b]) if is_constant(nodes, *a, 0) => Some(*b),
            (OpKind::Sub, [a, b]) if is_constant(nodes, *b, 0) => Some(*a),
            (OpKind::Mul, [a, b]) if is_constant(nodes, *b, 1) => Some(*a),
            (OpKind::Mul, [a, b]) if is_constant(nodes, *a, 1) => Some(*b),
            (OpKind::Neg, [a]) => match &nodes[a.index()] {
                Node {
                    op: OpKind::Neg,
                    inputs: inner,
                    ..
                } => Some(inner[0]),
                _ => None,
            },
            _ => None,
        };
        match alias {
            Some(id) => {
                folded += 1;
                Rewrite::Alias(id)
            }
            None => Rewrite::Keep,
        }
    })?;
    trace!(folded, "simplify");
    Ok(out)
}

/// Re-infers every node's metadata and compares it with what was recorded.
pub fn check_shapes(program: &Program) -> Result<()> {
    let nodes = program.nodes();
    for (i, node) in nodes.iter().enumerate() {
        if matches!(node.op, OpKind::Input(_)) {
            continue;
        }
        let metas: Vec<&TensorMeta> =
            node.inputs.iter().map(|id| &nodes[id.index()].meta).collect();
        let inferred = infer_meta(&node.op, &metas)?;
        if inferred != node.meta {
            return Err(CompileError::ShapeCheck {
                node: i,
                recorded: node.meta.clone(),
                inferred,
            });
        }
    }
    Ok(())
}

/// Lowers `a - b` into `a + neg(b)`.
pub fn decompose(program: &Program) -> Result<Program> {
    rewrite(program, |_, node, inputs| match (&node.op, inputs) {
        (OpKind::Sub, [a, b]) => Rewrite::Expand(vec![
            (OpKind::Neg, vec![Operand::Existing(*b)], node.meta.clone()),
            (
                OpKind::Add,
                vec![Operand::Existing(*a), Operand::Pending(0)],
                node.meta.clone(),
            ),
        ]),
        _ => Rewrite::Keep,
    })
}

/// Removes nodes that no output depends on. Inputs are always kept so the
/// program signature does not change.
pub fn eliminate_dead_code(program: &Program) -> Result<Program> {
    let nodes = program.nodes();
    let mut live = vec![false; nodes.len()];
    for id in program.outputs() {
        live[id.index()] = true;
    }
    for i in (0..nodes.len()).rev() {
        if live[i] {
            for id in &nodes[i].inputs {
                live[id.index()] = true;
            }
        }
    }
    let mut removed = 0usize;
    let mut index = 0usize;
    let out = rewrite(program, |_, node, _| {
        let keep = live[index] || matches!(node.op, OpKind::Input(_));
        index += 1;
        if keep {
            Rewrite::Keep
        } else {
            removed += 1;
            Rewrite::Drop
        }
    })?;
    trace!(removed, "eliminate_dead_code");
    Ok(out)
}

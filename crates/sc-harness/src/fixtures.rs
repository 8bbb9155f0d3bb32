//! Ready-made computations for the `stagecheck` suite and for tests.

use std::rc::Rc;

use sc_compiler::{Computation, NodeId, OpBuilder, Result, TensorMeta};
use sc_tensor::{DType, Shape, Tensor};

/// `a + b` over two random tensors.
#[derive(Debug, Clone)]
pub struct ElementwiseAdd {
    name: String,
    dims: Vec<usize>,
    dtype: DType,
    seed: u64,
}

impl ElementwiseAdd {
    pub fn new(dims: &[usize], dtype: DType, seed: u64) -> Self {
        ElementwiseAdd {
            name: format!("add_{dtype}{}", Shape::new(dims.to_vec())),
            dims: dims.to_vec(),
            dtype,
            seed,
        }
    }
}

impl Computation for ElementwiseAdd {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_inputs(&self) -> Result<Vec<Tensor>> {
        let shape = Shape::new(self.dims.clone());
        Ok(vec![
            Tensor::rand(self.dtype, shape.clone(), self.seed),
            Tensor::rand(self.dtype, shape, self.seed.wrapping_add(1)),
        ])
    }

    fn compute(&self, g: &mut dyn OpBuilder, inputs: &[NodeId]) -> Result<Vec<NodeId>> {
        Ok(vec![g.add(inputs[0], inputs[1])?])
    }

    fn static_shapes(&self) -> Vec<TensorMeta> {
        vec![TensorMeta::new(&self.dims, self.dtype); 2]
    }
}

/// `relu(x @ w)` for `x: [m, k]`, `w: [k, n]`.
#[derive(Debug, Clone)]
pub struct MatMulRelu {
    name: String,
    m: usize,
    k: usize,
    n: usize,
    seed: u64,
}

impl MatMulRelu {
    pub fn new(m: usize, k: usize, n: usize, seed: u64) -> Self {
        MatMulRelu {
            name: format!("matmul_relu_f32[{m}, {k}]x[{k}, {n}]"),
            m,
            k,
            n,
            seed,
        }
    }
}

impl Computation for MatMulRelu {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_inputs(&self) -> Result<Vec<Tensor>> {
        Ok(vec![
            Tensor::rand(DType::F32, Shape::new(vec![self.m, self.k]), self.seed),
            Tensor::rand(DType::F32, Shape::new(vec![self.k, self.n]), self.seed.wrapping_add(1)),
        ])
    }

    fn compute(&self, g: &mut dyn OpBuilder, inputs: &[NodeId]) -> Result<Vec<NodeId>> {
        let y = g.matmul(inputs[0], inputs[1])?;
        Ok(vec![g.relu(y)?])
    }

    fn static_shapes(&self) -> Vec<TensorMeta> {
        vec![
            TensorMeta::new(&[self.m, self.k], DType::F32),
            TensorMeta::new(&[self.k, self.n], DType::F32),
        ]
    }
}

/// Two outputs, `relu(x*1 - y) + 0` and `--(x*1 - y)`, plus an unused `x*y`.
///
/// Written with identities, a subtraction and a dead node so that every
/// pass has something to rewrite.
#[derive(Debug, Clone)]
pub struct Residual {
    name: String,
    len: usize,
    seed: u64,
}

impl Residual {
    pub fn new(len: usize, seed: u64) -> Self {
        Residual {
            name: format!("residual_f32[{len}]"),
            len,
            seed,
        }
    }

    fn shape(&self) -> Shape {
        Shape::new(vec![self.len])
    }
}

impl Computation for Residual {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_inputs(&self) -> Result<Vec<Tensor>> {
        Ok(vec![
            Tensor::rand(DType::F32, self.shape(), self.seed),
            Tensor::rand(DType::F32, self.shape(), self.seed.wrapping_add(1)),
        ])
    }

    fn compute(&self, g: &mut dyn OpBuilder, inputs: &[NodeId]) -> Result<Vec<NodeId>> {
        let (x, y) = (inputs[0], inputs[1]);
        let one = g.constant(Tensor::ones(DType::F32, self.shape()))?;
        let zero = g.constant(Tensor::zeros(DType::F32, self.shape()))?;
        let _unused = g.mul(x, y)?;
        let x1 = g.mul(x, one)?;
        let d = g.sub(x1, y)?;
        let r = g.relu(d)?;
        let first = g.add(r, zero)?;
        let nd = g.neg(d)?;
        let second = g.neg(nd)?;
        Ok(vec![first, second])
    }

    fn static_shapes(&self) -> Vec<TensorMeta> {
        vec![TensorMeta::new(&[self.len], DType::F32); 2]
    }
}

/// The suite `stagecheck` runs.
pub fn default_suite() -> Vec<Rc<dyn Computation>> {
    vec![
        Rc::new(ElementwiseAdd::new(&[4], DType::F32, 0)),
        Rc::new(ElementwiseAdd::new(&[2, 3], DType::F16, 1)),
        Rc::new(ElementwiseAdd::new(&[8], DType::I32, 2)),
        Rc::new(MatMulRelu::new(2, 3, 4, 3)),
        Rc::new(Residual::new(5, 4)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_compiler::{EagerExecutable, Executable, PassOptions, StagedCompiler};
    use sc_tensor::CpuBackend;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_names_are_unique() {
        let suite = default_suite();
        let names: HashSet<&str> = suite.iter().map(|c| c.name()).collect();
        assert_eq!(names.len(), suite.len());
        assert_eq!(ElementwiseAdd::new(&[4], DType::F32, 0).name(), "add_f32[4]");
    }

    #[test]
    fn test_inputs_match_static_shapes() {
        for c in default_suite() {
            let inputs = c.build_inputs().unwrap();
            let metas: Vec<TensorMeta> = inputs.iter().map(TensorMeta::of).collect();
            assert_eq!(metas, c.static_shapes(), "{}", c.name());
        }
    }

    #[test]
    fn test_residual_is_rewritten_by_every_pass() {
        let compiler = StagedCompiler::new(Arc::new(CpuBackend::new()), PassOptions::all());
        let residual = Residual::new(5, 4);
        let traced = compiler.trace(&residual).unwrap();
        let lowered = compiler.compile(&residual, true).unwrap();
        assert_ne!(traced.num_ops(), lowered.program().num_ops());

        let inputs = residual.build_inputs().unwrap();
        let eager = EagerExecutable::new(Rc::new(residual.clone()));
        assert_eq!(eager.run(&inputs).unwrap(), lowered.run(&inputs).unwrap());
    }
}

use std::sync::Arc;

use sc_tensor::{ComputeBackend, CpuBackend};
use tracing::debug;

use crate::builder::Tracer;
use crate::computation::Computation;
use crate::config::PassOptions;
use crate::error::Result;
use crate::executable::CompiledExecutable;
use crate::passes;
use crate::program::Program;

/// Traces computations and lowers them according to one pipeline stage.
///
/// Without the target backend only the target-independent passes run and the
/// program executes on the reference `CpuBackend`; with it, the lowering
/// passes run too and execution goes to `target`.
#[derive(Debug, Clone)]
pub struct StagedCompiler {
    target: Arc<dyn ComputeBackend>,
    reference: Arc<dyn ComputeBackend>,
    options: PassOptions,
}

impl StagedCompiler {
    pub fn new(target: Arc<dyn ComputeBackend>, options: PassOptions) -> Self {
        StagedCompiler {
            target,
            reference: Arc::new(CpuBackend::new()),
            options,
        }
    }

    pub fn options(&self) -> PassOptions {
        self.options
    }

    pub fn target(&self) -> &Arc<dyn ComputeBackend> {
        &self.target
    }

    /// Record `computation` into a static program over its static shapes.
    pub fn trace(&self, computation: &dyn Computation) -> Result<Program> {
        let mut tracer = Tracer::new(&computation.static_shapes());
        let inputs = tracer.inputs();
        let outputs = computation.compute(&mut tracer, &inputs)?;
        let program = tracer.finish(outputs)?;
        debug!(
            computation = computation.name(),
            nodes = program.nodes().len(),
            ops = program.num_ops(),
            "traced"
        );
        Ok(program)
    }

    /// Run the enabled passes over a traced program.
    pub fn lower(&self, mut program: Program, use_backend: bool) -> Result<Program> {
        let o = self.options;
        if o.simplify {
            program = passes::simplify(&program)?;
        }
        if o.check_shapes {
            passes::check_shapes(&program)?;
        }
        if use_backend {
            if o.decompose {
                program = passes::decompose(&program)?;
                if o.check_shapes {
                    passes::check_shapes(&program)?;
                }
            }
            if o.eliminate_dead_code {
                program = passes::eliminate_dead_code(&program)?;
            }
        }
        Ok(program)
    }

    /// Trace, lower and bind `computation` to its execution backend.
    pub fn compile(
        &self,
        computation: &dyn Computation,
        use_backend: bool,
    ) -> Result<CompiledExecutable> {
        let program = self.lower(self.trace(computation)?, use_backend)?;
        let (backend, label) = if use_backend {
            (Arc::clone(&self.target), format!("compiled+{}", self.target.name()))
        } else {
            (Arc::clone(&self.reference), "compiled".to_string())
        };
        debug!(computation = computation.name(), %label, ops = program.num_ops(), "compiled");
        Ok(CompiledExecutable::new(program, backend, label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::OpBuilder;
    use crate::executable::Executable;
    use crate::graph::{NodeId, TensorMeta};
    use sc_tensor::{DType, Shape, Tensor};

    /// relu(a - b) + 0
    struct Diff;

    impl Computation for Diff {
        fn name(&self) -> &str {
            "diff"
        }

        fn build_inputs(&self) -> Result<Vec<Tensor>> {
            Ok(vec![
                Tensor::rand(DType::F32, Shape::new(vec![2, 2]), 1),
                Tensor::rand(DType::F32, Shape::new(vec![2, 2]), 2),
            ])
        }

        fn compute(&self, g: &mut dyn OpBuilder, inputs: &[NodeId]) -> Result<Vec<NodeId>> {
            let d = g.sub(inputs[0], inputs[1])?;
            let r = g.relu(d)?;
            let zero = g.constant(Tensor::zeros(DType::F32, Shape::new(vec![2, 2])))?;
            Ok(vec![g.add(r, zero)?])
        }

        fn static_shapes(&self) -> Vec<TensorMeta> {
            vec![TensorMeta::new(&[2, 2], DType::F32); 2]
        }
    }

    fn compiler(options: PassOptions) -> StagedCompiler {
        StagedCompiler::new(Arc::new(CpuBackend::new()), options)
    }

    #[test]
    fn test_trace() {
        let program = compiler(PassOptions::default()).trace(&Diff).unwrap();
        assert_eq!(program.num_ops(), 3);
        assert_eq!(program.output_metas(), vec![TensorMeta::new(&[2, 2], DType::F32)]);
    }

    #[test]
    fn test_lowering_depends_on_backend_flag() {
        let c = compiler(PassOptions::all());
        let without = c.compile(&Diff, false).unwrap();
        let with = c.compile(&Diff, true).unwrap();
        // simplify drops the +0; decompose turns sub into neg+add
        assert_eq!(without.program().num_ops(), 2);
        assert_eq!(with.program().num_ops(), 3);
        assert_eq!(without.label(), "compiled");
        assert_eq!(with.label(), "compiled+cpu");
        assert_eq!(with.backend_name(), "cpu");
    }

    #[test]
    fn test_compiled_matches_eager() {
        let inputs = Diff.build_inputs().unwrap();
        let eager = crate::executable::EagerExecutable::new(std::rc::Rc::new(Diff));
        let expected = eager.run(&inputs).unwrap();
        for use_backend in [false, true] {
            let compiled = compiler(PassOptions::all()).compile(&Diff, use_backend).unwrap();
            assert_eq!(compiled.run(&inputs).unwrap(), expected);
        }
    }
}

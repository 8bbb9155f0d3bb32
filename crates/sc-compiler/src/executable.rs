use std::rc::Rc;
use std::sync::Arc;

use sc_tensor::{ComputeBackend, CpuBackend, Tensor};

use crate::builder::EagerBuilder;
use crate::computation::Computation;
use crate::error::{CompileError, Result};
use crate::program::Program;

/// A runnable form of a computation.
pub trait Executable {
    /// Short description used in logs and failure reports.
    fn label(&self) -> &str;

    fn run(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>>;
}

/// Runs the computation op by op on the reference backend.
pub struct EagerExecutable {
    computation: Rc<dyn Computation>,
    backend: CpuBackend,
}

impl EagerExecutable {
    pub fn new(computation: Rc<dyn Computation>) -> Self {
        EagerExecutable {
            computation,
            backend: CpuBackend::new(),
        }
    }
}

impl Executable for EagerExecutable {
    fn label(&self) -> &str {
        "eager"
    }

    /// Only the argument count is checked; `compute` sees every argument.
    fn run(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let expected = self.computation.static_shapes().len();
        if expected != inputs.len() {
            return Err(CompileError::InputMismatch {
                index: inputs.len().min(expected),
                expected: format!("{expected} argument(s)"),
                got: format!("{} argument(s)", inputs.len()),
            });
        }
        let mut g = EagerBuilder::new(&self.backend, inputs.to_vec());
        let ids = g.inputs();
        let outputs = self.computation.compute(&mut g, &ids)?;
        g.take(&outputs)
    }
}

/// A traced and lowered program bound to the backend it executes on.
pub struct CompiledExecutable {
    program: Program,
    backend: Arc<dyn ComputeBackend>,
    label: String,
}

impl CompiledExecutable {
    pub fn new(program: Program, backend: Arc<dyn ComputeBackend>, label: String) -> Self {
        CompiledExecutable {
            program,
            backend,
            label,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

impl Executable for CompiledExecutable {
    fn label(&self) -> &str {
        &self.label
    }

    fn run(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        self.program.run(self.backend.as_ref(), inputs)
    }
}

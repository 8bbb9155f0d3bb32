//! Runs computations through the selected variant and checks them against
//! eager execution.

use std::fmt;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;

use sc_compiler::{CompileError, Computation, StagedCompiler};
use sc_tensor::ComputeBackend;
use tracing::{debug, error, info, warn};

use crate::bisect::{PredecessorOracle, RegressionBisector, SubprocessOracle};
use crate::compare::{Mismatch, Output, OutputComparator};
use crate::context::ActiveStageContext;
use crate::variant::{VariantCache, VariantKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// Both variants ran but disagree.
    Mismatch(Mismatch),
    /// A variant could not be built or run.
    Execution { variant: VariantKind, error: CompileError },
    /// The computation could not produce its arguments.
    Inputs(CompileError),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Mismatch(m) => write!(f, "{m}"),
            Failure::Execution { variant, error } => write!(f, "{variant} variant failed: {error}"),
            Failure::Inputs(e) => write!(f, "could not build inputs: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome {
    Passed,
    /// The previous stage already fails, so this stage is not blamed.
    Skipped { predecessor: String },
    Failed(Failure),
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Passed => write!(f, "ok"),
            TestOutcome::Skipped { predecessor } => {
                write!(f, "skipped (stage '{predecessor}' already fails)")
            }
            TestOutcome::Failed(failure) => write!(f, "FAILED: {failure}"),
        }
    }
}

impl TestOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TestOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub name: String,
    pub outcome: TestOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteReport {
    pub tests: Vec<TestReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, TestOutcome::Passed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TestOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(TestOutcome::is_failed)
    }

    /// Skips do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    fn count(&self, f: impl Fn(&TestOutcome) -> bool) -> usize {
        self.tests.iter().filter(|t| f(&t.outcome)).count()
    }
}

/// Runs tests for one process-wide stage selection.
pub struct HarnessRunner<O = SubprocessOracle> {
    context: ActiveStageContext,
    bisector: RegressionBisector<O>,
    cache: VariantCache,
}

impl HarnessRunner<SubprocessOracle> {
    /// Bisects by replaying the current process.
    pub fn from_context(context: ActiveStageContext, target: Arc<dyn ComputeBackend>) -> Self {
        let oracle = SubprocessOracle::current_process().with_timeout(context.bisect_timeout());
        Self::with_oracle(context, target, oracle)
    }
}

impl<O: PredecessorOracle> HarnessRunner<O> {
    pub fn with_oracle(
        context: ActiveStageContext,
        target: Arc<dyn ComputeBackend>,
        oracle: O,
    ) -> Self {
        let compiler = StagedCompiler::new(target, context.pass_options());
        HarnessRunner {
            context,
            bisector: RegressionBisector::new(oracle),
            cache: VariantCache::new(compiler),
        }
    }

    pub fn context(&self) -> &ActiveStageContext {
        &self.context
    }

    pub fn cache(&self) -> &VariantCache {
        &self.cache
    }

    pub fn bisector(&self) -> &RegressionBisector<O> {
        &self.bisector
    }

    /// Eager when JIT is off, otherwise the compiled variant the backend flag picks.
    pub fn selected_variant(&self) -> VariantKind {
        if self.context.jit_enabled() {
            VariantKind::compiled(self.context.backend_enabled())
        } else {
            VariantKind::Eager
        }
    }

    pub fn run(&self, definition: &Rc<dyn Computation>) -> TestOutcome {
        let name = definition.name();
        if self.bisector.predecessor_failed(&self.context) {
            let predecessor = self
                .context
                .predecessor()
                .map(|s| s.name().to_string())
                .unwrap_or_default();
            info!(test = name, %predecessor, "skipped; previous stage already fails");
            return TestOutcome::Skipped { predecessor };
        }

        let variant = self.selected_variant();
        debug!(test = name, %variant, "running");
        let outcome = match self.check(definition, variant) {
            Ok(()) => TestOutcome::Passed,
            Err(failure) => TestOutcome::Failed(failure),
        };
        match &outcome {
            TestOutcome::Passed => info!(test = name, %variant, "passed"),
            TestOutcome::Failed(f @ Failure::Mismatch(_)) => warn!(test = name, %variant, "{f}"),
            TestOutcome::Failed(f) => error!(test = name, %variant, "{f}"),
            TestOutcome::Skipped { .. } => {}
        }
        outcome
    }

    pub fn run_suite(&self, definitions: &[Rc<dyn Computation>]) -> SuiteReport {
        let tests: Vec<TestReport> = definitions
            .iter()
            .map(|d| TestReport {
                name: d.name().to_string(),
                outcome: self.run(d),
            })
            .collect();
        let report = SuiteReport { tests };
        info!(
            passed = report.passed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "suite finished"
        );
        report
    }

    fn check(&self, definition: &Rc<dyn Computation>, variant: VariantKind) -> Result<(), Failure> {
        let inputs = definition.build_inputs().map_err(Failure::Inputs)?;
        let expected = self
            .cache
            .get_eager(definition)
            .run(&inputs)
            .map_err(|error| Failure::Execution {
                variant: VariantKind::Eager,
                error,
            })?;
        let actual = self
            .cache
            .get(definition, variant)
            .and_then(|exe| exe.run(&inputs))
            .map_err(|error| Failure::Execution { variant, error })?;

        let comparator = OutputComparator::new(self.context.tolerances());
        let outcome =
            comparator.compare(&Output::from_tensors(expected), &Output::from_tensors(actual));
        match outcome.first_mismatch {
            None => Ok(()),
            Some(m) => Err(Failure::Mismatch(m)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env;
    use crate::stage::{Stage, StagePipeline};
    use sc_compiler::{NodeId, OpBuilder, StageConfig, TensorMeta};
    use sc_tensor::{CpuBackend, DType, Shape, Tensor};
    use std::collections::HashMap;

    struct AddPair;

    impl Computation for AddPair {
        fn name(&self) -> &str {
            "add_f32_4"
        }

        fn build_inputs(&self) -> sc_compiler::Result<Vec<Tensor>> {
            Ok(vec![
                Tensor::rand(DType::F32, Shape::new(vec![4]), 11),
                Tensor::rand(DType::F32, Shape::new(vec![4]), 12),
            ])
        }

        fn compute(
            &self,
            g: &mut dyn OpBuilder,
            inputs: &[NodeId],
        ) -> sc_compiler::Result<Vec<NodeId>> {
            Ok(vec![g.add(inputs[0], inputs[1])?])
        }

        fn static_shapes(&self) -> Vec<TensorMeta> {
            vec![TensorMeta::new(&[4], DType::F32); 2]
        }
    }

    struct NoInputs;

    impl Computation for NoInputs {
        fn name(&self) -> &str {
            "no_inputs"
        }

        fn build_inputs(&self) -> sc_compiler::Result<Vec<Tensor>> {
            Err(CompileError::Trace("fixture unavailable".to_string()))
        }

        fn compute(
            &self,
            _: &mut dyn OpBuilder,
            inputs: &[NodeId],
        ) -> sc_compiler::Result<Vec<NodeId>> {
            Ok(inputs.to_vec())
        }

        fn static_shapes(&self) -> Vec<TensorMeta> {
            vec![]
        }
    }

    fn runner(vars: &[(&str, &str)], failed: bool) -> HarnessRunner<impl PredecessorOracle> {
        let source: HashMap<&str, &str> = vars.iter().copied().collect();
        let ctx = ActiveStageContext::from_env(StagePipeline::default_pipeline(), &source).unwrap();
        HarnessRunner::with_oracle(ctx, Arc::new(CpuBackend::new()), move |_: &Stage| failed)
    }

    #[test]
    fn test_eager_vs_compiled_without_backend() {
        let r = runner(&[(env::BACKEND_VAR, "0")], false);
        assert_eq!(r.selected_variant(), VariantKind::CompiledWithoutBackend);
        let def: Rc<dyn Computation> = Rc::new(AddPair);
        assert_eq!(r.run(&def), TestOutcome::Passed);
    }

    #[test]
    fn test_variant_selection() {
        assert_eq!(runner(&[], false).selected_variant(), VariantKind::CompiledWithBackend);
        assert_eq!(runner(&[(env::JIT_VAR, "off")], false).selected_variant(), VariantKind::Eager);
        assert_eq!(
            runner(&[(env::JIT_VAR, "off"), (env::BACKEND_VAR, "off")], false).selected_variant(),
            VariantKind::Eager
        );
    }

    #[test]
    fn test_skip_when_predecessor_failed() {
        let r = runner(&[(env::STAGE_VAR, "backend-lowering-final"), (env::DIFF_VAR, "1")], true);
        let defs: Vec<Rc<dyn Computation>> = vec![Rc::new(AddPair), Rc::new(AddPair)];
        let report = r.run_suite(&defs);
        assert_eq!(report.skipped(), 2);
        assert!(report.is_success());
        assert_eq!(
            report.tests[0].outcome,
            TestOutcome::Skipped {
                predecessor: "backend-lowering-frontend".to_string()
            }
        );
        // nothing was built for skipped tests
        assert!(r.cache().is_empty());
    }

    #[test]
    fn test_input_failure() {
        let r = runner(&[], false);
        let def: Rc<dyn Computation> = Rc::new(NoInputs);
        let outcome = r.run(&def);
        assert!(matches!(outcome, TestOutcome::Failed(Failure::Inputs(_))));
        let report = r.run_suite(&[def]);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_compile_failure_names_variant() {
        // jit pinned off by the stage, then forced back on by the environment
        let config = StageConfig::new().with("jit", false);
        let pipeline = StagePipeline::new(vec![Stage::new("s", config)]).unwrap();
        let source = HashMap::from([(env::STAGE_VAR, "s")]);
        let ctx = ActiveStageContext::from_env(pipeline, &source).unwrap();
        let r = HarnessRunner::with_oracle(ctx, Arc::new(CpuBackend::new()), |_: &Stage| false);
        assert_eq!(r.selected_variant(), VariantKind::Eager);

        let source = HashMap::from([(env::JIT_VAR, "1")]);
        let ctx = ActiveStageContext::from_env(StagePipeline::default_pipeline(), &source).unwrap();
        let r = HarnessRunner::with_oracle(ctx, Arc::new(CpuBackend::new()), |_: &Stage| false);

        struct Untraceable;
        impl Computation for Untraceable {
            fn name(&self) -> &str {
                "untraceable"
            }
            fn build_inputs(&self) -> sc_compiler::Result<Vec<Tensor>> {
                Ok(vec![Tensor::rand(DType::F32, Shape::new(vec![2]), 3)])
            }
            fn compute(
                &self,
                g: &mut dyn OpBuilder,
                inputs: &[NodeId],
            ) -> sc_compiler::Result<Vec<NodeId>> {
                Ok(vec![g.neg(inputs[0])?])
            }
            fn static_shapes(&self) -> Vec<TensorMeta> {
                vec![TensorMeta::new(&[2], DType::Bool)]
            }
        }

        let def: Rc<dyn Computation> = Rc::new(Untraceable);
        match r.run(&def) {
            TestOutcome::Failed(Failure::Execution { variant, .. }) => {
                assert_eq!(variant, VariantKind::CompiledWithBackend)
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

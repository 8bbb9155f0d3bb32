//! Runs the fixture suite against the stage selected by `STAGECHECK_STAGE`.
//!
//! Positional arguments are substring filters on test names. Bisection
//! re-executes this binary with the same arguments, so a replay runs the same
//! tests. Exit status: 0 when nothing failed, 1 on test failures, 2 on a
//! configuration error.

use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;

use sc_compiler::Computation;
use sc_harness::fixtures::default_suite;
use sc_harness::{ActiveStageContext, HarnessRunner, StagePipeline};
use sc_tensor::CpuBackend;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let context = match ActiveStageContext::from_process_env(StagePipeline::default_pipeline()) {
        Ok(context) => context,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(2);
        }
    };

    let filters: Vec<String> = std::env::args().skip(1).collect();
    let suite: Vec<Rc<dyn Computation>> = default_suite()
        .into_iter()
        .filter(|c| filters.is_empty() || filters.iter().any(|f| c.name().contains(f.as_str())))
        .collect();

    let runner = HarnessRunner::from_context(context, Arc::new(CpuBackend::new()));
    let report = runner.run_suite(&suite);
    for test in &report.tests {
        println!("{} ... {}", test.name, test.outcome);
    }
    println!(
        "{} passed, {} skipped, {} failed",
        report.passed(),
        report.skipped(),
        report.failed()
    );
    report.exit_code()
}

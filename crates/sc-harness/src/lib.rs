//! `sc-harness` - stage-aware regression harness for `sc-compiler`.
//!
//! A test runs a computation eagerly and through the compiled variant the
//! active stage selects, then compares the two. With bisection on, a test
//! whose previous stage already fails is skipped instead of failed, so a
//! regression is reported only at the stage that introduced it.

pub mod bisect;
pub mod compare;
pub mod context;
pub mod env;
pub mod error;
pub mod fixtures;
pub mod runner;
pub mod stage;
pub mod tolerance;
pub mod variant;

pub use bisect::{PredecessorOracle, RegressionBisector, SubprocessOracle};
pub use compare::{ComparisonOutcome, Mismatch, MismatchKind, Output, OutputComparator, Scalar};
pub use context::ActiveStageContext;
pub use env::{EnvSource, FlagValue, ProcessEnv};
pub use error::{HarnessError, Result};
pub use runner::{Failure, HarnessRunner, SuiteReport, TestOutcome, TestReport};
pub use stage::{Stage, StagePipeline};
pub use tolerance::{Tolerance, ToleranceTable};
pub use variant::{VariantCache, VariantKind, VariantSet};

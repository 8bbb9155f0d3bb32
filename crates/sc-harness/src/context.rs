//! Per-process run configuration, resolved from the environment once.

use std::time::Duration;

use sc_compiler::{PassOptions, StageConfig};
use tracing::{debug, info};

use crate::env::{self, EnvSource, ProcessEnv};
use crate::error::{HarnessError, Result};
use crate::stage::{Stage, StagePipeline};
use crate::tolerance::ToleranceTable;

/// Stage config key overridden by `STAGECHECK_JIT`.
pub const JIT_KEY: &str = "jit";
/// Stage config key overridden by `STAGECHECK_BACKEND`.
pub const BACKEND_KEY: &str = "backend";

/// Index of the stage named by `STAGECHECK_STAGE`, if any.
pub fn resolve_active_stage(
    pipeline: &StagePipeline,
    source: &dyn EnvSource,
) -> Result<Option<usize>> {
    let Some(name) = env::read_str(source, env::STAGE_VAR) else {
        return Ok(None);
    };
    match pipeline.position_of_name(&name) {
        Some(index) => Ok(Some(index)),
        None => Err(HarnessError::UnknownStage {
            var: env::STAGE_VAR.to_string(),
            name,
            known: pipeline.names().join(", "),
        }),
    }
}

/// Reads `STAGECHECK_DIFF`. Bisection needs a stage to bisect from.
pub fn is_diff_enabled(source: &dyn EnvSource, stage: Option<&Stage>) -> Result<bool> {
    let enabled = env::read_flag(source, env::DIFF_VAR)?.unwrap_or(false);
    if enabled && stage.is_none() {
        return Err(HarnessError::DiffWithoutStage {
            diff_var: env::DIFF_VAR.to_string(),
            stage_var: env::STAGE_VAR.to_string(),
        });
    }
    Ok(enabled)
}

/// Everything a run needs to know about the selected stage.
///
/// Built once at process entry and passed by reference afterwards.
#[derive(Debug, Clone)]
pub struct ActiveStageContext {
    pipeline: StagePipeline,
    current: Option<usize>,
    config: StageConfig,
    pass_options: PassOptions,
    diff: bool,
    jit: bool,
    backend: bool,
    tolerances: ToleranceTable,
    bisect_timeout: Option<Duration>,
}

impl ActiveStageContext {
    pub fn from_process_env(pipeline: StagePipeline) -> Result<Self> {
        Self::from_env(pipeline, &ProcessEnv)
    }

    pub fn from_env(pipeline: StagePipeline, source: &dyn EnvSource) -> Result<Self> {
        let current = resolve_active_stage(&pipeline, source)?;
        let stage = current.and_then(|i| pipeline.get(i));
        let diff = is_diff_enabled(source, stage)?;
        let config = stage.map(|s| s.config().clone()).unwrap_or_default();
        let pass_options = PassOptions::from_config(&config)?;

        let jit = match env::read_flag(source, env::JIT_VAR)? {
            Some(v) => v,
            None => config.get_bool(JIT_KEY)?.unwrap_or(true),
        };
        let backend = match env::read_flag(source, env::BACKEND_VAR)? {
            Some(v) => v,
            None => config.get_bool(BACKEND_KEY)?.unwrap_or(true),
        };
        let tolerances = ToleranceTable::from_env(source);
        let bisect_timeout = env::read_secs(source, env::BISECT_TIMEOUT_VAR);

        let ctx = ActiveStageContext {
            pipeline,
            current,
            config,
            pass_options,
            diff,
            jit,
            backend,
            tolerances,
            bisect_timeout,
        };
        match ctx.current_stage() {
            Some(stage) => info!(
                stage = stage.name(),
                diff,
                jit,
                backend,
                "stage resolved"
            ),
            None => debug!(jit, backend, "no stage selected"),
        }
        Ok(ctx)
    }

    pub fn pipeline(&self) -> &StagePipeline {
        &self.pipeline
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.current.and_then(|i| self.pipeline.get(i))
    }

    /// The stage before the active one; `None` when no stage is active or
    /// the active stage is first.
    pub fn predecessor(&self) -> Option<&Stage> {
        self.pipeline.get_predecessor(self.current_stage()?)
    }

    /// The active stage's configuration, empty when no stage is active.
    pub fn stage_config(&self) -> &StageConfig {
        &self.config
    }

    pub fn pass_options(&self) -> PassOptions {
        self.pass_options
    }

    pub fn diff_enabled(&self) -> bool {
        self.diff
    }

    pub fn jit_enabled(&self) -> bool {
        self.jit
    }

    pub fn backend_enabled(&self) -> bool {
        self.backend
    }

    pub fn tolerances(&self) -> &ToleranceTable {
        &self.tolerances
    }

    pub fn bisect_timeout(&self) -> Option<Duration> {
        self.bisect_timeout
    }
}

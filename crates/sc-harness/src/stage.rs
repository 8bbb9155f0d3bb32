use std::collections::HashSet;

use sc_compiler::{PassOptions, StageConfig};

use crate::error::{HarnessError, Result};

/// One named step of the compiler pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    name: String,
    config: StageConfig,
}

impl Stage {
    pub fn new(name: impl Into<String>, config: StageConfig) -> Self {
        Stage {
            name: name.into(),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }
}

/// Ordered stages; position is execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePipeline {
    stages: Vec<Stage>,
}

impl StagePipeline {
    /// Fails on an empty list or a repeated name.
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(HarnessError::EmptyPipeline);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = stages.iter().find(|s| !seen.insert(s.name())) {
            return Err(HarnessError::DuplicateStage(dup.name().to_string()));
        }
        drop(seen);
        Ok(StagePipeline { stages })
    }

    /// The five-stage pipeline: each stage enables one more pass than the last.
    pub fn default_pipeline() -> Self {
        let off = StageConfig::new()
            .with(PassOptions::SIMPLIFY, false)
            .with(PassOptions::CHECK_SHAPES, false)
            .with(PassOptions::DECOMPOSE, false)
            .with(PassOptions::ELIMINATE_DEAD_CODE, false);
        let simplify = StageConfig::new().with(PassOptions::SIMPLIFY, true);
        let shapes = simplify.clone().with(PassOptions::CHECK_SHAPES, true);
        let frontend = shapes.clone().with(PassOptions::DECOMPOSE, true);
        let last = frontend.clone().with(PassOptions::ELIMINATE_DEAD_CODE, true);
        StagePipeline {
            stages: vec![
                Stage::new("source-to-ir", off),
                Stage::new("algebraic-simplification", simplify),
                Stage::new("symbolic-shape-check", shapes),
                Stage::new("backend-lowering-frontend", frontend),
                Stage::new("backend-lowering-final", last),
            ],
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn get_stage_by_name(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn position_of_name(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    /// Index of `stage` if it is one of this pipeline's own stages.
    ///
    /// Matches by address, so an equal `Stage` owned elsewhere is not found.
    pub fn position(&self, stage: &Stage) -> Option<usize> {
        self.stages.iter().position(|s| std::ptr::eq(s, stage))
    }

    pub fn get_predecessor(&self, stage: &Stage) -> Option<&Stage> {
        let index = self.position(stage)?;
        index.checked_sub(1).map(|i| &self.stages[i])
    }
}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarnessError {
    #[error("unknown stage '{name}' in {var}; known stages: {known}")]
    UnknownStage {
        var: String,
        name: String,
        known: String,
    },
    #[error("{var}={value:?} is not a boolean (use 1/true/on or 0/false/off)")]
    InvalidFlag { var: String, value: String },
    #[error("{diff_var} is enabled but no stage is selected via {stage_var}")]
    DiffWithoutStage { diff_var: String, stage_var: String },
    #[error("duplicate stage name '{0}'")]
    DuplicateStage(String),
    #[error("stage pipeline is empty")]
    EmptyPipeline,
    #[error("invalid stage configuration: {0}")]
    Config(#[from] sc_compiler::CompileError),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

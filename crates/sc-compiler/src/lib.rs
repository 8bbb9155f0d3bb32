//! `sc-compiler` - a small staged compiler used as the system under test.
//!
//! A `Computation` is written once against the `OpBuilder` interface. The
//! `EagerBuilder` evaluates every op immediately on the reference backend;
//! the `Tracer` records ops into a static `Program`, which `StagedCompiler`
//! runs through the passes enabled by the active stage before execution.

pub mod builder;
pub mod compiler;
pub mod computation;
pub mod config;
pub mod error;
pub mod executable;
pub mod graph;
pub mod passes;
pub mod program;

pub use builder::{EagerBuilder, OpBuilder, Tracer};
pub use compiler::StagedCompiler;
pub use computation::Computation;
pub use config::{ConfigValue, PassOptions, StageConfig};
pub use error::{CompileError, Result};
pub use executable::{CompiledExecutable, EagerExecutable, Executable};
pub use graph::{Node, NodeId, OpKind, TensorMeta};
pub use program::Program;

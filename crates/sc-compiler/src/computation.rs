use sc_tensor::Tensor;

use crate::builder::OpBuilder;
use crate::error::Result;
use crate::graph::{NodeId, TensorMeta};

/// A numeric computation under test.
///
/// `compute` is written once against `OpBuilder`; the harness runs it
/// eagerly for the reference result and traces it for the compiled variants.
pub trait Computation {
    /// Stable, human-readable identifier (operator plus shape signature).
    fn name(&self) -> &str;

    /// Produce the arguments for one run.
    fn build_inputs(&self) -> Result<Vec<Tensor>>;

    /// Express the computation. Returns one node per output.
    fn compute(&self, g: &mut dyn OpBuilder, inputs: &[NodeId]) -> Result<Vec<NodeId>>;

    /// Static metadata of the arguments. Tracing uses all of it; eager runs
    /// check only the count.
    fn static_shapes(&self) -> Vec<TensorMeta>;
}

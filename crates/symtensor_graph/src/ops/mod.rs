//! Built-in operations. Kernels run on the CPU in `f64` and the results are
//! cast to each operation's output dtype.

pub mod arithmetic;
pub mod control;
pub mod linalg;
pub mod misc;
pub mod reduction;
pub mod shape;
pub mod unary;

use crate::{graph::Graph, operation::OpId, variable::VarId};
use symtensor_core::{
    array::Array,
    dtype::{get_default_dtype, DType},
    error::{Error, Result},
    shape::Shape,
};

pub(crate) fn check_arity<T>(op_type: &str, inputs: &[T], expected: usize) -> Result<()> {
    if inputs.len() == expected {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "{} expects {} inputs, got {}",
            op_type,
            expected,
            inputs.len()
        )))
    }
}

/// Output dtype of float-valued math: float inputs keep their dtype, others
/// use the thread's default dtype.
pub(crate) fn float_dtype(dtype: DType) -> DType {
    if dtype.is_float() {
        dtype
    } else {
        get_default_dtype()
    }
}

pub(crate) fn same_shape(inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
    inputs.first().cloned().flatten().map(|s| vec![s])
}

pub(crate) fn first_grad(grads: &[VarId]) -> Result<VarId> {
    grads
        .first()
        .copied()
        .ok_or_else(|| Error::internal("diff called without an output gradient"))
}

/// Inputs and outputs of `op`, copied out so the graph can be extended.
pub(crate) fn io(graph: &Graph, op: OpId) -> (Vec<VarId>, Vec<VarId>) {
    let operation = graph.operation(op);
    (operation.inputs().to_vec(), operation.outputs().to_vec())
}

pub(crate) fn map_unary(x: &Array, dtype: DType, kernel: fn(&[f64], &mut [f64])) -> Result<Array> {
    let input = x.to_f64_vec();
    let mut out = vec![0.0; input.len()];
    kernel(&input, &mut out);
    Array::from_f64_vec(&out, x.shape(), dtype)
}

/// Sums `grad` down to the shape of `like` unless both are statically known
/// to match already.
pub(crate) fn reduce_to(graph: &mut Graph, grad: VarId, like: VarId) -> Result<VarId> {
    let same = match (graph.variable(grad).shape(), graph.variable(like).shape()) {
        (Some(g), Some(l)) => g.is_fully_defined() && g == l,
        _ => false,
    };
    if same {
        Ok(grad)
    } else {
        graph.reduce_like(grad, like)
    }
}

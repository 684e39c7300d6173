use super::{check_arity, first_grad, io, reduce_to};
use crate::{
    function::DifferentialFunction,
    graph::Graph,
    operation::OpId,
    variable::VarId,
};
use symtensor_core::{
    array::Array,
    dtype::DType,
    error::Result,
    shape::{broadcast_declared, broadcast_shapes, compute_size},
};
use symtensor_cpu::{ops::binary, utils::broadcast_strides};

type BinaryKernel = fn(&[usize], &[f64], &[usize], &[f64], &[usize], &mut [f64]);

fn broadcast_binary(lhs: &Array, rhs: &Array, dtype: DType, kernel: BinaryKernel) -> Result<Array> {
    let dims = broadcast_shapes(lhs.shape(), rhs.shape())?;
    let mut out = vec![0.0; compute_size(&dims)];
    kernel(
        &dims,
        &lhs.to_f64_vec(),
        &broadcast_strides(lhs.shape(), &dims),
        &rhs.to_f64_vec(),
        &broadcast_strides(rhs.shape(), &dims),
        &mut out,
    );
    Array::from_f64_vec(&out, &dims, dtype)
}

macro_rules! binary_function {
    ($(#[$meta:meta])* $name:ident, $op_type:literal, $kernel:path, $dtype:expr, $diff:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl DifferentialFunction for $name {
            fn op_type(&self) -> &'static str {
                $op_type
            }

            fn output_shapes(&self, inputs: &[Option<symtensor_core::shape::Shape>]) -> Option<Vec<symtensor_core::shape::Shape>> {
                match inputs {
                    [Some(a), Some(b)] => broadcast_declared(a, b).map(|s| vec![s]),
                    _ => None,
                }
            }

            fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
                check_arity($op_type, inputs, 2)?;
                let dtype: fn(DType, DType) -> DType = $dtype;
                Ok(vec![dtype(inputs[0], inputs[1])])
            }

            fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
                check_arity($op_type, inputs, 2)?;
                let dtype: fn(DType, DType) -> DType = $dtype;
                let out_dtype = dtype(inputs[0].dtype(), inputs[1].dtype());
                Ok(vec![broadcast_binary(inputs[0], inputs[1], out_dtype, $kernel)?])
            }

            fn diff(&self, graph: &mut Graph, op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
                let (inputs, _) = io(graph, op);
                check_arity($op_type, &inputs, 2)?;
                $diff(graph, inputs[0], inputs[1], first_grad(grads)?)
            }

            fn box_clone(&self) -> Box<dyn DifferentialFunction> {
                Box::new(*self)
            }
        }
    };
}

fn promote(a: DType, b: DType) -> DType {
    a.promote(b)
}

fn boolean(_: DType, _: DType) -> DType {
    DType::BOOL
}

fn add_diff(graph: &mut Graph, a: VarId, b: VarId, grad: VarId) -> Result<Vec<Option<VarId>>> {
    Ok(vec![Some(reduce_to(graph, grad, a)?), Some(reduce_to(graph, grad, b)?)])
}

fn sub_diff(graph: &mut Graph, a: VarId, b: VarId, grad: VarId) -> Result<Vec<Option<VarId>>> {
    let ga = reduce_to(graph, grad, a)?;
    let neg = graph.neg(grad)?;
    let gb = reduce_to(graph, neg, b)?;
    Ok(vec![Some(ga), Some(gb)])
}

fn mul_diff(graph: &mut Graph, a: VarId, b: VarId, grad: VarId) -> Result<Vec<Option<VarId>>> {
    let ga = graph.mul(grad, b)?;
    let ga = reduce_to(graph, ga, a)?;
    let gb = graph.mul(grad, a)?;
    let gb = reduce_to(graph, gb, b)?;
    Ok(vec![Some(ga), Some(gb)])
}

// d(a/b) = g/b, -g*a/b^2
fn div_diff(graph: &mut Graph, a: VarId, b: VarId, grad: VarId) -> Result<Vec<Option<VarId>>> {
    let ga = graph.div(grad, b)?;
    let ga = reduce_to(graph, ga, a)?;

    let num = graph.mul(grad, a)?;
    let den = graph.square(b)?;
    let quot = graph.div(num, den)?;
    let gb = graph.neg(quot)?;
    let gb = reduce_to(graph, gb, b)?;
    Ok(vec![Some(ga), Some(gb)])
}

fn no_diff(_: &mut Graph, _: VarId, _: VarId, _: VarId) -> Result<Vec<Option<VarId>>> {
    Ok(vec![None, None])
}

binary_function!(
    /// Elementwise `a + b` with broadcasting.
    Add, "add", binary::add, promote, add_diff
);
binary_function!(
    /// Elementwise `a - b` with broadcasting.
    Sub, "sub", binary::sub, promote, sub_diff
);
binary_function!(
    /// Elementwise `a * b` with broadcasting.
    Mul, "mul", binary::mul, promote, mul_diff
);
binary_function!(
    /// Elementwise `a / b` with broadcasting.
    Div, "div", binary::div, promote, div_diff
);
binary_function!(
    /// Elementwise `a < b`; has no gradient.
    LessThan, "less_than", binary::lt, boolean, no_diff
);

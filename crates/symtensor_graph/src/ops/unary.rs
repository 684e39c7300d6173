use super::{check_arity, first_grad, float_dtype, io, map_unary, same_shape};
use crate::{function::DifferentialFunction, graph::Graph, operation::OpId, variable::VarId};
use symtensor_core::{array::Array, dtype::DType, error::Result, shape::Shape};
use symtensor_cpu::ops::unary;

fn keep(dtype: DType) -> DType {
    dtype
}

macro_rules! unary_function {
    ($(#[$meta:meta])* $name:ident, $op_type:literal, $kernel:path, $dtype:path, $diff:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl DifferentialFunction for $name {
            fn op_type(&self) -> &'static str {
                $op_type
            }

            fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
                same_shape(inputs)
            }

            fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
                check_arity($op_type, inputs, 1)?;
                Ok(vec![$dtype(inputs[0])])
            }

            fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
                check_arity($op_type, inputs, 1)?;
                Ok(vec![map_unary(inputs[0], $dtype(inputs[0].dtype()), $kernel)?])
            }

            fn diff(&self, graph: &mut Graph, op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
                let (inputs, outputs) = io(graph, op);
                check_arity($op_type, &inputs, 1)?;
                let grad = $diff(graph, inputs[0], outputs[0], first_grad(grads)?)?;
                Ok(vec![grad])
            }

            fn box_clone(&self) -> Box<dyn DifferentialFunction> {
                Box::new(*self)
            }
        }
    };
}

fn neg_diff(graph: &mut Graph, _x: VarId, _y: VarId, grad: VarId) -> Result<Option<VarId>> {
    graph.neg(grad).map(Some)
}

// d/dx e^x = y
fn exp_diff(graph: &mut Graph, _x: VarId, y: VarId, grad: VarId) -> Result<Option<VarId>> {
    graph.mul(grad, y).map(Some)
}

fn log_diff(graph: &mut Graph, x: VarId, _y: VarId, grad: VarId) -> Result<Option<VarId>> {
    graph.div(grad, x).map(Some)
}

// 1 - y^2
fn tanh_diff(graph: &mut Graph, _x: VarId, y: VarId, grad: VarId) -> Result<Option<VarId>> {
    let y2 = graph.square(y)?;
    let neg = graph.scalar_mul(y2, -1.0)?;
    let local = graph.scalar_add(neg, 1.0)?;
    graph.mul(grad, local).map(Some)
}

// y * (1 - y)
fn sigmoid_diff(graph: &mut Graph, _x: VarId, y: VarId, grad: VarId) -> Result<Option<VarId>> {
    let neg = graph.neg(y)?;
    let one_minus = graph.scalar_add(neg, 1.0)?;
    let local = graph.mul(y, one_minus)?;
    graph.mul(grad, local).map(Some)
}

fn relu_diff(graph: &mut Graph, x: VarId, _y: VarId, grad: VarId) -> Result<Option<VarId>> {
    let mask = graph.step(x)?;
    graph.mul(grad, mask).map(Some)
}

fn step_diff(graph: &mut Graph, x: VarId, _y: VarId, _grad: VarId) -> Result<Option<VarId>> {
    graph.zeros_like(x).map(Some)
}

fn square_diff(graph: &mut Graph, x: VarId, _y: VarId, grad: VarId) -> Result<Option<VarId>> {
    let twice = graph.scalar_mul(x, 2.0)?;
    graph.mul(grad, twice).map(Some)
}

fn sqrt_diff(graph: &mut Graph, _x: VarId, y: VarId, grad: VarId) -> Result<Option<VarId>> {
    let twice = graph.scalar_mul(y, 2.0)?;
    graph.div(grad, twice).map(Some)
}

unary_function!(Neg, "neg", unary::neg, keep, neg_diff);
unary_function!(Exp, "exp", unary::exp, float_dtype, exp_diff);
unary_function!(
    /// Natural logarithm.
    Log, "log", unary::log, float_dtype, log_diff
);
unary_function!(Tanh, "tanh", unary::tanh, float_dtype, tanh_diff);
unary_function!(Sigmoid, "sigmoid", unary::sigmoid, float_dtype, sigmoid_diff);
unary_function!(Relu, "relu", unary::relu, keep, relu_diff);
unary_function!(
    /// `1` where the input is positive, `0` elsewhere. Used as the relu mask.
    Step, "step", unary::step, keep, step_diff
);
unary_function!(Square, "square", unary::square, keep, square_diff);
unary_function!(Sqrt, "sqrt", unary::sqrt, float_dtype, sqrt_diff);

use super::{check_arity, first_grad, same_shape};
use crate::{
    function::{AttrValue, Attributes, DifferentialFunction},
    graph::Graph,
    operation::OpId,
    variable::VarId,
};
use symtensor_core::{array::Array, dtype::DType, error::Result, shape::Shape};
use symtensor_cpu::ops::unary;

/// Passes its input through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl DifferentialFunction for Identity {
    fn op_type(&self) -> &'static str {
        "identity"
    }

    fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
        same_shape(inputs)
    }

    fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
        check_arity("identity", inputs, 1)?;
        Ok(vec![inputs[0]])
    }

    fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
        check_arity("identity", inputs, 1)?;
        Ok(vec![inputs[0].clone()])
    }

    fn diff(&self, graph: &mut Graph, _op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
        Ok(vec![Some(graph.identity(first_grad(grads)?)?)])
    }

    fn box_clone(&self) -> Box<dyn DifferentialFunction> {
        Box::new(*self)
    }
}

macro_rules! fill_like {
    ($name:ident, $op_type:literal, $value:literal) => {
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
                Ok(vec![inputs[0]])
            }

            fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
                check_arity($op_type, inputs, 1)?;
                let x = inputs[0];
                Ok(vec![Array::full(x.shape(), $value, x.dtype())])
            }

            // constant output: nothing flows back
            fn diff(&self, _graph: &mut Graph, _op: OpId, _grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
                Ok(vec![None])
            }

            fn box_clone(&self) -> Box<dyn DifferentialFunction> {
                Box::new(*self)
            }
        }
    };
}

fill_like!(OnesLike, "ones_like", 1.0f64);
fill_like!(ZerosLike, "zeros_like", 0.0f64);

/// `x + value` for a constant scalar.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScalarAdd {
    pub value: f64,
}

/// `x * value` for a constant scalar.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScalarMul {
    pub value: f64,
}

macro_rules! scalar_function {
    ($name:ident, $op_type:literal, $kernel:path) => {
        impl $name {
            pub fn new(value: f64) -> Self {
                Self { value }
            }

            pub fn from_attributes(attrs: &Attributes) -> Result<Self> {
                Ok(Self::new(attrs.get_f64("value")?))
            }
        }

        impl DifferentialFunction for $name {
            fn op_type(&self) -> &'static str {
                $op_type
            }

            fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
                same_shape(inputs)
            }

            fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
                check_arity($op_type, inputs, 1)?;
                Ok(vec![inputs[0]])
            }

            fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
                check_arity($op_type, inputs, 1)?;
                let x = inputs[0];
                let input = x.to_f64_vec();
                let mut out = vec![0.0; input.len()];
                $kernel(&input, self.value, &mut out);
                Ok(vec![Array::from_f64_vec(&out, x.shape(), x.dtype())?])
            }

            fn diff(&self, graph: &mut Graph, _op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
                self.backward(graph, first_grad(grads)?).map(|g| vec![Some(g)])
            }

            fn attributes(&self) -> Attributes {
                Attributes::new().with("value", AttrValue::Float(self.value))
            }

            fn box_clone(&self) -> Box<dyn DifferentialFunction> {
                Box::new(*self)
            }
        }
    };
}

scalar_function!(ScalarAdd, "scalar_add", unary::add_scalar);
scalar_function!(ScalarMul, "scalar_mul", unary::mul_scalar);

impl ScalarAdd {
    fn backward(&self, _graph: &mut Graph, grad: VarId) -> Result<VarId> {
        Ok(grad)
    }
}

impl ScalarMul {
    fn backward(&self, graph: &mut Graph, grad: VarId) -> Result<VarId> {
        graph.scalar_mul(grad, self.value)
    }
}

//! Control-flow markers. The session routes values through these itself
//! (frames, iterations, branch selection); none of them has a gradient.

use crate::{
    function::{AttrValue, Attributes, ControlFlow, DifferentialFunction},
    graph::Graph,
    operation::OpId,
    variable::VarId,
};
use symtensor_core::{
    array::Array,
    dtype::DType,
    error::{Error, Result},
    shape::Shape,
};

fn not_differentiable(graph: &Graph, op: OpId) -> Error {
    let operation = graph.operation(op);
    Error::NotDifferentiable {
        op: operation.name().to_string(),
        op_type: operation.op_type().to_string(),
    }
}

fn first_input<'a>(op_type: &str, inputs: &[&'a Array]) -> Result<&'a Array> {
    inputs
        .first()
        .copied()
        .ok_or_else(|| Error::InvalidArgument(format!("{} expects at least one input", op_type)))
}

macro_rules! control_function {
    ($name:ident, $op_type:literal, $outputs:literal, $marker:expr, $dtype:expr) => {
        impl DifferentialFunction for $name {
            fn op_type(&self) -> &'static str {
                $op_type
            }

            fn num_outputs(&self) -> usize {
                $outputs
            }

            fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
                let shape = inputs.first().cloned().flatten()?;
                Some(vec![shape; $outputs])
            }

            fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
                let first = inputs
                    .first()
                    .copied()
                    .ok_or_else(|| Error::InvalidArgument(format!("{} expects at least one input", $op_type)))?;
                let dtype: fn(DType) -> DType = $dtype;
                Ok(vec![dtype(first); $outputs])
            }

            fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
                let first = first_input($op_type, inputs)?;
                Ok(vec![first.clone(); $outputs])
            }

            fn diff(&self, graph: &mut Graph, op: OpId, _grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
                Err(not_differentiable(graph, op))
            }

            fn control_flow(&self) -> Option<ControlFlow> {
                let marker: fn(&Self) -> ControlFlow = $marker;
                Some(marker(self))
            }

            fn attributes(&self) -> Attributes {
                self.attrs()
            }

            fn box_clone(&self) -> Box<dyn DifferentialFunction> {
                Box::new(self.clone())
            }
        }
    };
}

/// Moves a value into a child frame. Constant enters make the value visible
/// in every iteration of that frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enter {
    pub frame: String,
    pub is_constant: bool,
}

impl Enter {
    pub fn new(frame: &str, is_constant: bool) -> Self {
        Self {
            frame: frame.to_string(),
            is_constant,
        }
    }

    pub fn from_attributes(attrs: &Attributes) -> Result<Self> {
        Ok(Self::new(attrs.get_str("frame")?, attrs.get_bool("is_constant").unwrap_or(false)))
    }

    fn attrs(&self) -> Attributes {
        Attributes::new()
            .with("frame", AttrValue::Str(self.frame.clone()))
            .with("is_constant", AttrValue::Bool(self.is_constant))
    }
}

/// Moves a value back to the parent frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct Exit;

/// Carries a value into the next iteration of the current frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct NextIteration;

/// Routes `data` (first input) to output 0 when `pred` (second input) is
/// false and to output 1 when it is true.
#[derive(Clone, Copy, Debug, Default)]
pub struct Switch;

/// Forwards whichever input becomes available first.
#[derive(Clone, Copy, Debug, Default)]
pub struct Merge;

/// Marks the boolean loop predicate.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoopCond;

macro_rules! no_attrs {
    ($($name:ident),*) => {
        $(
            impl $name {
                fn attrs(&self) -> Attributes {
                    Attributes::new()
                }
            }
        )*
    };
}

no_attrs!(Exit, NextIteration, Switch, Merge, LoopCond);

fn keep(dtype: DType) -> DType {
    dtype
}

control_function!(
    Enter,
    "enter",
    1,
    |e| ControlFlow::Enter {
        frame: e.frame.clone(),
        is_constant: e.is_constant,
    },
    keep
);
control_function!(Exit, "exit", 1, |_| ControlFlow::Exit, keep);
control_function!(NextIteration, "next_iteration", 1, |_| ControlFlow::NextIteration, keep);
control_function!(Switch, "switch", 2, |_| ControlFlow::Switch, keep);
control_function!(Merge, "merge", 1, |_| ControlFlow::Merge, keep);
control_function!(LoopCond, "loop_cond", 1, |_| ControlFlow::LoopCond, |_| DType::BOOL);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers() -> Result<()> {
        let enter = Enter::new("while", true);
        assert_eq!(
            enter.control_flow(),
            Some(ControlFlow::Enter {
                frame: "while".into(),
                is_constant: true
            })
        );
        assert_eq!(Enter::from_attributes(&enter.attributes())?, enter);

        assert_eq!(Switch.num_outputs(), 2);
        assert_eq!(Switch.output_dtypes(&[DType::F32, DType::BOOL])?, vec![DType::F32, DType::F32]);
        assert_eq!(LoopCond.output_dtypes(&[DType::U8])?, vec![DType::BOOL]);
        assert!(Merge.execute(&[]).is_err());
        Ok(())
    }
}

use crate::{graph::Graph, operation::OpId, variable::VarId};
use std::{collections::BTreeMap, fmt};
use symtensor_core::{
    array::Array,
    dtype::DType,
    error::{Error, Result},
    shape::Shape,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Control-flow role of an operation. Operations carrying a marker are
/// scheduled by the session itself and are never differentiated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlFlow {
    Enter { frame: String, is_constant: bool },
    Exit,
    NextIteration,
    Switch,
    Merge,
    LoopCond,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Ints(Vec<i64>),
    Str(String),
    DType(DType),
}

/// Static configuration of an operation, enough to rebuild it through an
/// [`OpRegistry`](crate::registry::OpRegistry).
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attributes(BTreeMap<String, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, key: &str, value: AttrValue) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn insert(&mut self, key: &str, value: AttrValue) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    fn missing(key: &str, expected: &str) -> Error {
        Error::InvalidArgument(format!("Attribute \"{}\" missing or not {}", key, expected))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            Some(AttrValue::Bool(v)) => Ok(*v),
            _ => Err(Self::missing(key, "a bool")),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        match self.get(key) {
            Some(AttrValue::Float(v)) => Ok(*v),
            Some(AttrValue::Int(v)) => Ok(*v as f64),
            _ => Err(Self::missing(key, "a number")),
        }
    }

    pub fn get_ints(&self, key: &str) -> Result<Vec<i64>> {
        match self.get(key) {
            Some(AttrValue::Ints(v)) => Ok(v.clone()),
            _ => Err(Self::missing(key, "an int list")),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(AttrValue::Str(v)) => Ok(v),
            _ => Err(Self::missing(key, "a string")),
        }
    }

    pub fn get_dtype(&self, key: &str) -> Result<DType> {
        match self.get(key) {
            Some(AttrValue::DType(v)) => Ok(*v),
            _ => Err(Self::missing(key, "a dtype")),
        }
    }
}

/// The contract every graph operation implements.
///
/// Shape inference may return `None` when input shapes are not known yet;
/// the graph then leaves the outputs unshaped until
/// [`Graph::infer_shapes`] succeeds. `diff` receives one gradient variable per
/// output and returns one optional gradient per input, adding whatever nodes
/// it needs to `graph`.
pub trait DifferentialFunction: Send + Sync + fmt::Debug {
    fn op_type(&self) -> &'static str;

    fn num_outputs(&self) -> usize {
        1
    }

    fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>>;

    fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>>;

    fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>>;

    fn diff(&self, graph: &mut Graph, op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>>;

    fn control_flow(&self) -> Option<ControlFlow> {
        None
    }

    fn attributes(&self) -> Attributes {
        Attributes::new()
    }

    fn box_clone(&self) -> Box<dyn DifferentialFunction>;
}

impl Clone for Box<dyn DifferentialFunction> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

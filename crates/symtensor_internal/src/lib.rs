pub mod prelude;

pub use symtensor_core as core;
pub use symtensor_graph as graph;
#[cfg(feature = "train")]
pub use symtensor_train as train;

pub use crate::core::{
    array::Array,
    dtype::{get_default_dtype, set_default_dtype, DType},
    error::{Error, ErrorKind, Result},
    scalar::Scalar,
    shape::Shape,
};
pub use crate::graph::{Graph, GraphConfig, Session, VarId, VariableKind};

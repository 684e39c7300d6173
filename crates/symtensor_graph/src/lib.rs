pub mod autodiff;
pub mod builder;
pub mod frame;
pub mod function;
pub mod graph;
pub mod operation;
pub mod ops;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod variable;

pub use crate::{
    autodiff::GradientOutput,
    function::{AttrValue, Attributes, ControlFlow, DifferentialFunction},
    graph::{Graph, GraphConfig},
    operation::{OpId, Operation},
    registry::OpRegistry,
    session::{Session, SessionStats},
    snapshot::{GraphSnapshot, OperationRecord, VariableRecord},
    variable::{VarId, Variable, VariableKind},
};

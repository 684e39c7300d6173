use crate::{
    function::{Attributes, DifferentialFunction},
    ops::{arithmetic::*, control::*, linalg::MatMul, misc::*, reduction::*, shape::*, unary::*},
};
use std::{collections::HashMap, fmt, sync::Arc};
use symtensor_core::error::{Error, Result};

type Constructor = Arc<dyn Fn(&Attributes) -> Result<Box<dyn DifferentialFunction>> + Send + Sync>;

/// Maps op type strings to constructors so operations can be rebuilt from
/// their attributes.
#[derive(Clone, Default)]
pub struct OpRegistry {
    constructors: HashMap<String, Constructor>,
}

impl fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.constructors.keys().collect();
        types.sort();
        f.debug_struct("OpRegistry").field("op_types", &types).finish()
    }
}

macro_rules! register_unit {
    ($registry:expr, $($op_type:literal => $ty:ident),* $(,)?) => {
        $(
            $registry.register($op_type, |_| Ok(Box::new($ty)));
        )*
    };
}

macro_rules! register_with_attrs {
    ($registry:expr, $($op_type:literal => $ty:ident),* $(,)?) => {
        $(
            $registry.register($op_type, |attrs| Ok(Box::new($ty::from_attributes(attrs)?)));
        )*
    };
}

impl OpRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in operation.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        register_unit!(registry,
            "add" => Add,
            "sub" => Sub,
            "mul" => Mul,
            "div" => Div,
            "less_than" => LessThan,
            "neg" => Neg,
            "exp" => Exp,
            "log" => Log,
            "tanh" => Tanh,
            "sigmoid" => Sigmoid,
            "relu" => Relu,
            "step" => Step,
            "square" => Square,
            "sqrt" => Sqrt,
            "identity" => Identity,
            "ones_like" => OnesLike,
            "zeros_like" => ZerosLike,
            "reshape_like" => ReshapeLike,
            "reduce_like" => ReduceLike,
            "broadcast_like" => BroadcastLike,
            "exit" => Exit,
            "next_iteration" => NextIteration,
            "switch" => Switch,
            "merge" => Merge,
            "loop_cond" => LoopCond,
        );
        register_with_attrs!(registry,
            "matmul" => MatMul,
            "reshape" => Reshape,
            "transpose" => Transpose,
            "sum" => Sum,
            "mean" => Mean,
            "reduce_bp" => ReduceBp,
            "scalar_add" => ScalarAdd,
            "scalar_mul" => ScalarMul,
            "enter" => Enter,
        );
        registry
    }

    /// Registers (or replaces) the constructor for `op_type`.
    pub fn register<F>(&mut self, op_type: &str, constructor: F)
    where
        F: Fn(&Attributes) -> Result<Box<dyn DifferentialFunction>> + Send + Sync + 'static,
    {
        if self.constructors.insert(op_type.to_string(), Arc::new(constructor)).is_some() {
            log::debug!("replaced constructor for op type \"{}\"", op_type);
        }
    }

    pub fn contains(&self, op_type: &str) -> bool {
        self.constructors.contains_key(op_type)
    }

    pub fn create(&self, op_type: &str, attributes: &Attributes) -> Result<Box<dyn DifferentialFunction>> {
        let constructor = self
            .constructors
            .get(op_type)
            .ok_or_else(|| Error::UnknownOperation(format!("no constructor for op type \"{}\"", op_type)))?;
        constructor(attributes)
    }
}

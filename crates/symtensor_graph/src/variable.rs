use crate::operation::OpId;
use symtensor_core::{dtype::DType, shape::Shape};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VariableKind {
    /// Fixed value stored in the graph.
    Constant,
    /// Trainable parameter stored in the graph.
    Variable,
    /// Value supplied by the caller for every evaluation.
    Placeholder,
    /// Output of an operation; only ever holds a value inside a session.
    Array,
}

impl VariableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "CONSTANT",
            Self::Variable => "VARIABLE",
            Self::Placeholder => "PLACEHOLDER",
            Self::Array => "ARRAY",
        }
    }

    /// Whether arrays for this kind live in the graph's store.
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Constant | Self::Variable)
    }
}

#[derive(Clone, Debug)]
pub struct Variable {
    pub(crate) name: String,
    pub(crate) kind: VariableKind,
    pub(crate) shape: Option<Shape>,
    pub(crate) dtype: DType,
    pub(crate) producer: Option<OpId>,
    pub(crate) output_index: Option<usize>,
    pub(crate) consumers: Vec<OpId>,
    pub(crate) placeholder_shape: Option<Shape>,
}

impl Variable {
    pub(crate) fn new(name: &str, kind: VariableKind, shape: Option<Shape>, dtype: DType) -> Self {
        let placeholder_shape = match kind {
            VariableKind::Placeholder => shape.clone(),
            _ => None,
        };
        Self {
            name: name.to_string(),
            kind,
            shape,
            dtype,
            producer: None,
            output_index: None,
            consumers: Vec::new(),
            placeholder_shape,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Declared shape; `None` while inference is deferred.
    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn producer(&self) -> Option<OpId> {
        self.producer
    }

    pub fn output_index(&self) -> Option<usize> {
        self.output_index
    }

    pub fn consumers(&self) -> &[OpId] {
        &self.consumers
    }

    /// Shape originally declared for a placeholder, used to validate bound arrays.
    pub fn placeholder_shape(&self) -> Option<&Shape> {
        self.placeholder_shape.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.producer.is_none()
    }
}

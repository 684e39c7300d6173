use crate::{function::DifferentialFunction, variable::VarId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) usize);

impl OpId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct Operation {
    pub(crate) name: String,
    pub(crate) function: Box<dyn DifferentialFunction>,
    pub(crate) inputs: Option<Vec<VarId>>,
    pub(crate) outputs: Option<Vec<VarId>>,
    pub(crate) placeholder_dependent: bool,
}

impl Clone for Operation {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            function: self.function.box_clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            placeholder_dependent: self.placeholder_dependent,
        }
    }
}

impl Operation {
    pub(crate) fn new(name: &str, function: Box<dyn DifferentialFunction>) -> Self {
        Self {
            name: name.to_string(),
            function,
            inputs: None,
            outputs: None,
            placeholder_dependent: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op_type(&self) -> &str {
        self.function.op_type()
    }

    pub fn function(&self) -> &dyn DifferentialFunction {
        self.function.as_ref()
    }

    pub fn inputs(&self) -> &[VarId] {
        self.inputs.as_deref().unwrap_or(&[])
    }

    pub fn outputs(&self) -> &[VarId] {
        self.outputs.as_deref().unwrap_or(&[])
    }

    pub fn has_outputs(&self) -> bool {
        self.outputs.is_some()
    }

    /// Whether any input is a placeholder.
    pub fn is_placeholder_dependent(&self) -> bool {
        self.placeholder_dependent
    }

    pub fn is_control_flow(&self) -> bool {
        self.function.control_flow().is_some()
    }
}

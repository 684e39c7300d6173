use crate::{
    autodiff::GradFunction,
    function::DifferentialFunction,
    operation::{OpId, Operation},
    session::Session,
    store::ArrayStore,
    variable::{VarId, Variable, VariableKind},
};
use std::{collections::HashMap, sync::Arc};
use symtensor_core::{
    array::Array,
    dtype::DType,
    error::{Error, Result},
    init::WeightInit,
    shape::Shape,
};

#[derive(Clone, Debug)]
pub struct GraphConfig {
    /// Seed of the generator used for lazy variable initialization.
    pub seed: u64,
    pub default_init: WeightInit,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            default_init: WeightInit::default(),
        }
    }
}

/// A symbolic graph of named variables and the operations connecting them.
///
/// Nodes live in two arenas indexed by [`VarId`] and [`OpId`]; edges are
/// stored as indices, so names only matter to the lookup tables.
#[derive(Debug)]
pub struct Graph {
    config: GraphConfig,
    pub(crate) variables: Vec<Variable>,
    pub(crate) operations: Vec<Operation>,
    var_names: HashMap<String, VarId>,
    op_names: HashMap<String, OpId>,
    store: Arc<ArrayStore>,
    // (boundary, store): variables below `boundary` read arrays from `store`
    inherited: Vec<(usize, Arc<ArrayStore>)>,
    pub(crate) grad_fn: Option<Box<GradFunction>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            store: Arc::new(ArrayStore::new(config.seed)),
            config,
            variables: Vec::new(),
            operations: Vec::new(),
            var_names: HashMap::new(),
            op_names: HashMap::new(),
            inherited: Vec::new(),
            grad_fn: None,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // ────────────────────────────────────────────────────────────────────────
    //  Registry
    // ────────────────────────────────────────────────────────────────────────

    /// Declares a variable, or returns the existing one when a variable of the
    /// same kind and dtype already has this name.
    pub fn declare_variable(
        &mut self,
        name: &str,
        kind: VariableKind,
        shape: Option<Shape>,
        dtype: DType,
        value: Option<Array>,
    ) -> Result<VarId> {
        if let Some(&existing) = self.var_names.get(name) {
            let var = &self.variables[existing.0];
            if var.kind != kind || var.dtype != dtype {
                return Err(Error::DuplicateName {
                    name: name.to_string(),
                    message: format!(
                        "already declared as {} {}, requested {} {}",
                        var.kind.as_str(),
                        var.dtype,
                        kind.as_str(),
                        dtype
                    ),
                });
            }
            if let Some(value) = value {
                self.set_array(name, value)?;
            }
            return Ok(existing);
        }

        if value.is_some() && !kind.is_stored() {
            return Err(Error::IllegalState(format!(
                "{} variable \"{}\" cannot hold a stored array",
                kind.as_str(),
                name
            )));
        }

        let shape = match (&shape, &value) {
            (Some(declared), Some(v)) if !declared.is_compatible_with(v.shape()) => {
                return Err(Error::IncompatibleShape(format!(
                    "Variable \"{}\" declared with shape {} but given an array of shape {:?}",
                    name,
                    declared,
                    v.shape()
                )));
            },
            (None, Some(v)) => Some(Shape::from_concrete(v.shape())),
            _ => shape,
        };

        let id = VarId(self.variables.len());
        self.variables.push(Variable::new(name, kind, shape, dtype));
        self.var_names.insert(name.to_string(), id);

        if let Some(value) = value {
            self.store.insert(id, value.cast(dtype));
        }

        log::trace!("declared {} variable \"{}\" ({})", kind.as_str(), name, dtype);
        Ok(id)
    }

    /// Registers an operation with empty inputs and outputs. Registering a
    /// name that already exists returns the existing operation unchanged.
    pub fn register_operation(&mut self, name: &str, function: Box<dyn DifferentialFunction>) -> OpId {
        if let Some(&existing) = self.op_names.get(name) {
            return existing;
        }

        let id = OpId(self.operations.len());
        log::trace!("registered operation \"{}\" ({})", name, function.op_type());
        self.operations.push(Operation::new(name, function));
        self.op_names.insert(name.to_string(), id);
        id
    }

    pub fn set_operation_inputs(&mut self, op_name: &str, inputs: &[&str]) -> Result<()> {
        let op = self.op_id(op_name)?;
        let ids = inputs.iter().map(|n| self.var_id(n)).collect::<Result<Vec<_>>>()?;
        self.set_inputs(op, &ids)
    }

    pub fn set_inputs(&mut self, op: OpId, inputs: &[VarId]) -> Result<()> {
        self.check_op(op)?;
        for &input in inputs {
            self.check_var(input)?;
        }

        let operation = &mut self.operations[op.0];
        if operation.inputs.is_some() {
            return Err(Error::IllegalState(format!(
                "Inputs of operation \"{}\" are already set",
                operation.name
            )));
        }
        operation.inputs = Some(inputs.to_vec());

        let mut placeholder_dependent = false;
        for &input in inputs {
            let var = &mut self.variables[input.0];
            if !var.consumers.contains(&op) {
                var.consumers.push(op);
            }
            placeholder_dependent |= var.kind == VariableKind::Placeholder;
        }
        self.operations[op.0].placeholder_dependent = placeholder_dependent;
        Ok(())
    }

    pub fn set_operation_outputs(&mut self, op_name: &str, outputs: &[&str]) -> Result<()> {
        let op = self.op_id(op_name)?;
        let ids = outputs.iter().map(|n| self.var_id(n)).collect::<Result<Vec<_>>>()?;
        self.set_outputs(op, &ids)
    }

    pub fn set_outputs(&mut self, op: OpId, outputs: &[VarId]) -> Result<()> {
        self.check_op(op)?;
        if self.operations[op.0].outputs.is_some() {
            return Err(Error::IllegalState(format!(
                "Outputs of operation \"{}\" are already set",
                self.operations[op.0].name
            )));
        }

        for &output in outputs {
            self.check_var(output)?;
            let var = &self.variables[output.0];
            if var.kind != VariableKind::Array {
                return Err(Error::IllegalState(format!(
                    "{} variable \"{}\" cannot be an operation output",
                    var.kind.as_str(),
                    var.name
                )));
            }
            if let Some(other) = var.producer.filter(|&p| p != op) {
                return Err(Error::IllegalState(format!(
                    "Variable \"{}\" is already produced by \"{}\"",
                    var.name, self.operations[other.0].name
                )));
            }
        }

        for (index, &output) in outputs.iter().enumerate() {
            let var = &mut self.variables[output.0];
            var.producer = Some(op);
            var.output_index = Some(index);
        }
        self.operations[op.0].outputs = Some(outputs.to_vec());
        Ok(())
    }

    /// Creates (or reuses) the ARRAY variables an operation outputs and links
    /// them to it. Outputs whose shape cannot be inferred yet are left
    /// unshaped; see [`Graph::infer_shapes`].
    pub fn generate_output_variables(&mut self, op: OpId) -> Result<Vec<VarId>> {
        self.check_op(op)?;
        let operation = &self.operations[op.0];
        if operation.outputs.is_some() {
            return Err(Error::IllegalState(format!(
                "Outputs of operation \"{}\" are already set",
                operation.name
            )));
        }

        let op_name = operation.name.clone();
        let function = operation.function.as_ref();
        let inputs = operation.inputs();
        let in_shapes: Vec<Option<Shape>> = inputs.iter().map(|v| self.variables[v.0].shape.clone()).collect();
        let in_dtypes: Vec<DType> = inputs.iter().map(|v| self.variables[v.0].dtype).collect();

        let num_outputs = function.num_outputs();
        let dtypes = function.output_dtypes(&in_dtypes)?;
        let shapes = function.output_shapes(&in_shapes);

        if dtypes.len() != num_outputs || shapes.as_ref().is_some_and(|s| s.len() != num_outputs) {
            return Err(Error::internal(format!(
                "Operation \"{}\" declares {} outputs but inferred {} dtypes",
                op_name,
                num_outputs,
                dtypes.len()
            )));
        }
        if shapes.is_none() {
            log::trace!("deferring output shapes of \"{}\"", op_name);
        }

        let mut outputs = Vec::with_capacity(num_outputs);
        for (index, dtype) in dtypes.into_iter().enumerate() {
            let shape = shapes.as_ref().map(|s| s[index].clone());
            let base = if num_outputs == 1 {
                op_name.clone()
            } else {
                format!("{}:{}", op_name, index)
            };

            let reusable = self.var_names.get(&base).copied().filter(|&existing| {
                let var = &self.variables[existing.0];
                var.kind == VariableKind::Array && var.producer.is_none() && !outputs.contains(&existing)
            });

            let id = match reusable {
                Some(existing) => {
                    let var = &mut self.variables[existing.0];
                    var.dtype = dtype;
                    if shape.is_some() {
                        var.shape = shape;
                    }
                    existing
                },
                None => {
                    let name = self.unique_var_name(&base);
                    self.declare_variable(&name, VariableKind::Array, shape, dtype, None)?
                },
            };
            outputs.push(id);
        }

        self.set_outputs(op, &outputs)?;
        Ok(outputs)
    }

    /// Renames a variable. Edges hold indices, so only the lookup table and
    /// the node's own name change.
    pub fn rename_variable(&mut self, from: &str, to: &str) -> Result<()> {
        let id = self.var_id(from)?;
        if from == to {
            return Ok(());
        }
        if self.var_names.get(to).is_some_and(|&other| other != id) {
            return Err(Error::RenameCollision {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.var_names.remove(from);
        self.var_names.insert(to.to_string(), id);
        self.variables[id.0].name = to.to_string();
        log::trace!("renamed variable \"{}\" to \"{}\"", from, to);
        Ok(())
    }

    /// Retries shape inference for outputs left unshaped. Returns the number
    /// of variables that received a shape.
    pub fn infer_shapes(&mut self) -> usize {
        let mut resolved = 0;
        loop {
            let mut changed = false;
            for index in 0..self.operations.len() {
                let operation = &self.operations[index];
                let outputs = operation.outputs().to_vec();
                if outputs.iter().all(|v| self.variables[v.0].shape.is_some()) {
                    continue;
                }

                let in_shapes: Vec<Option<Shape>> =
                    operation.inputs().iter().map(|v| self.variables[v.0].shape.clone()).collect();
                let Some(shapes) = operation.function.output_shapes(&in_shapes) else {
                    continue;
                };

                for (var, shape) in outputs.iter().zip(shapes) {
                    let var = &mut self.variables[var.0];
                    if var.shape.is_none() {
                        var.shape = Some(shape);
                        resolved += 1;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        resolved
    }

    // ────────────────────────────────────────────────────────────────────────
    //  Queries
    // ────────────────────────────────────────────────────────────────────────

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_operations(&self) -> usize {
        self.operations.len()
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this graph.
    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this graph.
    pub fn operation(&self, id: OpId) -> &Operation {
        &self.operations[id.0]
    }

    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        self.var_names.get(name).map(|id| &self.variables[id.0])
    }

    pub fn get_operation(&self, name: &str) -> Option<&Operation> {
        self.op_names.get(name).map(|id| &self.operations[id.0])
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.var_names.contains_key(name)
    }

    pub fn var_id(&self, name: &str) -> Result<VarId> {
        self.var_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    pub fn op_id(&self, name: &str) -> Result<OpId> {
        self.op_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))
    }

    pub fn producer_of(&self, var: VarId) -> Option<OpId> {
        self.variables.get(var.0).and_then(|v| v.producer)
    }

    pub fn consumers_of(&self, var: VarId) -> &[OpId] {
        self.variables.get(var.0).map(|v| v.consumers.as_slice()).unwrap_or(&[])
    }

    pub fn placeholders(&self) -> Vec<VarId> {
        self.ids_where(|v| v.kind == VariableKind::Placeholder)
    }

    /// Final outputs: ARRAY variables nobody consumes, produced by an
    /// operation without a control-flow marker.
    pub fn outputs(&self) -> Vec<VarId> {
        self.ids_where(|v| {
            v.kind == VariableKind::Array
                && v.consumers.is_empty()
                && v.producer.is_some_and(|p| !self.operations[p.0].is_control_flow())
        })
    }

    /// VARIABLE-kind leaves, i.e. everything that could be trained.
    pub fn trainable_candidates(&self) -> Vec<VarId> {
        self.ids_where(|v| v.kind == VariableKind::Variable && v.producer.is_none())
    }

    fn ids_where(&self, pred: impl Fn(&Variable) -> bool) -> Vec<VarId> {
        self.variables
            .iter()
            .enumerate()
            .filter(|(_, v)| pred(v))
            .map(|(i, _)| VarId(i))
            .collect()
    }

    // ────────────────────────────────────────────────────────────────────────
    //  Stored arrays
    // ────────────────────────────────────────────────────────────────────────

    fn store_for(&self, id: VarId) -> &ArrayStore {
        self.inherited
            .iter()
            .find(|(boundary, _)| id.0 < *boundary)
            .map(|(_, store)| store.as_ref())
            .unwrap_or(self.store.as_ref())
    }

    /// Stores the array of a CONSTANT or VARIABLE node, cast to its dtype.
    pub fn set_array(&mut self, name: &str, array: Array) -> Result<()> {
        let id = self.var_id(name)?;
        let var = &self.variables[id.0];
        if !var.kind.is_stored() {
            return Err(Error::IllegalState(format!(
                "Cannot set an array on {} variable \"{}\"",
                var.kind.as_str(),
                name
            )));
        }
        if let Some(shape) = var.shape.as_ref().filter(|s| !s.is_compatible_with(array.shape())) {
            return Err(Error::IncompatibleShape(format!(
                "Variable \"{}\" has shape {} but the array has shape {:?}",
                name,
                shape,
                array.shape()
            )));
        }

        let array = array.cast(var.dtype);
        if var.shape.is_none() {
            self.variables[id.0].shape = Some(Shape::from_concrete(array.shape()));
        }
        self.store_for(id).insert(id, array);
        Ok(())
    }

    /// Array of a CONSTANT or VARIABLE node; VARIABLE nodes without a value
    /// are initialized with the configured [`WeightInit`] on first access.
    pub fn get_array(&self, name: &str) -> Result<Array> {
        self.stored_array(self.var_id(name)?)
    }

    pub fn has_array(&self, name: &str) -> bool {
        self.var_names.get(name).is_some_and(|&id| self.store_for(id).contains(id))
    }

    pub(crate) fn stored_array(&self, id: VarId) -> Result<Array> {
        self.check_var(id)?;
        let var = &self.variables[id.0];
        let store = self.store_for(id);

        match var.kind {
            VariableKind::Constant => store
                .get(id)
                .ok_or_else(|| Error::IllegalState(format!("Constant \"{}\" has no array", var.name))),
            VariableKind::Variable => {
                if let Some(array) = store.get(id) {
                    return Ok(array);
                }
                let shape = var
                    .shape
                    .as_ref()
                    .ok_or_else(|| {
                        Error::IllegalState(format!("Cannot initialize variable \"{}\" without a shape", var.name))
                    })?
                    .to_concrete()?;
                log::debug!("initializing variable \"{}\" with {:?}", var.name, self.config.default_init);
                store.get_or_init(id, &shape, var.dtype, &self.config.default_init)
            },
            kind => Err(Error::IllegalState(format!(
                "{} variable \"{}\" has no stored array",
                kind.as_str(),
                var.name
            ))),
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    //  Copies
    // ────────────────────────────────────────────────────────────────────────

    /// Full copy of the forward graph including every stored array. The
    /// copy has no gradient function.
    pub fn dup(&self) -> Graph {
        let store = ArrayStore::new(self.config.seed);
        for (i, var) in self.variables.iter().enumerate() {
            let id = VarId(i);
            if var.kind.is_stored() {
                if let Some(array) = self.store_for(id).get(id) {
                    store.insert(id, array);
                }
            }
        }
        log::trace!("duplicated graph with {} stored arrays", store.len());

        Graph {
            config: self.config.clone(),
            variables: self.variables.clone(),
            operations: self.operations.clone(),
            var_names: self.var_names.clone(),
            op_names: self.op_names.clone(),
            store: Arc::new(store),
            inherited: Vec::new(),
            grad_fn: None,
        }
    }

    /// Same nodes and indices without copying arrays; stored values of the
    /// existing variables keep being read from this graph's store.
    pub(crate) fn copy_structure(&self) -> Graph {
        let mut inherited = self.inherited.clone();
        inherited.push((self.variables.len(), Arc::clone(&self.store)));

        Graph {
            config: self.config.clone(),
            variables: self.variables.clone(),
            operations: self.operations.clone(),
            var_names: self.var_names.clone(),
            op_names: self.op_names.clone(),
            store: Arc::new(ArrayStore::new(self.config.seed)),
            inherited,
            grad_fn: None,
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    //  Execution
    // ────────────────────────────────────────────────────────────────────────

    pub fn session(&self) -> Session<'_> {
        Session::new(self)
    }

    /// One-shot evaluation through a fresh [`Session`].
    pub fn output(&self, names: &[&str], placeholders: &HashMap<String, Array>) -> Result<HashMap<String, Array>> {
        self.session().output(names, placeholders)
    }

    // ────────────────────────────────────────────────────────────────────────
    //  Helpers
    // ────────────────────────────────────────────────────────────────────────

    pub(crate) fn check_var(&self, id: VarId) -> Result<()> {
        if id.0 < self.variables.len() {
            Ok(())
        } else {
            Err(Error::UnknownVariable(format!("#{}", id.0)))
        }
    }

    pub(crate) fn check_op(&self, id: OpId) -> Result<()> {
        if id.0 < self.operations.len() {
            Ok(())
        } else {
            Err(Error::UnknownOperation(format!("#{}", id.0)))
        }
    }

    pub(crate) fn unique_var_name(&self, base: &str) -> String {
        if !self.var_names.contains_key(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}_{}", base, i))
            .find(|n| !self.var_names.contains_key(n))
            .unwrap_or_else(|| base.to_string())
    }

    /// Unused operation name derived from `base`, also free as a variable
    /// name so single-output operations can name their output after themselves.
    pub(crate) fn unique_op_name(&self, base: &str) -> String {
        let free = |n: &str| !self.op_names.contains_key(n) && !self.var_names.contains_key(n);
        if free(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}_{}", base, i))
            .find(|n| free(n))
            .unwrap_or_else(|| base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::arithmetic::Add;

    #[test]
    fn duplicate_declarations() -> Result<()> {
        let mut graph = Graph::new();
        let a = graph.declare_variable("a", VariableKind::Placeholder, Some(Shape::new(&[-1])), DType::F32, None)?;
        let again = graph.declare_variable("a", VariableKind::Placeholder, None, DType::F32, None)?;
        assert_eq!(a, again);

        let err = graph.declare_variable("a", VariableKind::Variable, None, DType::F32, None);
        assert!(matches!(err, Err(Error::DuplicateName { .. })));
        Ok(())
    }

    #[test]
    fn outputs_are_set_once() -> Result<()> {
        let mut graph = Graph::new();
        graph.declare_variable("x", VariableKind::Placeholder, Some(Shape::new(&[2])), DType::F32, None)?;
        let op = graph.register_operation("sum", Box::new(Add));
        assert_eq!(graph.register_operation("sum", Box::new(Add)), op);

        graph.set_operation_inputs("sum", &["x", "x"])?;
        assert_eq!(graph.consumers_of(graph.var_id("x")?).len(), 1);
        assert!(graph.operation(op).is_placeholder_dependent());

        let outputs = graph.generate_output_variables(op)?;
        assert_eq!(graph.variable(outputs[0]).name(), "sum");
        assert_eq!(graph.variable(outputs[0]).shape(), Some(&Shape::new(&[2])));
        assert!(matches!(graph.generate_output_variables(op), Err(Error::IllegalState(_))));
        assert!(matches!(graph.set_operation_outputs("sum", &["sum"]), Err(Error::IllegalState(_))));
        Ok(())
    }

    #[test]
    fn rename_collision() -> Result<()> {
        let mut graph = Graph::new();
        graph.declare_variable("a", VariableKind::Constant, None, DType::F32, Some(Array::scalar(1.0f32)))?;
        graph.declare_variable("b", VariableKind::Constant, None, DType::F32, Some(Array::scalar(2.0f32)))?;

        graph.rename_variable("a", "a")?;
        assert!(matches!(
            graph.rename_variable("a", "b"),
            Err(Error::RenameCollision { .. })
        ));

        graph.rename_variable("a", "c")?;
        assert!(!graph.has_variable("a"));
        assert_eq!(graph.get_array("c")?.item()?.as_f64(), 1.0);
        Ok(())
    }

    #[test]
    fn stored_arrays_only_for_constants_and_variables() -> Result<()> {
        let mut graph = Graph::new();
        graph.declare_variable("p", VariableKind::Placeholder, Some(Shape::new(&[1])), DType::F32, None)?;
        graph.declare_variable("w", VariableKind::Variable, Some(Shape::new(&[2, 3])), DType::F64, None)?;

        assert!(matches!(
            graph.set_array("p", Array::ones(&[1], DType::F32)),
            Err(Error::IllegalState(_))
        ));

        let w = graph.get_array("w")?;
        assert_eq!(w.shape(), &[2, 3]);
        assert_eq!(w, graph.get_array("w")?);

        assert!(graph.set_array("w", Array::ones(&[3, 2], DType::F64)).is_err());
        graph.set_array("w", Array::ones(&[2, 3], DType::F32))?;
        assert_eq!(graph.get_array("w")?.dtype(), DType::F64);
        Ok(())
    }

    #[test]
    fn dup_copies_arrays() -> Result<()> {
        let mut graph = Graph::new();
        graph.declare_variable("w", VariableKind::Variable, None, DType::F32, Some(Array::zeros(&[2], DType::F32)))?;

        let mut copy = graph.dup();
        copy.set_array("w", Array::ones(&[2], DType::F32))?;

        assert_eq!(graph.get_array("w")?.to_vec::<f32>(), vec![0.0, 0.0]);
        assert_eq!(copy.get_array("w")?.to_vec::<f32>(), vec![1.0, 1.0]);
        assert_eq!(copy.store.len(), 1);
        assert!(copy.grad_function().is_none());
        Ok(())
    }
}

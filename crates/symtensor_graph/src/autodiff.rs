use crate::{
    graph::Graph,
    operation::OpId,
    variable::{VarId, VariableKind},
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use symtensor_core::{
    array::Array,
    error::{Error, Result},
};

/// Suffix given to gradient variables in the gradient graph.
pub const GRAD_SUFFIX: &str = "-grad";

/// The gradient graph plus the forward-variable to gradient-variable map.
#[derive(Debug)]
pub(crate) struct GradFunction {
    pub(crate) graph: Graph,
    pub(crate) gradients: BTreeMap<VarId, VarId>,
}

/// Result of one backward execution.
#[derive(Clone, Debug, Default)]
pub struct GradientOutput {
    /// Gradient arrays keyed by the forward variable's name.
    pub gradients: HashMap<String, Array>,
    /// Additional forward values evaluated in the same pass.
    pub outputs: HashMap<String, Array>,
}

impl Graph {
    /// Builds the gradient graph if it does not exist yet.
    ///
    /// Calling this again is a no-op; call [`Graph::clear_grad_function`]
    /// first after changing the forward graph.
    pub fn create_grad_function(&mut self) -> Result<()> {
        if self.grad_fn.is_some() {
            log::debug!("gradient function already exists");
            return Ok(());
        }

        let outputs = self.outputs();
        let loss = match outputs.as_slice() {
            [] => return Err(Error::NoOutputs),
            [single] => *single,
            _ => {
                return Err(Error::MultipleOutputs {
                    outputs: outputs.iter().map(|&v| self.variable(v).name().to_string()).collect(),
                })
            },
        };

        let grad_fn = Differentiator::new(self, loss).run()?;
        self.grad_fn = Some(Box::new(grad_fn));
        Ok(())
    }

    pub fn clear_grad_function(&mut self) {
        self.grad_fn = None;
    }

    /// The gradient graph, once built.
    pub fn grad_function(&self) -> Option<&Graph> {
        self.grad_fn.as_ref().map(|g| &g.graph)
    }

    /// Gradient variable (inside the gradient graph) of a forward variable.
    pub fn grad_for_variable(&self, name: &str) -> Option<&crate::variable::Variable> {
        let grad_fn = self.grad_fn.as_ref()?;
        let id = self.var_id(name).ok()?;
        grad_fn.gradients.get(&id).map(|&g| grad_fn.graph.variable(g))
    }

    /// Gradients of every VARIABLE-kind variable that the loss depends on.
    pub fn exec_backwards(&mut self, placeholders: &HashMap<String, Array>) -> Result<HashMap<String, Array>> {
        Ok(self.exec_backwards_with_outputs(placeholders, &[])?.gradients)
    }

    /// Gradients of the named variables only.
    pub fn calculate_gradients(
        &mut self,
        placeholders: &HashMap<String, Array>,
        variables: &[&str],
    ) -> Result<HashMap<String, Array>> {
        let ids = variables.iter().map(|n| self.var_id(n)).collect::<Result<Vec<_>>>()?;
        self.create_grad_function()?;
        Ok(self.run_backward(placeholders, &ids, &[])?.gradients)
    }

    /// Gradients of every VARIABLE-kind variable plus the forward values of
    /// `outputs`, computed in a single pass over the gradient graph.
    pub fn exec_backwards_with_outputs(
        &mut self,
        placeholders: &HashMap<String, Array>,
        outputs: &[&str],
    ) -> Result<GradientOutput> {
        self.create_grad_function()?;
        let ids: Vec<VarId> = self
            .variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.kind() == VariableKind::Variable)
            .map(|(i, _)| VarId(i))
            .collect();
        self.run_backward(placeholders, &ids, outputs)
    }

    fn run_backward(
        &self,
        placeholders: &HashMap<String, Array>,
        variables: &[VarId],
        outputs: &[&str],
    ) -> Result<GradientOutput> {
        let grad_fn = self
            .grad_fn
            .as_ref()
            .ok_or_else(|| Error::internal("gradient function missing after creation"))?;

        let mut wanted: Vec<(String, String)> = Vec::new();
        for &id in variables {
            match grad_fn.gradients.get(&id) {
                Some(&g) => wanted.push((
                    self.variable(id).name().to_string(),
                    grad_fn.graph.variable(g).name().to_string(),
                )),
                None => log::debug!("variable \"{}\" does not affect the loss", self.variable(id).name()),
            }
        }

        // forward indices are stable in the gradient graph, names may not be
        let mut extra: Vec<(&str, String)> = Vec::with_capacity(outputs.len());
        for &name in outputs {
            let id = self.var_id(name)?;
            if id.0 >= grad_fn.graph.num_variables() {
                return Err(Error::IllegalState(format!(
                    "variable \"{}\" was declared after the gradient function was built",
                    name
                )));
            }
            extra.push((name, grad_fn.graph.variable(id).name().to_string()));
        }

        let mut names: Vec<&str> = wanted.iter().map(|(_, g)| g.as_str()).collect();
        names.extend(extra.iter().map(|(_, g)| g.as_str()));

        // placeholders renamed after the build still carry their old name there
        let bound: HashMap<String, Array> = placeholders
            .iter()
            .map(|(name, array)| {
                let key = self
                    .var_id(name)
                    .ok()
                    .filter(|id| id.0 < grad_fn.graph.num_variables())
                    .map_or_else(|| name.clone(), |id| grad_fn.graph.variable(id).name().to_string());
                (key, array.clone())
            })
            .collect();

        let values = grad_fn.graph.session().output(&names, &bound)?;

        let mut result = GradientOutput::default();
        for (forward, grad) in wanted {
            if let Some(array) = values.get(&grad) {
                result.gradients.insert(forward, array.clone());
            }
        }
        for (name, grad_name) in extra {
            if let Some(array) = values.get(&grad_name) {
                result.outputs.insert(name.to_string(), array.clone());
            }
        }
        Ok(result)
    }
}

/// One reverse-mode pass over a structural copy of the forward graph.
struct Differentiator {
    graph: Graph,
    loss: VarId,
    num_forward_ops: usize,
    grads: BTreeMap<VarId, VarId>,
    // forward op -> number of distinct consumer ops not yet differentiated
    pending: Vec<usize>,
    enqueued: Vec<bool>,
    processed: Vec<bool>,
    queue: VecDeque<OpId>,
}

impl Differentiator {
    fn new(forward: &Graph, loss: VarId) -> Self {
        let graph = forward.copy_structure();
        let num_forward_ops = graph.num_operations();

        let pending = (0..num_forward_ops)
            .map(|i| {
                let consumers: HashSet<OpId> = graph.operations[i]
                    .outputs()
                    .iter()
                    .flat_map(|&v| graph.consumers_of(v).iter().copied())
                    .collect();
                consumers.len()
            })
            .collect();

        Self {
            graph,
            loss,
            num_forward_ops,
            grads: BTreeMap::new(),
            pending,
            enqueued: vec![false; num_forward_ops],
            processed: vec![false; num_forward_ops],
            queue: VecDeque::new(),
        }
    }

    fn run(mut self) -> Result<GradFunction> {
        log::debug!(
            "differentiating \"{}\" over {} operations",
            self.graph.variable(self.loss).name(),
            self.num_forward_ops
        );

        let seed = self.graph.ones_like(self.loss)?;
        self.grads.insert(self.loss, seed);

        for i in 0..self.num_forward_ops {
            if self.pending[i] == 0 {
                self.enqueue(OpId(i));
            }
        }

        let mut processed_count = 0;
        while let Some(op) = self.queue.pop_front() {
            self.differentiate(op)?;
            self.processed[op.0] = true;
            processed_count += 1;
            log::trace!(
                "differentiated \"{}\" ({}/{})",
                self.graph.operation(op).name(),
                processed_count,
                self.num_forward_ops
            );
            self.release_producers(op);
        }

        if processed_count != self.num_forward_ops {
            let unprocessed = (0..self.num_forward_ops)
                .filter(|&i| !self.processed[i])
                .map(|i| self.graph.operations[i].name().to_string())
                .collect();
            return Err(Error::UnreachableOperations {
                processed: processed_count,
                total: self.num_forward_ops,
                unprocessed,
            });
        }

        self.name_gradients()?;
        Ok(GradFunction {
            graph: self.graph,
            gradients: self.grads,
        })
    }

    fn enqueue(&mut self, op: OpId) {
        if !self.enqueued[op.0] {
            self.enqueued[op.0] = true;
            self.queue.push_back(op);
        }
    }

    /// Gradient flowing into an output of `op`; outputs nothing differentiable
    /// reached get zeros.
    fn output_gradient(&mut self, var: VarId) -> Result<VarId> {
        if let Some(&g) = self.grads.get(&var) {
            return Ok(g);
        }

        let forward_consumers: Vec<OpId> = self
            .graph
            .consumers_of(var)
            .iter()
            .copied()
            .filter(|c| c.0 < self.num_forward_ops)
            .collect();
        if let Some(waiting) = forward_consumers.iter().find(|c| !self.processed[c.0]) {
            let op = self.graph.producer_of(var).map(|p| self.graph.operation(p).name().to_string());
            log::debug!(
                "\"{}\" still waits on \"{}\"",
                self.graph.variable(var).name(),
                self.graph.operation(*waiting).name()
            );
            return Err(Error::NullGradient {
                op: op.unwrap_or_default(),
                variable: self.graph.variable(var).name().to_string(),
            });
        }

        let zeros = self.graph.zeros_like(var)?;
        self.grads.insert(var, zeros);
        Ok(zeros)
    }

    fn differentiate(&mut self, op: OpId) -> Result<()> {
        let operation = self.graph.operation(op);
        if let Some(marker) = operation.function().control_flow() {
            log::debug!("cannot differentiate control-flow marker {:?}", marker);
            return Err(Error::NotDifferentiable {
                op: operation.name().to_string(),
                op_type: operation.op_type().to_string(),
            });
        }

        let inputs = operation.inputs().to_vec();
        let outputs = operation.outputs().to_vec();
        let function = operation.function().box_clone();

        let out_grads = outputs
            .iter()
            .map(|&v| self.output_gradient(v))
            .collect::<Result<Vec<_>>>()?;

        let in_grads = function.diff(&mut self.graph, op, &out_grads)?;
        if in_grads.len() != inputs.len() {
            return Err(Error::internal(format!(
                "diff of \"{}\" returned {} gradients for {} inputs",
                self.graph.operation(op).name(),
                in_grads.len(),
                inputs.len()
            )));
        }

        for (input, grad) in inputs.into_iter().zip(in_grads) {
            let Some(grad) = grad else { continue };
            let total = match self.grads.get(&input) {
                Some(&existing) => self.graph.add(existing, grad)?,
                None => grad,
            };
            self.grads.insert(input, total);
        }
        Ok(())
    }

    /// Counts `op` as done for each distinct producer of its inputs.
    fn release_producers(&mut self, op: OpId) {
        let mut seen = HashSet::new();
        let producers: Vec<OpId> = self
            .graph
            .operation(op)
            .inputs()
            .iter()
            .filter_map(|&v| self.graph.producer_of(v))
            .filter(|p| p.0 < self.num_forward_ops && seen.insert(*p))
            .collect();

        for producer in producers {
            self.pending[producer.0] = self.pending[producer.0].saturating_sub(1);
            if self.pending[producer.0] == 0 {
                self.enqueue(producer);
            }
        }
    }

    /// Names each gradient `<variable>-grad`. A gradient variable shared by
    /// several forward variables gets an identity copy per extra name.
    fn name_gradients(&mut self) -> Result<()> {
        let mut named: HashSet<VarId> = HashSet::new();
        let entries: Vec<(VarId, VarId)> = self.grads.iter().map(|(&v, &g)| (v, g)).collect();

        for (var, grad) in entries {
            let target = format!("{}{}", self.graph.variable(var).name(), GRAD_SUFFIX);
            let grad = if named.contains(&grad) {
                let copy = self.graph.identity(grad)?;
                self.grads.insert(var, copy);
                copy
            } else {
                grad
            };

            let current = self.graph.variable(grad).name().to_string();
            self.graph.rename_variable(&current, &target)?;
            named.insert(grad);
            log::trace!("gradient of \"{}\" is \"{}\"", self.graph.variable(var).name(), target);
        }
        Ok(())
    }
}

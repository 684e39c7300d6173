use crate::{
    frame::{FrameIter, VarKey},
    function::ControlFlow,
    graph::Graph,
    operation::OpId,
    variable::{VarId, VariableKind},
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};
use symtensor_core::{
    array::Array,
    error::{Error, Result},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Operations executed by the last `output` call, counted once per frame iteration.
    pub kernel_invocations: usize,
    /// Values cached for the last call, keyed by variable, frame and iteration.
    pub cached_values: usize,
}

/// An evaluation handle over a shared graph.
///
/// Every `output` call owns its own value cache, so any number of sessions
/// (on any number of threads) can evaluate the same graph at once. Nothing
/// but the statistics of the last call survives between calls.
#[derive(Debug)]
pub struct Session<'g> {
    graph: &'g Graph,
    stats: SessionStats,
}

impl<'g> Session<'g> {
    pub(crate) fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            stats: SessionStats::default(),
        }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Evaluates the requested variables, executing only the operations they
    /// depend on.
    pub fn output(&mut self, names: &[&str], placeholders: &HashMap<String, Array>) -> Result<HashMap<String, Array>> {
        let requested = names.iter().map(|n| self.graph.var_id(n)).collect::<Result<Vec<_>>>()?;

        let mut run = Run::new(self.graph);
        run.collect_required(&requested);
        run.bind_leaves(placeholders)?;
        run.execute()?;

        self.stats = SessionStats {
            kernel_invocations: run.invocations,
            cached_values: run.values.len(),
        };
        log::debug!(
            "session produced {:?} with {} kernel invocations",
            names,
            run.invocations
        );

        let main = FrameIter::main();
        let mut results = HashMap::with_capacity(names.len());
        for (name, id) in names.iter().zip(requested) {
            let value = run
                .value(id, &main)
                .ok_or_else(|| Error::execution(*name, "requested output was never produced"))?;
            results.insert(name.to_string(), value.clone());
        }
        Ok(results)
    }
}

type FrameKey = (Arc<str>, Option<Arc<FrameIter>>);

/// State of a single evaluation.
struct Run<'g> {
    graph: &'g Graph,
    required: HashSet<OpId>,
    leaves: Vec<VarId>,
    leaf_values: HashMap<VarId, Array>,
    values: HashMap<VarKey, Array>,
    loop_invariants: HashMap<(VarId, FrameKey), Array>,
    executed: HashSet<(OpId, FrameIter)>,
    queue: VecDeque<(OpId, FrameIter)>,
    invocations: usize,
}

impl<'g> Run<'g> {
    fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            required: HashSet::new(),
            leaves: Vec::new(),
            leaf_values: HashMap::new(),
            values: HashMap::new(),
            loop_invariants: HashMap::new(),
            executed: HashSet::new(),
            queue: VecDeque::new(),
            invocations: 0,
        }
    }

    /// Walks producer edges backwards from the requested variables.
    fn collect_required(&mut self, requested: &[VarId]) {
        let mut visited = HashSet::new();
        let mut stack: Vec<VarId> = requested.to_vec();

        while let Some(var) = stack.pop() {
            if !visited.insert(var) {
                continue;
            }
            match self.graph.producer_of(var) {
                Some(op) => {
                    if self.required.insert(op) {
                        stack.extend(self.graph.operation(op).inputs().iter().copied());
                    }
                },
                None => self.leaves.push(var),
            }
        }
    }

    fn bind_leaves(&mut self, placeholders: &HashMap<String, Array>) -> Result<()> {
        let graph = self.graph;
        for &id in &self.leaves {
            let var = graph.variable(id);
            let array = match var.kind() {
                VariableKind::Placeholder => {
                    let array = placeholders.get(var.name()).ok_or_else(|| Error::MissingPlaceholder {
                        name: var.name().to_string(),
                    })?;

                    if let Some(declared) = var.placeholder_shape().or(var.shape()) {
                        if !declared.is_compatible_with(array.shape()) {
                            return Err(Error::ShapeMismatch {
                                name: var.name().to_string(),
                                expected: declared.dims().to_vec(),
                                got: array.shape().to_vec(),
                            });
                        }
                    }
                    if array.dtype() != var.dtype() {
                        log::trace!(
                            "casting placeholder \"{}\" from {} to {}",
                            var.name(),
                            array.dtype(),
                            var.dtype()
                        );
                    }
                    array.cast(var.dtype())
                },
                VariableKind::Constant | VariableKind::Variable => graph.stored_array(id)?,
                VariableKind::Array => {
                    return Err(Error::IllegalState(format!(
                        "ARRAY variable \"{}\" has no producing operation",
                        var.name()
                    )));
                },
            };
            self.leaf_values.insert(id, array);
        }
        Ok(())
    }

    fn value(&self, var: VarId, frame_iter: &FrameIter) -> Option<&Array> {
        if let Some(leaf) = self.leaf_values.get(&var) {
            return Some(leaf);
        }
        self.values
            .get(&VarKey::new(var, frame_iter.clone()))
            .or_else(|| self.loop_invariants.get(&(var, frame_iter.frame_key())))
    }

    fn is_ready(&self, op: OpId, frame_iter: &FrameIter) -> bool {
        let operation = self.graph.operation(op);
        let mut inputs = operation.inputs().iter();
        match operation.function().control_flow() {
            Some(ControlFlow::Merge) => inputs.any(|&v| self.value(v, frame_iter).is_some()),
            _ => inputs.all(|&v| self.value(v, frame_iter).is_some()),
        }
    }

    fn execute(&mut self) -> Result<()> {
        let mut initial: Vec<OpId> = self
            .required
            .iter()
            .copied()
            .filter(|&op| {
                self.graph
                    .operation(op)
                    .inputs()
                    .iter()
                    .all(|v| self.leaf_values.contains_key(v))
            })
            .collect();
        initial.sort();

        let main = FrameIter::main();
        for op in initial {
            self.queue.push_back((op, main.clone()));
        }

        while let Some((op, frame_iter)) = self.queue.pop_front() {
            if !self.executed.insert((op, frame_iter.clone())) {
                continue;
            }
            self.run_op(op, frame_iter)?;
        }
        Ok(())
    }

    fn input(&self, op: OpId, index: usize, frame_iter: &FrameIter) -> Result<Array> {
        let operation = self.graph.operation(op);
        operation
            .inputs()
            .get(index)
            .and_then(|&v| self.value(v, frame_iter))
            .cloned()
            .ok_or_else(|| Error::execution(operation.name(), format!("input {} is not available in frame {}", index, frame_iter)))
    }

    fn output_id(&self, op: OpId, index: usize) -> Result<VarId> {
        let operation = self.graph.operation(op);
        operation
            .outputs()
            .get(index)
            .copied()
            .ok_or_else(|| Error::execution(operation.name(), format!("operation has no output {}", index)))
    }

    fn run_op(&mut self, op: OpId, frame_iter: FrameIter) -> Result<()> {
        let graph = self.graph;
        let operation = graph.operation(op);
        log::trace!("executing \"{}\" in frame {}", operation.name(), frame_iter);

        match operation.function().control_flow() {
            Some(ControlFlow::Enter { frame, is_constant }) => {
                let value = self.input(op, 0, &frame_iter)?;
                let out = self.output_id(op, 0)?;
                let child = frame_iter.enter(&frame);
                if is_constant {
                    self.loop_invariants.insert((out, child.frame_key()), value.clone());
                }
                self.set_value(out, child, value);
            },
            Some(ControlFlow::Exit) => {
                let value = self.input(op, 0, &frame_iter)?;
                let out = self.output_id(op, 0)?;
                let parent = frame_iter
                    .exit()
                    .ok_or_else(|| Error::execution(operation.name(), "cannot exit the main frame"))?;
                self.set_value(out, parent, value);
            },
            Some(ControlFlow::NextIteration) => {
                let value = self.input(op, 0, &frame_iter)?;
                let out = self.output_id(op, 0)?;
                self.set_value(out, frame_iter.next_iteration(), value);
            },
            Some(ControlFlow::Switch) => {
                let data = self.input(op, 0, &frame_iter)?;
                let pred = self.input(op, 1, &frame_iter)?.item()?.as_bool();
                let out = self.output_id(op, usize::from(pred))?;
                self.set_value(out, frame_iter, data);
            },
            Some(ControlFlow::Merge) => {
                let value = operation
                    .inputs()
                    .iter()
                    .find_map(|&v| self.value(v, &frame_iter))
                    .cloned()
                    .ok_or_else(|| Error::execution(operation.name(), "no input available"))?;
                let out = self.output_id(op, 0)?;
                self.set_value(out, frame_iter, value);
            },
            Some(ControlFlow::LoopCond) | None => {
                let inputs = (0..operation.inputs().len())
                    .map(|i| self.input(op, i, &frame_iter))
                    .collect::<Result<Vec<_>>>()?;
                let refs: Vec<&Array> = inputs.iter().collect();

                let results = operation.function().execute(&refs)?;
                if results.len() != operation.outputs().len() {
                    return Err(Error::execution(
                        operation.name(),
                        format!(
                            "kernel returned {} arrays for {} outputs",
                            results.len(),
                            operation.outputs().len()
                        ),
                    ));
                }
                for (&out, value) in operation.outputs().iter().zip(results) {
                    self.set_value(out, frame_iter.clone(), value);
                }
            },
        }

        self.invocations += 1;
        Ok(())
    }

    /// Caches a value and enqueues every required consumer it unblocks.
    fn set_value(&mut self, var: VarId, frame_iter: FrameIter, value: Array) {
        let graph = self.graph;
        self.values.insert(VarKey::new(var, frame_iter.clone()), value);

        for &consumer in graph.consumers_of(var) {
            if self.required.contains(&consumer)
                && !self.executed.contains(&(consumer, frame_iter.clone()))
                && self.is_ready(consumer, &frame_iter)
            {
                self.queue.push_back((consumer, frame_iter.clone()));
            }
        }
    }
}

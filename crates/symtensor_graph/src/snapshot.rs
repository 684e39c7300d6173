use crate::{
    function::Attributes,
    graph::{Graph, GraphConfig},
    registry::OpRegistry,
    variable::VariableKind,
};
use symtensor_core::{
    array::Array,
    dtype::DType,
    error::{Error, Result},
    shape::Shape,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariableRecord {
    pub name: String,
    pub kind: VariableKind,
    pub shape: Option<Shape>,
    pub dtype: DType,
    /// Stored array of CONSTANT and VARIABLE nodes, if one exists.
    pub value: Option<Array>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OperationRecord {
    pub name: String,
    pub op_type: String,
    pub attributes: Attributes,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Name-based description of a whole graph, in creation order.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GraphSnapshot {
    pub variables: Vec<VariableRecord>,
    pub operations: Vec<OperationRecord>,
}

impl Graph {
    /// Captures the forward graph. VARIABLE nodes that were never
    /// initialized are recorded without a value.
    pub fn snapshot(&self) -> Result<GraphSnapshot> {
        let mut variables = Vec::with_capacity(self.num_variables());
        for var in self.variables() {
            let value = if var.kind().is_stored() && self.has_array(var.name()) {
                Some(self.get_array(var.name())?)
            } else {
                None
            };
            variables.push(VariableRecord {
                name: var.name().to_string(),
                kind: var.kind(),
                shape: var.shape().cloned(),
                dtype: var.dtype(),
                value,
            });
        }

        let names = |ids: &[crate::variable::VarId]| -> Vec<String> {
            ids.iter().map(|&v| self.variable(v).name().to_string()).collect()
        };
        let operations = self
            .operations()
            .iter()
            .map(|op| OperationRecord {
                name: op.name().to_string(),
                op_type: op.op_type().to_string(),
                attributes: op.function().attributes(),
                inputs: names(op.inputs()),
                outputs: names(op.outputs()),
            })
            .collect();

        Ok(GraphSnapshot { variables, operations })
    }

    /// Rebuilds a graph from a snapshot, recreating every operation through
    /// `registry`.
    pub fn from_snapshot(snapshot: &GraphSnapshot, registry: &OpRegistry) -> Result<Graph> {
        Self::from_snapshot_with_config(snapshot, registry, GraphConfig::default())
    }

    pub fn from_snapshot_with_config(
        snapshot: &GraphSnapshot,
        registry: &OpRegistry,
        config: GraphConfig,
    ) -> Result<Graph> {
        let mut graph = Graph::with_config(config);

        for record in &snapshot.variables {
            if graph.has_variable(&record.name) {
                return Err(Error::DuplicateName {
                    name: record.name.clone(),
                    message: "appears twice in the snapshot".to_string(),
                });
            }
            graph.declare_variable(
                &record.name,
                record.kind,
                record.shape.clone(),
                record.dtype,
                record.value.clone(),
            )?;
        }

        for record in &snapshot.operations {
            let function = registry.create(&record.op_type, &record.attributes)?;
            if function.op_type() != record.op_type {
                log::debug!(
                    "constructor for \"{}\" built a \"{}\" operation",
                    record.op_type,
                    function.op_type()
                );
            }
            let op = graph.register_operation(&record.name, function);

            let inputs: Vec<&str> = record.inputs.iter().map(String::as_str).collect();
            let outputs: Vec<&str> = record.outputs.iter().map(String::as_str).collect();
            graph.set_operation_inputs(&record.name, &inputs)?;
            graph.set_operation_outputs(&record.name, &outputs)?;
            log::trace!("restored operation \"{}\" as {:?}", record.name, op);
        }

        Ok(graph)
    }
}

#[cfg(feature = "serde")]
impl GraphSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let config = bincode::config::legacy();
        bincode::serde::encode_to_vec(self, config)
            .map_err(|e| Error::SerializationError(format!("Failed to serialize graph: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config = bincode::config::legacy();
        bincode::serde::decode_from_slice(bytes, config)
            .map(|(value, _)| value)
            .map_err(|e| Error::DeserializationError(format!("Failed to deserialize graph: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::SerializationError(format!("Failed to serialize graph to JSON: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::DeserializationError(format!("Failed to deserialize graph from JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuilt_graph_matches() -> Result<()> {
        let mut graph = Graph::new();
        let x = graph.placeholder("x", DType::F32, &[-1, 2])?;
        let w = graph.var_with_value("w", Array::from_vec(vec![1.0f32, 2.0], &[2, 1])?)?;
        let y = graph.matmul(x, w)?;
        graph.sum(y, &[], false)?;

        let snapshot = graph.snapshot()?;
        let rebuilt = Graph::from_snapshot(&snapshot, &OpRegistry::with_builtin())?;
        assert_eq!(rebuilt.snapshot()?, snapshot);

        let sum = rebuilt.var_id("sum")?;
        assert_eq!(rebuilt.outputs(), vec![sum]);
        assert_eq!(rebuilt.consumers_of(rebuilt.var_id("x")?).len(), 1);
        Ok(())
    }

    #[test]
    fn unknown_op_type() -> Result<()> {
        let mut graph = Graph::new();
        let x = graph.placeholder("x", DType::F32, &[1])?;
        graph.neg(x)?;

        let snapshot = graph.snapshot()?;
        assert!(matches!(
            Graph::from_snapshot(&snapshot, &OpRegistry::new()),
            Err(Error::UnknownOperation(_))
        ));
        Ok(())
    }
}

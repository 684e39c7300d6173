use crate::{
    config::TrainingConfig,
    dataset::{BatchIterator, MultiDataSet},
    listener::TrainingListener,
    updater::{GradientUpdater, Updater},
};
use std::{collections::HashMap, ops::Range};
use symtensor_core::{
    array::Array,
    error::{Error, Result},
};
use symtensor_graph::{Graph, VariableKind};

/// Outcome of [`Trainer::fit`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct History {
    /// Loss of every minibatch, when loss variables are configured.
    pub losses: Vec<f64>,
    pub iterations: usize,
    pub epochs: usize,
}

impl History {
    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }
}

#[derive(Debug)]
struct ParamState {
    name: String,
    length: usize,
    range: Range<usize>,
    updater: Box<dyn GradientUpdater>,
}

/// One flat buffer shared by all parameters, sliced in trainable order.
#[derive(Debug)]
struct UpdaterState {
    buffer: Vec<f64>,
    params: Vec<ParamState>,
}

impl UpdaterState {
    fn allocate(updater: &dyn Updater, graph: &Graph, trainable: &[String]) -> Result<Self> {
        let mut params = Vec::with_capacity(trainable.len());
        let mut offset = 0;
        for name in trainable {
            let length = graph.get_array(name)?.size();
            let size = updater.state_size(length);
            params.push(ParamState {
                name: name.clone(),
                length,
                range: offset..offset + size,
                updater: updater.instantiate(),
            });
            offset += size;
        }
        log::debug!(
            "allocated {} updater state elements for {} parameters",
            offset,
            params.len()
        );
        Ok(Self {
            buffer: vec![0.0; offset],
            params,
        })
    }

    /// Turns `gradient` into the update step of parameter `name`, writing it
    /// back into `gradient`.
    fn apply(&mut self, name: &str, gradient: &mut [f64], iteration: usize, epoch: usize) -> Result<()> {
        let param = self.params.iter_mut().find(|p| p.name == name).ok_or_else(|| {
            Error::IllegalState(format!(
                "parameter \"{}\" was not trainable when the updater state was allocated",
                name
            ))
        })?;
        if gradient.len() != param.length {
            return Err(Error::IllegalState(format!(
                "parameter length changed from {} to {}; updater state cannot be reallocated",
                param.length,
                gradient.len()
            )));
        }
        param
            .updater
            .apply_updater(gradient, &mut self.buffer[param.range.clone()], iteration, epoch)
    }
}

/// Minibatch training loop over a [`Graph`].
pub struct Trainer {
    config: TrainingConfig,
    iteration_count: usize,
    epoch_count: usize,
    listeners: Vec<Box<dyn TrainingListener>>,
    state: Option<UpdaterState>,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            iteration_count: 0,
            epoch_count: 0,
            listeners: Vec::new(),
            state: None,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn add_listener(&mut self, listener: impl TrainingListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Minibatches processed so far, across all calls to `fit`.
    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn epoch_count(&self) -> usize {
        self.epoch_count
    }

    /// Trains for `epochs` passes over `iterator`.
    ///
    /// The iterator is reset before every epoch but the first, so training
    /// for more than one epoch requires [`BatchIterator::reset_supported`].
    pub fn fit(&mut self, graph: &mut Graph, iterator: &mut dyn BatchIterator, epochs: usize) -> Result<History> {
        if epochs > 1 && !iterator.reset_supported() {
            return Err(Error::Configuration(format!(
                "training for {} epochs requires a batch iterator that supports reset",
                epochs
            )));
        }

        let mut history = History::default();
        for epoch in 0..epochs {
            if epoch > 0 {
                iterator.reset()?;
            }

            let mut batches = 0;
            while let Some(batch) = iterator.next_batch() {
                if let Some(loss) = self.fit_batch(graph, &batch)? {
                    history.losses.push(loss);
                }
                batches += 1;
            }

            for listener in &mut self.listeners {
                listener.epoch_done(graph, self.epoch_count);
            }
            log::info!(
                "epoch {} done: {} minibatches, {} iterations in total",
                self.epoch_count,
                batches,
                self.iteration_count
            );
            self.epoch_count += 1;
            history.iterations += batches;
            history.epochs += 1;
        }
        Ok(history)
    }

    /// Runs one differentiation pass and parameter update for `batch`.
    /// Returns the summed value of the configured loss variables.
    pub fn fit_batch(&mut self, graph: &mut Graph, batch: &MultiDataSet) -> Result<Option<f64>> {
        let placeholders = self.bind(batch)?;
        let trainable = self.trainable_params(graph)?;

        let outputs: Vec<&str> = self.config.loss_variables().iter().map(String::as_str).collect();
        let result = graph.exec_backwards_with_outputs(&placeholders, &outputs)?;

        if self.state.is_none() {
            self.state = Some(UpdaterState::allocate(self.config.updater(), graph, &trainable)?);
        }
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| Error::internal("updater state missing after allocation"))?;

        let (l1, l2) = (self.config.l1(), self.config.l2());
        let sign = if self.config.minimize() { -1.0 } else { 1.0 };

        for name in &trainable {
            let gradient = match result.gradients.get(name) {
                Some(gradient) => gradient,
                None => {
                    log::debug!("no gradient for \"{}\", skipping its update", name);
                    continue;
                },
            };
            let param = graph.get_array(name)?;
            let mut values = param.to_f64_vec();

            // flat view of the gradient
            let mut step = gradient.to_f64_vec();
            state
                .apply(name, &mut step, self.iteration_count, self.epoch_count)
                .map_err(|e| Error::UpdaterApplication {
                    parameter: name.clone(),
                    source: Box::new(e),
                })?;

            if step.len() != values.len() {
                return Err(Error::UpdaterApplication {
                    parameter: name.clone(),
                    source: Box::new(Error::IncompatibleShape(format!(
                        "gradient has {} elements but the parameter has {}",
                        step.len(),
                        values.len()
                    ))),
                });
            }

            for (s, &p) in step.iter_mut().zip(values.iter()) {
                if l1 > 0.0 {
                    *s += l1 * signum(p);
                }
                if l2 > 0.0 {
                    *s += l2 * p;
                }
            }
            for (p, s) in values.iter_mut().zip(step) {
                *p += sign * s;
            }

            graph.set_array(name, Array::from_f64_vec(&values, param.shape(), param.dtype())?)?;
        }

        let loss = if outputs.is_empty() {
            None
        } else {
            let mut total = 0.0;
            for name in &outputs {
                let value = result
                    .outputs
                    .get(*name)
                    .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
                total += value.to_f64_vec().iter().sum::<f64>();
            }
            Some(total)
        };

        for listener in &mut self.listeners {
            listener.iteration_done(graph, self.iteration_count, self.epoch_count, loss);
        }
        log::debug!(
            "iteration {} (epoch {}): updated {} parameters, loss {:?}",
            self.iteration_count,
            self.epoch_count,
            trainable.len(),
            loss
        );
        self.iteration_count += 1;
        Ok(loss)
    }

    /// Explicitly configured parameters, or every VARIABLE leaf that is not
    /// bound from batch data.
    pub fn trainable_params(&self, graph: &Graph) -> Result<Vec<String>> {
        if let Some(names) = self.config.trainable_params() {
            for name in names {
                let var = graph.get_variable(name).ok_or_else(|| Error::UnknownVariable(name.clone()))?;
                if var.kind() != VariableKind::Variable {
                    return Err(Error::Configuration(format!(
                        "trainable parameter \"{}\" is a {} variable",
                        name,
                        var.kind().as_str()
                    )));
                }
            }
            return Ok(names.to_vec());
        }

        Ok(graph
            .trainable_candidates()
            .into_iter()
            .map(|id| graph.variable(id).name().to_string())
            .filter(|name| !self.config.is_mapped(name))
            .collect())
    }

    fn bind(&self, batch: &MultiDataSet) -> Result<HashMap<String, Array>> {
        let mut placeholders = HashMap::new();
        bind_arrays(
            "feature",
            self.config.feature_mapping(),
            Some(&batch.features),
            &mut placeholders,
        )?;
        bind_arrays("label", self.config.label_mapping(), Some(&batch.labels), &mut placeholders)?;
        bind_arrays(
            "feature mask",
            self.config.feature_mask_mapping(),
            batch.features_masks.as_ref(),
            &mut placeholders,
        )?;
        bind_arrays(
            "label mask",
            self.config.label_mask_mapping(),
            batch.labels_masks.as_ref(),
            &mut placeholders,
        )?;
        Ok(placeholders)
    }
}

fn bind_arrays(
    what: &str,
    names: &[String],
    arrays: Option<&Vec<Array>>,
    placeholders: &mut HashMap<String, Array>,
) -> Result<()> {
    let arrays = match arrays {
        Some(arrays) => arrays,
        None => return Ok(()),
    };
    if names.len() != arrays.len() {
        return Err(Error::Configuration(format!(
            "{} mapping names {} placeholders but the batch has {} {} arrays",
            what,
            names.len(),
            arrays.len(),
            what
        )));
    }
    for (name, array) in names.iter().zip(arrays) {
        placeholders.insert(name.clone(), array.clone());
    }
    Ok(())
}

// f64::signum maps 0.0 to 1.0
fn signum(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updaters::Sgd;
    use symtensor_core::dtype::DType;

    fn config() -> Result<TrainingConfig> {
        TrainingConfig::builder()
            .updater(Sgd::new(0.1))
            .feature_mapping(&["x"])
            .label_mapping(&["y"])
            .build()
    }

    #[test]
    fn infers_unmapped_variable_leaves() -> Result<()> {
        let mut graph = Graph::new();
        let x = graph.placeholder("x", DType::F32, &[-1, 2])?;
        graph.placeholder("y", DType::F32, &[-1, 1])?;
        let w = graph.var("w", DType::F32, &[2, 1])?;
        let c = graph.constant("c", Array::ones(&[1], DType::F32))?;
        let xw = graph.matmul(x, w)?;
        graph.add(xw, c)?;

        let trainer = Trainer::new(config()?);
        assert_eq!(trainer.trainable_params(&graph)?, vec!["w".to_string()]);
        Ok(())
    }

    #[test]
    fn explicit_params_must_be_variables() -> Result<()> {
        let mut graph = Graph::new();
        graph.placeholder("x", DType::F32, &[1])?;
        let config = TrainingConfig::builder()
            .updater(Sgd::new(0.1))
            .feature_mapping(&["x"])
            .trainable_params(&["x"])
            .build()?;

        let trainer = Trainer::new(config);
        assert!(matches!(trainer.trainable_params(&graph), Err(Error::Configuration(_))));
        Ok(())
    }

    #[test]
    fn binding_checks_counts() -> Result<()> {
        let trainer = Trainer::new(config()?);
        let batch = MultiDataSet::new(vec![Array::zeros(&[1, 2], DType::F32)], vec![]);
        assert!(matches!(trainer.bind(&batch), Err(Error::Configuration(_))));

        let batch = MultiDataSet::new(
            vec![Array::zeros(&[1, 2], DType::F32)],
            vec![Array::zeros(&[1, 1], DType::F32)],
        );
        let bound = trainer.bind(&batch)?;
        assert_eq!(bound.len(), 2);
        assert_eq!(bound["y"].shape(), &[1, 1]);
        Ok(())
    }

    #[test]
    fn sign_of_zero() {
        assert_eq!(signum(0.0), 0.0);
        assert_eq!(signum(-3.0), -1.0);
        assert_eq!(signum(2.5), 1.0);
    }
}

use std::sync::{Arc, Mutex};
use symtensor_graph::Graph;

/// Callbacks invoked by the [`Trainer`](crate::Trainer).
pub trait TrainingListener {
    /// Called after the parameters were updated for one minibatch. `loss`
    /// is present when loss variables are configured.
    fn iteration_done(&mut self, graph: &Graph, iteration: usize, epoch: usize, loss: Option<f64>);

    fn epoch_done(&mut self, _graph: &Graph, _epoch: usize) {}
}

/// Records `(iteration, loss)` pairs into a shared buffer.
#[derive(Clone, Debug, Default)]
pub struct ScoreListener {
    scores: Arc<Mutex<Vec<(usize, f64)>>>,
}

impl ScoreListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the recorded scores, usable after the listener was moved
    /// into a trainer.
    pub fn scores(&self) -> Arc<Mutex<Vec<(usize, f64)>>> {
        Arc::clone(&self.scores)
    }
}

impl TrainingListener for ScoreListener {
    fn iteration_done(&mut self, _graph: &Graph, iteration: usize, _epoch: usize, loss: Option<f64>) {
        if let Some(loss) = loss {
            match self.scores.lock() {
                Ok(mut scores) => scores.push((iteration, loss)),
                Err(_) => log::warn!("score buffer is poisoned, dropping loss of iteration {}", iteration),
            }
        }
    }
}

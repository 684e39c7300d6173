use crate::{
    schedule::Schedule,
    updater::{check_state, GradientUpdater, Updater},
};
use rayon::prelude::*;
use symtensor_core::{error::Result, scalar::Scalar};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// AdaGrad; the state is the per-element sum of squared gradients.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdaGrad {
    learning_rate: Scalar,
    epsilon: Scalar,
    schedule: Option<Schedule>,
}

impl AdaGrad {
    pub fn new(learning_rate: impl Into<Scalar>, epsilon: impl Into<Scalar>) -> Self {
        Self {
            learning_rate: learning_rate.into(),
            epsilon: epsilon.into(),
            schedule: None,
        }
    }
}

learning_rate_methods!(AdaGrad);

impl Updater for AdaGrad {
    fn state_size(&self, num_params: usize) -> usize {
        num_params
    }

    fn instantiate(&self) -> Box<dyn GradientUpdater> {
        Box::new(self.clone())
    }

    fn learning_rate(&self, iteration: usize, epoch: usize) -> f64 {
        self.current_learning_rate(iteration, epoch)
    }

    fn box_clone(&self) -> Box<dyn Updater> {
        Box::new(self.clone())
    }
}

impl GradientUpdater for AdaGrad {
    fn apply_updater(&mut self, gradient: &mut [f64], state: &mut [f64], iteration: usize, epoch: usize) -> Result<()> {
        check_state("AdaGrad", gradient, state, 1)?;
        let lr = self.current_learning_rate(iteration, epoch);
        let epsilon = self.epsilon.as_f64();

        gradient.par_iter_mut().zip(state.par_iter_mut()).for_each(|(g, history)| {
            *history += *g * *g;
            *g = lr * *g / (history.sqrt() + epsilon);
        });
        Ok(())
    }
}

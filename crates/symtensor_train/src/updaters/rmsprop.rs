use crate::{
    schedule::Schedule,
    updater::{check_state, GradientUpdater, Updater},
};
use rayon::prelude::*;
use symtensor_core::{error::Result, scalar::Scalar};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// RMSProp with a running average of squared gradients as state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RmsProp {
    learning_rate: Scalar,
    decay: Scalar,
    epsilon: Scalar,
    schedule: Option<Schedule>,
}

impl RmsProp {
    pub fn new(learning_rate: impl Into<Scalar>, decay: impl Into<Scalar>, epsilon: impl Into<Scalar>) -> Self {
        Self {
            learning_rate: learning_rate.into(),
            decay: decay.into(),
            epsilon: epsilon.into(),
            schedule: None,
        }
    }
}

learning_rate_methods!(RmsProp);

impl Updater for RmsProp {
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

impl GradientUpdater for RmsProp {
    fn apply_updater(&mut self, gradient: &mut [f64], state: &mut [f64], iteration: usize, epoch: usize) -> Result<()> {
        check_state("RmsProp", gradient, state, 1)?;
        let lr = self.current_learning_rate(iteration, epoch);
        let decay = self.decay.as_f64();
        let epsilon = self.epsilon.as_f64();

        gradient.par_iter_mut().zip(state.par_iter_mut()).for_each(|(g, cache)| {
            *cache = decay * *cache + (1.0 - decay) * *g * *g;
            *g = lr * *g / (*cache + epsilon).sqrt();
        });
        Ok(())
    }
}

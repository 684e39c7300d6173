use crate::{
    schedule::Schedule,
    updater::{check_state, GradientUpdater, Updater},
};
use rayon::prelude::*;
use symtensor_core::{error::Result, scalar::Scalar};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Nesterov momentum. State holds one velocity value per parameter element.
///
/// ```text
/// v'   = mu * v - lr * g
/// step = mu * v - (1 + mu) * v'
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Nesterovs {
    learning_rate: Scalar,
    momentum: Scalar,
    schedule: Option<Schedule>,
}

impl Nesterovs {
    pub fn new(learning_rate: impl Into<Scalar>, momentum: impl Into<Scalar>) -> Self {
        Self {
            learning_rate: learning_rate.into(),
            momentum: momentum.into(),
            schedule: None,
        }
    }

    pub fn momentum(&self) -> f64 {
        self.momentum.as_f64()
    }
}

learning_rate_methods!(Nesterovs);

impl Updater for Nesterovs {
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

impl GradientUpdater for Nesterovs {
    fn apply_updater(&mut self, gradient: &mut [f64], state: &mut [f64], iteration: usize, epoch: usize) -> Result<()> {
        check_state("Nesterovs", gradient, state, 1)?;
        let lr = self.current_learning_rate(iteration, epoch);
        let mu = self.momentum.as_f64();

        gradient.par_iter_mut().zip(state.par_iter_mut()).for_each(|(g, v)| {
            let previous = *v;
            *v = mu * previous - lr * *g;
            *g = mu * previous - (1.0 + mu) * *v;
        });
        Ok(())
    }
}

use crate::{
    schedule::Schedule,
    updater::{check_state, GradientUpdater, Updater},
};
use rayon::prelude::*;
use symtensor_core::{error::Result, scalar::Scalar};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Adam. The state of a parameter with `n` elements is `[m; n]` followed by
/// `[v; n]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Adam {
    learning_rate: Scalar,
    beta1: Scalar,
    beta2: Scalar,
    epsilon: Scalar,
    schedule: Option<Schedule>,
}

impl Adam {
    pub fn new(
        learning_rate: impl Into<Scalar>,
        beta1: impl Into<Scalar>,
        beta2: impl Into<Scalar>,
        epsilon: impl Into<Scalar>,
    ) -> Self {
        Self {
            learning_rate: learning_rate.into(),
            beta1: beta1.into(),
            beta2: beta2.into(),
            epsilon: epsilon.into(),
            schedule: None,
        }
    }
}

learning_rate_methods!(Adam);

impl Updater for Adam {
    fn state_size(&self, num_params: usize) -> usize {
        2 * num_params
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

impl GradientUpdater for Adam {
    fn apply_updater(&mut self, gradient: &mut [f64], state: &mut [f64], iteration: usize, epoch: usize) -> Result<()> {
        check_state("Adam", gradient, state, 2)?;
        let lr = self.current_learning_rate(iteration, epoch);
        let beta1 = self.beta1.as_f64();
        let beta2 = self.beta2.as_f64();
        let epsilon = self.epsilon.as_f64();

        // bias correction folded into the step size
        let t = (iteration + 1) as i32;
        let mut alpha = lr * (1.0 - beta2.powi(t)).sqrt() / (1.0 - beta1.powi(t));
        if !alpha.is_finite() || alpha == 0.0 {
            alpha = epsilon;
        }

        let (m, v) = state.split_at_mut(gradient.len());
        gradient
            .par_iter_mut()
            .zip(m.par_iter_mut())
            .zip(v.par_iter_mut())
            .for_each(|((g, m), v)| {
                *m = beta1 * *m + (1.0 - beta1) * *g;
                *v = beta2 * *v + (1.0 - beta2) * *g * *g;
                *g = alpha * *m / (v.sqrt() + epsilon);
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_is_learning_rate_sized() -> Result<()> {
        let adam = Adam::new(0.01, 0.9, 0.999, 1e-8);
        assert_eq!(adam.state_size(3), 6);

        let mut grad = vec![1.0, -4.0, 0.0];
        let mut state = vec![0.0; 6];
        adam.instantiate().apply_updater(&mut grad, &mut state, 0, 0)?;

        assert!((grad[0] - 0.01).abs() < 1e-6);
        assert!((grad[1] + 0.01).abs() < 1e-6);
        assert_eq!(grad[2], 0.0);
        assert!((state[0] - 0.1).abs() < 1e-12);
        assert!((state[4] - 0.016).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn state_must_hold_both_moments() {
        let mut updater = Adam::new(0.01, 0.9, 0.999, 1e-8).instantiate();
        assert!(updater.apply_updater(&mut [1.0, 1.0], &mut [0.0, 0.0], 0, 0).is_err());
    }
}

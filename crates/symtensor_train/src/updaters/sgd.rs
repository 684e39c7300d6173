use crate::{
    schedule::Schedule,
    updater::{GradientUpdater, Updater},
};
use rayon::prelude::*;
use symtensor_core::{error::Result, scalar::Scalar};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Plain stochastic gradient descent: `step = lr * g`. Stateless.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sgd {
    learning_rate: Scalar,
    schedule: Option<Schedule>,
}

impl Sgd {
    pub fn new(learning_rate: impl Into<Scalar>) -> Self {
        Self {
            learning_rate: learning_rate.into(),
            schedule: None,
        }
    }
}

learning_rate_methods!(Sgd);

impl Updater for Sgd {
    fn state_size(&self, _num_params: usize) -> usize {
        0
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

impl GradientUpdater for Sgd {
    fn apply_updater(&mut self, gradient: &mut [f64], _state: &mut [f64], iteration: usize, epoch: usize) -> Result<()> {
        let lr = self.current_learning_rate(iteration, epoch);
        gradient.par_iter_mut().for_each(|g| *g *= lr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleType;

    #[test]
    fn scales_by_learning_rate() -> Result<()> {
        let sgd = Sgd::new(0.1);
        assert_eq!(sgd.state_size(10), 0);

        let mut grad = vec![10.0, -2.0];
        sgd.instantiate().apply_updater(&mut grad, &mut [], 0, 0)?;
        assert!((grad[0] - 1.0).abs() < 1e-12);
        assert!((grad[1] + 0.2).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn scheduled() -> Result<()> {
        let mut sgd = Sgd::new(1.0).with_schedule(Schedule::exponential(ScheduleType::Iteration, 1.0, 0.5));
        assert_eq!(sgd.learning_rate(2, 0), 0.25);

        let mut grad = vec![4.0];
        sgd.apply_updater(&mut grad, &mut [], 2, 0)?;
        assert_eq!(grad, vec![1.0]);

        sgd.set_learning_rate(0.5);
        assert!(sgd.schedule().is_none());
        assert_eq!(sgd.learning_rate(2, 0), 0.5);
        Ok(())
    }
}

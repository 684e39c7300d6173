use std::fmt;
use symtensor_core::error::{Error, Result};

/// Configuration of an update rule.
///
/// An updater describes how much per-parameter state it needs and produces
/// a [`GradientUpdater`] that turns a raw gradient into the step subtracted
/// from (or added to) the parameter.
pub trait Updater: fmt::Debug + Send + Sync {
    /// Number of state elements needed for a parameter of `num_params`
    /// elements.
    fn state_size(&self, num_params: usize) -> usize;

    fn instantiate(&self) -> Box<dyn GradientUpdater>;

    /// Learning rate in effect at the given iteration and epoch.
    fn learning_rate(&self, iteration: usize, epoch: usize) -> f64;

    fn box_clone(&self) -> Box<dyn Updater>;
}

impl Clone for Box<dyn Updater> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

pub trait GradientUpdater: fmt::Debug + Send {
    /// Rewrites `gradient` in place into the update step, reading and writing
    /// this parameter's slice of the flat state buffer.
    fn apply_updater(&mut self, gradient: &mut [f64], state: &mut [f64], iteration: usize, epoch: usize) -> Result<()>;
}

/// Checks that `state` holds `per_element` values per gradient element.
pub(crate) fn check_state(name: &str, gradient: &[f64], state: &[f64], per_element: usize) -> Result<()> {
    let expected = gradient.len() * per_element;
    if state.len() != expected {
        return Err(Error::IllegalState(format!(
            "{} state has {} elements, expected {} for a gradient of {} elements",
            name,
            state.len(),
            expected,
            gradient.len()
        )));
    }
    Ok(())
}

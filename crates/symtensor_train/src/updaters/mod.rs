macro_rules! learning_rate_methods {
    ($name:ident) => {
        impl $name {
            /// Replaces the fixed learning rate with a schedule.
            pub fn with_schedule(mut self, schedule: $crate::schedule::Schedule) -> Self {
                self.schedule = Some(schedule);
                self
            }

            /// Sets a fixed learning rate, dropping any schedule.
            pub fn set_learning_rate(&mut self, learning_rate: impl Into<symtensor_core::scalar::Scalar>) {
                self.learning_rate = learning_rate.into();
                self.schedule = None;
            }

            pub fn schedule(&self) -> Option<&$crate::schedule::Schedule> {
                self.schedule.as_ref()
            }

            fn current_learning_rate(&self, iteration: usize, epoch: usize) -> f64 {
                match &self.schedule {
                    Some(schedule) => schedule.value_at(iteration, epoch),
                    None => self.learning_rate.as_f64(),
                }
            }
        }
    };
}

mod adagrad;
mod adam;
mod nesterovs;
mod rmsprop;
mod sgd;

pub use adagrad::AdaGrad;
pub use adam::Adam;
pub use nesterovs::Nesterovs;
pub use rmsprop::RmsProp;
pub use sgd::Sgd;

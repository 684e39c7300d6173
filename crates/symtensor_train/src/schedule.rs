#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether a schedule advances per minibatch or per epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScheduleType {
    Iteration,
    Epoch,
}

impl ScheduleType {
    fn step(self, iteration: usize, epoch: usize) -> f64 {
        match self {
            Self::Iteration => iteration as f64,
            Self::Epoch => epoch as f64,
        }
    }
}

/// A learning-rate schedule.
///
/// `i` below is the iteration or epoch count, depending on the
/// [`ScheduleType`]:
///
/// - `Fixed`: `value`
/// - `Exponential`: `initial * gamma^i`
/// - `Step`: `initial * decay_rate^floor(i / step)`
/// - `Inverse`: `initial / (1 + gamma * i)^power`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Schedule {
    Fixed(f64),
    Exponential {
        schedule_type: ScheduleType,
        initial: f64,
        gamma: f64,
    },
    Step {
        schedule_type: ScheduleType,
        initial: f64,
        decay_rate: f64,
        step: f64,
    },
    Inverse {
        schedule_type: ScheduleType,
        initial: f64,
        gamma: f64,
        power: f64,
    },
}

impl Schedule {
    pub fn exponential(schedule_type: ScheduleType, initial: f64, gamma: f64) -> Self {
        Self::Exponential {
            schedule_type,
            initial,
            gamma,
        }
    }

    pub fn step(schedule_type: ScheduleType, initial: f64, decay_rate: f64, step: f64) -> Self {
        Self::Step {
            schedule_type,
            initial,
            decay_rate,
            step,
        }
    }

    pub fn inverse(schedule_type: ScheduleType, initial: f64, gamma: f64, power: f64) -> Self {
        Self::Inverse {
            schedule_type,
            initial,
            gamma,
            power,
        }
    }

    pub fn value_at(&self, iteration: usize, epoch: usize) -> f64 {
        match *self {
            Self::Fixed(value) => value,
            Self::Exponential {
                schedule_type,
                initial,
                gamma,
            } => initial * gamma.powf(schedule_type.step(iteration, epoch)),
            Self::Step {
                schedule_type,
                initial,
                decay_rate,
                step,
            } => initial * decay_rate.powf((schedule_type.step(iteration, epoch) / step).floor()),
            Self::Inverse {
                schedule_type,
                initial,
                gamma,
                power,
            } => initial / (1.0 + gamma * schedule_type.step(iteration, epoch)).powf(power),
        }
    }
}

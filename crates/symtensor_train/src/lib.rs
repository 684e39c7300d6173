pub mod config;
pub mod dataset;
pub mod listener;
pub mod schedule;
pub mod trainer;
pub mod updater;
pub mod updaters;

pub use crate::{
    config::{TrainingConfig, TrainingConfigBuilder},
    dataset::{BatchIterator, MultiDataSet, VecBatchIterator},
    listener::{ScoreListener, TrainingListener},
    schedule::{Schedule, ScheduleType},
    trainer::{History, Trainer},
    updater::{GradientUpdater, Updater},
    updaters::{AdaGrad, Adam, Nesterovs, RmsProp, Sgd},
};

pub use crate::core::{
    array::Array,
    dtype::{get_default_dtype, set_default_dtype, DType},
    error::{Error, Result},
    init::WeightInit,
    scalar::Scalar,
    shape::Shape,
};
pub use crate::graph::{
    DifferentialFunction, Graph, GraphConfig, GraphSnapshot, OpRegistry, Session, VarId, VariableKind,
};
#[cfg(feature = "train")]
pub use crate::train::{
    AdaGrad, Adam, BatchIterator, MultiDataSet, Nesterovs, RmsProp, Schedule, ScheduleType, ScoreListener, Sgd, Trainer,
    TrainingConfig, TrainingListener, Updater, VecBatchIterator,
};

use crate::dtype::DType;
use std::fmt;

/// Coarse classification of an [`Error`], one bucket per failure domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    GraphConstruction,
    Evaluation,
    DifferentiationState,
    UpdaterApplication,
    Configuration,
    Serialization,
    Internal,
}

#[derive(Debug)]
pub enum Error {
    // graph construction
    DuplicateName {
        name: String,
        message: String,
    },
    RenameCollision {
        from: String,
        to: String,
    },
    UnknownVariable(String),
    UnknownOperation(String),
    IllegalState(String),
    // evaluation
    MissingPlaceholder {
        name: String,
    },
    ShapeMismatch {
        name: String,
        expected: Vec<i64>,
        got: Vec<usize>,
    },
    IncompatibleShape(String),
    DTypeMismatch {
        expected: DType,
        got: DType,
    },
    UnsupportedDType(DType),
    InvalidArgument(String),
    Execution {
        op: String,
        message: String,
    },
    // differentiation
    MultipleOutputs {
        outputs: Vec<String>,
    },
    NoOutputs,
    NullGradient {
        op: String,
        variable: String,
    },
    NotDifferentiable {
        op: String,
        op_type: String,
    },
    UnreachableOperations {
        processed: usize,
        total: usize,
        unprocessed: Vec<String>,
    },
    // training
    UpdaterApplication {
        parameter: String,
        source: Box<Error>,
    },
    Configuration(String),
    // serde
    SerializationError(String),
    DeserializationError(String),
    //
    Internal {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateName { .. }
            | Self::RenameCollision { .. }
            | Self::UnknownVariable(_)
            | Self::UnknownOperation(_)
            | Self::IllegalState(_) => ErrorKind::GraphConstruction,
            Self::MissingPlaceholder { .. }
            | Self::ShapeMismatch { .. }
            | Self::IncompatibleShape(_)
            | Self::DTypeMismatch { .. }
            | Self::UnsupportedDType(_)
            | Self::InvalidArgument(_)
            | Self::Execution { .. } => ErrorKind::Evaluation,
            Self::MultipleOutputs { .. }
            | Self::NoOutputs
            | Self::NullGradient { .. }
            | Self::NotDifferentiable { .. }
            | Self::UnreachableOperations { .. } => ErrorKind::DifferentiationState,
            Self::UpdaterApplication { .. } => ErrorKind::UpdaterApplication,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::SerializationError(_) | Self::DeserializationError(_) => ErrorKind::Serialization,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn execution(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            op: op.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { name, message } => write!(f, "Duplicate name \"{}\": {}", name, message),
            Self::RenameCollision { from, to } => write!(
                f,
                "Cannot rename variable \"{}\" to \"{}\": name already refers to a different variable",
                from, to
            ),
            Self::UnknownVariable(name) => write!(f, "No variable named \"{}\"", name),
            Self::UnknownOperation(name) => write!(f, "No operation named \"{}\"", name),
            Self::IllegalState(msg) => write!(f, "Illegal state: {}", msg),

            Self::MissingPlaceholder { name } => write!(
                f,
                "No array was provided for required placeholder variable \"{}\"",
                name
            ),
            Self::ShapeMismatch { name, expected, got } => write!(
                f,
                "Shape mismatch for placeholder \"{}\": declared {:?}, got {:?}",
                name, expected, got
            ),
            Self::IncompatibleShape(msg) => write!(f, "Incompatible shape: {}", msg),
            Self::DTypeMismatch { expected, got } => {
                write!(f, "DType mismatch: expected {:?}, got {:?}", expected, got)
            }
            Self::UnsupportedDType(dtype) => write!(f, "Unsupported data type: {}", dtype),
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Self::Execution { op, message } => write!(f, "Execution of \"{}\" failed: {}", op, message),

            Self::MultipleOutputs { outputs } => write!(
                f,
                "Cannot differentiate a graph with multiple outputs {:?}: combine the losses into a single scalar first",
                outputs
            ),
            Self::NoOutputs => write!(f, "Cannot differentiate a graph without outputs"),
            Self::NullGradient { op, variable } => write!(
                f,
                "No gradient available for output \"{}\" of operation \"{}\"",
                variable, op
            ),
            Self::NotDifferentiable { op, op_type } => {
                write!(f, "Operation \"{}\" ({}) is not differentiable", op, op_type)
            }
            Self::UnreachableOperations {
                processed,
                total,
                unprocessed,
            } => write!(
                f,
                "Differentiated {} of {} operations; unreachable operations: {:?}",
                processed, total, unprocessed
            ),

            Self::UpdaterApplication { parameter, source } => {
                write!(f, "Error applying updater for parameter \"{}\": {}", parameter, source)
            }
            Self::Configuration(msg) => write!(f, "Configuration error: {}", msg),

            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Self::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),

            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UpdaterApplication { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn updater_error_exposes_source() {
        let err = Error::UpdaterApplication {
            parameter: "w".into(),
            source: Box::new(Error::IncompatibleShape("length changed".into())),
        };

        assert_eq!(err.kind(), ErrorKind::UpdaterApplication);
        assert!(err.to_string().contains("\"w\""));
        assert!(err.source().is_some());
    }

    #[test]
    fn multiple_outputs_lists_names() {
        let err = Error::MultipleOutputs {
            outputs: vec!["a".into(), "b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"a\"") && msg.contains("\"b\""));
        assert_eq!(err.kind(), ErrorKind::DifferentiationState);
    }
}

//! Symbolic tensor graphs.
//!
//! Build a [`Graph`] of named variables and operations, evaluate any subset
//! of it through a [`Session`], differentiate a scalar loss with
//! [`Graph::exec_backwards`] and fit parameters with the minibatch
//! `Trainer` (behind the `train` feature).
//!
//! ```no_run
//! use symtensor::prelude::*;
//! use std::collections::HashMap;
//!
//! # fn main() -> Result<()> {
//! let mut graph = Graph::new();
//! let x = graph.placeholder("x", DType::F32, &[-1, 2])?;
//! let w = graph.var("w", DType::F32, &[2, 1])?;
//! let y = graph.matmul(x, w)?;
//! graph.sum(y, &[], false)?;
//!
//! let mut inputs = HashMap::new();
//! inputs.insert("x".to_string(), Array::ones(&[4, 2], DType::F32));
//! let grads = graph.exec_backwards(&inputs)?;
//! assert_eq!(grads["w"].shape(), &[2, 1]);
//! # Ok(())
//! # }
//! ```

pub use symtensor_internal::*;

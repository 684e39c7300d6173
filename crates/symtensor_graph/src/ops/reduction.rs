use super::{check_arity, first_grad, io};
use crate::{
    function::{AttrValue, Attributes, DifferentialFunction},
    graph::Graph,
    operation::OpId,
    variable::VarId,
};
use symtensor_core::{
    array::Array,
    dtype::DType,
    error::{Error, Result},
    shape::{compute_size, Shape},
};
use symtensor_cpu::ops::{reduction, transform};

/// Per-axis reduce flags for `dims` over a tensor of `rank` axes. Negative
/// axes count from the end; no axes means all of them.
fn reduce_flags(dims: &[i64], rank: usize) -> Result<Vec<bool>> {
    if dims.is_empty() {
        return Ok(vec![true; rank]);
    }
    let mut flags = vec![false; rank];
    for &d in dims {
        let axis = if d < 0 { d + rank as i64 } else { d };
        if axis < 0 || axis >= rank as i64 {
            return Err(Error::InvalidArgument(format!(
                "axis {} out of range for rank {}",
                d, rank
            )));
        }
        flags[axis as usize] = true;
    }
    Ok(flags)
}

fn reduced_dims<T: Copy>(dims: &[T], flags: &[bool], keep_dims: bool, one: T) -> Vec<T> {
    dims.iter()
        .zip(flags)
        .filter_map(|(&d, &r)| match (r, keep_dims) {
            (false, _) => Some(d),
            (true, true) => Some(one),
            (true, false) => None,
        })
        .collect()
}

fn reduction_attributes(dims: &[i64], keep_dims: bool) -> Attributes {
    Attributes::new()
        .with("dims", AttrValue::Ints(dims.to_vec()))
        .with("keep_dims", AttrValue::Bool(keep_dims))
}

macro_rules! reduce_function {
    ($(#[$meta:meta])* $name:ident, $op_type:literal, $kernel:path, $mean:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        pub struct $name {
            pub dims: Vec<i64>,
            pub keep_dims: bool,
        }

        impl $name {
            pub fn new(dims: &[i64], keep_dims: bool) -> Self {
                Self {
                    dims: dims.to_vec(),
                    keep_dims,
                }
            }

            pub fn from_attributes(attrs: &Attributes) -> Result<Self> {
                Ok(Self::new(
                    &attrs.get_ints("dims").unwrap_or_default(),
                    attrs.get_bool("keep_dims").unwrap_or(false),
                ))
            }
        }

        impl DifferentialFunction for $name {
            fn op_type(&self) -> &'static str {
                $op_type
            }

            fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
                let shape = inputs.first()?.as_ref()?;
                let flags = reduce_flags(&self.dims, shape.rank()).ok()?;
                Some(vec![Shape::new(&reduced_dims(shape.dims(), &flags, self.keep_dims, 1))])
            }

            fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
                check_arity($op_type, inputs, 1)?;
                Ok(vec![if $mean { super::float_dtype(inputs[0]) } else { inputs[0] }])
            }

            fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
                check_arity($op_type, inputs, 1)?;
                let x = inputs[0];
                let flags = reduce_flags(&self.dims, x.ndim())?;
                let out_dims = reduced_dims(x.shape(), &flags, self.keep_dims, 1);

                let mut out = vec![0.0; compute_size(&out_dims)];
                $kernel(x.shape(), &flags, &x.to_f64_vec(), &mut out);
                let dtype = if $mean { super::float_dtype(x.dtype()) } else { x.dtype() };
                Ok(vec![Array::from_f64_vec(&out, &out_dims, dtype)?])
            }

            fn diff(&self, graph: &mut Graph, op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
                let (inputs, _) = io(graph, op);
                check_arity($op_type, &inputs, 1)?;
                let bp = ReduceBp {
                    dims: self.dims.clone(),
                    keep_dims: self.keep_dims,
                    mean: $mean,
                };
                let grad = graph.op1(Box::new(bp), &[first_grad(grads)?, inputs[0]])?;
                Ok(vec![Some(grad)])
            }

            fn attributes(&self) -> Attributes {
                reduction_attributes(&self.dims, self.keep_dims)
            }

            fn box_clone(&self) -> Box<dyn DifferentialFunction> {
                Box::new(self.clone())
            }
        }
    };
}

reduce_function!(
    /// Sum over `dims` (all axes when empty).
    Sum, "sum", reduction::sum, false
);
reduce_function!(
    /// Arithmetic mean over `dims` (all axes when empty).
    Mean, "mean", reduction::mean, true
);

/// Backward pass of [`Sum`] and [`Mean`]: spreads the reduced gradient (first
/// input) back over the shape of the reduced tensor (second input).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReduceBp {
    pub dims: Vec<i64>,
    pub keep_dims: bool,
    pub mean: bool,
}

impl ReduceBp {
    pub fn from_attributes(attrs: &Attributes) -> Result<Self> {
        Ok(Self {
            dims: attrs.get_ints("dims").unwrap_or_default(),
            keep_dims: attrs.get_bool("keep_dims").unwrap_or(false),
            mean: attrs.get_bool("mean").unwrap_or(false),
        })
    }
}

impl DifferentialFunction for ReduceBp {
    fn op_type(&self) -> &'static str {
        "reduce_bp"
    }

    fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
        inputs.get(1).cloned().flatten().map(|s| vec![s])
    }

    fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
        check_arity("reduce_bp", inputs, 2)?;
        Ok(vec![inputs[0]])
    }

    fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
        check_arity("reduce_bp", inputs, 2)?;
        let (grad, x) = (inputs[0], inputs[1]);
        let flags = reduce_flags(&self.dims, x.ndim())?;
        let kept = reduced_dims(x.shape(), &flags, true, 1);

        if compute_size(&kept) != grad.size() {
            return Err(Error::IncompatibleShape(format!(
                "reduced gradient of shape {:?} does not match input shape {:?}",
                grad.shape(),
                x.shape()
            )));
        }

        let mut out = vec![0.0; x.size()];
        transform::expand(&kept, &grad.to_f64_vec(), x.shape(), &mut out);
        if self.mean {
            let count: usize = x.shape().iter().zip(&flags).filter(|(_, &r)| r).map(|(&d, _)| d).product();
            if count > 0 {
                let scale = 1.0 / count as f64;
                out.iter_mut().for_each(|v| *v *= scale);
            }
        }
        Ok(vec![Array::from_f64_vec(&out, x.shape(), grad.dtype())?])
    }

    fn diff(&self, graph: &mut Graph, _op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
        let g = first_grad(grads)?;
        let grad = if self.mean {
            graph.mean(g, &self.dims, self.keep_dims)?
        } else {
            graph.sum(g, &self.dims, self.keep_dims)?
        };
        Ok(vec![Some(grad), None])
    }

    fn attributes(&self) -> Attributes {
        reduction_attributes(&self.dims, self.keep_dims).with("mean", AttrValue::Bool(self.mean))
    }

    fn box_clone(&self) -> Box<dyn DifferentialFunction> {
        Box::new(self.clone())
    }
}

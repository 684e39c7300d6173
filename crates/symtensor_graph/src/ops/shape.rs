use super::{check_arity, first_grad, io, same_shape};
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
    shape::{compute_size, Shape, UNKNOWN_DIM},
};
use symtensor_cpu::ops::{reduction, transform};

fn first_dtype(op_type: &str, inputs: &[DType], arity: usize) -> Result<Vec<DType>> {
    check_arity(op_type, inputs, arity)?;
    Ok(vec![inputs[0]])
}

// ─── Reshape ─────────────────────────────────────────────────────────────────

/// Reshape to a fixed target; at most one dimension may be `-1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reshape {
    pub shape: Vec<i64>,
}

impl Reshape {
    pub fn new(shape: &[i64]) -> Result<Self> {
        if shape.iter().filter(|&&d| d == UNKNOWN_DIM).count() > 1 {
            return Err(Error::InvalidArgument(format!(
                "reshape target {:?} has more than one unknown dimension",
                shape
            )));
        }
        if shape.iter().any(|&d| d < UNKNOWN_DIM) {
            return Err(Error::InvalidArgument(format!("invalid reshape target {:?}", shape)));
        }
        Ok(Self { shape: shape.to_vec() })
    }

    pub fn from_attributes(attrs: &Attributes) -> Result<Self> {
        Self::new(&attrs.get_ints("shape")?)
    }

    fn resolve(&self, size: usize) -> Result<Vec<usize>> {
        let known: usize = self.shape.iter().filter(|&&d| d != UNKNOWN_DIM).map(|&d| d as usize).product();
        let mut dims = Vec::with_capacity(self.shape.len());
        for &d in &self.shape {
            if d == UNKNOWN_DIM {
                if known == 0 || size % known != 0 {
                    return Err(Error::IncompatibleShape(format!(
                        "cannot reshape {} elements into {:?}",
                        size, self.shape
                    )));
                }
                dims.push(size / known);
            } else {
                dims.push(d as usize);
            }
        }
        if compute_size(&dims) != size {
            return Err(Error::IncompatibleShape(format!(
                "cannot reshape {} elements into {:?}",
                size, self.shape
            )));
        }
        Ok(dims)
    }
}

impl DifferentialFunction for Reshape {
    fn op_type(&self) -> &'static str {
        "reshape"
    }

    fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
        let resolved = inputs
            .first()
            .and_then(|s| s.as_ref())
            .and_then(|s| s.size())
            .and_then(|size| self.resolve(size).ok());
        match resolved {
            Some(dims) => Some(vec![Shape::from_concrete(&dims)]),
            None => Some(vec![Shape::new(&self.shape)]),
        }
    }

    fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
        first_dtype("reshape", inputs, 1)
    }

    fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
        check_arity("reshape", inputs, 1)?;
        let dims = self.resolve(inputs[0].size())?;
        Ok(vec![inputs[0].reshape(&dims)?])
    }

    fn diff(&self, graph: &mut Graph, op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
        let (inputs, _) = io(graph, op);
        Ok(vec![Some(graph.reshape_like(first_grad(grads)?, inputs[0])?)])
    }

    fn attributes(&self) -> Attributes {
        Attributes::new().with("shape", AttrValue::Ints(self.shape.clone()))
    }

    fn box_clone(&self) -> Box<dyn DifferentialFunction> {
        Box::new(self.clone())
    }
}

// ─── Runtime-shaped ops ──────────────────────────────────────────────────────
//
// The second input only contributes its runtime shape, so these work even
// when the shapes involved are unknown while building the graph.

/// Reshapes the first input to the shape of the second.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReshapeLike;

impl DifferentialFunction for ReshapeLike {
    fn op_type(&self) -> &'static str {
        "reshape_like"
    }

    fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
        inputs.get(1).cloned().flatten().map(|s| vec![s])
    }

    fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
        first_dtype("reshape_like", inputs, 2)
    }

    fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
        check_arity("reshape_like", inputs, 2)?;
        Ok(vec![inputs[0].reshape(inputs[1].shape())?])
    }

    fn diff(&self, graph: &mut Graph, op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
        let (inputs, _) = io(graph, op);
        Ok(vec![Some(graph.reshape_like(first_grad(grads)?, inputs[0])?), None])
    }

    fn box_clone(&self) -> Box<dyn DifferentialFunction> {
        Box::new(*self)
    }
}

/// Sums the first input down to the shape of the second, undoing a broadcast.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReduceLike;

pub(crate) fn reduce_array(x: &Array, target: &[usize]) -> Result<Array> {
    if x.shape() == target {
        return Ok(x.clone());
    }
    let dims = x.shape();
    if target.len() > dims.len() {
        // only a reshape can help here
        return x.reshape(target);
    }

    let mut padded = vec![1; dims.len() - target.len()];
    padded.extend_from_slice(target);

    let mut reduce = Vec::with_capacity(dims.len());
    for (&d, &t) in dims.iter().zip(&padded) {
        if d == t {
            reduce.push(false);
        } else if t == 1 {
            reduce.push(true);
        } else {
            return Err(Error::IncompatibleShape(format!(
                "cannot reduce shape {:?} to {:?}",
                dims, target
            )));
        }
    }

    let mut out = vec![0.0; compute_size(&padded)];
    reduction::sum(dims, &reduce, &x.to_f64_vec(), &mut out);
    Array::from_f64_vec(&out, target, x.dtype())
}

impl DifferentialFunction for ReduceLike {
    fn op_type(&self) -> &'static str {
        "reduce_like"
    }

    fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
        inputs.get(1).cloned().flatten().map(|s| vec![s])
    }

    fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
        first_dtype("reduce_like", inputs, 2)
    }

    fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
        check_arity("reduce_like", inputs, 2)?;
        Ok(vec![reduce_array(inputs[0], inputs[1].shape())?])
    }

    fn diff(&self, graph: &mut Graph, op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
        let (inputs, _) = io(graph, op);
        Ok(vec![Some(graph.broadcast_like(first_grad(grads)?, inputs[0])?), None])
    }

    fn box_clone(&self) -> Box<dyn DifferentialFunction> {
        Box::new(*self)
    }
}

/// Broadcasts the first input up to the shape of the second.
#[derive(Clone, Copy, Debug, Default)]
pub struct BroadcastLike;

pub(crate) fn broadcast_array(x: &Array, target: &[usize]) -> Result<Array> {
    if x.shape() == target {
        return Ok(x.clone());
    }
    if x.ndim() > target.len() {
        return x.reshape(target);
    }

    let offset = target.len() - x.ndim();
    let fits = x
        .shape()
        .iter()
        .zip(&target[offset..])
        .all(|(&d, &t)| d == t || d == 1);
    if !fits {
        return Err(Error::IncompatibleShape(format!(
            "cannot broadcast shape {:?} to {:?}",
            x.shape(),
            target
        )));
    }

    let mut out = vec![0.0; compute_size(target)];
    transform::expand(x.shape(), &x.to_f64_vec(), target, &mut out);
    Array::from_f64_vec(&out, target, x.dtype())
}

impl DifferentialFunction for BroadcastLike {
    fn op_type(&self) -> &'static str {
        "broadcast_like"
    }

    fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
        inputs.get(1).cloned().flatten().map(|s| vec![s])
    }

    fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
        first_dtype("broadcast_like", inputs, 2)
    }

    fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
        check_arity("broadcast_like", inputs, 2)?;
        Ok(vec![broadcast_array(inputs[0], inputs[1].shape())?])
    }

    fn diff(&self, graph: &mut Graph, op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
        let (inputs, _) = io(graph, op);
        Ok(vec![Some(graph.reduce_like(first_grad(grads)?, inputs[0])?), None])
    }

    fn box_clone(&self) -> Box<dyn DifferentialFunction> {
        Box::new(*self)
    }
}

// ─── Transpose ───────────────────────────────────────────────────────────────

/// Permutes axes; without an explicit permutation the axes are reversed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transpose {
    pub perm: Option<Vec<usize>>,
}

impl Transpose {
    pub fn new(perm: Option<Vec<usize>>) -> Result<Self> {
        if let Some(perm) = &perm {
            let mut seen = vec![false; perm.len()];
            for &axis in perm {
                if axis >= perm.len() || std::mem::replace(&mut seen[axis], true) {
                    return Err(Error::InvalidArgument(format!("{:?} is not a permutation", perm)));
                }
            }
        }
        Ok(Self { perm })
    }

    pub fn from_attributes(attrs: &Attributes) -> Result<Self> {
        let perm = match attrs.get("perm") {
            Some(_) => Some(attrs.get_ints("perm")?.into_iter().map(|p| p as usize).collect()),
            None => None,
        };
        Self::new(perm)
    }

    fn perm_for(&self, rank: usize) -> Result<Vec<usize>> {
        match &self.perm {
            Some(perm) if perm.len() == rank => Ok(perm.clone()),
            Some(perm) => Err(Error::IncompatibleShape(format!(
                "permutation {:?} applied to rank {}",
                perm, rank
            ))),
            None => Ok((0..rank).rev().collect()),
        }
    }

    fn inverse(&self) -> Self {
        let perm = self.perm.as_ref().map(|perm| {
            let mut inverse = vec![0; perm.len()];
            for (i, &p) in perm.iter().enumerate() {
                inverse[p] = i;
            }
            inverse
        });
        Self { perm }
    }
}

impl DifferentialFunction for Transpose {
    fn op_type(&self) -> &'static str {
        "transpose"
    }

    fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
        let shape = same_shape(inputs)?.pop()?;
        let perm = self.perm_for(shape.rank()).ok()?;
        let dims: Vec<i64> = perm.iter().map(|&p| shape.dims()[p]).collect();
        Some(vec![Shape::new(&dims)])
    }

    fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
        first_dtype("transpose", inputs, 1)
    }

    fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
        check_arity("transpose", inputs, 1)?;
        let x = inputs[0];
        let perm = self.perm_for(x.ndim())?;
        let dims: Vec<usize> = perm.iter().map(|&p| x.shape()[p]).collect();

        let mut out = vec![0.0; x.size()];
        transform::permute(x.shape(), &perm, &x.to_f64_vec(), &mut out);
        Ok(vec![Array::from_f64_vec(&out, &dims, x.dtype())?])
    }

    fn diff(&self, graph: &mut Graph, _op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
        let grad = graph.op1(Box::new(self.inverse()), &[first_grad(grads)?])?;
        Ok(vec![Some(grad)])
    }

    fn attributes(&self) -> Attributes {
        match &self.perm {
            Some(perm) => Attributes::new().with("perm", AttrValue::Ints(perm.iter().map(|&p| p as i64).collect())),
            None => Attributes::new(),
        }
    }

    fn box_clone(&self) -> Box<dyn DifferentialFunction> {
        Box::new(self.clone())
    }
}

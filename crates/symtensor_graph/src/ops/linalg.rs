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
    shape::{Shape, UNKNOWN_DIM},
};
use symtensor_cpu::ops::matmul;

/// Batched matrix product over the last two axes, optionally transposing
/// either operand. Leading (batch) axes must match exactly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatMul {
    pub transpose_a: bool,
    pub transpose_b: bool,
}

impl MatMul {
    pub fn new(transpose_a: bool, transpose_b: bool) -> Self {
        Self {
            transpose_a,
            transpose_b,
        }
    }

    pub fn from_attributes(attrs: &Attributes) -> Result<Self> {
        Ok(Self::new(
            attrs.get_bool("transpose_a").unwrap_or(false),
            attrs.get_bool("transpose_b").unwrap_or(false),
        ))
    }

    // (m, k) of `a` and (k, n) of `b` after applying the transpose flags
    fn operand_dims<T: Copy>(&self, a: &[T], b: &[T]) -> Option<((T, T), (T, T))> {
        if a.len() < 2 || b.len() < 2 {
            return None;
        }
        let (a0, a1) = (a[a.len() - 2], a[a.len() - 1]);
        let (b0, b1) = (b[b.len() - 2], b[b.len() - 1]);
        let lhs = if self.transpose_a { (a1, a0) } else { (a0, a1) };
        let rhs = if self.transpose_b { (b1, b0) } else { (b0, b1) };
        Some((lhs, rhs))
    }
}

impl DifferentialFunction for MatMul {
    fn op_type(&self) -> &'static str {
        "matmul"
    }

    fn output_shapes(&self, inputs: &[Option<Shape>]) -> Option<Vec<Shape>> {
        let [Some(a), Some(b)] = inputs else {
            return None;
        };
        let ((m, _), (_, n)) = self.operand_dims(a.dims(), b.dims())?;

        let batch_a = &a.dims()[..a.rank() - 2];
        let batch_b = &b.dims()[..b.rank() - 2];
        if batch_a.len() != batch_b.len() {
            return None;
        }
        let mut dims: Vec<i64> = batch_a
            .iter()
            .zip(batch_b)
            .map(|(&x, &y)| if x == UNKNOWN_DIM { y } else { x })
            .collect();
        dims.push(m);
        dims.push(n);
        Some(vec![Shape::new(&dims)])
    }

    fn output_dtypes(&self, inputs: &[DType]) -> Result<Vec<DType>> {
        check_arity("matmul", inputs, 2)?;
        Ok(vec![inputs[0].promote(inputs[1])])
    }

    fn execute(&self, inputs: &[&Array]) -> Result<Vec<Array>> {
        check_arity("matmul", inputs, 2)?;
        let (a, b) = (inputs[0], inputs[1]);
        let ((m, k), (k2, n)) = self.operand_dims(a.shape(), b.shape()).ok_or_else(|| {
            Error::IncompatibleShape(format!(
                "matmul needs operands of rank >= 2, got {:?} and {:?}",
                a.shape(),
                b.shape()
            ))
        })?;

        let batch_dims = &a.shape()[..a.ndim() - 2];
        if k != k2 || batch_dims != &b.shape()[..b.ndim() - 2] {
            return Err(Error::IncompatibleShape(format!(
                "matmul of {:?} (transposed: {}) and {:?} (transposed: {})",
                a.shape(),
                self.transpose_a,
                b.shape(),
                self.transpose_b
            )));
        }

        let batch: usize = batch_dims.iter().product();
        let mut out = vec![0.0; batch * m * n];
        matmul::matmul(
            batch,
            m,
            k,
            n,
            &a.to_f64_vec(),
            self.transpose_a,
            &b.to_f64_vec(),
            self.transpose_b,
            &mut out,
        );

        let mut shape = batch_dims.to_vec();
        shape.extend([m, n]);
        Ok(vec![Array::from_f64_vec(&out, &shape, a.dtype().promote(b.dtype()))?])
    }

    fn diff(&self, graph: &mut Graph, op: OpId, grads: &[VarId]) -> Result<Vec<Option<VarId>>> {
        let (inputs, _) = io(graph, op);
        check_arity("matmul", &inputs, 2)?;
        let (a, b, g) = (inputs[0], inputs[1], first_grad(grads)?);

        let (da, db) = match (self.transpose_a, self.transpose_b) {
            (false, false) => (graph.matmul_t(g, b, false, true)?, graph.matmul_t(a, g, true, false)?),
            (false, true) => (graph.matmul_t(g, b, false, false)?, graph.matmul_t(g, a, true, false)?),
            (true, false) => (graph.matmul_t(b, g, false, true)?, graph.matmul_t(a, g, false, false)?),
            (true, true) => (graph.matmul_t(b, g, true, true)?, graph.matmul_t(g, a, true, true)?),
        };
        Ok(vec![Some(da), Some(db)])
    }

    fn attributes(&self) -> Attributes {
        Attributes::new()
            .with("transpose_a", AttrValue::Bool(self.transpose_a))
            .with("transpose_b", AttrValue::Bool(self.transpose_b))
    }

    fn box_clone(&self) -> Box<dyn DifferentialFunction> {
        Box::new(*self)
    }
}

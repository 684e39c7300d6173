use crate::{
    function::DifferentialFunction,
    graph::Graph,
    ops::{arithmetic::*, control::*, linalg::MatMul, misc::*, reduction::*, shape::*, unary::*},
    variable::{VarId, VariableKind},
};
use symtensor_core::{
    array::Array,
    dtype::DType,
    error::{Error, Result},
    shape::Shape,
};

impl Graph {
    // ────────────────────────────────────────────────────────────────────────
    //  Leaves
    // ────────────────────────────────────────────────────────────────────────

    /// Declares a placeholder. `-1` marks a dimension that is only known when
    /// an array is fed.
    pub fn placeholder(&mut self, name: &str, dtype: DType, shape: &[i64]) -> Result<VarId> {
        self.declare_variable(name, VariableKind::Placeholder, Some(Shape::new(shape)), dtype, None)
    }

    /// Declares a trainable variable initialized lazily with the configured
    /// [`WeightInit`](symtensor_core::init::WeightInit).
    pub fn var(&mut self, name: &str, dtype: DType, shape: &[usize]) -> Result<VarId> {
        self.declare_variable(name, VariableKind::Variable, Some(Shape::from_concrete(shape)), dtype, None)
    }

    pub fn var_with_value(&mut self, name: &str, value: Array) -> Result<VarId> {
        let dtype = value.dtype();
        self.declare_variable(name, VariableKind::Variable, None, dtype, Some(value))
    }

    pub fn constant(&mut self, name: &str, value: Array) -> Result<VarId> {
        let dtype = value.dtype();
        self.declare_variable(name, VariableKind::Constant, None, dtype, Some(value))
    }

    // ────────────────────────────────────────────────────────────────────────
    //  Generic
    // ────────────────────────────────────────────────────────────────────────

    /// Adds an operation over `inputs`, named after its op type, and returns
    /// its generated outputs.
    pub fn op(&mut self, function: Box<dyn DifferentialFunction>, inputs: &[VarId]) -> Result<Vec<VarId>> {
        let name = self.unique_op_name(function.op_type());
        self.op_named(&name, function, inputs)
    }

    /// Like [`Graph::op`] with an explicit operation name, which must be
    /// unused.
    pub fn op_named(
        &mut self,
        name: &str,
        function: Box<dyn DifferentialFunction>,
        inputs: &[VarId],
    ) -> Result<Vec<VarId>> {
        self.validate_new_op(name, function.as_ref(), inputs)?;
        let op = self.register_operation(name, function);
        self.set_inputs(op, inputs)?;
        self.generate_output_variables(op)
    }

    /// Adds an operation whose outputs are existing ARRAY variables. This
    /// is how loop back-edges are closed: the target is declared first and
    /// consumed before its producer exists.
    pub fn op_with_outputs(
        &mut self,
        function: Box<dyn DifferentialFunction>,
        inputs: &[VarId],
        outputs: &[VarId],
    ) -> Result<()> {
        let name = self.unique_op_name(function.op_type());
        self.validate_new_op(&name, function.as_ref(), inputs)?;
        if outputs.len() != function.num_outputs() {
            return Err(Error::InvalidArgument(format!(
                "{} has {} outputs, {} given",
                function.op_type(),
                function.num_outputs(),
                outputs.len()
            )));
        }
        for &output in outputs {
            self.check_var(output)?;
        }

        let op = self.register_operation(&name, function);
        self.set_inputs(op, inputs)?;
        self.set_outputs(op, outputs)
    }

    /// Single-output form of [`Graph::op`].
    pub fn op1(&mut self, function: Box<dyn DifferentialFunction>, inputs: &[VarId]) -> Result<VarId> {
        let op_type = function.op_type();
        self.op(function, inputs)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::internal(format!("{} produced no output", op_type)))
    }

    fn validate_new_op(&self, name: &str, function: &dyn DifferentialFunction, inputs: &[VarId]) -> Result<()> {
        if self.get_operation(name).is_some() {
            return Err(Error::DuplicateName {
                name: name.to_string(),
                message: "an operation with this name already exists".to_string(),
            });
        }
        for &input in inputs {
            self.check_var(input)?;
        }
        let dtypes: Vec<DType> = inputs.iter().map(|&v| self.variable(v).dtype()).collect();
        function.output_dtypes(&dtypes).map(|_| ())
    }

    // ────────────────────────────────────────────────────────────────────────
    //  Typed builders
    // ────────────────────────────────────────────────────────────────────────

    pub fn add(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.op1(Box::new(Add), &[a, b])
    }

    pub fn sub(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.op1(Box::new(Sub), &[a, b])
    }

    pub fn mul(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.op1(Box::new(Mul), &[a, b])
    }

    pub fn div(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.op1(Box::new(Div), &[a, b])
    }

    pub fn less_than(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.op1(Box::new(LessThan), &[a, b])
    }

    pub fn matmul(&mut self, a: VarId, b: VarId) -> Result<VarId> {
        self.matmul_t(a, b, false, false)
    }

    pub fn matmul_t(&mut self, a: VarId, b: VarId, transpose_a: bool, transpose_b: bool) -> Result<VarId> {
        self.op1(Box::new(MatMul::new(transpose_a, transpose_b)), &[a, b])
    }

    pub fn neg(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Neg), &[x])
    }

    pub fn exp(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Exp), &[x])
    }

    pub fn log(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Log), &[x])
    }

    pub fn tanh(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Tanh), &[x])
    }

    pub fn sigmoid(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Sigmoid), &[x])
    }

    pub fn relu(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Relu), &[x])
    }

    pub fn step(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Step), &[x])
    }

    pub fn square(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Square), &[x])
    }

    pub fn sqrt(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Sqrt), &[x])
    }

    pub fn scalar_add(&mut self, x: VarId, value: f64) -> Result<VarId> {
        self.op1(Box::new(ScalarAdd::new(value)), &[x])
    }

    pub fn scalar_mul(&mut self, x: VarId, value: f64) -> Result<VarId> {
        self.op1(Box::new(ScalarMul::new(value)), &[x])
    }

    pub fn identity(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Identity), &[x])
    }

    pub fn ones_like(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(OnesLike), &[x])
    }

    pub fn zeros_like(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(ZerosLike), &[x])
    }

    /// Reverses the axes.
    pub fn transpose(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Transpose::default()), &[x])
    }

    pub fn permute(&mut self, x: VarId, perm: &[usize]) -> Result<VarId> {
        self.op1(Box::new(Transpose::new(Some(perm.to_vec()))?), &[x])
    }

    pub fn reshape(&mut self, x: VarId, shape: &[i64]) -> Result<VarId> {
        self.op1(Box::new(Reshape::new(shape)?), &[x])
    }

    pub fn reshape_like(&mut self, x: VarId, like: VarId) -> Result<VarId> {
        self.op1(Box::new(ReshapeLike), &[x, like])
    }

    pub fn reduce_like(&mut self, x: VarId, like: VarId) -> Result<VarId> {
        self.op1(Box::new(ReduceLike), &[x, like])
    }

    pub fn broadcast_like(&mut self, x: VarId, like: VarId) -> Result<VarId> {
        self.op1(Box::new(BroadcastLike), &[x, like])
    }

    /// Sum over `dims`; an empty slice reduces every axis.
    pub fn sum(&mut self, x: VarId, dims: &[i64], keep_dims: bool) -> Result<VarId> {
        self.op1(Box::new(Sum::new(dims, keep_dims)), &[x])
    }

    /// Mean over `dims`; an empty slice reduces every axis.
    pub fn mean(&mut self, x: VarId, dims: &[i64], keep_dims: bool) -> Result<VarId> {
        self.op1(Box::new(Mean::new(dims, keep_dims)), &[x])
    }

    /// `mean((prediction - target)^2)` over every element.
    pub fn mean_squared_error(&mut self, prediction: VarId, target: VarId) -> Result<VarId> {
        let diff = self.sub(prediction, target)?;
        let squared = self.square(diff)?;
        self.mean(squared, &[], false)
    }

    // ────────────────────────────────────────────────────────────────────────
    //  Control flow
    // ────────────────────────────────────────────────────────────────────────

    pub fn enter(&mut self, x: VarId, frame: &str, is_constant: bool) -> Result<VarId> {
        self.op1(Box::new(Enter::new(frame, is_constant)), &[x])
    }

    pub fn exit(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(Exit), &[x])
    }

    pub fn next_iteration(&mut self, x: VarId) -> Result<VarId> {
        self.op1(Box::new(NextIteration), &[x])
    }

    /// Feeds `x` into the next iteration through `target`, an ARRAY variable
    /// declared earlier and already consumed by a [`Merge`].
    pub fn next_iteration_into(&mut self, x: VarId, target: VarId) -> Result<()> {
        self.op_with_outputs(Box::new(NextIteration), &[x], &[target])
    }

    /// Returns `(false_output, true_output)`.
    pub fn switch(&mut self, data: VarId, pred: VarId) -> Result<(VarId, VarId)> {
        match self.op(Box::new(Switch), &[data, pred])?.as_slice() {
            &[on_false, on_true] => Ok((on_false, on_true)),
            other => Err(Error::internal(format!("switch produced {} outputs", other.len()))),
        }
    }

    pub fn merge(&mut self, inputs: &[VarId]) -> Result<VarId> {
        self.op1(Box::new(Merge), inputs)
    }

    pub fn loop_cond(&mut self, pred: VarId) -> Result<VarId> {
        self.op1(Box::new(LoopCond), &[pred])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_follow_operations() -> Result<()> {
        let mut graph = Graph::new();
        let x = graph.placeholder("x", DType::F32, &[-1, 3])?;
        let w = graph.var("w", DType::F32, &[3, 2])?;

        let first = graph.matmul(x, w)?;
        let second = graph.matmul(x, w)?;
        assert_eq!(graph.variable(first).name(), "matmul");
        assert_eq!(graph.variable(second).name(), "matmul_1");
        assert_eq!(graph.variable(first).shape(), Some(&Shape::new(&[-1, 2])));

        let pred = graph.constant("pred", Array::scalar(true))?;
        let (f, t) = graph.switch(first, pred)?;
        assert_eq!(graph.variable(f).name(), "switch:0");
        assert_eq!(graph.variable(t).name(), "switch:1");
        Ok(())
    }

    #[test]
    fn invalid_operations_are_not_registered() -> Result<()> {
        let mut graph = Graph::new();
        let x = graph.placeholder("x", DType::F32, &[2])?;

        assert!(graph.op(Box::new(Add), &[x]).is_err());
        assert_eq!(graph.num_operations(), 0);

        graph.op_named("double", Box::new(ScalarMul::new(2.0)), &[x])?;
        assert!(matches!(
            graph.op_named("double", Box::new(Neg), &[x]),
            Err(Error::DuplicateName { .. })
        ));
        Ok(())
    }

    #[test]
    fn pre_declared_output_is_reused() -> Result<()> {
        let mut graph = Graph::new();
        let x = graph.placeholder("x", DType::F32, &[2])?;
        let reused = graph.declare_variable("exp", VariableKind::Array, None, DType::F32, None)?;
        let op = graph.register_operation("exp", Box::new(Exp));
        graph.set_inputs(op, &[x])?;
        assert_eq!(graph.generate_output_variables(op)?, vec![reused]);
        assert_eq!(graph.producer_of(reused), Some(op));
        Ok(())
    }
}

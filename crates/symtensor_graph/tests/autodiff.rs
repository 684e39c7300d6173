mod utils;

use std::collections::HashMap;
use symtensor_core::{
    array::Array,
    dtype::DType,
    error::{Error, Result},
    shape::Shape,
};
use symtensor_graph::{autodiff::GRAD_SUFFIX, ops::misc::Identity, Graph, VariableKind};
use utils::{assert_close, feed, linear_graph, matrix, structure};

#[test]
fn square_through_mul() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.placeholder("x", DType::F32, &[3])?;
    let y = graph.mul(x, x)?;
    graph.sum(y, &[], false)?;

    let inputs = feed(vec![("x", Array::from_vec(vec![1.0f32, -2.0, 0.5], &[3])?)]);
    let grads = graph.calculate_gradients(&inputs, &["x"])?;
    assert_close(&grads["x"], &[2.0, -4.0, 1.0]);
    Ok(())
}

#[test]
fn diamond_accumulates_both_paths() -> Result<()> {
    let mut graph = Graph::new();
    let w = graph.var_with_value("w", Array::from_vec(vec![2.0f64, 3.0], &[2])?)?;
    let a = graph.exp(w)?;
    let b = graph.scalar_mul(w, 3.0)?;
    let c = graph.add(a, b)?;
    graph.sum(c, &[], false)?;

    // d/dw (e^w + 3w) = e^w + 3
    let grads = graph.exec_backwards(&HashMap::new())?;
    assert_close(&grads["w"], &[2f64.exp() + 3.0, 3f64.exp() + 3.0]);
    Ok(())
}

#[test]
fn linear_layer_gradients() -> Result<()> {
    let mut graph = linear_graph()?;
    let inputs = feed(vec![("x", matrix(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?)]);

    let result = graph.exec_backwards_with_outputs(&inputs, &["loss"])?;
    assert_close(&result.outputs["loss"], &[17.0]);
    assert_close(&result.gradients["w"], &[4.0, 6.0]);
    // the bias is broadcast over both rows
    assert_close(&result.gradients["b"], &[2.0]);
    assert_eq!(result.gradients["b"].shape(), &[1]);
    assert!(!result.gradients.contains_key("x"));

    let x = graph.calculate_gradients(&inputs, &["x"])?;
    assert_close(&x["x"], &[1.0, 2.0, 1.0, 2.0]);
    Ok(())
}

#[test]
fn gradient_names() -> Result<()> {
    let mut graph = linear_graph()?;
    assert!(graph.grad_for_variable("w").is_none());
    graph.create_grad_function()?;

    let w_grad = graph.grad_for_variable("w").map(|v| v.name().to_string());
    assert_eq!(w_grad, Some(format!("w{}", GRAD_SUFFIX)));

    // the forward graph itself is untouched
    assert!(!graph.has_variable("w-grad"));
    let grad_graph = graph.grad_function().map(|g| g.has_variable("b-grad"));
    assert_eq!(grad_graph, Some(true));
    Ok(())
}

#[test]
fn shared_gradient_variables_get_distinct_names() -> Result<()> {
    let mut graph = Graph::new();
    let a = graph.var_with_value("a", Array::ones(&[2], DType::F32))?;
    let b = graph.var_with_value("b", Array::ones(&[2], DType::F32))?;
    let c = graph.add(a, b)?;
    graph.sum(c, &[], false)?;

    let grads = graph.exec_backwards(&HashMap::new())?;
    assert_close(&grads["a"], &[1.0, 1.0]);
    assert_close(&grads["b"], &[1.0, 1.0]);

    let names = (
        graph.grad_for_variable("a").map(|v| v.name().to_string()),
        graph.grad_for_variable("b").map(|v| v.name().to_string()),
    );
    assert_eq!(names, (Some("a-grad".to_string()), Some("b-grad".to_string())));
    Ok(())
}

#[test]
fn activations() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.placeholder("x", DType::F64, &[3])?;
    let s = graph.sigmoid(x)?;
    let t = graph.tanh(x)?;
    let r = graph.relu(x)?;
    let st = graph.add(s, t)?;
    let all = graph.add(st, r)?;
    graph.sum(all, &[], false)?;

    let values = [-1.0f64, 0.0, 2.0];
    let inputs = feed(vec![("x", Array::from_vec(values.to_vec(), &[3])?)]);
    let grads = graph.calculate_gradients(&inputs, &["x"])?;

    let expected: Vec<f64> = values
        .iter()
        .map(|&v| {
            let sig = 1.0 / (1.0 + (-v).exp());
            let relu = if v > 0.0 { 1.0 } else { 0.0 };
            sig * (1.0 - sig) + (1.0 - v.tanh().powi(2)) + relu
        })
        .collect();
    assert_close(&grads["x"], &expected);
    Ok(())
}

#[test]
fn mean_squared_error_gradient() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.placeholder("x", DType::F32, &[-1, 1])?;
    let target = graph.placeholder("target", DType::F32, &[-1, 1])?;
    let w = graph.var_with_value("w", matrix(vec![vec![3.0]])?)?;
    let pred = graph.matmul(x, w)?;
    graph.mean_squared_error(pred, target)?;

    let inputs = feed(vec![
        ("x", matrix(vec![vec![1.0], vec![2.0]])?),
        ("target", matrix(vec![vec![2.0], vec![5.0]])?),
    ]);
    let result = graph.exec_backwards_with_outputs(&inputs, &["mean"])?;
    assert_close(&result.outputs["mean"], &[1.0]);
    assert_close(&result.gradients["w"], &[3.0]);
    Ok(())
}

#[test]
fn parameter_updates_reach_the_gradient_graph() -> Result<()> {
    let mut graph = Graph::new();
    let p = graph.var_with_value("p", Array::scalar(5.0f32))?;
    graph.mul(p, p)?;

    assert_close(&graph.exec_backwards(&HashMap::new())?["p"], &[10.0]);
    graph.set_array("p", Array::scalar(4.0f32))?;
    assert_close(&graph.exec_backwards(&HashMap::new())?["p"], &[8.0]);
    Ok(())
}

#[test]
fn multiple_outputs_are_rejected() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.placeholder("x", DType::F32, &[2])?;
    let a = graph.exp(x)?;
    graph.neg(a)?;
    graph.square(a)?;

    match graph.create_grad_function() {
        Err(Error::MultipleOutputs { outputs }) => {
            assert_eq!(outputs, vec!["neg".to_string(), "square".to_string()]);
        },
        other => panic!("expected multiple outputs, got {:?}", other.err()),
    }
    assert!(graph.grad_function().is_none());
    Ok(())
}

#[test]
fn no_outputs() -> Result<()> {
    let mut graph = Graph::new();
    graph.placeholder("x", DType::F32, &[2])?;
    assert!(matches!(graph.create_grad_function(), Err(Error::NoOutputs)));
    Ok(())
}

#[test]
fn rebuilding_is_structurally_identical() -> Result<()> {
    let mut graph = linear_graph()?;
    graph.create_grad_function()?;
    let first = graph.grad_function().map(structure);

    // a second call is a no-op
    graph.create_grad_function()?;
    assert_eq!(graph.grad_function().map(structure), first);

    graph.clear_grad_function();
    assert!(graph.grad_function().is_none());
    graph.create_grad_function()?;
    assert_eq!(graph.grad_function().map(structure), first);
    Ok(())
}

#[test]
fn cycles_leave_operations_unprocessed() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.placeholder("x", DType::F32, &[2])?;
    let back = graph.declare_variable("back", VariableKind::Array, Some(Shape::new(&[2])), DType::F32, None)?;
    let looped = graph.add(x, back)?;
    graph.op_with_outputs(Box::new(Identity), &[looped], &[back])?;
    graph.sum(looped, &[], false)?;

    match graph.create_grad_function() {
        Err(Error::UnreachableOperations {
            processed,
            total,
            unprocessed,
        }) => {
            assert_eq!((processed, total), (1, 3));
            assert_eq!(unprocessed, vec!["add".to_string(), "identity".to_string()]);
        },
        other => panic!("expected unreachable operations, got {:?}", other.err()),
    }
    Ok(())
}

#[test]
fn control_flow_is_not_differentiable() -> Result<()> {
    let mut graph = Graph::new();
    let x = graph.placeholder("x", DType::F32, &[])?;
    let inside = graph.enter(x, "frame", false)?;
    let outside = graph.exit(inside)?;
    graph.neg(outside)?;

    match graph.create_grad_function() {
        Err(e @ Error::NotDifferentiable { .. }) => {
            assert!(e.to_string().contains("exit"));
        },
        other => panic!("expected a non-differentiable op, got {:?}", other.err()),
    }
    Ok(())
}

#[test]
fn transpose_and_reshape_gradients() -> Result<()> {
    let mut graph = Graph::new();
    let w = graph.var_with_value("w", Array::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3])?)?;
    let c = graph.constant("c", Array::from_vec(vec![1.0f32, 10.0, 100.0, 1000.0, 0.0, 0.0], &[3, 2])?)?;
    let t = graph.transpose(w)?;
    let flat = graph.reshape(t, &[-1])?;
    let c_flat = graph.reshape(c, &[6])?;
    let weighted = graph.mul(flat, c_flat)?;
    graph.sum(weighted, &[], false)?;

    // w^T flattened reads w column by column
    let grads = graph.exec_backwards(&HashMap::new())?;
    assert_eq!(grads["w"].shape(), &[2, 3]);
    assert_close(&grads["w"], &[1.0, 100.0, 0.0, 10.0, 1000.0, 0.0]);
    Ok(())
}

#[test]
fn outputs_without_gradient_flow_get_zeros() -> Result<()> {
    let mut graph = Graph::new();
    let w = graph.var_with_value("w", Array::from_vec(vec![2.0f32, 3.0], &[2])?)?;
    let y = graph.exp(w)?;
    let z = graph.ones_like(y)?;
    graph.sum(z, &[], false)?;

    // ones_like does not depend on its input's values
    let grads = graph.exec_backwards(&HashMap::new())?;
    assert_eq!(grads["w"].shape(), &[2]);
    assert_close(&grads["w"], &[0.0, 0.0]);
    Ok(())
}

#[test]
fn renames_after_building_gradients() -> Result<()> {
    let mut graph = linear_graph()?;
    graph.create_grad_function()?;

    graph.rename_variable("loss", "objective")?;
    graph.rename_variable("x", "features")?;
    graph.rename_variable("w", "weights")?;

    let inputs = feed(vec![("features", matrix(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?)]);
    let result = graph.exec_backwards_with_outputs(&inputs, &["objective"])?;
    assert_close(&result.outputs["objective"], &[17.0]);
    assert_close(&result.gradients["weights"], &[4.0, 6.0]);
    assert!(!result.gradients.contains_key("w"));
    Ok(())
}

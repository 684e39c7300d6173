use crate::utils::{is_contiguous, strided_offset};
use rayon::prelude::*;

macro_rules! binary_op {
    ($name:ident, $op:expr) => {
        /// Elementwise kernel over `dims`, reading each operand through its own
        /// (possibly broadcast) strides. `out` is contiguous with `dims.iter().product()` elements.
        pub fn $name(dims: &[usize], lhs: &[f64], lhs_strides: &[usize], rhs: &[f64], rhs_strides: &[usize], out: &mut [f64]) {
            let lhs_cont = lhs.len() == out.len() && is_contiguous(dims, lhs_strides);
            let rhs_cont = rhs.len() == out.len() && is_contiguous(dims, rhs_strides);

            out.par_iter_mut().enumerate().for_each(|(i, out_val)| {
                let l = if lhs_cont { i } else { strided_offset(i, dims, lhs_strides) };
                let r = if rhs_cont { i } else { strided_offset(i, dims, rhs_strides) };
                *out_val = $op(lhs[l], rhs[r]);
            });
        }
    };
}

binary_op!(add, |a: f64, b: f64| a + b);
binary_op!(sub, |a: f64, b: f64| a - b);
binary_op!(mul, |a: f64, b: f64| a * b);
binary_op!(div, |a: f64, b: f64| a / b);
binary_op!(lt, |a: f64, b: f64| if a < b { 1.0 } else { 0.0 });

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{broadcast_strides, contiguous_strides};

    #[test]
    fn broadcast_add() {
        let dims = [2, 3];
        let lhs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let rhs = [10.0, 20.0, 30.0];
        let mut out = vec![0.0; 6];

        add(&dims, &lhs, &contiguous_strides(&dims), &rhs, &broadcast_strides(&[3], &dims), &mut out);
        assert_eq!(out, vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
    }

    #[test]
    fn less_than() {
        let dims = [3];
        let strides = contiguous_strides(&dims);
        let mut out = vec![0.0; 3];
        lt(&dims, &[1.0, 5.0, 2.0], &strides, &[2.0, 2.0, 2.0], &strides, &mut out);
        assert_eq!(out, vec![1.0, 0.0, 0.0]);
    }
}

use rayon::prelude::*;

macro_rules! unary_op {
    ($name:ident, $op:expr) => {
        pub fn $name(input: &[f64], out: &mut [f64]) {
            out.par_iter_mut().zip(input.par_iter()).for_each(|(o, &x)| {
                *o = $op(x);
            });
        }
    };
}

macro_rules! unary_op_with_constant {
    ($name:ident, $op:expr) => {
        pub fn $name(input: &[f64], constant: f64, out: &mut [f64]) {
            out.par_iter_mut().zip(input.par_iter()).for_each(|(o, &x)| {
                *o = $op(x, constant);
            });
        }
    };
}

unary_op!(neg, |x: f64| -x);
unary_op!(exp, |x: f64| x.exp());
unary_op!(log, |x: f64| x.ln());
unary_op!(tanh, |x: f64| x.tanh());
unary_op!(sigmoid, |x: f64| 1.0 / (1.0 + (-x).exp()));
unary_op!(relu, |x: f64| if x > 0.0 { x } else { 0.0 });
unary_op!(step, |x: f64| if x > 0.0 { 1.0 } else { 0.0 });
unary_op!(square, |x: f64| x * x);
unary_op!(sqrt, |x: f64| x.sqrt());

unary_op_with_constant!(add_scalar, |x: f64, c: f64| x + c);
unary_op_with_constant!(mul_scalar, |x: f64, c: f64| x * c);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activations() {
        let input = [-1.0, 0.0, 2.0];
        let mut out = vec![0.0; 3];

        relu(&input, &mut out);
        assert_eq!(out, vec![0.0, 0.0, 2.0]);

        step(&input, &mut out);
        assert_eq!(out, vec![0.0, 0.0, 1.0]);

        sigmoid(&[0.0], &mut out[..1]);
        assert_eq!(out[0], 0.5);

        mul_scalar(&input, -2.0, &mut out);
        assert_eq!(out, vec![2.0, -0.0, -4.0]);
    }
}

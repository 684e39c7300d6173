use crate::utils::{contiguous_strides, strided_offset};
use rayon::prelude::*;

/// Sums `input` (contiguous, shape `dims`) over every dimension flagged in `reduce`.
/// `out` is laid out as `dims` with each reduced dimension collapsed to 1.
pub fn sum(dims: &[usize], reduce: &[bool], input: &[f64], out: &mut [f64]) {
    let in_strides = contiguous_strides(dims);
    let out_dims: Vec<usize> = dims.iter().zip(reduce).map(|(&d, &r)| if r { 1 } else { d }).collect();

    let red_dims: Vec<usize> = dims.iter().zip(reduce).filter(|(_, &r)| r).map(|(&d, _)| d).collect();
    let red_strides: Vec<usize> = in_strides.iter().zip(reduce).filter(|(_, &r)| r).map(|(&s, _)| s).collect();
    let red_count: usize = red_dims.iter().product();

    // output index -> input offset of the first reduced element
    let kept_strides: Vec<usize> = in_strides.iter().zip(reduce).map(|(&s, &r)| if r { 0 } else { s }).collect();

    out.par_iter_mut().enumerate().for_each(|(o, out_val)| {
        let base = strided_offset(o, &out_dims, &kept_strides);
        let mut acc = 0.0;
        for j in 0..red_count {
            acc += input[base + strided_offset(j, &red_dims, &red_strides)];
        }
        *out_val = acc;
    });
}

pub fn mean(dims: &[usize], reduce: &[bool], input: &[f64], out: &mut [f64]) {
    let count: usize = dims.iter().zip(reduce).filter(|(_, &r)| r).map(|(&d, _)| d).product();
    sum(dims, reduce, input, out);
    if count > 0 {
        let scale = 1.0 / count as f64;
        out.par_iter_mut().for_each(|v| *v *= scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_rows_and_columns() {
        let input = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let mut rows = vec![0.0; 2];
        sum(&[2, 3], &[false, true], &input, &mut rows);
        assert_eq!(rows, vec![6.0, 15.0]);

        let mut cols = vec![0.0; 3];
        sum(&[2, 3], &[true, false], &input, &mut cols);
        assert_eq!(cols, vec![5.0, 7.0, 9.0]);

        let mut all = vec![0.0; 1];
        mean(&[2, 3], &[true, true], &input, &mut all);
        assert_eq!(all, vec![3.5]);
    }
}

use crate::utils::{broadcast_strides, contiguous_strides, strided_offset};
use rayon::prelude::*;

/// Broadcasts a contiguous `src` of shape `src_dims` into `out` of shape `out_dims`.
pub fn expand(src_dims: &[usize], src: &[f64], out_dims: &[usize], out: &mut [f64]) {
    let strides = broadcast_strides(src_dims, out_dims);
    out.par_iter_mut().enumerate().for_each(|(i, o)| {
        *o = src[strided_offset(i, out_dims, &strides)];
    });
}

/// Permutes the axes of a contiguous `input` of shape `dims`; output axis `d` is input axis `perm[d]`.
pub fn permute(dims: &[usize], perm: &[usize], input: &[f64], out: &mut [f64]) {
    let in_strides = contiguous_strides(dims);
    let out_dims: Vec<usize> = perm.iter().map(|&p| dims[p]).collect();
    let strides: Vec<usize> = perm.iter().map(|&p| in_strides[p]).collect();

    out.par_iter_mut().enumerate().for_each(|(i, o)| {
        *o = input[strided_offset(i, &out_dims, &strides)];
    });
}

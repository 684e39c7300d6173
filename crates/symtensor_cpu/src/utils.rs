/// Row-major strides of a contiguous buffer with `dims`.
#[inline]
pub fn contiguous_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dims.len()];
    for d in (0..dims.len()).rev() {
        if d + 1 < dims.len() {
            strides[d] = strides[d + 1] * dims[d + 1];
        }
    }
    strides
}

/// Strides that read a contiguous `src_dims` buffer as if it had `out_dims`.
/// Broadcast dimensions get a stride of zero; `src_dims` is right-aligned.
pub fn broadcast_strides(src_dims: &[usize], out_dims: &[usize]) -> Vec<usize> {
    let src_strides = contiguous_strides(src_dims);
    let offset = out_dims.len() - src_dims.len().min(out_dims.len());

    (0..out_dims.len())
        .map(|d| {
            if d < offset {
                0
            } else {
                let s = d - offset;
                if src_dims[s] == 1 && out_dims[d] != 1 {
                    0
                } else {
                    src_strides[s]
                }
            }
        })
        .collect()
}

#[inline]
pub fn is_contiguous(dims: &[usize], strides: &[usize]) -> bool {
    let mut acc = 1;
    for d in (0..dims.len()).rev() {
        if dims[d] > 1 && acc != strides[d] {
            return false;
        }
        acc *= dims[d];
    }
    true
}

/// Offset into a strided buffer for the `i`-th element in row-major order over `dims`.
#[inline]
pub fn strided_offset(i: usize, dims: &[usize], strides: &[usize]) -> usize {
    let mut offset = 0;
    let mut rem = i;
    for d in (0..dims.len()).rev() {
        offset += (rem % dims[d]) * strides[d];
        rem /= dims[d];
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_strides_zero_out_expanded_dims() {
        assert_eq!(broadcast_strides(&[3], &[2, 3]), vec![0, 1]);
        assert_eq!(broadcast_strides(&[2, 1], &[2, 4]), vec![1, 0]);
        assert_eq!(broadcast_strides(&[], &[2, 2]), vec![0, 0]);
    }

    #[test]
    fn offsets() {
        let strides = broadcast_strides(&[3], &[2, 3]);
        let offsets: Vec<usize> = (0..6).map(|i| strided_offset(i, &[2, 3], &strides)).collect();
        assert_eq!(offsets, vec![0, 1, 2, 0, 1, 2]);
        assert!(is_contiguous(&[2, 3], &[3, 1]));
        assert!(!is_contiguous(&[2, 3], &[1, 2]));
    }
}

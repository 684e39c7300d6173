use rayon::prelude::*;

/// Batched 2-D matrix product `out[b] = op(a[b]) · op(b[b])`.
///
/// Each batch of `a` is stored as `[m, k]`, or `[k, m]` when `transpose_a`
/// is set; likewise `b` is `[k, n]` or `[n, k]`. `out` holds `batch * m * n`
/// contiguous elements.
#[allow(clippy::too_many_arguments)]
pub fn matmul(
    batch: usize,
    m: usize,
    k: usize,
    n: usize,
    a: &[f64],
    transpose_a: bool,
    b: &[f64],
    transpose_b: bool,
    out: &mut [f64],
) {
    if m == 0 || n == 0 {
        return;
    }

    out.par_chunks_mut(n).enumerate().take(batch * m).for_each(|(row, out_row)| {
        let batch_idx = row / m;
        let m_idx = row % m;
        let a_base = batch_idx * m * k;
        let b_base = batch_idx * k * n;

        for (n_idx, out_val) in out_row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for k_idx in 0..k {
                let a_idx = if transpose_a { k_idx * m + m_idx } else { m_idx * k + k_idx };
                let b_idx = if transpose_b { n_idx * k + k_idx } else { k_idx * n + n_idx };
                acc += a[a_base + a_idx] * b[b_base + b_idx];
            }
            *out_val = acc;
        }
    });
}

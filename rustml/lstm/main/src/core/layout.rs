//! Layout conversion between per-gate and fused four-gate buffers.
//!
//! A fused buffer has rows of width `4 * cols`; gate `g` occupies columns
//! `g * cols .. (g + 1) * cols` of every row. All conversions are pure data
//! movement and round-trip bitwise.

use crate::api::types::Gate;

/// Copies a packed `rows x cols` gate matrix into its slot of a fused
/// `rows x 4*cols` buffer.
pub fn to_fused_gate_layout(rows: usize, cols: usize, gate: Gate, src: &[f32], dst: &mut [f32]) {
    let ld = 4 * cols;
    let offset = gate.offset(cols);
    for (src_row, dst_row) in src[..rows * cols]
        .chunks_exact(cols)
        .zip(dst[..rows * ld].chunks_exact_mut(ld))
    {
        dst_row[offset..offset + cols].copy_from_slice(src_row);
    }
}

/// Extracts one gate's `rows x cols` slot of a fused buffer into packed form.
pub fn from_fused_gate_layout(rows: usize, cols: usize, gate: Gate, src: &[f32], dst: &mut [f32]) {
    let ld = 4 * cols;
    let offset = gate.offset(cols);
    for (src_row, dst_row) in src[..rows * ld]
        .chunks_exact(ld)
        .zip(dst[..rows * cols].chunks_exact_mut(cols))
    {
        dst_row.copy_from_slice(&src_row[offset..offset + cols]);
    }
}

/// Writes `[x, h]` rows: `x` is `n x c`, `h` is `n x k`, `dst` is `n x (c + k)`.
pub fn concatenate_input_hidden(
    n: usize,
    c: usize,
    k: usize,
    x: &[f32],
    h: &[f32],
    dst: &mut [f32],
) {
    let ld = c + k;
    for ((dst_row, x_row), h_row) in dst[..n * ld]
        .chunks_exact_mut(ld)
        .zip(x[..n * c].chunks_exact(c))
        .zip(h[..n * k].chunks_exact(k))
    {
        dst_row[..c].copy_from_slice(x_row);
        dst_row[c..].copy_from_slice(h_row);
    }
}

/// Inverse of [`concatenate_input_hidden`]: splits `n x (c + k)` rows into
/// the `n x c` and `n x k` halves.
pub fn split_input_hidden(n: usize, c: usize, k: usize, src: &[f32], x: &mut [f32], h: &mut [f32]) {
    let ld = c + k;
    for ((src_row, x_row), h_row) in src[..n * ld]
        .chunks_exact(ld)
        .zip(x[..n * c].chunks_exact_mut(c))
        .zip(h[..n * k].chunks_exact_mut(k))
    {
        x_row.copy_from_slice(&src_row[..c]);
        h_row.copy_from_slice(&src_row[c..]);
    }
}

/// Splits one timestep's fused `n x 4k` gate buffer into packed `n x k`
/// matrices, indexed by [`Gate::index`].
pub fn split_gates(n: usize, k: usize, icfo_t: &[f32]) -> [Vec<f32>; 4] {
    Gate::ALL.map(|gate| {
        let mut out = vec![0.0; n * k];
        from_fused_gate_layout(n, k, gate, icfo_t, &mut out);
        out
    })
}

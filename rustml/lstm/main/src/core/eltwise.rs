//! Elementwise tensor engine.
//!
//! Every operation comes in a packed form over whole slices and a strided
//! `_ld` form over a `rows x cols` tile whose operands each carry their own
//! leading dimension. Gate slices of a fused `N x 4K` buffer are addressed
//! with [`View::gate`] and [`ViewMut::gate`].
//!
//! Tiles of at least `eltwise_par_threshold` elements are split across rayon
//! workers by row (packed buffers by fixed-size chunk). Each worker writes a
//! disjoint destination region, so results do not depend on the thread count.

use crate::api::types::{Activation, Gate};
use crate::core::runtime::eltwise_par_threshold;
use rayon::prelude::*;

const PACKED_CHUNK: usize = 4096;

/// Read-only tile operand: row `r` starts at `r * ld`.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    pub data: &'a [f32],
    pub ld: usize,
}

impl<'a> View<'a> {
    pub fn strided(data: &'a [f32], ld: usize) -> Self {
        Self { data, ld }
    }

    pub fn packed(data: &'a [f32], cols: usize) -> Self {
        Self { data, ld: cols }
    }

    /// The `gate` slot of a fused buffer with hidden width `k`.
    pub fn gate(fused: &'a [f32], gate: Gate, k: usize) -> Self {
        Self::strided(&fused[gate.offset(k)..], 4 * k)
    }

    #[inline]
    fn row(&self, r: usize, cols: usize) -> &'a [f32] {
        let start = r * self.ld;
        &self.data[start..start + cols]
    }
}

/// Destination tile.
#[derive(Debug)]
pub struct ViewMut<'a> {
    pub data: &'a mut [f32],
    pub ld: usize,
}

impl<'a> ViewMut<'a> {
    pub fn strided(data: &'a mut [f32], ld: usize) -> Self {
        Self { data, ld }
    }

    pub fn packed(data: &'a mut [f32], cols: usize) -> Self {
        Self { data, ld: cols }
    }

    pub fn gate(fused: &'a mut [f32], gate: Gate, k: usize) -> Self {
        Self::strided(&mut fused[gate.offset(k)..], 4 * k)
    }
}

fn for_each_row<F>(rows: usize, cols: usize, dst: ViewMut<'_>, f: F)
where
    F: Fn(usize, &mut [f32]) + Sync + Send,
{
    if rows == 0 || cols == 0 {
        return;
    }
    let ViewMut { data, ld } = dst;
    debug_assert!(ld >= cols);
    let span = (rows - 1) * ld + cols;
    let data = &mut data[..span];
    if rows * cols >= eltwise_par_threshold() {
        data.par_chunks_mut(ld)
            .enumerate()
            .for_each(|(r, row)| f(r, &mut row[..cols]));
    } else {
        data.chunks_mut(ld)
            .enumerate()
            .for_each(|(r, row)| f(r, &mut row[..cols]));
    }
}

fn for_each_chunk<F>(dst: &mut [f32], f: F)
where
    F: Fn(usize, &mut [f32]) + Sync + Send,
{
    if dst.len() >= eltwise_par_threshold() {
        dst.par_chunks_mut(PACKED_CHUNK)
            .enumerate()
            .for_each(|(i, chunk)| f(i * PACKED_CHUNK, chunk));
    } else {
        f(0, dst);
    }
}

fn unary_ld<F>(rows: usize, cols: usize, src: View<'_>, dst: ViewMut<'_>, f: F)
where
    F: Fn(f32) -> f32 + Sync + Send,
{
    for_each_row(rows, cols, dst, |r, out| {
        for (o, &x) in out.iter_mut().zip(src.row(r, cols)) {
            *o = f(x);
        }
    });
}

fn binary_ld<F>(rows: usize, cols: usize, a: View<'_>, b: View<'_>, dst: ViewMut<'_>, f: F)
where
    F: Fn(f32, f32) -> f32 + Sync + Send,
{
    for_each_row(rows, cols, dst, |r, out| {
        for ((o, &x), &y) in out.iter_mut().zip(a.row(r, cols)).zip(b.row(r, cols)) {
            *o = f(x, y);
        }
    });
}

fn update_ld<F>(rows: usize, cols: usize, src: View<'_>, dst: ViewMut<'_>, f: F)
where
    F: Fn(f32, f32) -> f32 + Sync + Send,
{
    for_each_row(rows, cols, dst, |r, out| {
        for (o, &x) in out.iter_mut().zip(src.row(r, cols)) {
            *o = f(*o, x);
        }
    });
}

fn unary<F>(src: &[f32], dst: &mut [f32], f: F)
where
    F: Fn(f32) -> f32 + Sync + Send,
{
    for_each_chunk(dst, |start, out| {
        let end = start + out.len();
        for (o, &x) in out.iter_mut().zip(&src[start..end]) {
            *o = f(x);
        }
    });
}

fn binary<F>(a: &[f32], b: &[f32], dst: &mut [f32], f: F)
where
    F: Fn(f32, f32) -> f32 + Sync + Send,
{
    for_each_chunk(dst, |start, out| {
        let end = start + out.len();
        for ((o, &x), &y) in out.iter_mut().zip(&a[start..end]).zip(&b[start..end]) {
            *o = f(x, y);
        }
    });
}

fn update<F>(src: &[f32], dst: &mut [f32], f: F)
where
    F: Fn(f32, f32) -> f32 + Sync + Send,
{
    for_each_chunk(dst, |start, out| {
        let end = start + out.len();
        for (o, &x) in out.iter_mut().zip(&src[start..end]) {
            *o = f(*o, x);
        }
    });
}

// ── Activations ─────────────────────────────────────────────────────────

/// `dst = act(src)`
pub fn activate(act: Activation, src: &[f32], dst: &mut [f32]) {
    unary(src, dst, move |x| act.apply(x));
}

pub fn activate_ld(act: Activation, rows: usize, cols: usize, src: View<'_>, dst: ViewMut<'_>) {
    unary_ld(rows, cols, src, dst, move |x| act.apply(x));
}

/// Applies `act` to a tile in place.
pub fn activate_inplace_ld(act: Activation, rows: usize, cols: usize, buf: ViewMut<'_>) {
    for_each_row(rows, cols, buf, move |_, out| {
        for v in out.iter_mut() {
            *v = act.apply(*v);
        }
    });
}

/// `dst = act'(src)`, the derivative evaluated from the pre-activation input.
pub fn derivative(act: Activation, src: &[f32], dst: &mut [f32]) {
    unary(src, dst, move |x| act.derivative(x));
}

pub fn derivative_ld(act: Activation, rows: usize, cols: usize, src: View<'_>, dst: ViewMut<'_>) {
    unary_ld(rows, cols, src, dst, move |x| act.derivative(x));
}

// ── Arithmetic ──────────────────────────────────────────────────────────

pub fn add(a: &[f32], b: &[f32], dst: &mut [f32]) {
    binary(a, b, dst, |x, y| x + y);
}

pub fn add_ld(rows: usize, cols: usize, a: View<'_>, b: View<'_>, dst: ViewMut<'_>) {
    binary_ld(rows, cols, a, b, dst, |x, y| x + y);
}

pub fn mul(a: &[f32], b: &[f32], dst: &mut [f32]) {
    binary(a, b, dst, |x, y| x * y);
}

pub fn mul_ld(rows: usize, cols: usize, a: View<'_>, b: View<'_>, dst: ViewMut<'_>) {
    binary_ld(rows, cols, a, b, dst, |x, y| x * y);
}

/// `dst += src`
pub fn add_assign(src: &[f32], dst: &mut [f32]) {
    update(src, dst, |o, x| o + x);
}

pub fn add_assign_ld(rows: usize, cols: usize, src: View<'_>, dst: ViewMut<'_>) {
    update_ld(rows, cols, src, dst, |o, x| o + x);
}

/// `dst *= src`
pub fn mul_assign(src: &[f32], dst: &mut [f32]) {
    update(src, dst, |o, x| o * x);
}

pub fn mul_assign_ld(rows: usize, cols: usize, src: View<'_>, dst: ViewMut<'_>) {
    update_ld(rows, cols, src, dst, |o, x| o * x);
}

/// `dst = 1 - src`
pub fn complement(src: &[f32], dst: &mut [f32]) {
    unary(src, dst, |x| 1.0 - x);
}

pub fn complement_ld(rows: usize, cols: usize, src: View<'_>, dst: ViewMut<'_>) {
    unary_ld(rows, cols, src, dst, |x| 1.0 - x);
}

/// `dst = 1 - src^2`
pub fn complement_square(src: &[f32], dst: &mut [f32]) {
    unary(src, dst, |x| 1.0 - x * x);
}

pub fn complement_square_ld(rows: usize, cols: usize, src: View<'_>, dst: ViewMut<'_>) {
    unary_ld(rows, cols, src, dst, |x| 1.0 - x * x);
}

pub fn copy(src: &[f32], dst: &mut [f32]) {
    unary(src, dst, |x| x);
}

pub fn copy_ld(rows: usize, cols: usize, src: View<'_>, dst: ViewMut<'_>) {
    unary_ld(rows, cols, src, dst, |x| x);
}

/// Broadcasts the row `bias` into each of `rows` rows of `dst`.
pub fn copy_bias(rows: usize, bias: &[f32], dst: ViewMut<'_>) {
    let cols = bias.len();
    for_each_row(rows, cols, dst, |_, out| out.copy_from_slice(bias));
}

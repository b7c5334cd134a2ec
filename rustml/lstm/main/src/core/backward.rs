//! Backpropagation through time.
//!
//! Walks `t = T-1 .. 0`, turning the gradient arriving at `H_t` into the four
//! gate gradients `dICFO_t`, then multiplies them back through the weights.
//! Data gradients (`dX`, `dCS_prev`, `dH_prev`) are overwritten; weight
//! gradients (`dW`, `dR`, `db`) are accumulated across every timestep.

use crate::api::buffers::{
    BackwardInputs, DataGradients, ForwardInputs, ForwardState, WeightGradients,
};
use crate::api::config::LstmConfig;
use crate::api::traits::Gemm;
use crate::api::types::{Activation, Gate, GemmDesc, GemmStrategy};
use crate::core::eltwise::{self, View, ViewMut};
use crate::core::layout::{concatenate_input_hidden, split_input_hidden};
use crate::core::scratch::carve;
use crate::core::weights::FusedWeights;
use rayon::prelude::*;

/// f32 elements of scratch the backward pass needs.
pub fn backward_scratch_len(config: &LstmConfig, with_weights: bool) -> usize {
    let nk = config.state_len();
    let base = config.n * config.gates() + 5 * nk;
    match config.strategy {
        GemmStrategy::TwoGemms => base,
        GemmStrategy::Concatenated => {
            let xh = config.n * config.xh_width();
            let dwr = if with_weights { config.xh_width() * config.gates() } else { 0 };
            base + 2 * xh + dwr
        }
    }
}

/// Adds the column sums of a `rows x cols` buffer into `db`.
///
/// Rows are split into `partitions` contiguous groups, each summed in
/// parallel into a private partial; partials are then merged into `db` in
/// group order. For a fixed `partitions` the result is bitwise identical
/// regardless of how many threads run.
pub fn reduce_bias_grad(rows: usize, cols: usize, src: &[f32], db: &mut [f32], partitions: usize) {
    if rows == 0 || cols == 0 {
        return;
    }
    let rows_per_part = rows.div_ceil(partitions.max(1));
    let partials: Vec<Vec<f32>> = src[..rows * cols]
        .par_chunks(rows_per_part * cols)
        .map(|part| {
            let mut acc = vec![0.0f32; cols];
            for row in part.chunks_exact(cols) {
                for (a, &v) in acc.iter_mut().zip(row) {
                    *a += v;
                }
            }
            acc
        })
        .collect();

    let db = &mut db[..cols];
    for partial in &partials {
        for (d, &p) in db.iter_mut().zip(partial) {
            *d += p;
        }
    }
}

/// Runs the backward recursion over the retained forward activations.
///
/// `data` receives `dX`, `dCS_prev` and `dH_prev` when present; `weights_grad`
/// accumulates `dW`, `dR` and `db` when present. With neither, only the
/// recursion runs. Buffer lengths are preconditions; a short buffer panics.
#[allow(clippy::too_many_arguments)]
pub fn backward<G: Gemm>(
    gemm: &G,
    config: &LstmConfig,
    weights: &FusedWeights,
    inputs: &ForwardInputs<'_>,
    state: &ForwardState<'_>,
    grads_in: &BackwardInputs<'_>,
    mut data: Option<&mut DataGradients<'_>>,
    mut weights_grad: Option<&mut WeightGradients<'_>>,
    partitions: usize,
    scratch: &mut [f32],
) {
    let (n, c, k, steps) = (config.n, config.c, config.k, config.t);
    let g = config.gates();
    let nk = n * k;
    let xh_w = config.xh_width();

    let mut rest = scratch;
    let dicfo = carve(&mut rest, n * g);
    let dcs = carve(&mut rest, nk);
    let delta = carve(&mut rest, nk);
    let dout = carve(&mut rest, nk);
    let tmp = carve(&mut rest, nk);
    let tmp2 = carve(&mut rest, nk);
    let (mut xh, mut dxh) = match config.strategy {
        GemmStrategy::TwoGemms => (None, None),
        GemmStrategy::Concatenated => (
            Some(carve(&mut rest, n * xh_w)),
            Some(carve(&mut rest, n * xh_w)),
        ),
    };
    let mut dwr = match (config.strategy, weights_grad.is_some()) {
        (GemmStrategy::Concatenated, true) => {
            let dwr = carve(&mut rest, xh_w * g);
            dwr.fill(0.0);
            Some(dwr)
        }
        _ => None,
    };

    for t in (0..steps).rev() {
        log::trace!("lstm::backward t={}", t);
        let icfo_t = &state.icfo[t * n * g..(t + 1) * n * g];
        let (gi, gc, gf, go) = (
            View::gate(icfo_t, Gate::Input, k),
            View::gate(icfo_t, Gate::Cell, k),
            View::gate(icfo_t, Gate::Forget, k),
            View::gate(icfo_t, Gate::Output, k),
        );
        let cs_t = &state.cs[t * nk..(t + 1) * nk];
        let cs_prev = if t == 0 { inputs.cs_prev } else { &state.cs[(t - 1) * nk..t * nk] };
        let h_prev = if t == 0 { inputs.h_prev } else { &state.h[(t - 1) * nk..t * nk] };
        let x_t = &inputs.x[t * n * c..(t + 1) * n * c];
        let dh_t = &grads_in.dh[t * nk..(t + 1) * nk];
        let last = t + 1 == steps;

        // gradient arriving at H_t
        if last {
            eltwise::copy(dh_t, delta);
        } else {
            eltwise::add(dout, dh_t, delta);
        }

        // dCS_t += delta * o * tanh'(CS_t)
        eltwise::mul_ld(n, k, go, View::packed(delta, k), ViewMut::packed(tmp, k));
        eltwise::derivative(Activation::Tanh, cs_t, tmp2);
        eltwise::mul_assign(tmp2, tmp);
        if last {
            eltwise::add(tmp, &grads_in.dcs[..nk], dcs);
        } else {
            eltwise::add_assign(tmp, dcs);
        }

        // dc = dCS * i * (1 - c^2)
        eltwise::mul_ld(n, k, gi, View::packed(dcs, k), ViewMut::packed(tmp, k));
        eltwise::complement_square_ld(n, k, gc, ViewMut::packed(tmp2, k));
        eltwise::mul_ld(
            n,
            k,
            View::packed(tmp, k),
            View::packed(tmp2, k),
            ViewMut::gate(dicfo, Gate::Cell, k),
        );

        // di = dCS * c * i * (1 - i)
        eltwise::mul_ld(n, k, gc, View::packed(dcs, k), ViewMut::packed(tmp, k));
        eltwise::complement_ld(n, k, gi, ViewMut::packed(tmp2, k));
        eltwise::mul_assign_ld(n, k, gi, ViewMut::packed(tmp2, k));
        eltwise::mul_ld(
            n,
            k,
            View::packed(tmp, k),
            View::packed(tmp2, k),
            ViewMut::gate(dicfo, Gate::Input, k),
        );

        // df = dCS * CS_{t-1} * f * (1 - f)
        eltwise::mul(dcs, cs_prev, tmp);
        eltwise::complement_ld(n, k, gf, ViewMut::packed(tmp2, k));
        eltwise::mul_assign_ld(n, k, gf, ViewMut::packed(tmp2, k));
        eltwise::mul_ld(
            n,
            k,
            View::packed(tmp, k),
            View::packed(tmp2, k),
            ViewMut::gate(dicfo, Gate::Forget, k),
        );

        // do = delta * tanh(CS_t) * o * (1 - o)
        eltwise::activate(Activation::Tanh, cs_t, tmp);
        eltwise::mul_assign(delta, tmp);
        eltwise::complement_ld(n, k, go, ViewMut::packed(tmp2, k));
        eltwise::mul_assign_ld(n, k, go, ViewMut::packed(tmp2, k));
        eltwise::mul_ld(
            n,
            k,
            View::packed(tmp, k),
            View::packed(tmp2, k),
            ViewMut::gate(dicfo, Gate::Output, k),
        );

        // carry dCS through the forget gate to t-1
        eltwise::mul_assign_ld(n, k, gf, ViewMut::packed(dcs, k));

        let dicfo: &[f32] = dicfo;
        let dx_t = data.as_deref_mut().map(|d| &mut d.dx[t * n * c..(t + 1) * n * c]);

        match (xh.as_deref_mut(), dxh.as_deref_mut()) {
            (Some(xh), Some(dxh)) => {
                // [dX_t, dout] = dICFO * [W; R]^T
                gemm.gemm(&GemmDesc::new(n, xh_w, g).transpose_b(), dicfo, weights.wr(), dxh);
                match dx_t {
                    Some(dx_t) => split_input_hidden(n, c, k, dxh, dx_t, dout),
                    None => eltwise::copy_ld(
                        n,
                        k,
                        View::strided(&dxh[c..], xh_w),
                        ViewMut::packed(dout, k),
                    ),
                }
                if let Some(dwr) = dwr.as_deref_mut() {
                    concatenate_input_hidden(n, c, k, x_t, h_prev, xh);
                    let desc = GemmDesc::new(xh_w, g, n).transpose_a().accumulate();
                    gemm.gemm(&desc, xh, dicfo, dwr);
                }
            }
            _ => {
                gemm.gemm(&GemmDesc::new(n, k, g).transpose_b(), dicfo, weights.r(), dout);
                if let Some(dx_t) = dx_t {
                    gemm.gemm(&GemmDesc::new(n, c, g).transpose_b(), dicfo, weights.w(), dx_t);
                }
                if let Some(wg) = weights_grad.as_deref_mut() {
                    let dw_desc = GemmDesc::new(c, g, n).transpose_a().accumulate();
                    gemm.gemm(&dw_desc, x_t, dicfo, wg.dw);
                    let dr_desc = GemmDesc::new(k, g, n).transpose_a().accumulate();
                    gemm.gemm(&dr_desc, h_prev, dicfo, wg.dr);
                }
            }
        }

        if let Some(wg) = weights_grad.as_deref_mut() {
            reduce_bias_grad(n, g, dicfo, wg.db, partitions);
        }
    }

    if let (Some(wg), Some(dwr)) = (weights_grad.as_deref_mut(), dwr.as_deref()) {
        let split = c * g;
        eltwise::add_assign(&dwr[..split], &mut wg.dw[..split]);
        eltwise::add_assign(&dwr[split..], &mut wg.dr[..k * g]);
    }

    if let Some(d) = data.as_deref_mut() {
        eltwise::copy(dout, &mut d.dh_prev[..nk]);
        eltwise::copy(dcs, &mut d.dcs_prev[..nk]);
    }
}

//! Forward recurrence over `T` timesteps.
//!
//! Step `t` broadcasts the forget-adjusted bias into `ICFO_t`, accumulates
//! the input and recurrent products, activates the gates in place, then
//! forms `CS_t = f * CS_{t-1} + i * c` and `H_t = o * tanh(CS_t)`.
//! `ICFO_t`, `CS_t` and `H_t` are retained for every `t`.

use crate::api::buffers::{ForwardInputs, ForwardOutputs};
use crate::api::config::LstmConfig;
use crate::api::traits::Gemm;
use crate::api::types::{Activation, Gate, GemmDesc, GemmStrategy};
use crate::core::eltwise::{self, View, ViewMut};
use crate::core::layout::concatenate_input_hidden;
use crate::core::scratch::carve;
use crate::core::weights::FusedWeights;

/// f32 elements of scratch the forward pass needs.
pub fn forward_scratch_len(config: &LstmConfig) -> usize {
    let nk = config.state_len();
    match config.strategy {
        GemmStrategy::TwoGemms => nk,
        GemmStrategy::Concatenated => nk + config.n * config.xh_width(),
    }
}

/// Runs the forward recurrence.
///
/// `bias_fb` is the fused bias with the forget bias already applied. Buffer
/// lengths are preconditions; a short buffer panics.
pub fn forward<G: Gemm>(
    gemm: &G,
    config: &LstmConfig,
    weights: &FusedWeights,
    bias_fb: &[f32],
    inputs: &ForwardInputs<'_>,
    outputs: &mut ForwardOutputs<'_>,
    scratch: &mut [f32],
) {
    let (n, c, k) = (config.n, config.c, config.k);
    let g = config.gates();
    let nk = n * k;

    let mut rest = scratch;
    let tmp = carve(&mut rest, nk);
    let mut xh = match config.strategy {
        GemmStrategy::TwoGemms => None,
        GemmStrategy::Concatenated => Some(carve(&mut rest, n * config.xh_width())),
    };

    for t in 0..config.t {
        log::trace!("lstm::forward t={}", t);
        let x_t = &inputs.x[t * n * c..(t + 1) * n * c];
        let icfo_t = &mut outputs.icfo[t * n * g..(t + 1) * n * g];

        let (h_done, h_rest) = outputs.h.split_at_mut(t * nk);
        let h_prev = if t == 0 { inputs.h_prev } else { &h_done[(t - 1) * nk..] };
        let h_t = &mut h_rest[..nk];

        let (cs_done, cs_rest) = outputs.cs.split_at_mut(t * nk);
        let cs_prev = if t == 0 { inputs.cs_prev } else { &cs_done[(t - 1) * nk..] };
        let cs_t = &mut cs_rest[..nk];

        eltwise::copy_bias(n, bias_fb, ViewMut::packed(icfo_t, g));

        match xh.as_deref_mut() {
            None => {
                gemm.gemm(&GemmDesc::new(n, g, c).accumulate(), x_t, weights.w(), icfo_t);
                gemm.gemm(&GemmDesc::new(n, g, k).accumulate(), &h_prev[..nk], weights.r(), icfo_t);
            }
            Some(xh) => {
                concatenate_input_hidden(n, c, k, x_t, h_prev, xh);
                gemm.gemm(
                    &GemmDesc::new(n, g, config.xh_width()).accumulate(),
                    xh,
                    weights.wr(),
                    icfo_t,
                );
            }
        }

        for gate in Gate::ALL {
            eltwise::activate_inplace_ld(gate.activation(), n, k, ViewMut::gate(icfo_t, gate, k));
        }

        let icfo_t = &*icfo_t;
        let (gi, gc, gf, go) = (
            View::gate(icfo_t, Gate::Input, k),
            View::gate(icfo_t, Gate::Cell, k),
            View::gate(icfo_t, Gate::Forget, k),
            View::gate(icfo_t, Gate::Output, k),
        );

        // CS_t = f * CS_{t-1} + i * c
        eltwise::mul_ld(n, k, gf, View::packed(cs_prev, k), ViewMut::packed(cs_t, k));
        eltwise::mul_ld(n, k, gi, gc, ViewMut::packed(tmp, k));
        eltwise::add_assign(tmp, cs_t);

        // H_t = o * tanh(CS_t)
        eltwise::activate(Activation::Tanh, cs_t, tmp);
        eltwise::mul_ld(n, k, go, View::packed(tmp, k), ViewMut::packed(h_t, k));
    }
}

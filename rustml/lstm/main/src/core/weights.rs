//! Fused weight storage.
//!
//! `W` (`C x 4K`) and `R` (`K x 4K`) are kept back to back in one row-major
//! buffer, which is exactly `W` stacked over `R`: the `(C + K) x 4K` operand
//! the concatenated multiply strategy consumes. No copy is needed to switch
//! strategies.

use crate::api::buffers::GateWeights;
use crate::api::error::{LstmError, LstmResult};
use crate::api::types::Gate;
use crate::core::layout::{from_fused_gate_layout, to_fused_gate_layout};

/// Per-gate matrices extracted from a [`FusedWeights`], indexed by [`Gate::index`].
#[derive(Debug, Clone, PartialEq)]
pub struct GateMatrices {
    pub w: [Vec<f32>; 4],
    pub r: [Vec<f32>; 4],
    pub b: [Vec<f32>; 4],
}

/// Input, recurrent and bias parameters in the fused four-gate layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedWeights {
    c: usize,
    k: usize,
    wr: Vec<f32>,
    bias: Vec<f32>,
}

impl FusedWeights {
    /// Takes ownership of already fused buffers: `w` is `C x 4K`, `r` is `K x 4K`,
    /// `bias` has length `4K`.
    pub fn from_fused(
        c: usize,
        k: usize,
        w: Vec<f32>,
        r: Vec<f32>,
        bias: Vec<f32>,
    ) -> LstmResult<Self> {
        if c == 0 || k == 0 {
            return Err(LstmError::InvalidConfig(format!(
                "weight dimensions must be positive, got c={} k={}",
                c, k
            )));
        }
        let g = 4 * k;
        LstmError::check_len("w", c * g, w.len())?;
        LstmError::check_len("r", k * g, r.len())?;
        LstmError::check_len("bias", g, bias.len())?;

        let mut wr = w;
        wr.extend_from_slice(&r);
        Ok(Self { c, k, wr, bias })
    }

    /// Fuses eight per-gate matrices and four per-gate biases.
    pub fn from_gates(c: usize, k: usize, gates: &GateWeights<'_>) -> LstmResult<Self> {
        const W_NAMES: [&str; 4] = ["w_i", "w_c", "w_f", "w_o"];
        const R_NAMES: [&str; 4] = ["r_i", "r_c", "r_f", "r_o"];
        const B_NAMES: [&str; 4] = ["b_i", "b_c", "b_f", "b_o"];

        let g = 4 * k;
        let mut w = vec![0.0; c * g];
        let mut r = vec![0.0; k * g];
        let mut bias = vec![0.0; g];
        for gate in Gate::ALL {
            let idx = gate.index();
            LstmError::check_len(W_NAMES[idx], c * k, gates.w[idx].len())?;
            LstmError::check_len(R_NAMES[idx], k * k, gates.r[idx].len())?;
            LstmError::check_len(B_NAMES[idx], k, gates.b[idx].len())?;
            to_fused_gate_layout(c, k, gate, gates.w[idx], &mut w);
            to_fused_gate_layout(k, k, gate, gates.r[idx], &mut r);
            to_fused_gate_layout(1, k, gate, gates.b[idx], &mut bias);
        }
        Self::from_fused(c, k, w, r, bias)
    }

    /// Splits back into per-gate matrices.
    pub fn to_gates(&self) -> GateMatrices {
        let (c, k) = (self.c, self.k);
        let extract = |rows: usize, src: &[f32], gate: Gate| {
            let mut out = vec![0.0; rows * k];
            from_fused_gate_layout(rows, k, gate, src, &mut out);
            out
        };
        GateMatrices {
            w: Gate::ALL.map(|gate| extract(c, self.w(), gate)),
            r: Gate::ALL.map(|gate| extract(k, self.r(), gate)),
            b: Gate::ALL.map(|gate| extract(1, &self.bias, gate)),
        }
    }

    pub fn input_width(&self) -> usize {
        self.c
    }

    pub fn hidden_width(&self) -> usize {
        self.k
    }

    /// Fused input weight, `C x 4K`.
    pub fn w(&self) -> &[f32] {
        &self.wr[..self.c * 4 * self.k]
    }

    /// Fused recurrent weight, `K x 4K`.
    pub fn r(&self) -> &[f32] {
        &self.wr[self.c * 4 * self.k..]
    }

    /// `W` stacked over `R`, `(C + K) x 4K`.
    pub fn wr(&self) -> &[f32] {
        &self.wr
    }

    /// Raw fused bias, `4K`.
    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    /// Fused bias with `forget_bias` added to the forget-gate slot.
    pub fn forget_adjusted_bias(&self, forget_bias: f32) -> Vec<f32> {
        let mut bias = self.bias.clone();
        let offset = Gate::Forget.offset(self.k);
        for b in &mut bias[offset..offset + self.k] {
            *b += forget_bias;
        }
        bias
    }
}

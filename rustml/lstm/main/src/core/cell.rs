//! Validating LSTM cell.
//!
//! [`LstmCell`] owns the configuration, the multiply implementation and a
//! scratch pool. It checks every caller buffer against the configured shape
//! and then drives the unchecked forward and backward recursions.
//!
//! Internal scratch is freed before each call returns unless the cell was
//! built with [`LstmCell::with_scratch_cache`].

use std::time::Instant;

use crate::api::buffers::{BackwardInputs, ForwardInputs, ForwardOutputs, ForwardState, Gradients};
use crate::api::config::LstmConfig;
use crate::api::error::{LstmError, LstmResult};
use crate::api::traits::Gemm;
use crate::api::types::Pass;
use crate::core::backward::{backward, backward_scratch_len};
use crate::core::forward::{forward, forward_scratch_len};
use crate::core::gemm::FaerGemm;
use crate::core::runtime::{self, OptProfile};
use crate::core::scratch::ScratchPool;
use crate::core::weights::FusedWeights;

/// An LSTM cell bound to one configuration.
pub struct LstmCell<G: Gemm = FaerGemm> {
    config: LstmConfig,
    gemm: G,
    pool: ScratchPool,
    reduce_partitions: usize,
}

impl LstmCell<FaerGemm> {
    /// Creates a cell using the faer multiply.
    pub fn new(config: LstmConfig) -> LstmResult<Self> {
        Self::with_gemm(config, FaerGemm::new())
    }

    /// Creates a cell tuned by an optimization profile.
    ///
    /// Picks the sequential multiply when the profile disables parallel gemm
    /// and takes the profile's reduction partition count. Global elementwise
    /// thresholds come from `profile.runtime_config().apply()`.
    pub fn with_profile(config: LstmConfig, profile: OptProfile) -> LstmResult<Self> {
        let gemm = if profile.parallel_gemm() {
            FaerGemm::new()
        } else {
            FaerGemm::sequential()
        };
        let partitions = profile.runtime_config().reduce_partitions;
        Self::with_gemm(config, gemm)?.with_reduce_partitions(partitions)
    }
}

impl<G: Gemm> LstmCell<G> {
    /// Creates a cell using a caller-provided multiply.
    pub fn with_gemm(config: LstmConfig, gemm: G) -> LstmResult<Self> {
        config.validate()?;
        if !config.kernel.is_reference_supported() {
            return Err(LstmError::UnsupportedKernel(format!(
                "{} is not implemented by the reference cell",
                config.kernel
            )));
        }
        Ok(Self {
            config,
            gemm,
            pool: ScratchPool::new(0),
            reduce_partitions: runtime::reduce_partitions(),
        })
    }

    /// Overrides the number of batch partitions of the bias-gradient reduction.
    pub fn with_reduce_partitions(mut self, partitions: usize) -> LstmResult<Self> {
        if partitions == 0 {
            return Err(LstmError::InvalidConfig(
                "reduce_partitions must be positive".into(),
            ));
        }
        self.reduce_partitions = partitions;
        Ok(self)
    }

    /// Keeps up to `capacity` scratch buffers between calls instead of
    /// freeing them on return.
    pub fn with_scratch_cache(mut self, capacity: usize) -> Self {
        self.pool = ScratchPool::new(capacity);
        self
    }

    /// f32 elements of scratch held between calls.
    pub fn cached_scratch_len(&self) -> usize {
        self.pool.cached_elems()
    }

    /// Frees every cached scratch buffer.
    pub fn release_scratch(&mut self) {
        self.pool.clear();
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    pub fn gemm(&self) -> &G {
        &self.gemm
    }

    pub fn reduce_partitions(&self) -> usize {
        self.reduce_partitions
    }

    /// f32 elements of internal scratch used by `pass`.
    pub fn scratch_len(&self, pass: Pass) -> usize {
        match pass {
            Pass::Forward => forward_scratch_len(&self.config),
            _ => backward_scratch_len(&self.config, pass.computes_weight_gradients()),
        }
    }

    fn check_weights(&self, weights: &FusedWeights) -> LstmResult<()> {
        if weights.input_width() != self.config.c || weights.hidden_width() != self.config.k {
            return Err(LstmError::InvalidConfig(format!(
                "weights are {}x{} (c x k), cell expects {}x{}",
                weights.input_width(),
                weights.hidden_width(),
                self.config.c,
                self.config.k
            )));
        }
        Ok(())
    }

    fn check_inputs(&self, inputs: &ForwardInputs<'_>) -> LstmResult<()> {
        let cfg = &self.config;
        LstmError::check_len("x", cfg.x_len(), inputs.x.len())?;
        LstmError::check_len("cs_prev", cfg.state_len(), inputs.cs_prev.len())?;
        LstmError::check_len("h_prev", cfg.state_len(), inputs.h_prev.len())
    }

    fn check_state(&self, cs: usize, h: usize, icfo: usize) -> LstmResult<()> {
        let cfg = &self.config;
        LstmError::check_len("cs", cfg.seq_state_len(), cs)?;
        LstmError::check_len("h", cfg.seq_state_len(), h)?;
        LstmError::check_len("icfo", cfg.icfo_len(), icfo)
    }

    /// Runs the forward recurrence, writing `CS_t`, `H_t` and `ICFO_t` for every `t`.
    pub fn forward(
        &mut self,
        weights: &FusedWeights,
        inputs: &ForwardInputs<'_>,
        outputs: &mut ForwardOutputs<'_>,
    ) -> LstmResult<()> {
        self.check_weights(weights)?;
        self.check_inputs(inputs)?;
        self.check_state(outputs.cs.len(), outputs.h.len(), outputs.icfo.len())?;

        let _t = if log::log_enabled!(log::Level::Debug) { Some(Instant::now()) } else { None };

        let bias_fb = weights.forget_adjusted_bias(self.config.forget_bias);
        let scratch_len = self.scratch_len(Pass::Forward);
        let mut scratch = self.pool.get(scratch_len);
        forward(&self.gemm, &self.config, weights, &bias_fb, inputs, outputs, &mut scratch);
        self.pool.put(scratch);

        if let Some(t) = _t {
            log::debug!(
                "[perf] lstm::forward n={} c={} k={} t={} gemm={} {:.3}ms",
                self.config.n,
                self.config.c,
                self.config.k,
                self.config.t,
                self.gemm.name(),
                t.elapsed().as_secs_f64() * 1000.0
            );
        }
        Ok(())
    }

    /// Runs backpropagation through time for `pass` over retained forward activations.
    ///
    /// `Backward` writes `grads.data`, `Update` accumulates into `grads.weights`,
    /// `BackwardUpdate` does both. A bundle the pass does not use is left untouched.
    pub fn backward(
        &mut self,
        pass: Pass,
        weights: &FusedWeights,
        inputs: &ForwardInputs<'_>,
        state: &ForwardState<'_>,
        grads_in: &BackwardInputs<'_>,
        grads: &mut Gradients<'_>,
    ) -> LstmResult<()> {
        if pass == Pass::Forward {
            return Err(LstmError::InvalidConfig(
                "backward called with the forward pass".into(),
            ));
        }
        self.check_weights(weights)?;
        self.check_inputs(inputs)?;
        self.check_state(state.cs.len(), state.h.len(), state.icfo.len())?;

        let cfg = &self.config;
        LstmError::check_len("dh", cfg.seq_state_len(), grads_in.dh.len())?;
        LstmError::check_len("dcs", cfg.state_len(), grads_in.dcs.len())?;

        let data = if pass.computes_data_gradients() {
            let data = grads.data.as_mut().ok_or_else(|| {
                LstmError::InvalidConfig(format!("pass {} needs data gradient buffers", pass))
            })?;
            LstmError::check_len("dx", cfg.x_len(), data.dx.len())?;
            LstmError::check_len("dcs_prev", cfg.state_len(), data.dcs_prev.len())?;
            LstmError::check_len("dh_prev", cfg.state_len(), data.dh_prev.len())?;
            Some(data)
        } else {
            None
        };

        let weight_grads = if pass.computes_weight_gradients() {
            let wg = grads.weights.as_mut().ok_or_else(|| {
                LstmError::InvalidConfig(format!("pass {} needs weight gradient buffers", pass))
            })?;
            LstmError::check_len("dw", cfg.w_len(), wg.dw.len())?;
            LstmError::check_len("dr", cfg.r_len(), wg.dr.len())?;
            LstmError::check_len("db", cfg.bias_len(), wg.db.len())?;
            Some(wg)
        } else {
            None
        };

        let _t = if log::log_enabled!(log::Level::Debug) { Some(Instant::now()) } else { None };

        let scratch_len = self.scratch_len(pass);
        let mut scratch = self.pool.get(scratch_len);
        backward(
            &self.gemm,
            &self.config,
            weights,
            inputs,
            state,
            grads_in,
            data,
            weight_grads,
            self.reduce_partitions,
            &mut scratch,
        );
        self.pool.put(scratch);

        if let Some(t) = _t {
            log::debug!(
                "[perf] lstm::backward pass={} n={} c={} k={} t={} gemm={} {:.3}ms",
                pass,
                self.config.n,
                self.config.c,
                self.config.k,
                self.config.t,
                self.gemm.name(),
                t.elapsed().as_secs_f64() * 1000.0
            );
        }
        Ok(())
    }
}

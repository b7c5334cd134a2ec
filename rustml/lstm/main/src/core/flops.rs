//! FLOP accounting per pass, for throughput reporting.
//!
//! A transcendental evaluation (exp, tanh) counts as [`TRANSCENDENTAL_FLOPS`].
//! Terms scaled by `T - 1` or `T - 2` are clamped at zero for short sequences.

use crate::api::config::LstmConfig;
use crate::api::types::Pass;

pub const TRANSCENDENTAL_FLOPS: f64 = 12.0;

/// Floating point operations performed by one invocation of `pass`.
pub fn flops(config: &LstmConfig, pass: Pass) -> f64 {
    let (n, c, k, t) = (config.n as f64, config.c as f64, config.k as f64, config.t as f64);
    let tf = TRANSCENDENTAL_FLOPS;
    let t1 = (t - 1.0).max(0.0);
    let t2 = (t - 2.0).max(0.0);

    // delta, dJ/dCS and the four gate gradients
    let gate_grads = k * n
        + (6.0 * k * n + tf * k * n)
        + 3.0 * (4.0 * k * n)
        + (4.0 * k * n + tf * k * n);
    let through_w = 4.0 * k * c + 8.0 * k * n * c + 3.0 * k * c;
    let through_r = 4.0 * k * k + 8.0 * k * n * k;

    let weight_update = (c * n + 8.0 * k * n * c) * t
        + 4.0 * k * c * t1
        + (4.0 * k * n + 8.0 * k * n * k) * t1
        + 4.0 * k * n * t2
        + 4.0 * k * n * t1;

    match pass {
        Pass::Forward => {
            let gates = (2.0 * k * n * c + 2.0 * k * n * k + 2.0 * k * n + tf * k * n) * 4.0;
            (gates + 4.0 * k * n + tf * k * n) * t
        }
        Pass::Backward => (gate_grads + through_w + through_r) * t,
        Pass::Update => (gate_grads + through_r) * t + weight_update,
        Pass::BackwardUpdate => (gate_grads + through_w + through_r) * t + weight_update,
    }
}

/// `flops` in units of 1e9.
pub fn gflops(config: &LstmConfig, pass: Pass) -> f64 {
    flops(config, pass) * 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_unit_shape() {
        // ((2 + 2 + 2 + 12) * 4 + 4 + 12) * 1
        assert_eq!(flops(&LstmConfig::new(1, 1, 1, 1), Pass::Forward), 88.0);
    }

    #[test]
    fn test_backward_unit_shape() {
        // 1 + 18 + 12 + 16 + 15 + 12
        assert_eq!(flops(&LstmConfig::new(1, 1, 1, 1), Pass::Backward), 74.0);
    }

    #[test]
    fn test_update_clamps_short_sequences() {
        // gate grads (47) + R^T (12) + x^T (9); every (T-1)/(T-2) term vanishes
        assert_eq!(flops(&LstmConfig::new(1, 1, 1, 1), Pass::Update), 68.0);
    }

    #[test]
    fn test_backward_update_is_superset() {
        let config = LstmConfig::default();
        let bwd = flops(&config, Pass::Backward);
        let upd = flops(&config, Pass::Update);
        let both = flops(&config, Pass::BackwardUpdate);
        assert!(both > bwd && both > upd);
        assert!(gflops(&config, Pass::Forward) > 0.0);
    }

    #[test]
    fn test_scales_linearly_in_t_for_forward() {
        let one = flops(&LstmConfig::new(4, 8, 2, 1), Pass::Forward);
        let five = flops(&LstmConfig::new(4, 8, 2, 5), Pass::Forward);
        assert_eq!(five, 5.0 * one);
    }
}

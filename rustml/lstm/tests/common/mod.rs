#![allow(dead_code)]

use rustml_lstm::*;

/// Route `log` output to the test harness; set `RUST_LOG=debug` to see it.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Assert that two f32 slices are element-wise close within a tolerance.
pub fn assert_f32_near(actual: &[f32], expected: &[f32], tolerance: f32, msg: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{}: length mismatch (actual={}, expected={})",
        msg,
        actual.len(),
        expected.len()
    );
    for (i, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "{}: element [{}] mismatch: actual={}, expected={}, diff={}, tolerance={}",
            msg,
            i,
            a,
            e,
            (a - e).abs(),
            tolerance
        );
    }
}

/// Assert bitwise equality of two f32 slices.
pub fn assert_bits_eq(actual: &[f32], expected: &[f32], msg: &str) {
    assert_eq!(actual.len(), expected.len(), "{}: length mismatch", msg);
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a.to_bits(), e.to_bits(), "{}: element [{}] {} vs {}", msg, i, a, e);
    }
}

/// Every caller-owned input of one cell invocation.
#[derive(Debug, Clone)]
pub struct Problem {
    pub config: LstmConfig,
    pub w: Vec<f32>,
    pub r: Vec<f32>,
    pub b: Vec<f32>,
    pub x: Vec<f32>,
    pub cs0: Vec<f32>,
    pub h0: Vec<f32>,
    pub dh: Vec<f32>,
    pub dcs: Vec<f32>,
}

/// Retained forward activations.
#[derive(Debug, Clone, PartialEq)]
pub struct Activations {
    pub cs: Vec<f32>,
    pub h: Vec<f32>,
    pub icfo: Vec<f32>,
}

/// Every gradient buffer of one backward invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GradBuffers {
    pub dx: Vec<f32>,
    pub dcs_prev: Vec<f32>,
    pub dh_prev: Vec<f32>,
    pub dw: Vec<f32>,
    pub dr: Vec<f32>,
    pub db: Vec<f32>,
}

impl GradBuffers {
    pub fn filled(config: &LstmConfig, value: f32) -> Self {
        Self {
            dx: vec![value; config.x_len()],
            dcs_prev: vec![value; config.state_len()],
            dh_prev: vec![value; config.state_len()],
            dw: vec![value; config.w_len()],
            dr: vec![value; config.r_len()],
            db: vec![value; config.bias_len()],
        }
    }
}

impl Problem {
    /// Random weights and inputs in moderate ranges, reproducible from `seed`.
    pub fn random(config: LstmConfig, seed: u64) -> Self {
        init_logging();
        let mut p = Self {
            w: vec![0.0; config.w_len()],
            r: vec![0.0; config.r_len()],
            b: vec![0.0; config.bias_len()],
            x: vec![0.0; config.x_len()],
            cs0: vec![0.0; config.state_len()],
            h0: vec![0.0; config.state_len()],
            dh: vec![0.0; config.seq_state_len()],
            dcs: vec![0.0; config.state_len()],
            config,
        };
        fill_seeded(&mut p.w, seed, 0.5);
        fill_seeded(&mut p.r, seed + 1, 0.5);
        fill_seeded(&mut p.b, seed + 2, 0.2);
        fill_seeded(&mut p.x, seed + 3, 1.0);
        fill_seeded(&mut p.cs0, seed + 4, 0.5);
        fill_seeded(&mut p.h0, seed + 5, 0.5);
        fill_seeded(&mut p.dh, seed + 6, 1.0);
        fill_seeded(&mut p.dcs, seed + 7, 1.0);
        p
    }

    pub fn weights(&self) -> FusedWeights {
        FusedWeights::from_fused(
            self.config.c,
            self.config.k,
            self.w.clone(),
            self.r.clone(),
            self.b.clone(),
        )
        .unwrap()
    }

    pub fn inputs(&self) -> ForwardInputs<'_> {
        ForwardInputs {
            x: &self.x,
            cs_prev: &self.cs0,
            h_prev: &self.h0,
        }
    }

    pub fn forward<G: Gemm>(&self, cell: &mut LstmCell<G>) -> Activations {
        let mut acts = Activations {
            cs: vec![0.0; self.config.seq_state_len()],
            h: vec![0.0; self.config.seq_state_len()],
            icfo: vec![0.0; self.config.icfo_len()],
        };
        let mut outputs = ForwardOutputs {
            cs: &mut acts.cs,
            h: &mut acts.h,
            icfo: &mut acts.icfo,
        };
        cell.forward(&self.weights(), &self.inputs(), &mut outputs).unwrap();
        acts
    }

    /// Runs `pass` with every gradient buffer bound, starting from `grads`.
    pub fn backward_into<G: Gemm>(
        &self,
        cell: &mut LstmCell<G>,
        pass: Pass,
        acts: &Activations,
        grads: &mut GradBuffers,
    ) {
        let state = ForwardState {
            cs: &acts.cs,
            h: &acts.h,
            icfo: &acts.icfo,
        };
        let grads_in = BackwardInputs {
            dh: &self.dh,
            dcs: &self.dcs,
        };
        let mut bundle = Gradients {
            data: Some(DataGradients {
                dx: &mut grads.dx,
                dcs_prev: &mut grads.dcs_prev,
                dh_prev: &mut grads.dh_prev,
            }),
            weights: Some(WeightGradients {
                dw: &mut grads.dw,
                dr: &mut grads.dr,
                db: &mut grads.db,
            }),
        };
        cell.backward(pass, &self.weights(), &self.inputs(), &state, &grads_in, &mut bundle)
            .unwrap();
    }

    /// Runs `pass` into zero-initialized gradient buffers.
    pub fn backward<G: Gemm>(
        &self,
        cell: &mut LstmCell<G>,
        pass: Pass,
        acts: &Activations,
    ) -> GradBuffers {
        let mut grads = GradBuffers::filled(&self.config, 0.0);
        self.backward_into(cell, pass, acts, &mut grads);
        grads
    }

    /// `sum(dh * H) + sum(dcs * CS_{T-1})`: the loss whose gradient the
    /// backward pass computes when seeded with `dh` and `dcs`.
    pub fn loss<G: Gemm>(&self, cell: &mut LstmCell<G>) -> f64 {
        let acts = self.forward(cell);
        let nk = self.config.state_len();
        let last = (self.config.t - 1) * nk;
        let h_term: f64 = acts.h.iter().zip(&self.dh).map(|(&h, &d)| h as f64 * d as f64).sum();
        let cs_term: f64 = acts.cs[last..]
            .iter()
            .zip(&self.dcs)
            .map(|(&c, &d)| c as f64 * d as f64)
            .sum();
        h_term + cs_term
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Straight-loop f64 evaluation of the recurrence, independent of the crate's engine.
pub struct Reference {
    pub cs: Vec<f64>,
    pub h: Vec<f64>,
    pub icfo: Vec<f64>,
    /// Per-timestep gate gradients, `T x N x 4K`.
    pub dicfo: Vec<f64>,
    pub dx: Vec<f64>,
    pub dh_prev: Vec<f64>,
    pub dcs_prev: Vec<f64>,
}

impl Reference {
    pub fn compute(p: &Problem) -> Self {
        let LstmConfig { n, c, k, t, forget_bias, .. } = p.config;
        let g = 4 * k;
        let nk = n * k;
        let mut cs = vec![0.0f64; t * nk];
        let mut h = vec![0.0f64; t * nk];
        let mut icfo = vec![0.0f64; t * n * g];

        for step in 0..t {
            for row in 0..n {
                for j in 0..g {
                    let mut acc = p.b[j] as f64;
                    if j / k == 2 {
                        acc += forget_bias as f64;
                    }
                    for cc in 0..c {
                        acc += p.x[(step * n + row) * c + cc] as f64 * p.w[cc * g + j] as f64;
                    }
                    for kk in 0..k {
                        let hp = if step == 0 {
                            p.h0[row * k + kk] as f64
                        } else {
                            h[(step - 1) * nk + row * k + kk]
                        };
                        acc += hp * p.r[kk * g + j] as f64;
                    }
                    icfo[(step * n + row) * g + j] =
                        if j / k == 1 { acc.tanh() } else { sigmoid(acc) };
                }
                for kk in 0..k {
                    let base = (step * n + row) * g;
                    let (gi, gc, gf, go) = (
                        icfo[base + kk],
                        icfo[base + k + kk],
                        icfo[base + 2 * k + kk],
                        icfo[base + 3 * k + kk],
                    );
                    let prev = if step == 0 {
                        p.cs0[row * k + kk] as f64
                    } else {
                        cs[(step - 1) * nk + row * k + kk]
                    };
                    let cs_t = gf * prev + gi * gc;
                    cs[step * nk + row * k + kk] = cs_t;
                    h[step * nk + row * k + kk] = go * cs_t.tanh();
                }
            }
        }

        let mut dicfo = vec![0.0f64; t * n * g];
        let mut dx = vec![0.0f64; t * n * c];
        let mut dcs: Vec<f64> = p.dcs.iter().map(|&v| v as f64).collect();
        let mut dout = vec![0.0f64; nk];

        for step in (0..t).rev() {
            for row in 0..n {
                for kk in 0..k {
                    let s = row * k + kk;
                    let base = (step * n + row) * g;
                    let (gi, gc, gf, go) = (
                        icfo[base + kk],
                        icfo[base + k + kk],
                        icfo[base + 2 * k + kk],
                        icfo[base + 3 * k + kk],
                    );
                    let cs_t = cs[step * nk + s];
                    let prev = if step == 0 { p.cs0[s] as f64 } else { cs[(step - 1) * nk + s] };
                    let tcs = cs_t.tanh();
                    let mut delta = p.dh[step * nk + s] as f64;
                    if step + 1 < t {
                        delta += dout[s];
                    }
                    dcs[s] += delta * go * (1.0 - tcs * tcs);
                    dicfo[base + kk] = dcs[s] * gc * gi * (1.0 - gi);
                    dicfo[base + k + kk] = dcs[s] * gi * (1.0 - gc * gc);
                    dicfo[base + 2 * k + kk] = dcs[s] * prev * gf * (1.0 - gf);
                    dicfo[base + 3 * k + kk] = delta * tcs * go * (1.0 - go);
                    dcs[s] *= gf;
                }
            }
            for row in 0..n {
                let base = (step * n + row) * g;
                for kk in 0..k {
                    dout[row * k + kk] =
                        (0..g).map(|j| dicfo[base + j] * p.r[kk * g + j] as f64).sum();
                }
                for cc in 0..c {
                    dx[(step * n + row) * c + cc] =
                        (0..g).map(|j| dicfo[base + j] * p.w[cc * g + j] as f64).sum();
                }
            }
        }

        Self {
            cs,
            h,
            icfo,
            dicfo,
            dx,
            dh_prev: dout,
            dcs_prev: dcs,
        }
    }
}

pub fn to_f32(v: &[f64]) -> Vec<f32> {
    v.iter().map(|&x| x as f32).collect()
}

//! # RustML LSTM
//!
//! Reference LSTM cell for mini-batched sequences: forward activations over
//! `T` timesteps and backpropagation through time (BPTT) for the input,
//! boundary-state, weight, recurrent-weight and bias gradients.
//!
//! The recurrence is expressed as a sequence of dense multiplies over a
//! fused four-gate layout (`i, c, f, o`), with the elementwise gate math
//! running over strided tiles of the `N x 4K` activation buffer.
//!
//! ## Features
//!
//! - Layout conversion between per-gate and fused weight matrices
//! - Strided elementwise engine (sigmoid, tanh, relu and their derivatives)
//! - Two interchangeable multiply strategies (separate or concatenated input/hidden)
//! - Partitioned, thread-count independent bias-gradient reduction
//! - faer-backed dense multiply behind the [`Gemm`] trait
//!
//! ## Example
//!
//! ```rust
//! use rustml_lstm::{
//!     ForwardInputs, ForwardOutputs, FusedWeights, LstmCell, LstmConfig, fill_seeded,
//! };
//!
//! let config = LstmConfig::new(2, 3, 4, 5);
//! let mut cell = LstmCell::new(config.clone()).unwrap();
//!
//! let mut w = vec![0.0; config.w_len()];
//! let mut r = vec![0.0; config.r_len()];
//! fill_seeded(&mut w, 42, 0.1);
//! fill_seeded(&mut r, 43, 0.1);
//! let weights = FusedWeights::from_fused(3, 4, w, r, vec![0.0; config.bias_len()]).unwrap();
//!
//! let x = vec![0.5; config.x_len()];
//! let cs_prev = vec![0.0; config.state_len()];
//! let h_prev = vec![0.0; config.state_len()];
//! let mut cs = vec![0.0; config.seq_state_len()];
//! let mut h = vec![0.0; config.seq_state_len()];
//! let mut icfo = vec![0.0; config.icfo_len()];
//!
//! let inputs = ForwardInputs { x: &x, cs_prev: &cs_prev, h_prev: &h_prev };
//! let mut outputs = ForwardOutputs { cs: &mut cs, h: &mut h, icfo: &mut icfo };
//! cell.forward(&weights, &inputs, &mut outputs).unwrap();
//! assert!(h.iter().all(|v| v.abs() < 1.0));
//! ```

pub mod api;
mod core;
mod saf;

pub use saf::*;

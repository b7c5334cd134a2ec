//! Facade re-exports for rustml-lstm

pub use crate::api::buffers::*;
pub use crate::api::config::LstmConfig;
pub use crate::api::error::*;
pub use crate::api::kernel::{ElementType, KernelVariant};
pub use crate::api::traits::Gemm;
pub use crate::api::types::*;
pub use crate::core::backward::reduce_bias_grad;
pub use crate::core::cell::LstmCell;
pub use crate::core::eltwise;
pub use crate::core::flops::{flops, gflops, TRANSCENDENTAL_FLOPS};
pub use crate::core::gemm::{FaerGemm, NaiveGemm};
pub use crate::core::init::{fill_constant, fill_seeded};
pub use crate::core::layout::{
    concatenate_input_hidden, from_fused_gate_layout, split_gates, split_input_hidden,
    to_fused_gate_layout,
};
pub use crate::core::runtime::{OptProfile, RuntimeConfig};
pub use crate::core::weights::{FusedWeights, GateMatrices};

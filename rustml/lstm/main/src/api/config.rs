use crate::api::error::{LstmError, LstmResult};
use crate::api::kernel::KernelVariant;
use crate::api::types::GemmStrategy;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Shape and numerical configuration of one LSTM cell invocation.
///
/// - `n`: mini-batch size
/// - `c`: input width
/// - `k`: hidden width
/// - `t`: number of timesteps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmConfig {
    pub n: usize,
    pub c: usize,
    pub k: usize,
    pub t: usize,
    /// Added once to the forget-gate bias before the first timestep.
    #[serde(default = "default_forget_bias")]
    pub forget_bias: f32,
    #[serde(default)]
    pub strategy: GemmStrategy,
    #[serde(default)]
    pub kernel: KernelVariant,
}

fn default_forget_bias() -> f32 { 1.0 }

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            n: 128,
            c: 512,
            k: 64,
            t: 5,
            forget_bias: 1.0,
            strategy: GemmStrategy::Concatenated,
            kernel: KernelVariant::F32,
        }
    }
}

impl LstmConfig {
    pub fn new(n: usize, c: usize, k: usize, t: usize) -> Self {
        Self {
            n,
            c,
            k,
            t,
            ..Self::default()
        }
    }

    pub fn with_forget_bias(mut self, forget_bias: f32) -> Self {
        self.forget_bias = forget_bias;
        self
    }

    pub fn with_strategy(mut self, strategy: GemmStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_kernel(mut self, kernel: KernelVariant) -> Self {
        self.kernel = kernel;
        self
    }

    /// Load a config from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> LstmResult<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from a JSON string.
    pub fn from_json_str(json: &str) -> LstmResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LstmResult<()> {
        for (name, value) in [("n", self.n), ("c", self.c), ("k", self.k), ("t", self.t)] {
            if value == 0 {
                return Err(LstmError::InvalidConfig(format!(
                    "{} must be positive",
                    name
                )));
            }
        }
        if !self.forget_bias.is_finite() {
            return Err(LstmError::InvalidConfig(format!(
                "forget_bias must be finite, got {}",
                self.forget_bias
            )));
        }
        Ok(())
    }

    /// Width of the fused gate dimension, `4K`.
    pub fn gates(&self) -> usize {
        4 * self.k
    }

    /// Width of a concatenated `[x, h]` row, `C + K`.
    pub fn xh_width(&self) -> usize {
        self.c + self.k
    }

    /// Elements of the input sequence, `T x N x C`.
    pub fn x_len(&self) -> usize {
        self.t * self.n * self.c
    }

    /// Elements of one `N x K` state.
    pub fn state_len(&self) -> usize {
        self.n * self.k
    }

    /// Elements of a per-timestep state sequence, `T x N x K`.
    pub fn seq_state_len(&self) -> usize {
        self.t * self.state_len()
    }

    /// Elements of the per-timestep gate buffer, `T x N x 4K`.
    pub fn icfo_len(&self) -> usize {
        self.t * self.n * self.gates()
    }

    /// Elements of the fused input weight, `C x 4K`.
    pub fn w_len(&self) -> usize {
        self.c * self.gates()
    }

    /// Elements of the fused recurrent weight, `K x 4K`.
    pub fn r_len(&self) -> usize {
        self.k * self.gates()
    }

    /// Elements of the fused bias, `4K`.
    pub fn bias_len(&self) -> usize {
        self.gates()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shape() {
        let config = LstmConfig::default();
        assert_eq!((config.n, config.c, config.k, config.t), (128, 512, 64, 5));
        assert_eq!(config.forget_bias, 1.0);
        assert_eq!(config.strategy, GemmStrategy::Concatenated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_buffer_lengths() {
        let config = LstmConfig::new(2, 3, 4, 5);
        assert_eq!(config.gates(), 16);
        assert_eq!(config.x_len(), 30);
        assert_eq!(config.state_len(), 8);
        assert_eq!(config.seq_state_len(), 40);
        assert_eq!(config.icfo_len(), 160);
        assert_eq!(config.w_len(), 48);
        assert_eq!(config.r_len(), 64);
        assert_eq!(config.xh_width(), 7);
    }

    #[test]
    fn test_validate_rejects_zero_dims() {
        let err = LstmConfig::new(2, 3, 0, 5).validate().unwrap_err();
        assert!(err.to_string().contains("k must be positive"));
        assert!(LstmConfig::new(2, 3, 4, 0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nan_forget_bias() {
        let config = LstmConfig::new(1, 1, 1, 1).with_forget_bias(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_defaults() {
        let config = LstmConfig::from_json_str(r#"{"n": 4, "c": 8, "k": 2, "t": 3}"#).unwrap();
        assert_eq!(config.forget_bias, 1.0);
        assert_eq!(config.strategy, GemmStrategy::Concatenated);
        assert_eq!(config.kernel, KernelVariant::F32);
    }

    #[test]
    fn test_from_json_overrides() {
        let json =
            r#"{"n": 4, "c": 8, "k": 2, "t": 3, "forget_bias": 0.0, "strategy": "two_gemms"}"#;
        let config = LstmConfig::from_json_str(json).unwrap();
        assert_eq!(config.forget_bias, 0.0);
        assert_eq!(config.strategy, GemmStrategy::TwoGemms);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lstm.json");
        std::fs::write(&path, r#"{"n": 1, "c": 1, "k": 1, "t": 1}"#).unwrap();
        let config = LstmConfig::from_json_file(&path).unwrap();
        assert_eq!(config, LstmConfig::new(1, 1, 1, 1));
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = LstmConfig::from_json_file("/nonexistent/lstm.json").unwrap_err();
        assert!(matches!(err, LstmError::Io(_)));
    }
}

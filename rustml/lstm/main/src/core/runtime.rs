use crate::api::error::{LstmError, LstmResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Global threshold for switching elementwise tile ops from sequential to parallel (rayon).
pub(crate) static ELTWISE_PAR_THRESHOLD: AtomicUsize = AtomicUsize::new(16384);

/// Global number of batch partitions used by the bias-gradient reduction.
pub(crate) static REDUCE_PARTITIONS: AtomicUsize = AtomicUsize::new(8);

pub(crate) fn eltwise_par_threshold() -> usize {
    ELTWISE_PAR_THRESHOLD.load(Ordering::Relaxed)
}

pub(crate) fn reduce_partitions() -> usize {
    REDUCE_PARTITIONS.load(Ordering::Relaxed).max(1)
}

/// Runtime configuration for parallelism and thread management.
/// Must be applied (via `apply()`) before any computation to take effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of threads for faer and rayon parallelism.
    /// 0 means auto-detect (use all available cores).
    pub num_threads: usize,
    /// Element count below which elementwise tile ops run sequentially (default 16384).
    pub eltwise_par_threshold: usize,
    /// Number of batch partitions for the bias-gradient reduction (default 8).
    ///
    /// Fixed independently of the thread count so the summation order, and
    /// hence `db`, is identical however many workers run.
    pub reduce_partitions: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            eltwise_par_threshold: 16384,
            reduce_partitions: 8,
        }
    }
}

impl RuntimeConfig {
    /// Apply this runtime configuration globally.
    ///
    /// Sets faer's global parallelism and optionally configures
    /// rayon's global thread pool. Writes thresholds to global atomics.
    pub fn apply(&self) -> LstmResult<()> {
        use faer::{set_global_parallelism, Parallelism};

        if self.reduce_partitions == 0 {
            return Err(LstmError::Runtime(
                "reduce_partitions must be positive".into(),
            ));
        }

        if self.num_threads == 0 {
            set_global_parallelism(Parallelism::Rayon(0));
        } else {
            set_global_parallelism(Parallelism::Rayon(self.num_threads));
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.num_threads)
                .build_global()
                .map_err(|e| {
                    LstmError::Runtime(format!("Failed to set rayon thread pool: {}", e))
                })?;
        }

        ELTWISE_PAR_THRESHOLD.store(self.eltwise_par_threshold, Ordering::Relaxed);
        REDUCE_PARTITIONS.store(self.reduce_partitions, Ordering::Relaxed);

        log::info!("[runtime] SIMD: {}", Self::detect_simd());
        log::info!("[runtime] Rayon threads: {}", rayon::current_num_threads());

        Ok(())
    }

    /// Detect available SIMD instruction sets.
    pub fn detect_simd() -> &'static str {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx512f") {
                return "AVX-512";
            }
            if is_x86_feature_detected!("avx2") {
                return "AVX2";
            }
            if is_x86_feature_detected!("sse2") {
                return "SSE2";
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            return "NEON";
        }
        "scalar"
    }
}

/// Optimization profiles for A/B benchmarking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptProfile {
    /// Default thresholds.
    Optimized,
    /// Everything sequential: thresholds set to MAX, one reduction partition.
    Baseline,
    /// Lower thresholds (1024) for aggressive parallelism.
    Aggressive,
}

impl OptProfile {
    /// Build a `RuntimeConfig` matching this profile.
    pub fn runtime_config(&self) -> RuntimeConfig {
        match self {
            OptProfile::Optimized => RuntimeConfig::default(),
            OptProfile::Baseline => RuntimeConfig {
                eltwise_par_threshold: usize::MAX,
                reduce_partitions: 1,
                ..RuntimeConfig::default()
            },
            OptProfile::Aggressive => RuntimeConfig {
                eltwise_par_threshold: 1024,
                reduce_partitions: 16,
                ..RuntimeConfig::default()
            },
        }
    }

    /// Whether the faer multiply should run with the global parallelism.
    pub fn parallel_gemm(&self) -> bool {
        *self != OptProfile::Baseline
    }
}

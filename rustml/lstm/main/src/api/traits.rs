//! Trait definitions for the LSTM cell's collaborators

use crate::api::types::GemmDesc;

/// Dense matrix multiply primitive.
///
/// Computes `C = alpha * op(A) * op(B) + beta * C` over row-major slices as
/// described by [`GemmDesc`]. When `beta == 0` the prior contents of `C` are
/// ignored, so `C` may hold uninitialized garbage such as NaN. Implementations
/// block until the product is written and must be deterministic for a fixed
/// parallelism setting.
pub trait Gemm: Send + Sync {
    /// Runs one multiply. Panics if a slice is shorter than its described tile.
    fn gemm(&self, desc: &GemmDesc, a: &[f32], b: &[f32], c: &mut [f32]);

    /// Short name used in perf logs.
    fn name(&self) -> &str;
}

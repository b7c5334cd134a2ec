//! Seeded deterministic buffer initialization.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fills `buf` with values drawn uniformly from `[-scale, scale]`.
///
/// The same `seed` always produces the same values. A zero or non-finite
/// `scale` has no valid range and zero-fills `buf`.
pub fn fill_seeded(buf: &mut [f32], seed: u64, scale: f32) {
    let mut rng = StdRng::seed_from_u64(seed);
    let scale = scale.abs();
    if scale == 0.0 || !scale.is_finite() {
        buf.fill(0.0);
        return;
    }
    for v in buf.iter_mut() {
        *v = rng.gen_range(-scale..=scale);
    }
}

/// Fills `buf` with `value`.
pub fn fill_constant(buf: &mut [f32], value: f32) {
    buf.fill(value);
}

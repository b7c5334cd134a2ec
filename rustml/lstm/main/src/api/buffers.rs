//! Borrowed buffer bundles passed across the cell boundary.
//!
//! Every buffer is caller-owned and row-major. Sequence buffers are stored
//! timestep-major: timestep `t` of an `N x K` sequence starts at `t * N * K`.

/// Per-gate weights, indexed by [`Gate::index`](crate::api::types::Gate::index).
///
/// `w[g]` is `C x K`, `r[g]` is `K x K`, `b[g]` has length `K`.
#[derive(Debug, Clone, Copy)]
pub struct GateWeights<'a> {
    pub w: [&'a [f32]; 4],
    pub r: [&'a [f32]; 4],
    pub b: [&'a [f32]; 4],
}

/// Inputs of a forward pass.
#[derive(Debug, Clone, Copy)]
pub struct ForwardInputs<'a> {
    /// `T x N x C`
    pub x: &'a [f32],
    /// `N x K` cell state fed into timestep 0
    pub cs_prev: &'a [f32],
    /// `N x K` hidden state fed into timestep 0
    pub h_prev: &'a [f32],
}

/// Outputs of a forward pass, retained for the backward pass.
#[derive(Debug)]
pub struct ForwardOutputs<'a> {
    /// `T x N x K`
    pub cs: &'a mut [f32],
    /// `T x N x K`
    pub h: &'a mut [f32],
    /// `T x N x 4K` post-activation gates
    pub icfo: &'a mut [f32],
}

impl<'a> ForwardOutputs<'a> {
    /// Read-only view of the retained activations.
    pub fn as_state(&self) -> ForwardState<'_> {
        ForwardState {
            cs: self.cs,
            h: self.h,
            icfo: self.icfo,
        }
    }
}

/// Read-only forward activations consumed by the backward pass.
#[derive(Debug, Clone, Copy)]
pub struct ForwardState<'a> {
    pub cs: &'a [f32],
    pub h: &'a [f32],
    pub icfo: &'a [f32],
}

/// Externally supplied loss gradients.
#[derive(Debug, Clone, Copy)]
pub struct BackwardInputs<'a> {
    /// `T x N x K` gradient into each `H_t`
    pub dh: &'a [f32],
    /// `N x K` gradient into `CS_{T-1}`
    pub dcs: &'a [f32],
}

/// Gradients with respect to the data: written, never accumulated.
#[derive(Debug)]
pub struct DataGradients<'a> {
    /// `T x N x C`
    pub dx: &'a mut [f32],
    /// `N x K`
    pub dcs_prev: &'a mut [f32],
    /// `N x K`
    pub dh_prev: &'a mut [f32],
}

/// Gradients with respect to the parameters: accumulated into.
///
/// The caller zero-initializes these before the first pass that accumulates.
#[derive(Debug)]
pub struct WeightGradients<'a> {
    /// `C x 4K`
    pub dw: &'a mut [f32],
    /// `K x 4K`
    pub dr: &'a mut [f32],
    /// `4K`
    pub db: &'a mut [f32],
}

/// Output buffers of a backward invocation.
///
/// Either side may be absent when the selected pass does not produce it.
#[derive(Debug, Default)]
pub struct Gradients<'a> {
    pub data: Option<DataGradients<'a>>,
    pub weights: Option<WeightGradients<'a>>,
}

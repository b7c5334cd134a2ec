//! Core types for the LSTM cell

use serde::{Deserialize, Serialize};

/// One of the four LSTM gates.
///
/// The discriminant order is the fused layout order: every `N x 4K` gate
/// buffer stores `i`, `c`, `f`, `o` in that sequence along the columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    /// Input gate `i`
    Input,
    /// Candidate cell gate `c`
    Cell,
    /// Forget gate `f`
    Forget,
    /// Output gate `o`
    Output,
}

impl Gate {
    /// All gates in fused layout order.
    pub const ALL: [Gate; 4] = [Gate::Input, Gate::Cell, Gate::Forget, Gate::Output];

    /// Slot of this gate in the fused layout.
    pub fn index(self) -> usize {
        match self {
            Gate::Input => 0,
            Gate::Cell => 1,
            Gate::Forget => 2,
            Gate::Output => 3,
        }
    }

    /// Column offset of this gate inside a row of width `4 * k`.
    pub fn offset(self, k: usize) -> usize {
        self.index() * k
    }

    /// Nonlinearity applied to this gate's pre-activation.
    pub fn activation(self) -> Activation {
        match self {
            Gate::Cell => Activation::Tanh,
            Gate::Input | Gate::Forget | Gate::Output => Activation::Sigmoid,
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gate::Input => write!(f, "i"),
            Gate::Cell => write!(f, "c"),
            Gate::Forget => write!(f, "f"),
            Gate::Output => write!(f, "o"),
        }
    }
}

/// Elementwise activation functions.
///
/// Sigmoid and tanh evaluate in double precision and round to `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Sigmoid,
    Tanh,
    Relu,
}

impl Activation {
    /// Evaluates the activation at `x`.
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => {
                let exp_value = (-(x as f64)).exp() as f32;
                1.0 / (1.0 + exp_value)
            }
            Activation::Tanh => (x as f64).tanh() as f32,
            Activation::Relu => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
        }
    }

    /// Derivative with respect to the pre-activation input `x`.
    #[inline]
    pub fn derivative(self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => {
                let s = Activation::Sigmoid.apply(x);
                (1.0 - s) * s
            }
            Activation::Tanh => {
                let t = Activation::Tanh.apply(x);
                1.0 - t * t
            }
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Which part of the computation a cell invocation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// Forward activations only.
    #[default]
    Forward,
    /// Data gradients: dX, dCS_prev, dH_prev.
    Backward,
    /// Weight gradients: dW, dR, db.
    Update,
    /// Data and weight gradients.
    BackwardUpdate,
}

impl Pass {
    /// Whether this pass writes the data gradients.
    pub fn computes_data_gradients(self) -> bool {
        matches!(self, Pass::Backward | Pass::BackwardUpdate)
    }

    /// Whether this pass accumulates the weight gradients.
    pub fn computes_weight_gradients(self) -> bool {
        matches!(self, Pass::Update | Pass::BackwardUpdate)
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::Forward => write!(f, "fwd"),
            Pass::Backward => write!(f, "bwd"),
            Pass::Update => write!(f, "upd"),
            Pass::BackwardUpdate => write!(f, "bwd+upd"),
        }
    }
}

/// How the per-timestep gate pre-activations are multiplied out.
///
/// Both strategies compute `x_t * W + h_{t-1} * R` into the fused gate
/// buffer and share the same timestep loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GemmStrategy {
    /// Two multiply-accumulates: `x_t * W` then `h_{t-1} * R`.
    TwoGemms,
    /// One multiply-accumulate of `[x_t, h_{t-1}]` against `W` stacked over `R`.
    #[default]
    Concatenated,
}

/// Transpose flag for the dense multiply primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transpose {
    #[default]
    No,
    Yes,
}

/// A `rows x cols` tile inside a row-major buffer whose rows are `ld` apart.
///
/// Gate sub-blocks of the fused `N x 4K` buffer are `Block { rows: N, cols: K, ld: 4K }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub rows: usize,
    pub cols: usize,
    pub ld: usize,
}

impl Block {
    pub fn new(rows: usize, cols: usize, ld: usize) -> Self {
        debug_assert!(ld >= cols, "leading dimension {} smaller than cols {}", ld, cols);
        Self { rows, cols, ld }
    }

    /// A tile whose rows are contiguous.
    pub fn packed(rows: usize, cols: usize) -> Self {
        Self { rows, cols, ld: cols }
    }

    /// Number of elements addressed by the tile.
    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }

    /// Minimum buffer length, from the tile origin, that holds every row.
    pub fn span(&self) -> usize {
        if self.rows == 0 {
            0
        } else {
            (self.rows - 1) * self.ld + self.cols
        }
    }
}

/// Description of one dense multiply `C = alpha * op(A) * op(B) + beta * C`.
///
/// All matrices are row-major. `m x k` is the shape of `op(A)`, `k x n` the
/// shape of `op(B)` and `m x n` the shape of `C`; `lda`, `ldb`, `ldc` are the
/// row strides of the matrices as stored (before any transpose).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GemmDesc {
    pub trans_a: Transpose,
    pub trans_b: Transpose,
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub alpha: f32,
    pub beta: f32,
    pub lda: usize,
    pub ldb: usize,
    pub ldc: usize,
}

impl GemmDesc {
    /// Packed, non-transposed, overwriting `C = A * B`.
    pub fn new(m: usize, n: usize, k: usize) -> Self {
        Self {
            trans_a: Transpose::No,
            trans_b: Transpose::No,
            m,
            n,
            k,
            alpha: 1.0,
            beta: 0.0,
            lda: k,
            ldb: n,
            ldc: n,
        }
    }

    /// Use `A^T`, with `A` stored packed as `k x m`.
    pub fn transpose_a(mut self) -> Self {
        self.trans_a = Transpose::Yes;
        self.lda = self.m;
        self
    }

    /// Use `B^T`, with `B` stored packed as `n x k`.
    pub fn transpose_b(mut self) -> Self {
        self.trans_b = Transpose::Yes;
        self.ldb = self.k;
        self
    }

    /// Accumulate into `C` (`beta = 1`).
    pub fn accumulate(mut self) -> Self {
        self.beta = 1.0;
        self
    }

    /// Override the leading dimensions.
    pub fn with_ld(mut self, lda: usize, ldb: usize, ldc: usize) -> Self {
        self.lda = lda;
        self.ldb = ldb;
        self.ldc = ldc;
        self
    }

    /// Stored shape of `A` as `(rows, cols)`.
    pub fn a_dims(&self) -> (usize, usize) {
        match self.trans_a {
            Transpose::No => (self.m, self.k),
            Transpose::Yes => (self.k, self.m),
        }
    }

    /// Stored shape of `B` as `(rows, cols)`.
    pub fn b_dims(&self) -> (usize, usize) {
        match self.trans_b {
            Transpose::No => (self.k, self.n),
            Transpose::Yes => (self.n, self.k),
        }
    }

    pub fn a_block(&self) -> Block {
        let (rows, cols) = self.a_dims();
        Block { rows, cols, ld: self.lda }
    }

    pub fn b_block(&self) -> Block {
        let (rows, cols) = self.b_dims();
        Block { rows, cols, ld: self.ldb }
    }

    pub fn c_block(&self) -> Block {
        Block { rows: self.m, cols: self.n, ld: self.ldc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_order_and_offsets() {
        let offsets: Vec<usize> = Gate::ALL.iter().map(|g| g.offset(8)).collect();
        assert_eq!(offsets, vec![0, 8, 16, 24]);
        assert_eq!(Gate::Cell.activation(), Activation::Tanh);
        assert_eq!(Gate::Forget.activation(), Activation::Sigmoid);
    }

    #[test]
    fn test_activation_values() {
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-7);
        assert!((Activation::Tanh.apply(0.0)).abs() < 1e-7);
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_eq!(Activation::Relu.apply(3.0), 3.0);
        assert!((Activation::Sigmoid.derivative(0.0) - 0.25).abs() < 1e-7);
        assert!((Activation::Tanh.derivative(0.0) - 1.0).abs() < 1e-7);
        assert_eq!(Activation::Relu.derivative(0.0), 0.0);
        assert_eq!(Activation::Relu.derivative(0.1), 1.0);
    }

    #[test]
    fn test_pass_flags() {
        assert!(!Pass::Forward.computes_data_gradients());
        assert!(!Pass::Forward.computes_weight_gradients());
        assert!(Pass::Backward.computes_data_gradients());
        assert!(!Pass::Backward.computes_weight_gradients());
        assert!(Pass::Update.computes_weight_gradients());
        assert!(Pass::BackwardUpdate.computes_data_gradients());
        assert!(Pass::BackwardUpdate.computes_weight_gradients());
    }

    #[test]
    fn test_block_span() {
        let b = Block::new(3, 4, 16);
        assert_eq!(b.numel(), 12);
        assert_eq!(b.span(), 2 * 16 + 4);
        assert_eq!(Block::packed(0, 4).span(), 0);
    }

    #[test]
    fn test_gemm_desc_transposes() {
        let d = GemmDesc::new(2, 3, 5).transpose_a().transpose_b().accumulate();
        assert_eq!(d.a_dims(), (5, 2));
        assert_eq!(d.lda, 2);
        assert_eq!(d.b_dims(), (3, 5));
        assert_eq!(d.ldb, 5);
        assert_eq!(d.beta, 1.0);
        assert_eq!(d.c_block().span(), 6);
    }
}

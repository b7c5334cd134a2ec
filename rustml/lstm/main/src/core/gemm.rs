//! Dense multiply implementations of [`Gemm`].

use crate::api::traits::Gemm;
use crate::api::types::{GemmDesc, Transpose};
use faer::linalg::matmul::matmul;
use faer::Parallelism;

fn check_operands(desc: &GemmDesc, a: &[f32], b: &[f32], c: &[f32]) {
    let (a_span, b_span, c_span) =
        (desc.a_block().span(), desc.b_block().span(), desc.c_block().span());
    assert!(a.len() >= a_span, "gemm: A holds {} elements, tile needs {}", a.len(), a_span);
    assert!(b.len() >= b_span, "gemm: B holds {} elements, tile needs {}", b.len(), b_span);
    assert!(c.len() >= c_span, "gemm: C holds {} elements, tile needs {}", c.len(), c_span);
}

/// faer-backed multiply over strided row-major views.
#[derive(Debug, Clone, Copy)]
pub struct FaerGemm {
    parallel: bool,
}

impl Default for FaerGemm {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl FaerGemm {
    /// Runs with faer's global parallelism (see `RuntimeConfig::apply`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every product on the calling thread.
    pub fn sequential() -> Self {
        Self { parallel: false }
    }
}

impl Gemm for FaerGemm {
    fn gemm(&self, desc: &GemmDesc, a: &[f32], b: &[f32], c: &mut [f32]) {
        if desc.m == 0 || desc.n == 0 {
            return;
        }
        check_operands(desc, a, b, c);

        let (a_rows, a_cols) = desc.a_dims();
        let (b_rows, b_cols) = desc.b_dims();
        let parallelism = if self.parallel {
            faer::get_global_parallelism()
        } else {
            Parallelism::None
        };
        // faer computes acc = alpha * acc + beta * lhs * rhs; alpha None overwrites
        let keep = if desc.beta == 0.0 { None } else { Some(desc.beta) };

        // Row-major storage is a faer view with (row_stride = ld, col_stride = 1);
        // a transpose swaps the strides.
        unsafe {
            let a_mat = faer::mat::from_raw_parts::<f32, usize, usize>(
                a.as_ptr(),
                a_rows,
                a_cols,
                desc.lda as isize,
                1,
            );
            let b_mat = faer::mat::from_raw_parts::<f32, usize, usize>(
                b.as_ptr(),
                b_rows,
                b_cols,
                desc.ldb as isize,
                1,
            );
            let c_mat = faer::mat::from_raw_parts_mut::<f32, usize, usize>(
                c.as_mut_ptr(),
                desc.m,
                desc.n,
                desc.ldc as isize,
                1,
            );
            let lhs = match desc.trans_a {
                Transpose::No => a_mat,
                Transpose::Yes => a_mat.transpose(),
            };
            let rhs = match desc.trans_b {
                Transpose::No => b_mat,
                Transpose::Yes => b_mat.transpose(),
            };
            matmul(c_mat, lhs, rhs, keep, desc.alpha, parallelism);
        }
    }

    fn name(&self) -> &str {
        if self.parallel {
            "faer"
        } else {
            "faer-seq"
        }
    }
}

/// Plain triple-loop multiply, used as a reference in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveGemm;

impl Gemm for NaiveGemm {
    fn gemm(&self, desc: &GemmDesc, a: &[f32], b: &[f32], c: &mut [f32]) {
        if desc.m == 0 || desc.n == 0 {
            return;
        }
        check_operands(desc, a, b, c);

        let a_at = |i: usize, p: usize| match desc.trans_a {
            Transpose::No => a[i * desc.lda + p],
            Transpose::Yes => a[p * desc.lda + i],
        };
        let b_at = |p: usize, j: usize| match desc.trans_b {
            Transpose::No => b[p * desc.ldb + j],
            Transpose::Yes => b[j * desc.ldb + p],
        };

        for i in 0..desc.m {
            for j in 0..desc.n {
                let mut sum = 0.0f32;
                for p in 0..desc.k {
                    sum += a_at(i, p) * b_at(p, j);
                }
                let dst = &mut c[i * desc.ldc + j];
                *dst = if desc.beta == 0.0 {
                    desc.alpha * sum
                } else {
                    desc.alpha * sum + desc.beta * *dst
                };
            }
        }
    }

    fn name(&self) -> &str {
        "naive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(len: usize, seed: usize) -> Vec<f32> {
        (0..len).map(|i| (((i * 7 + seed * 13) % 23) as f32 - 11.0) / 8.0).collect()
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() < 1e-4, "index {}: {} vs {}", i, x, y);
        }
    }

    #[test]
    fn test_naive_small_product() {
        // [1 2; 3 4] * [5 6; 7 8]
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![5.0, 6.0, 7.0, 8.0];
        let mut c = vec![0.0; 4];
        NaiveGemm.gemm(&GemmDesc::new(2, 2, 2), &a, &b, &mut c);
        assert_eq!(c, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_faer_matches_naive_all_transposes() {
        let (m, n, k) = (3, 5, 4);
        for (ta, tb) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut desc = GemmDesc::new(m, n, k);
            if ta {
                desc = desc.transpose_a();
            }
            if tb {
                desc = desc.transpose_b();
            }
            let a = values(desc.a_block().span(), 1);
            let b = values(desc.b_block().span(), 2);

            let mut expected = vec![f32::NAN; m * n];
            NaiveGemm.gemm(&desc, &a, &b, &mut expected);
            let mut got = vec![f32::NAN; m * n];
            FaerGemm::sequential().gemm(&desc, &a, &b, &mut got);
            assert_close(&got, &expected);
        }
    }

    #[test]
    fn test_faer_accumulates_with_leading_dims() {
        let (m, n, k) = (2, 3, 3);
        let desc = GemmDesc::new(m, n, k).with_ld(5, 4, 7).accumulate();
        let a = values(desc.a_block().span(), 3);
        let b = values(desc.b_block().span(), 4);
        let start = values(2 * 7, 5);

        let mut expected = start.clone();
        NaiveGemm.gemm(&desc, &a, &b, &mut expected);
        let mut got = start.clone();
        FaerGemm::new().gemm(&desc, &a, &b, &mut got);
        assert_close(&got, &expected);
        // padding columns are untouched
        assert_eq!(got[3..7], start[3..7]);
    }

    #[test]
    #[should_panic(expected = "gemm: B holds")]
    fn test_short_operand_panics() {
        let desc = GemmDesc::new(2, 2, 2);
        let mut c = vec![0.0; 4];
        FaerGemm::sequential().gemm(&desc, &[0.0; 4], &[0.0; 3], &mut c);
    }
}

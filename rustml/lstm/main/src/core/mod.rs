pub mod backward;
pub mod cell;
pub mod eltwise;
pub mod flops;
pub mod forward;
pub mod gemm;
pub mod init;
pub mod layout;
pub mod runtime;
pub mod scratch;
pub mod weights;

pub mod blas;
pub mod filler;

pub use self::blas::{asum, axpby, flatten_batch, flatten_labels, gemm, scale};
pub use self::filler::{get_filler, Filler};

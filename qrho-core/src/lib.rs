//! Dense linear algebra for small open-system propagation problems.
//!
//! Operators are column-major `nalgebra` matrices of `Complex64`.
//! Everything here is allocation-light glue between the physics crate and
//! nalgebra; no BLAS/LAPACK backend is required.

extern crate approx;
extern crate nalgebra;

pub mod eig;
pub mod liouville;
pub mod reps;
pub mod util;

pub use num_complex::Complex64 as c64;
pub use reps::dense::{basis_projector, op_from_real_rows, qtrace, LinearCombination, Op, LC};

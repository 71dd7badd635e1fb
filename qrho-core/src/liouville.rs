//! Liouville-space (superoperator) helpers.
//!
//! Operators are vectorized column-major, matching nalgebra storage:
//!     vec(rho)[a + n b] = rho[a, b]
//! so that
//!     vec(X rho Y) = (Y^T (x) X) vec(rho)

use num_complex::Complex64 as c64;

use crate::reps::dense::Op;

/// Stack the columns of an n x n operator into an n^2 x 1 column
pub fn vectorize(op: &Op) -> Op {
    let n = op.nrows();
    Op::from_column_slice(n * op.ncols(), 1, op.as_slice())
}

/// Inverse of `vectorize` for a column of length n^2
pub fn unvectorize(v: &Op, n: usize) -> Op {
    assert_eq!(v.len(), n * n, "unvectorize: length is not n^2");
    Op::from_column_slice(n, n, v.as_slice())
}

/// Superoperator of rho -> X rho
pub fn spre(x: &Op) -> Op {
    let n = x.nrows();
    Op::identity(n, n).kronecker(x)
}

/// Superoperator of rho -> rho Y
pub fn spost(y: &Op) -> Op {
    let n = y.nrows();
    y.transpose().kronecker(&Op::identity(n, n))
}

/// Superoperator of rho -> X rho Y
pub fn sprepost(x: &Op, y: &Op) -> Op {
    y.transpose().kronecker(x)
}

/// Superoperator of rho -> -i [H, rho]
pub fn liouvillian(h: &Op) -> Op {
    (spre(h) - spost(h)) * c64::new(0.0, -1.0)
}

use itertools::Itertools;
use nalgebra::base::storage::{Storage, StorageMut};
use nalgebra::{Dim, Matrix, Scalar, Vector, U1};
use num_complex::Complex64 as c64;

use crate::reps::dense::Op;

/// Computes
/// out[i, j] = f( a[i], b[j] )
pub fn outer_zip_to<N, D1, S1, D2, S2, R3, C3, S3, F>(
    a: &Vector<N, D1, S1>,
    b: &Vector<N, D2, S2>,
    out: &mut Matrix<N, R3, C3, S3>,
    f: F,
) where
    N: Scalar,
    D1: Dim,
    S1: Storage<N, D1, U1>,
    D2: Dim,
    S2: Storage<N, D2, U1>,
    R3: Dim,
    C3: Dim,
    S3: StorageMut<N, R3, C3>,
    F: Fn(&N, &N) -> N,
{
    let (nrows, ncols) = out.shape();
    assert!(nrows == a.len() && ncols == b.len(), "outer_zip_to Dimensions mismatch");

    // Column major iteration
    for (m, (j, i)) in out
        .iter_mut()
        .zip((0..ncols).cartesian_product(0..nrows))
    {
        *m = f(&a[i], &b[j]);
    }
}

#[allow(non_snake_case)]
/// Performs U^dag A U
pub fn change_basis(A: &Op, U: &Op) -> Op {
    U.adjoint() * (A * U)
}

#[allow(non_snake_case)]
/// Performs U A U^dag
pub fn unchange_basis(A: &Op, U: &Op) -> Op {
    U * (A * U.adjoint())
}

/// max_ij |A_ij - conj(A_ji)|, NaN if any entry is not finite
pub fn hermiticity_deviation(a: &Op) -> f64 {
    if a.nrows() != a.ncols() {
        return f64::INFINITY;
    }
    if !all_finite(a) {
        return f64::NAN;
    }
    let n = a.nrows();
    let mut dev: f64 = 0.0;
    for i in 0..n {
        for j in i..n {
            dev = dev.max((a[(i, j)] - a[(j, i)].conj()).norm());
        }
    }
    dev
}

pub fn is_finite_c64(z: &c64) -> bool {
    z.re.is_finite() && z.im.is_finite()
}

/// True if every entry of the matrix is finite
pub fn all_finite<R: Dim, C: Dim, S: Storage<c64, R, C>>(m: &Matrix<c64, R, C, S>) -> bool {
    m.iter().all(is_finite_c64)
}

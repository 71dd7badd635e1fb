use nalgebra::{DVector, SymmetricEigen};

use crate::reps::dense::Op;

/// Eigensystem of a Hermitian operator
/// Eigenvalues are sorted in ascending order and the columns of `vecs`
/// are the corresponding orthonormal eigenvectors, so that
///     H = vecs * diag(vals) * vecs^dag
#[derive(Clone, Debug)]
pub struct HermitianEig {
    pub vals: DVector<f64>,
    pub vecs: Op,
}

/// Diagonalize a Hermitian operator.
/// Only the lower triangle is trusted; the caller is responsible for Hermiticity.
pub fn eigh(op: &Op) -> HermitianEig {
    assert_eq!(op.nrows(), op.ncols(), "eigh: operator must be square");
    let n = op.nrows();
    let eig = SymmetricEigen::new(op.clone());

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eig.eigenvalues[a]
            .partial_cmp(&eig.eigenvalues[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let vals = DVector::from_iterator(n, order.iter().map(|&i| eig.eigenvalues[i]));
    let mut vecs = Op::zeros(n, n);
    for (j, &i) in order.iter().enumerate() {
        vecs.set_column(j, &eig.eigenvectors.column(i));
    }

    HermitianEig { vals, vecs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reps::dense::op_from_real_rows;
    use crate::util::change_basis;
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64 as c64;

    #[test]
    fn test_eigh_sorted_and_diagonalizing() {
        let h = op_from_real_rows(3, &[
            0.0, 0.0, 0.0,
            0.0, 0.0, -1.0,
            0.0, -1.0, 0.0]);
        let eig = eigh(&h);
        assert_abs_diff_eq!(eig.vals[0], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(eig.vals[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(eig.vals[2], 1.0, epsilon = 1e-12);

        let d = change_basis(&h, &eig.vecs);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { eig.vals[i] } else { 0.0 };
                assert_abs_diff_eq!(d[(i, j)], c64::new(expected, 0.0), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_eigh_complex_hermitian() {
        let mut h = Op::zeros(2, 2);
        h[(0, 1)] = c64::new(0.0, -1.0);
        h[(1, 0)] = c64::new(0.0, 1.0);
        let eig = eigh(&h);
        assert_abs_diff_eq!(eig.vals[0], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(eig.vals[1], 1.0, epsilon = 1e-12);
        let u = &eig.vecs;
        let id = u.adjoint() * u;
        assert_abs_diff_eq!((id - Op::identity(2, 2)).norm(), 0.0, epsilon = 1e-12);
    }
}

use std::marker::PhantomData;

use nalgebra::base::storage::StorageMut;
use nalgebra::{DMatrix, Dim, Matrix};
use num_complex::Complex64 as c64;
use num_traits::{One, Zero};

pub type Op = DMatrix<c64>;

/// Vector-space operations needed by the explicit integrators.
/// Every state type that can be propagated implements this through a
/// zero-size helper, so the solver never needs to know its layout.
pub trait LinearCombination<S, V> {
    /// v <- k v
    fn scale(v: &mut V, k: S);

    /// target <- k v
    fn scalar_multiply_to(v: &V, k: S, target: &mut V);

    /// v <- v + k other
    fn add_scalar_mul(v: &mut V, k: S, other: &V);

    /// v <- v + other
    fn add_assign_ref(v: &mut V, other: &V);

    /// v <- v - y
    fn delta(v: &mut V, y: &V);

    /// v <- sum_i k_i vecs_i
    fn linear_combination(v: &mut V, vecs: &[V], k: &[S])
    where
        S: Copy,
    {
        assert_eq!(vecs.len(), k.len(), "linear_combination: length mismatch");
        if vecs.is_empty() {
            return;
        }
        Self::scalar_multiply_to(&vecs[0], k[0], v);
        for (x, &ki) in vecs.iter().zip(k.iter()).skip(1) {
            Self::add_scalar_mul(v, ki, x);
        }
    }
}

#[derive(Clone, Default)]
pub struct LC<N> {
    _phantom: PhantomData<N>,
}

impl<R, C, S> LinearCombination<c64, Matrix<c64, R, C, S>> for LC<c64>
where
    R: Dim,
    C: Dim,
    S: StorageMut<c64, R, C>,
{
    fn scale(v: &mut Matrix<c64, R, C, S>, k: c64) {
        *v *= k;
    }

    fn scalar_multiply_to(v: &Matrix<c64, R, C, S>, k: c64, target: &mut Matrix<c64, R, C, S>) {
        assert_eq!(v.shape(), target.shape(), "scalar_multiply_to: shape mismatch");
        for (t, &x) in target.iter_mut().zip(v.iter()) {
            *t = k * x;
        }
    }

    fn add_scalar_mul(v: &mut Matrix<c64, R, C, S>, k: c64, other: &Matrix<c64, R, C, S>) {
        assert_eq!(v.shape(), other.shape(), "add_scalar_mul: shape mismatch");
        for (y, &x) in v.iter_mut().zip(other.iter()) {
            *y += k * x;
        }
    }

    fn add_assign_ref(v: &mut Matrix<c64, R, C, S>, other: &Matrix<c64, R, C, S>) {
        *v += other;
    }

    fn delta(v: &mut Matrix<c64, R, C, S>, y: &Matrix<c64, R, C, S>) {
        *v -= y;
    }
}

/// Trace of a square operator
pub fn qtrace(op: &Op) -> c64 {
    op.diagonal().iter().fold(c64::zero(), |acc, &x| acc + x)
}

/// Real-valued matrix from row-major data, promoted to complex
pub fn op_from_real_rows(n: usize, rows: &[f64]) -> Op {
    let v: Vec<c64> = rows.iter().map(|&x| c64::new(x, 0.0)).collect();
    Op::from_row_slice(n, n, &v)
}

/// Projector |i><i| in dimension n
pub fn basis_projector(n: usize, i: usize) -> Op {
    let mut p = Op::zeros(n, n);
    p[(i, i)] = c64::one();
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_lc_combination() {
        let a = op_from_real_rows(2, &[1.0, 2.0, 3.0, 4.0]);
        let b = Op::identity(2, 2);
        let mut out = Op::zeros(2, 2);
        let k = [c64::new(2.0, 0.0), c64::new(0.0, 1.0)];
        LC::<c64>::linear_combination(&mut out, &[a.clone(), b.clone()], &k);

        assert_abs_diff_eq!(out[(0, 0)], c64::new(2.0, 1.0), epsilon = 1e-14);
        assert_abs_diff_eq!(out[(0, 1)], c64::new(4.0, 0.0), epsilon = 1e-14);
        assert_abs_diff_eq!(out[(1, 1)], c64::new(8.0, 1.0), epsilon = 1e-14);

        let mut c = a.clone();
        LC::<c64>::delta(&mut c, &a);
        assert_abs_diff_eq!(c.norm(), 0.0);
    }

    #[test]
    fn test_basis_projector() {
        let p = basis_projector(3, 1);
        assert_abs_diff_eq!(qtrace(&p).re, 1.0);
        assert_abs_diff_eq!((&p * &p - &p).norm(), 0.0);
        assert_abs_diff_eq!(p[(1, 1)].re, 1.0);
    }
}
